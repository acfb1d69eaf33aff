//! MAC pass-through decorators.
//!
//! Every byte crossing the decorator, in either direction, feeds the
//! keyed MAC. `update` lets the caller mix extra bound context (serialized
//! configuration, item metadata) into the tag after the stream traffic
//! and before finalization.

use std::io::{self, Read, Write};

use crate::crypto::MacEngine;

pub struct MacWriter<W: Write> {
    inner: W,
    mac: MacEngine,
    bytes: u64,
}

impl<W: Write> MacWriter<W> {
    pub fn new(inner: W, mac: MacEngine) -> Self {
        MacWriter {
            inner,
            mac,
            bytes: 0,
        }
    }

    /// Bytes that traversed the decorator (extra `update` data excluded).
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Mix extra bytes into the MAC without writing them anywhere.
    pub fn update(&mut self, extra: &[u8]) {
        self.mac.update(extra);
    }

    /// Produce the tag and hand back the underlying stream.
    pub fn finish(self) -> (W, Vec<u8>) {
        (self.inner, self.mac.finish())
    }
}

impl<W: Write> Write for MacWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.mac.update(&buf[..n]);
        self.bytes += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

pub struct MacReader<R: Read> {
    inner: R,
    mac: MacEngine,
    bytes: u64,
}

impl<R: Read> MacReader<R> {
    pub fn new(inner: R, mac: MacEngine) -> Self {
        MacReader {
            inner,
            mac,
            bytes: 0,
        }
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn update(&mut self, extra: &[u8]) {
        self.mac.update(extra);
    }

    pub fn finish(self) -> (R, Vec<u8>) {
        (self.inner, self.mac.finish())
    }
}

impl<R: Read> Read for MacReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.mac.update(&buf[..n]);
        self.bytes += n as u64;
        Ok(n)
    }
}
