//! Cipher stream decorators.
//!
//! Design notes:
//! - `CipherWriter` accumulates plaintext into an operation buffer, runs
//!   the engine in exact-operation strides, and smooths ciphertext
//!   through a ring so the underlying stream only ever sees whole
//!   operations until finalization.
//! - `CipherReader` pulls ciphertext one operation at a time; end of the
//!   underlying stream triggers finish-read, where a trailing partial in
//!   a non-streamable mode surfaces as `IncompleteBlock`.
//! - Finalization is exactly-once. A finished writer rejects writes; a
//!   finished reader reports end of stream.
//! - AEAD engines are rejected at construction, before any I/O.

use std::io::{Read, Write};

use zeroize::Zeroize;

use crate::constants::{RING_OPS_DECRYPT, RING_OPS_ENCRYPT};
use crate::crypto::CipherEngine;
use crate::types::{PackageError, Result};
use crate::utils::read_exact_or_eof;

fn reject_aead(engine: &CipherEngine) -> Result<()> {
    if engine.is_aead() {
        return Err(PackageError::ConfigInvalid(
            "AEAD modes are not usable in a cipher stream; authentication is the MAC decorator's job"
                .into(),
        ));
    }
    Ok(())
}

impl<W: Write> std::fmt::Debug for CipherWriter<W> {
    // Deliberately omits field contents: the engine holds key material.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherWriter").finish_non_exhaustive()
    }
}

pub struct CipherWriter<W: Write> {
    inner: W,
    engine: CipherEngine,
    op: usize,
    op_buf: Vec<u8>,
    ring: Vec<u8>,
    ring_cap: usize,
    bytes_in: u64,
    bytes_out: u64,
    finished: bool,
}

impl<W: Write> CipherWriter<W> {
    pub fn new(inner: W, engine: CipherEngine) -> Result<Self> {
        reject_aead(&engine)?;
        let op = engine.operation_size();
        Ok(CipherWriter {
            inner,
            engine,
            op,
            op_buf: Vec::with_capacity(op),
            ring: Vec::with_capacity(op * RING_OPS_ENCRYPT),
            ring_cap: op * RING_OPS_ENCRYPT,
            bytes_in: 0,
            bytes_out: 0,
            finished: false,
        })
    }

    /// Plaintext bytes accepted so far.
    pub fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    /// Ciphertext bytes pushed to the underlying stream so far.
    pub fn bytes_out(&self) -> u64 {
        self.bytes_out
    }

    pub fn write_all(&mut self, mut data: &[u8]) -> Result<()> {
        if self.finished {
            return Err(PackageError::ConfigInvalid(
                "write to a finished cipher stream".into(),
            ));
        }
        self.bytes_in += data.len() as u64;

        // Top up a pending partial operation first.
        if !self.op_buf.is_empty() {
            let take = data.len().min(self.op - self.op_buf.len());
            self.op_buf.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.op_buf.len() == self.op {
                let buf = std::mem::take(&mut self.op_buf);
                self.engine.process(&buf, &mut self.ring)?;
                self.op_buf = buf;
                self.op_buf.zeroize();
                self.op_buf.clear();
                self.maybe_drain()?;
            }
        }

        // Exact-operation strides.
        while data.len() >= self.op {
            self.engine.process(&data[..self.op], &mut self.ring)?;
            data = &data[self.op..];
            self.maybe_drain()?;
        }

        // Trailing partial stays buffered.
        if !data.is_empty() {
            self.op_buf.extend_from_slice(data);
        }
        Ok(())
    }

    /// Flush the trailing partial through `process_final` and drain the
    /// ring. Exactly-once; a second call is a no-op.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        let buf = std::mem::take(&mut self.op_buf);
        self.engine.process_final(&buf, &mut self.ring)?;
        let mut buf = buf;
        buf.zeroize();
        self.drain()?;
        self.inner.flush()?;
        self.finished = true;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn maybe_drain(&mut self) -> Result<()> {
        if self.ring_cap - self.ring.len().min(self.ring_cap) < self.op {
            self.drain()?;
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        if !self.ring.is_empty() {
            self.inner.write_all(&self.ring)?;
            self.bytes_out += self.ring.len() as u64;
            self.ring.clear();
        }
        Ok(())
    }
}

impl<R: Read> std::fmt::Debug for CipherReader<R> {
    // Deliberately omits field contents: the engine holds key material.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherReader").finish_non_exhaustive()
    }
}

pub struct CipherReader<R: Read> {
    inner: R,
    engine: CipherEngine,
    op: usize,
    /// Decrypted bytes not yet handed to the caller.
    out_ring: Vec<u8>,
    out_pos: usize,
    ring_cap: usize,
    bytes_in: u64,
    bytes_out: u64,
    finished: bool,
}

impl<R: Read> CipherReader<R> {
    pub fn new(inner: R, engine: CipherEngine) -> Result<Self> {
        reject_aead(&engine)?;
        let op = engine.operation_size();
        Ok(CipherReader {
            inner,
            engine,
            op,
            out_ring: Vec::with_capacity(op * RING_OPS_DECRYPT),
            out_pos: 0,
            ring_cap: op * RING_OPS_DECRYPT,
            bytes_in: 0,
            bytes_out: 0,
            finished: false,
        })
    }

    /// Ciphertext bytes pulled from the underlying stream.
    pub fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    /// Plaintext bytes handed to the caller.
    pub fn bytes_out(&self) -> u64 {
        self.bytes_out
    }

    /// Read decrypted bytes. Returns 0 only once the underlying stream is
    /// exhausted and finish-read has run.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            // Serve buffered plaintext first.
            if self.out_pos < self.out_ring.len() {
                let n = buf.len().min(self.out_ring.len() - self.out_pos);
                buf[..n].copy_from_slice(&self.out_ring[self.out_pos..self.out_pos + n]);
                self.out_pos += n;
                self.bytes_out += n as u64;
                if self.out_pos == self.out_ring.len() {
                    self.out_ring.zeroize();
                    self.out_ring.clear();
                    self.out_pos = 0;
                }
                return Ok(n);
            }
            if self.finished {
                return Ok(0);
            }
            self.refill()?;
        }
    }

    /// Read until the stream is exhausted, appending to `out`.
    pub fn read_to_end(&mut self, out: &mut Vec<u8>) -> Result<usize> {
        let mut chunk = vec![0u8; self.op.max(512)];
        let mut total = 0;
        loop {
            let n = self.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
            total += n;
        }
        chunk.zeroize();
        Ok(total)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn refill(&mut self) -> Result<()> {
        debug_assert!(self.out_pos == 0 && self.out_ring.is_empty());
        let mut op_buf = vec![0u8; self.op];
        let n = read_exact_or_eof(&mut self.inner, &mut op_buf)?;
        self.bytes_in += n as u64;
        if n == self.op {
            self.engine.process(&op_buf, &mut self.out_ring)?;
        } else {
            // End of underlying stream: finish-read.
            self.engine.process_final(&op_buf[..n], &mut self.out_ring)?;
            self.finished = true;
        }
        op_buf.zeroize();
        // The ring only ever holds what one engine emission produced, so
        // its occupancy stays within ring_cap by construction.
        debug_assert!(self.out_ring.len() <= self.ring_cap.max(2 * self.op));
        Ok(())
    }
}
