//! Per-item Encrypt-then-MAC pipelines.
//!
//! Design notes:
//! - A pipeline owns its cipher and MAC engines plus stride buffers, and
//!   nothing else; the outer stream is passed into each call, so many
//!   pipelines can interleave over one stream without shared borrows.
//! - Ordering is structural: plaintext can only reach the outer stream by
//!   flowing through the cipher engine, and every ciphertext byte is fed
//!   to the MAC in emission order before it is written or after it is
//!   read. No item sees another item's cipher or MAC state.
//! - Finalization mixes the item's serialized metadata (tag and internal
//!   length cleared) into the MAC, binding configuration to ciphertext.

use std::io::{Read, Write};

use zeroize::Zeroize;

use crate::crypto::{CipherEngine, MacEngine};
use crate::types::{PackageError, Result};
use crate::utils::read_exact_or_eof;

fn reject_non_streamable(engine: &CipherEngine) -> Result<()> {
    if engine.is_aead() {
        return Err(PackageError::ConfigInvalid(
            "AEAD configurations cannot back a payload item".into(),
        ));
    }
    Ok(())
}

/// Write-side pipeline: plaintext segments in, MACed ciphertext out.
pub struct ItemWriter {
    engine: CipherEngine,
    mac: MacEngine,
    op: usize,
    /// Plaintext awaiting a full operation.
    carry: Vec<u8>,
    /// Ciphertext staging for the current call.
    staged: Vec<u8>,
    bytes_in: u64,
    bytes_out: u64,
}

impl ItemWriter {
    pub fn new(engine: CipherEngine, mac: MacEngine) -> Result<Self> {
        reject_non_streamable(&engine)?;
        let op = engine.operation_size();
        Ok(ItemWriter {
            engine,
            mac,
            op,
            carry: Vec::with_capacity(op),
            staged: Vec::new(),
            bytes_in: 0,
            bytes_out: 0,
        })
    }

    /// Encrypt one segment and push its ciphertext through the MAC into
    /// the outer stream.
    pub fn write_segment<W: Write + ?Sized>(&mut self, outer: &mut W, mut data: &[u8]) -> Result<()> {
        self.bytes_in += data.len() as u64;
        self.staged.clear();

        if !self.carry.is_empty() {
            let take = data.len().min(self.op - self.carry.len());
            self.carry.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.carry.len() == self.op {
                let carry = std::mem::take(&mut self.carry);
                self.engine.process(&carry, &mut self.staged)?;
                self.carry = carry;
                self.carry.zeroize();
            }
        }
        while data.len() >= self.op {
            self.engine.process(&data[..self.op], &mut self.staged)?;
            data = &data[self.op..];
        }
        if !data.is_empty() {
            self.carry.extend_from_slice(data);
        }

        self.mac.update(&self.staged);
        outer.write_all(&self.staged)?;
        self.bytes_out += self.staged.len() as u64;
        Ok(())
    }

    /// Flush the cipher, bind the item metadata, and produce the tag.
    /// Returns `(tag, plaintext_in, ciphertext_out)`.
    pub fn finish<W: Write + ?Sized>(
        mut self,
        outer: &mut W,
        bound_metadata: &[u8],
    ) -> Result<(Vec<u8>, u64, u64)> {
        self.staged.clear();
        let carry = std::mem::take(&mut self.carry);
        self.engine.process_final(&carry, &mut self.staged)?;
        let mut carry = carry;
        carry.zeroize();

        self.mac.update(&self.staged);
        outer.write_all(&self.staged)?;
        self.bytes_out += self.staged.len() as u64;

        self.mac.update(bound_metadata);
        let tag = self.mac.finish();
        Ok((tag, self.bytes_in, self.bytes_out))
    }
}

/// Read-side pipeline: MACed ciphertext in, plaintext segments out.
pub struct ItemReader {
    engine: CipherEngine,
    mac: MacEngine,
    op: usize,
    /// Ciphertext awaiting a full operation.
    carry: Vec<u8>,
    /// Plaintext staging for the current call.
    staged: Vec<u8>,
    bytes_in: u64,
    bytes_out: u64,
}

impl ItemReader {
    pub fn new(engine: CipherEngine, mac: MacEngine) -> Result<Self> {
        reject_non_streamable(&engine)?;
        let op = engine.operation_size();
        Ok(ItemReader {
            engine,
            mac,
            op,
            carry: Vec::with_capacity(op),
            staged: Vec::new(),
            bytes_in: 0,
            bytes_out: 0,
        })
    }

    /// Pull exactly `len` ciphertext bytes for this item, feed them to the
    /// MAC, decrypt whole operations, and write plaintext to the sink.
    pub fn read_segment<R: Read + ?Sized, W: Write + ?Sized>(
        &mut self,
        outer: &mut R,
        len: usize,
        sink: &mut W,
    ) -> Result<()> {
        let mut ct = vec![0u8; len];
        let got = read_exact_or_eof(outer, &mut ct)?;
        if got != len {
            return Err(PackageError::FormatInvalid(
                "payload body ends before the manifest says it should".into(),
            ));
        }
        self.bytes_in += len as u64;
        self.mac.update(&ct);

        self.staged.clear();
        let mut data: &[u8] = &ct;
        if !self.carry.is_empty() {
            let take = data.len().min(self.op - self.carry.len());
            self.carry.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.carry.len() == self.op {
                let carry = std::mem::take(&mut self.carry);
                self.engine.process(&carry, &mut self.staged)?;
                self.carry = carry;
                self.carry.clear();
            }
        }
        while data.len() >= self.op {
            self.engine.process(&data[..self.op], &mut self.staged)?;
            data = &data[self.op..];
        }
        if !data.is_empty() {
            self.carry.extend_from_slice(data);
        }

        sink.write_all(&self.staged)?;
        self.bytes_out += self.staged.len() as u64;
        self.staged.zeroize();
        Ok(())
    }

    /// Flush the cipher tail into the sink, bind the item metadata, and
    /// return `(computed_tag, plaintext_out)` for constant-time compare.
    pub fn finish<W: Write + ?Sized>(
        mut self,
        sink: &mut W,
        bound_metadata: &[u8],
    ) -> Result<(Vec<u8>, u64)> {
        self.staged.clear();
        let carry = std::mem::take(&mut self.carry);
        self.engine.process_final(&carry, &mut self.staged)?;

        sink.write_all(&self.staged)?;
        self.bytes_out += self.staged.len() as u64;
        self.staged.zeroize();

        self.mac.update(bound_metadata);
        let tag = self.mac.finish();
        Ok((tag, self.bytes_out))
    }
}
