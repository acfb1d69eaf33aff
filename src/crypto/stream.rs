//! Stream cipher engine over the ChaCha and Salsa families.
//!
//! Encryption and decryption are the same keystream XOR; the engine keeps
//! key and nonce copies only to honour `reset`, and wipes them on drop.

use cipher::{KeyIvInit, StreamCipher};

use chacha20::{ChaCha20, XChaCha20};
use salsa20::{Salsa20, XSalsa20};
use zeroize::Zeroizing;

use crate::config::{CipherAlgorithm, CipherConfig};
use crate::constants::STREAM_OP_SIZE;
use crate::types::{PackageError, Result};

enum StreamKind {
    ChaCha20(ChaCha20),
    XChaCha20(XChaCha20),
    Salsa20(Salsa20),
    XSalsa20(XSalsa20),
}

pub struct StreamEngine {
    kind: StreamKind,
    key: Zeroizing<Vec<u8>>,
    iv: Vec<u8>,
    alg: CipherAlgorithm,
}

impl StreamEngine {
    pub fn new(cfg: &CipherConfig, key: &[u8]) -> Result<Self> {
        let alg = CipherAlgorithm::verify(cfg.cipher)?;
        let kind = build(alg, key, &cfg.iv)?;
        Ok(StreamEngine {
            kind,
            key: Zeroizing::new(key.to_vec()),
            iv: cfg.iv.clone(),
            alg,
        })
    }

    /// Operation size: a small multiple of the word size; one keystream
    /// block for this family.
    pub fn operation_size(&self) -> usize {
        STREAM_OP_SIZE
    }

    pub fn reset(&mut self) -> Result<()> {
        self.kind = build(self.alg, &self.key, &self.iv)?;
        Ok(())
    }

    pub fn process(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<usize> {
        let start = out.len();
        out.extend_from_slice(input);
        let tail = &mut out[start..];
        match &mut self.kind {
            StreamKind::ChaCha20(c) => c.apply_keystream(tail),
            StreamKind::XChaCha20(c) => c.apply_keystream(tail),
            StreamKind::Salsa20(c) => c.apply_keystream(tail),
            StreamKind::XSalsa20(c) => c.apply_keystream(tail),
        }
        Ok(input.len())
    }

    pub fn process_final(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<usize> {
        self.process(input, out)
    }
}

fn build(alg: CipherAlgorithm, key: &[u8], iv: &[u8]) -> Result<StreamKind> {
    let bad = |_| PackageError::ConfigInvalid("stream cipher key or nonce length rejected".into());
    Ok(match alg {
        CipherAlgorithm::ChaCha20 => StreamKind::ChaCha20(ChaCha20::new_from_slices(key, iv).map_err(bad)?),
        CipherAlgorithm::XChaCha20 => {
            StreamKind::XChaCha20(XChaCha20::new_from_slices(key, iv).map_err(bad)?)
        }
        CipherAlgorithm::Salsa20 => StreamKind::Salsa20(Salsa20::new_from_slices(key, iv).map_err(bad)?),
        CipherAlgorithm::XSalsa20 => {
            StreamKind::XSalsa20(XSalsa20::new_from_slices(key, iv).map_err(bad)?)
        }
        _ => {
            return Err(PackageError::ConfigInvalid(
                "not a stream cipher".into(),
            ))
        }
    })
}
