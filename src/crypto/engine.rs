//! Uniform cipher engine facade.
//!
//! One type drives every symmetric transform in the crate: block cipher +
//! mode (+ padding), raw stream cipher, or one-shot AEAD. The stream
//! decorators and the payload multiplexer speak only this interface.

use crate::config::CipherConfig;
use crate::crypto::aead::AeadEngine;
use crate::crypto::block::BlockEngine;
use crate::crypto::stream::StreamEngine;
use crate::config::CipherAlgorithm;
use crate::types::{PackageError, Result};

pub enum CipherEngine {
    Block(BlockEngine),
    Stream(StreamEngine),
    Aead(AeadEngine),
}

impl std::fmt::Debug for CipherEngine {
    // Deliberately omits field contents: engines hold key material.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let variant = match self {
            CipherEngine::Block(_) => "Block",
            CipherEngine::Stream(_) => "Stream",
            CipherEngine::Aead(_) => "Aead",
        };
        f.debug_tuple("CipherEngine").field(&variant).finish()
    }
}

impl CipherEngine {
    /// Validate the configuration and key, then build the matching engine.
    pub fn new(encrypt: bool, cfg: &CipherConfig, key: &[u8]) -> Result<Self> {
        cfg.verify()?;
        if key.len() != cfg.key_len as usize {
            return Err(PackageError::ConfigInvalid(
                "cipher key length disagrees with its config".into(),
            ));
        }
        if cfg.is_aead() {
            return Ok(CipherEngine::Aead(AeadEngine::new(encrypt, cfg, key)?));
        }
        let alg = CipherAlgorithm::verify(cfg.cipher)?;
        if alg.is_block() {
            Ok(CipherEngine::Block(BlockEngine::new(encrypt, cfg, key)?))
        } else {
            Ok(CipherEngine::Stream(StreamEngine::new(cfg, key)?))
        }
    }

    /// Smallest chunk processed atomically: block size for block modes, a
    /// keystream block for stream ciphers.
    pub fn operation_size(&self) -> usize {
        match self {
            CipherEngine::Block(e) => e.operation_size(),
            CipherEngine::Stream(e) => e.operation_size(),
            CipherEngine::Aead(e) => e.operation_size(),
        }
    }

    pub fn is_aead(&self) -> bool {
        matches!(self, CipherEngine::Aead(_))
    }

    /// Process exactly one operation-sized input; appends to `out` and
    /// returns the appended length.
    pub fn process(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<usize> {
        match self {
            CipherEngine::Block(e) => e.process(input, out),
            CipherEngine::Stream(e) => e.process(input, out),
            CipherEngine::Aead(e) => e.process(input, out),
        }
    }

    /// Process the trailing partial operation (possibly empty) and flush
    /// whatever the mode holds back.
    pub fn process_final(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<usize> {
        match self {
            CipherEngine::Block(e) => e.process_final(input, out),
            CipherEngine::Stream(e) => e.process_final(input, out),
            CipherEngine::Aead(e) => e.process_final(input, out),
        }
    }

    /// Return to the freshly-initialized state (same key and IV).
    pub fn reset(&mut self) -> Result<()> {
        match self {
            CipherEngine::Block(e) => {
                e.reset();
                Ok(())
            }
            CipherEngine::Stream(e) => e.reset(),
            CipherEngine::Aead(e) => {
                e.reset();
                Ok(())
            }
        }
    }
}
