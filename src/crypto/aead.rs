//! Bare AEAD primitive: AES-GCM, AES-EAX, and ChaCha20-Poly1305.
//!
//! Design notes:
//! - One-shot seal/open semantics: the engine buffers its whole input and
//!   emits ciphertext-plus-tag (or plaintext) at `process_final`.
//! - Tag verification is constant-time inside the AEAD crates and fails
//!   closed; no partial plaintext is ever released.
//! - The packaging pipelines never construct this engine; authentication
//!   there is the separate MAC decorator. Building a cipher stream or a
//!   payload item over an AEAD configuration is rejected up front.

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use chacha20poly1305::ChaCha20Poly1305;
use eax::Eax;

use aes::{Aes128, Aes192, Aes256};

use crate::config::{BlockMode, CipherAlgorithm, CipherConfig};
use crate::constants::{cipher_ids, mode_ids};
use crate::types::{AuthScope, PackageError, Result};

enum AeadKind {
    Aes128Gcm(Aes128Gcm),
    Aes256Gcm(Aes256Gcm),
    EaxAes128(Eax<Aes128>),
    EaxAes192(Eax<Aes192>),
    EaxAes256(Eax<Aes256>),
    ChaCha20Poly1305(ChaCha20Poly1305),
}

pub struct AeadEngine {
    encrypt: bool,
    kind: AeadKind,
    nonce: Vec<u8>,
    aad: Vec<u8>,
    buf: Vec<u8>,
}

impl AeadEngine {
    pub fn new(encrypt: bool, cfg: &CipherConfig, key: &[u8]) -> Result<Self> {
        if !cfg.is_aead() {
            return Err(PackageError::ConfigInvalid(
                "configuration does not name an AEAD composition".into(),
            ));
        }
        let bad_key = |_| PackageError::ConfigInvalid("AEAD key length rejected".into());
        let kind = if cfg.cipher == cipher_ids::CHACHA20 && cfg.mode == mode_ids::POLY1305 {
            AeadKind::ChaCha20Poly1305(ChaCha20Poly1305::new_from_slice(key).map_err(bad_key)?)
        } else {
            let alg = CipherAlgorithm::verify(cfg.cipher)?;
            let mode = BlockMode::verify(cfg.mode)?;
            match (alg, mode) {
                (CipherAlgorithm::Aes128, BlockMode::Gcm) => {
                    AeadKind::Aes128Gcm(Aes128Gcm::new_from_slice(key).map_err(bad_key)?)
                }
                (CipherAlgorithm::Aes256, BlockMode::Gcm) => {
                    AeadKind::Aes256Gcm(Aes256Gcm::new_from_slice(key).map_err(bad_key)?)
                }
                (CipherAlgorithm::Aes128, BlockMode::Eax) => {
                    AeadKind::EaxAes128(Eax::<Aes128>::new_from_slice(key).map_err(bad_key)?)
                }
                (CipherAlgorithm::Aes192, BlockMode::Eax) => {
                    AeadKind::EaxAes192(Eax::<Aes192>::new_from_slice(key).map_err(bad_key)?)
                }
                (CipherAlgorithm::Aes256, BlockMode::Eax) => {
                    AeadKind::EaxAes256(Eax::<Aes256>::new_from_slice(key).map_err(bad_key)?)
                }
                (alg, mode) => {
                    return Err(PackageError::ConfigInvalid(format!(
                        "unsupported AEAD composition {:?}/{:?}",
                        alg, mode
                    )))
                }
            }
        };
        Ok(AeadEngine {
            encrypt,
            kind,
            nonce: cfg.iv.clone(),
            aad: Vec::new(),
            buf: Vec::new(),
        })
    }

    /// Associated data mixed into the tag; must be set before any input.
    pub fn set_associated_data(&mut self, aad: &[u8]) -> Result<()> {
        if !self.buf.is_empty() {
            return Err(PackageError::ConfigInvalid(
                "associated data must precede message input".into(),
            ));
        }
        self.aad = aad.to_vec();
        Ok(())
    }

    pub fn operation_size(&self) -> usize {
        16
    }

    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Buffer an operation; AEAD emits nothing until finalization.
    pub fn process(&mut self, input: &[u8], _out: &mut Vec<u8>) -> Result<usize> {
        self.buf.extend_from_slice(input);
        Ok(0)
    }

    /// Seal or open the buffered message. Sealing appends the tag to the
    /// output; opening verifies it and yields the plaintext.
    pub fn process_final(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<usize> {
        self.buf.extend_from_slice(input);
        let payload = Payload {
            msg: &self.buf,
            aad: &self.aad,
        };
        let produced = if self.encrypt {
            self.seal(payload)?
        } else {
            self.open(payload)?
        };
        self.buf.clear();
        out.extend_from_slice(&produced);
        Ok(produced.len())
    }

    fn seal(&self, payload: Payload<'_, '_>) -> Result<Vec<u8>> {
        let fail = |_| PackageError::ConfigInvalid("AEAD seal failed".into());
        match &self.kind {
            AeadKind::Aes128Gcm(c) => c.encrypt(GenericArray::from_slice(&self.nonce), payload).map_err(fail),
            AeadKind::Aes256Gcm(c) => c.encrypt(GenericArray::from_slice(&self.nonce), payload).map_err(fail),
            AeadKind::EaxAes128(c) => c.encrypt(GenericArray::from_slice(&self.nonce), payload).map_err(fail),
            AeadKind::EaxAes192(c) => c.encrypt(GenericArray::from_slice(&self.nonce), payload).map_err(fail),
            AeadKind::EaxAes256(c) => c.encrypt(GenericArray::from_slice(&self.nonce), payload).map_err(fail),
            AeadKind::ChaCha20Poly1305(c) => {
                c.encrypt(GenericArray::from_slice(&self.nonce), payload).map_err(fail)
            }
        }
    }

    fn open(&self, payload: Payload<'_, '_>) -> Result<Vec<u8>> {
        let fail = |_| PackageError::CiphertextAuthentication(AuthScope::PayloadItem);
        match &self.kind {
            AeadKind::Aes128Gcm(c) => c.decrypt(GenericArray::from_slice(&self.nonce), payload).map_err(fail),
            AeadKind::Aes256Gcm(c) => c.decrypt(GenericArray::from_slice(&self.nonce), payload).map_err(fail),
            AeadKind::EaxAes128(c) => c.decrypt(GenericArray::from_slice(&self.nonce), payload).map_err(fail),
            AeadKind::EaxAes192(c) => c.decrypt(GenericArray::from_slice(&self.nonce), payload).map_err(fail),
            AeadKind::EaxAes256(c) => c.decrypt(GenericArray::from_slice(&self.nonce), payload).map_err(fail),
            AeadKind::ChaCha20Poly1305(c) => {
                c.decrypt(GenericArray::from_slice(&self.nonce), payload).map_err(fail)
            }
        }
    }
}
