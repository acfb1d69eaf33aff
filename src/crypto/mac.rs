//! Keyed MAC engine: HMAC over SHA-2/SHA-3, keyed BLAKE3, and Poly1305.
//!
//! Security notes:
//! - Poly1305 is a one-time authenticator; the packaging layers feed it
//!   only freshly generated or freshly derived single-use keys.
//! - Tags are compared exclusively through `utils::equal_ct`.

use hmac::{Hmac, Mac};
use poly1305::universal_hash::{KeyInit as UhKeyInit, UniversalHash};
use poly1305::Poly1305;
use sha2::{Sha256, Sha512};
use sha3::Sha3_256;
use zeroize::Zeroizing;

use crate::config::{AuthConfig, MacAlgorithm};
use crate::types::{PackageError, Result};

enum MacKind {
    HmacSha256(Hmac<Sha256>),
    HmacSha512(Hmac<Sha512>),
    HmacSha3_256(Hmac<Sha3_256>),
    Blake3Keyed(Box<blake3::Hasher>),
    Poly1305 {
        state: Poly1305,
        buf: [u8; 16],
        buf_len: usize,
    },
}

pub struct MacEngine {
    kind: MacKind,
    alg: MacAlgorithm,
    key: Zeroizing<Vec<u8>>,
}

impl MacEngine {
    pub fn new(cfg: &AuthConfig, key: &[u8]) -> Result<Self> {
        cfg.verify()?;
        if key.len() != cfg.key_len as usize {
            return Err(PackageError::ConfigInvalid(
                "MAC key length disagrees with its config".into(),
            ));
        }
        let alg = MacAlgorithm::verify(cfg.mac)?;
        let kind = build(alg, key)?;
        Ok(MacEngine {
            kind,
            alg,
            key: Zeroizing::new(key.to_vec()),
        })
    }

    pub fn output_size(&self) -> usize {
        self.alg.output_size()
    }

    pub fn update(&mut self, data: &[u8]) {
        match &mut self.kind {
            MacKind::HmacSha256(m) => m.update(data),
            MacKind::HmacSha512(m) => m.update(data),
            MacKind::HmacSha3_256(m) => m.update(data),
            MacKind::Blake3Keyed(h) => {
                h.update(data);
            }
            MacKind::Poly1305 { state, buf, buf_len } => {
                let mut rest = data;
                if *buf_len > 0 {
                    let take = rest.len().min(16 - *buf_len);
                    buf[*buf_len..*buf_len + take].copy_from_slice(&rest[..take]);
                    *buf_len += take;
                    rest = &rest[take..];
                    if *buf_len == 16 {
                        state.update(&[(*buf).into()]);
                        *buf_len = 0;
                    }
                }
                let whole = rest.len() - rest.len() % 16;
                if whole > 0 {
                    let blocks: Vec<poly1305::Block> = rest[..whole]
                        .chunks_exact(16)
                        .map(|c| {
                            let mut b = [0u8; 16];
                            b.copy_from_slice(c);
                            b.into()
                        })
                        .collect();
                    state.update(&blocks);
                    rest = &rest[whole..];
                }
                if !rest.is_empty() {
                    buf[..rest.len()].copy_from_slice(rest);
                    *buf_len = rest.len();
                }
            }
        }
    }

    /// Produce the final tag, consuming the engine.
    pub fn finish(self) -> Vec<u8> {
        match self.kind {
            MacKind::HmacSha256(m) => m.finalize().into_bytes().to_vec(),
            MacKind::HmacSha512(m) => m.finalize().into_bytes().to_vec(),
            MacKind::HmacSha3_256(m) => m.finalize().into_bytes().to_vec(),
            MacKind::Blake3Keyed(h) => h.finalize().as_bytes().to_vec(),
            MacKind::Poly1305 {
                mut state,
                buf,
                buf_len,
            } => {
                if buf_len > 0 {
                    state.update_padded(&buf[..buf_len]);
                }
                state.finalize().to_vec()
            }
        }
    }

    /// Discard accumulated input, keeping the key.
    pub fn reset(&mut self) -> Result<()> {
        self.kind = build(self.alg, &self.key)?;
        Ok(())
    }
}

fn build(alg: MacAlgorithm, key: &[u8]) -> Result<MacKind> {
    let bad_key = |_| PackageError::ConfigInvalid("MAC key length rejected".into());
    Ok(match alg {
        MacAlgorithm::HmacSha256 => {
            MacKind::HmacSha256(<Hmac<Sha256> as Mac>::new_from_slice(key).map_err(bad_key)?)
        }
        MacAlgorithm::HmacSha512 => {
            MacKind::HmacSha512(<Hmac<Sha512> as Mac>::new_from_slice(key).map_err(bad_key)?)
        }
        MacAlgorithm::HmacSha3_256 => {
            MacKind::HmacSha3_256(<Hmac<Sha3_256> as Mac>::new_from_slice(key).map_err(bad_key)?)
        }
        MacAlgorithm::Blake3Keyed => {
            let key32: [u8; 32] = key
                .try_into()
                .map_err(|_| PackageError::ConfigInvalid("keyed BLAKE3 takes a 32-byte key".into()))?;
            MacKind::Blake3Keyed(Box::new(blake3::Hasher::new_keyed(&key32)))
        }
        MacAlgorithm::Poly1305 => {
            let state = Poly1305::new_from_slice(key).map_err(bad_key)?;
            MacKind::Poly1305 {
                state,
                buf: [0u8; 16],
                buf_len: 0,
            }
        }
    })
}
