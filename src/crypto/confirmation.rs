//! Key confirmation: a salted keyed hash over a fixed public canary.
//!
//! Lets the reader reject a wrong pre-key quickly, before any costly KDF
//! work, without revealing anything about the key itself. Verification is
//! constant-time.

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};
use sha3::Sha3_256;

use crate::config::{ConfirmationConfig, HashAlgorithm};
use crate::constants::CONFIRMATION_CANARY;
use crate::types::{PackageError, Result};
use crate::utils::equal_ct;

/// Compute the confirmation output for a candidate pre-key.
pub fn generate(cfg: &ConfirmationConfig, pre_key: &[u8]) -> Result<Vec<u8>> {
    cfg.verify()?;
    let bad_key = |_| PackageError::ConfigInvalid("confirmation key rejected".into());
    let out = match HashAlgorithm::verify(cfg.hash)? {
        HashAlgorithm::Sha256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(pre_key).map_err(bad_key)?;
            mac.update(&cfg.salt);
            mac.update(&CONFIRMATION_CANARY);
            mac.finalize().into_bytes().to_vec()
        }
        HashAlgorithm::Sha512 => {
            let mut mac = Hmac::<Sha512>::new_from_slice(pre_key).map_err(bad_key)?;
            mac.update(&cfg.salt);
            mac.update(&CONFIRMATION_CANARY);
            mac.finalize().into_bytes().to_vec()
        }
        HashAlgorithm::Sha3_256 => {
            let mut mac = Hmac::<Sha3_256>::new_from_slice(pre_key).map_err(bad_key)?;
            mac.update(&cfg.salt);
            mac.update(&CONFIRMATION_CANARY);
            mac.finalize().into_bytes().to_vec()
        }
        HashAlgorithm::Blake3 => {
            // Keyed BLAKE3 wants exactly 32 key bytes; stretch the pre-key
            // into them first.
            let key = blake3::derive_key("obscur-core confirmation key", pre_key);
            let mut h = blake3::Hasher::new_keyed(&key);
            h.update(&cfg.salt);
            h.update(&CONFIRMATION_CANARY);
            h.finalize().as_bytes().to_vec()
        }
    };
    Ok(out)
}

/// Does the candidate pre-key reproduce the stored output?
pub fn verify(cfg: &ConfirmationConfig, expected: &[u8], candidate_pre_key: &[u8]) -> Result<bool> {
    let computed = generate(cfg, candidate_pre_key)?;
    Ok(equal_ct(&computed, expected))
}
