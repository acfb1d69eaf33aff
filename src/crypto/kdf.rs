//! Working-key derivation.
//!
//! One invocation of the configured KDF stretches a pre-key into
//! `cipher_key_len + mac_key_len` bytes, split in that order. The same
//! configuration therefore always yields the same key pair, and the two
//! keys never leave their zeroizing wrappers.
//!
//! Security notes:
//! - Pre-keys are never used directly for encryption or authentication;
//!   everything passes through here first.
//! - Parameter policy lives in the config layer (`KdfConfig::verify`);
//!   this module re-checks it so a hand-built config cannot bypass it.

use hkdf::Hkdf;
use pbkdf2::pbkdf2_hmac;
use scrypt::Params as ScryptParams;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::config::{KdfAlgorithm, KdfConfig};
use crate::types::{PackageError, Result};

/// Info string binding HKDF output to this crate's key schedule.
const HKDF_INFO: &[u8] = b"obscur-core working keys";

/// Derive `(cipher_key, mac_key)` of the requested lengths from a pre-key.
pub fn derive_working_keys(
    pre_key: &[u8],
    cipher_key_len: usize,
    mac_key_len: usize,
    cfg: &KdfConfig,
) -> Result<(Zeroizing<Vec<u8>>, Zeroizing<Vec<u8>>)> {
    cfg.verify()?;
    if pre_key.is_empty() {
        return Err(PackageError::ConfigInvalid("pre-key must not be empty".into()));
    }
    let total = cipher_key_len + mac_key_len;
    let mut okm = Zeroizing::new(vec![0u8; total]);

    match KdfAlgorithm::verify(cfg.kdf)? {
        KdfAlgorithm::Scrypt => {
            let params = ScryptParams::new(cfg.log2_n, cfg.r, cfg.p, total)
                .map_err(|_| PackageError::ConfigInvalid("scrypt parameters rejected".into()))?;
            scrypt::scrypt(pre_key, &cfg.salt, &params, &mut okm)
                .map_err(|_| PackageError::ConfigInvalid("scrypt output length rejected".into()))?;
        }
        KdfAlgorithm::Pbkdf2 => {
            pbkdf2_hmac::<Sha256>(pre_key, &cfg.salt, cfg.iterations, &mut okm);
        }
        KdfAlgorithm::HkdfSha256 => {
            let hk = Hkdf::<Sha256>::new(Some(&cfg.salt), pre_key);
            hk.expand(HKDF_INFO, &mut okm)
                .map_err(|_| PackageError::ConfigInvalid("HKDF output length rejected".into()))?;
        }
    }

    let cipher_key = Zeroizing::new(okm[..cipher_key_len].to_vec());
    let mac_key = Zeroizing::new(okm[cipher_key_len..].to_vec());
    Ok((cipher_key, mac_key))
}
