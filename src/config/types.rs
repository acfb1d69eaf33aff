//! Configuration and manifest DTOs.
//!
//! Design notes:
//! - Algorithm selectors are u16 registry ids (see `constants`); the
//!   typed enums below exist for validation and readable diagnostics.
//! - Everything here is serialized with the crate codec (`config::codec`)
//!   except `ManifestHeader`, which has an explicit little-endian layout.
//! - Key-bearing fields are wiped on drop; the manifest is the only place
//!   item working keys ever rest.

use std::fmt;

use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::constants::{
    cipher_ids, curve_ids, hash_ids, kdf_ids, kdf_policy, mac_ids, mode_ids, padding_ids,
    LAYOUT_FRAMESHIFT, LAYOUT_SIMPLE, MAX_PAD_RUN, PRNG_CHACHA20, PRNG_SEED_LEN,
};
use crate::types::{PackageError, Result};
use crate::utils::enum_name_or_hex;

#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, TryFromPrimitive)]
pub enum CipherAlgorithm {
    Aes128 = cipher_ids::AES128,
    Aes192 = cipher_ids::AES192,
    Aes256 = cipher_ids::AES256,
    ChaCha20 = cipher_ids::CHACHA20,
    XChaCha20 = cipher_ids::XCHACHA20,
    Salsa20 = cipher_ids::SALSA20,
    XSalsa20 = cipher_ids::XSALSA20,
}

impl CipherAlgorithm {
    pub fn verify(raw: u16) -> Result<Self> {
        Self::try_from_primitive(raw).map_err(|_| {
            PackageError::ConfigInvalid(format!(
                "unknown cipher: {}",
                enum_name_or_hex::<CipherAlgorithm>(raw)
            ))
        })
    }

    pub fn is_block(self) -> bool {
        matches!(self, Self::Aes128 | Self::Aes192 | Self::Aes256)
    }
}

#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, TryFromPrimitive)]
pub enum BlockMode {
    Ctr = mode_ids::CTR,
    Cbc = mode_ids::CBC,
    Cfb = mode_ids::CFB,
    Ofb = mode_ids::OFB,
    Cts = mode_ids::CTS,
    Gcm = mode_ids::GCM,
    Eax = mode_ids::EAX,
}

impl BlockMode {
    pub fn verify(raw: u16) -> Result<Self> {
        Self::try_from_primitive(raw).map_err(|_| {
            PackageError::ConfigInvalid(format!(
                "unknown block mode: {}",
                enum_name_or_hex::<BlockMode>(raw)
            ))
        })
    }

    pub fn is_aead(self) -> bool {
        matches!(self, Self::Gcm | Self::Eax)
    }

    /// Modes whose ciphertext tracks the plaintext operation for
    /// operation, with nothing held back between calls. CTS preserves
    /// overall length but withholds a block until finalization, so it
    /// does not qualify.
    pub fn is_length_preserving(self) -> bool {
        matches!(self, Self::Ctr | Self::Cfb | Self::Ofb)
    }
}

#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, TryFromPrimitive)]
pub enum PaddingScheme {
    None = padding_ids::NONE,
    Pkcs7 = padding_ids::PKCS7,
    Iso7816 = padding_ids::ISO7816,
    X923 = padding_ids::X923,
}

impl PaddingScheme {
    pub fn verify(raw: u16) -> Result<Self> {
        Self::try_from_primitive(raw).map_err(|_| {
            PackageError::ConfigInvalid(format!(
                "unknown padding scheme: {}",
                enum_name_or_hex::<PaddingScheme>(raw)
            ))
        })
    }
}

#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, TryFromPrimitive)]
pub enum MacAlgorithm {
    HmacSha256 = mac_ids::HMAC_SHA256,
    HmacSha512 = mac_ids::HMAC_SHA512,
    HmacSha3_256 = mac_ids::HMAC_SHA3_256,
    Blake3Keyed = mac_ids::BLAKE3_KEYED,
    Poly1305 = mac_ids::POLY1305,
}

impl MacAlgorithm {
    pub fn verify(raw: u16) -> Result<Self> {
        Self::try_from_primitive(raw).map_err(|_| {
            PackageError::ConfigInvalid(format!(
                "unknown MAC: {}",
                enum_name_or_hex::<MacAlgorithm>(raw)
            ))
        })
    }

    pub fn output_size(self) -> usize {
        match self {
            Self::HmacSha256 | Self::HmacSha3_256 => 32,
            Self::HmacSha512 => 64,
            Self::Blake3Keyed => 32,
            Self::Poly1305 => 16,
        }
    }
}

#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, TryFromPrimitive)]
pub enum HashAlgorithm {
    Sha256 = hash_ids::SHA256,
    Sha512 = hash_ids::SHA512,
    Sha3_256 = hash_ids::SHA3_256,
    Blake3 = hash_ids::BLAKE3,
}

impl HashAlgorithm {
    pub fn verify(raw: u16) -> Result<Self> {
        Self::try_from_primitive(raw).map_err(|_| {
            PackageError::ConfigInvalid(format!(
                "unknown hash: {}",
                enum_name_or_hex::<HashAlgorithm>(raw)
            ))
        })
    }
}

#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, TryFromPrimitive)]
pub enum KdfAlgorithm {
    Scrypt = kdf_ids::SCRYPT,
    Pbkdf2 = kdf_ids::PBKDF2,
    HkdfSha256 = kdf_ids::HKDF_SHA256,
}

impl KdfAlgorithm {
    pub fn verify(raw: u16) -> Result<Self> {
        Self::try_from_primitive(raw).map_err(|_| {
            PackageError::ConfigInvalid(format!(
                "unknown KDF: {}",
                enum_name_or_hex::<KdfAlgorithm>(raw)
            ))
        })
    }
}

#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, TryFromPrimitive)]
pub enum CurveName {
    Curve25519 = curve_ids::CURVE25519,
    Secp256r1 = curve_ids::SECP256R1,
}

impl CurveName {
    pub fn verify(raw: u16) -> Result<Self> {
        Self::try_from_primitive(raw).map_err(|_| {
            PackageError::ConfigInvalid(format!(
                "unknown curve: {}",
                enum_name_or_hex::<CurveName>(raw)
            ))
        })
    }

    /// Field element encoding length in bytes.
    pub fn field_byte_length(self) -> usize {
        32
    }
}

/// Symmetric cipher configuration for one encrypted stream.
/// - `mode` and `padding` are `mode_ids::NONE` / `padding_ids::NONE` for
///   stream ciphers.
/// - The IV is public and serialized alongside; the key never is, except
///   for item keys resting inside the encrypted manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherConfig {
    pub cipher: u16,
    pub mode: u16,
    pub padding: u16,
    pub key_len: u32,
    pub iv: Vec<u8>,
}

impl CipherConfig {
    /// IV/nonce length the configuration must carry.
    pub fn expected_iv_len(&self) -> Result<usize> {
        let cipher = CipherAlgorithm::verify(self.cipher)?;
        if cipher.is_block() {
            let mode = BlockMode::verify(self.mode)?;
            Ok(match mode {
                BlockMode::Gcm => 12,
                _ => 16,
            })
        } else {
            Ok(match cipher {
                CipherAlgorithm::ChaCha20 => 12,
                CipherAlgorithm::XChaCha20 | CipherAlgorithm::XSalsa20 => 24,
                CipherAlgorithm::Salsa20 => 8,
                _ => unreachable!(),
            })
        }
    }

    pub fn valid_key_lens(&self) -> Result<&'static [usize]> {
        let cipher = CipherAlgorithm::verify(self.cipher)?;
        Ok(match cipher {
            CipherAlgorithm::Aes128 => &[16],
            CipherAlgorithm::Aes192 => &[24],
            CipherAlgorithm::Aes256 => &[32],
            _ => &[32],
        })
    }

    pub fn is_aead(&self) -> bool {
        let block_aead = CipherAlgorithm::try_from_primitive(self.cipher)
            .map(|c| c.is_block())
            .unwrap_or(false)
            && BlockMode::try_from_primitive(self.mode)
                .map(|m| m.is_aead())
                .unwrap_or(false);
        block_aead || (self.cipher == cipher_ids::CHACHA20 && self.mode == mode_ids::POLY1305)
    }

    /// Ciphertext length equals plaintext length for every operation.
    /// Required of payload-item configurations by the multiplexer.
    pub fn is_length_preserving(&self) -> bool {
        match CipherAlgorithm::try_from_primitive(self.cipher) {
            Ok(c) if c.is_block() => BlockMode::try_from_primitive(self.mode)
                .map(|m| m.is_length_preserving())
                .unwrap_or(false),
            Ok(_) => self.mode == mode_ids::NONE,
            Err(_) => false,
        }
    }

    pub fn verify(&self) -> Result<()> {
        let cipher = CipherAlgorithm::verify(self.cipher)?;
        if cipher.is_block() {
            let mode = BlockMode::verify(self.mode)?;
            let padding = PaddingScheme::verify(self.padding)?;
            match mode {
                BlockMode::Cbc if padding == PaddingScheme::None => {
                    return Err(PackageError::ConfigInvalid(
                        "CBC requires a padding scheme".into(),
                    ));
                }
                BlockMode::Cbc => {}
                _ if padding != PaddingScheme::None => {
                    return Err(PackageError::ConfigInvalid(format!(
                        "padding is not applicable to mode {:?}",
                        mode
                    )));
                }
                _ => {}
            }
        } else {
            let stream_aead =
                self.cipher == cipher_ids::CHACHA20 && self.mode == mode_ids::POLY1305;
            if self.mode != mode_ids::NONE && !stream_aead {
                return Err(PackageError::ConfigInvalid(
                    "stream ciphers take no block mode".into(),
                ));
            }
            if self.padding != padding_ids::NONE {
                return Err(PackageError::ConfigInvalid(
                    "stream ciphers take no padding".into(),
                ));
            }
        }
        if !self.valid_key_lens()?.contains(&(self.key_len as usize)) {
            return Err(PackageError::ConfigInvalid(format!(
                "key length {} is invalid for {:?}",
                self.key_len, cipher
            )));
        }
        let want_iv = self.expected_iv_len()?;
        if self.iv.len() != want_iv {
            return Err(PackageError::ConfigInvalid(format!(
                "IV length {} != required {}",
                self.iv.len(),
                want_iv
            )));
        }
        Ok(())
    }
}

/// Keyed MAC configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    pub mac: u16,
    pub key_len: u32,
}

impl AuthConfig {
    pub fn output_size(&self) -> Result<usize> {
        Ok(MacAlgorithm::verify(self.mac)?.output_size())
    }

    pub fn verify(&self) -> Result<()> {
        let mac = MacAlgorithm::verify(self.mac)?;
        let ok = match mac {
            MacAlgorithm::Blake3Keyed | MacAlgorithm::Poly1305 => self.key_len == 32,
            _ => (16..=128).contains(&(self.key_len as usize)),
        };
        if !ok {
            return Err(PackageError::ConfigInvalid(format!(
                "MAC key length {} is invalid for {:?}",
                self.key_len, mac
            )));
        }
        Ok(())
    }
}

/// Key derivation configuration. Fields not used by the selected KDF are
/// zero and ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfConfig {
    pub kdf: u16,
    pub salt: Vec<u8>,
    /// scrypt cost exponent; N = 1 << log2_n.
    pub log2_n: u8,
    /// scrypt block size.
    pub r: u32,
    /// scrypt parallelism.
    pub p: u32,
    /// PBKDF2 iteration count.
    pub iterations: u32,
}

impl KdfConfig {
    pub fn verify(&self) -> Result<()> {
        let kdf = KdfAlgorithm::verify(self.kdf)?;
        if self.salt.is_empty() {
            return Err(PackageError::ConfigInvalid("KDF salt must not be empty".into()));
        }
        match kdf {
            KdfAlgorithm::Scrypt => {
                if self.log2_n < kdf_policy::SCRYPT_MIN_LOG2_N
                    || self.log2_n > kdf_policy::SCRYPT_MAX_LOG2_N
                {
                    return Err(PackageError::ConfigInvalid(format!(
                        "scrypt cost exponent {} out of policy",
                        self.log2_n
                    )));
                }
                if self.r == 0 || self.p == 0 {
                    return Err(PackageError::ConfigInvalid(
                        "scrypt r and p must be nonzero".into(),
                    ));
                }
                let memory = 128u64 * (1u64 << self.log2_n) * self.r as u64;
                if memory > kdf_policy::SCRYPT_MAX_MEMORY {
                    return Err(PackageError::ConfigInvalid(format!(
                        "scrypt working set {} exceeds cap {}",
                        memory,
                        kdf_policy::SCRYPT_MAX_MEMORY
                    )));
                }
            }
            KdfAlgorithm::Pbkdf2 => {
                if self.iterations < kdf_policy::PBKDF2_MIN_ITERATIONS {
                    return Err(PackageError::ConfigInvalid(format!(
                        "PBKDF2 iteration count {} below policy floor",
                        self.iterations
                    )));
                }
            }
            KdfAlgorithm::HkdfSha256 => {}
        }
        Ok(())
    }
}

/// Key confirmation: MAC of a fixed canary under the candidate pre-key,
/// salted so outputs are not linkable across packages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    pub hash: u16,
    pub salt: Vec<u8>,
}

impl ConfirmationConfig {
    pub fn verify(&self) -> Result<()> {
        HashAlgorithm::verify(self.hash)?;
        if self.salt.is_empty() {
            return Err(PackageError::ConfigInvalid(
                "confirmation salt must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Serialized public key: curve id + SEC1/raw encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcPublicKey {
    pub curve: u16,
    pub encoded: Vec<u8>,
}

/// Serialized private scalar. Wiped on drop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcPrivateKey {
    pub curve: u16,
    pub scalar: Vec<u8>,
}

impl Drop for EcPrivateKey {
    fn drop(&mut self) {
        self.scalar.zeroize();
    }
}

/// Manifest cryptography: symmetric-only variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymmetricManifestConfig {
    pub cipher_cfg: CipherConfig,
    pub auth_cfg: AuthConfig,
    pub kdf_cfg: KdfConfig,
    pub key_confirmation: Option<ConfirmationConfig>,
    pub key_confirmation_output: Vec<u8>,
    /// Manifest MAC tag; filled during write, verified during read.
    pub auth_tag: Vec<u8>,
}

impl SymmetricManifestConfig {
    pub fn verify(&self) -> Result<()> {
        self.cipher_cfg.verify()?;
        self.auth_cfg.verify()?;
        self.kdf_cfg.verify()?;
        if let Some(kc) = &self.key_confirmation {
            kc.verify()?;
            if self.key_confirmation_output.is_empty() {
                return Err(PackageError::ConfigInvalid(
                    "key confirmation output missing".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Manifest cryptography: UM1 hybrid variant. Symmetric fields plus the
/// initiator's ephemeral public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Um1ManifestConfig {
    pub symmetric: SymmetricManifestConfig,
    pub ephemeral_key: EcPublicKey,
}

impl Um1ManifestConfig {
    pub fn verify(&self) -> Result<()> {
        self.symmetric.verify()?;
        CurveName::verify(self.ephemeral_key.curve)?;
        Ok(())
    }
}

/// Payload item kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    Binary,
    Utf8Text,
    KeyAction,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Binary => write!(f, "binary"),
            ItemKind::Utf8Text => write!(f, "utf8-text"),
            ItemKind::KeyAction => write!(f, "key-action"),
        }
    }
}

/// One payload item as carried inside the encrypted manifest.
///
/// Key resolution invariant: exactly one of
/// - `cipher_key` and `auth_key` both present, or
/// - a pre-key registered for `identifier` plus `kdf_cfg` present
/// must hold when the item is written or read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadItem {
    pub identifier: [u8; 16],
    pub relative_path: String,
    pub kind: ItemKind,
    /// Plaintext length the caller supplies; 0 when unknown at write time.
    pub external_length: u64,
    /// Bytes the item occupies inside the payload body; filled during
    /// write, required during read.
    pub internal_length: u64,
    pub cipher_cfg: CipherConfig,
    pub auth_cfg: AuthConfig,
    pub kdf_cfg: Option<KdfConfig>,
    pub cipher_key: Option<Vec<u8>>,
    pub auth_key: Option<Vec<u8>>,
    /// Final MAC over the item ciphertext and bound metadata.
    pub auth_tag: Vec<u8>,
}

impl PayloadItem {
    /// Copy with the write-mutated fields cleared, so the MAC can bind the
    /// metadata without depending on its own output.
    pub fn authenticatible_clone(&self) -> PayloadItem {
        let mut clone = self.clone();
        clone.auth_tag = Vec::new();
        clone.internal_length = 0;
        clone
    }

    pub fn has_embedded_keys(&self) -> bool {
        self.cipher_key.is_some() && self.auth_key.is_some()
    }

    pub fn wipe_keys(&mut self) {
        if let Some(k) = &mut self.cipher_key {
            k.zeroize();
        }
        if let Some(k) = &mut self.auth_key {
            k.zeroize();
        }
    }

    pub fn verify(&self) -> Result<()> {
        self.cipher_cfg.verify()?;
        self.auth_cfg.verify()?;
        if let Some(kdf) = &self.kdf_cfg {
            kdf.verify()?;
        }
        if let (Some(ck), Some(ak)) = (&self.cipher_key, &self.auth_key) {
            if ck.len() != self.cipher_cfg.key_len as usize {
                return Err(PackageError::ConfigInvalid(
                    "item cipher key length disagrees with its config".into(),
                ));
            }
            if ak.len() != self.auth_cfg.key_len as usize {
                return Err(PackageError::ConfigInvalid(
                    "item auth key length disagrees with its config".into(),
                ));
            }
        } else if self.kdf_cfg.is_none() {
            return Err(PackageError::ItemKeyMissing);
        }
        Ok(())
    }
}

impl Drop for PayloadItem {
    fn drop(&mut self) {
        self.wipe_keys();
    }
}

/// Payload layout + scheduling PRNG selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadConfig {
    pub layout: String,
    pub layout_config: Vec<u8>,
    pub prng: String,
    pub prng_config: Vec<u8>,
}

impl PayloadConfig {
    pub fn verify(&self) -> Result<()> {
        if self.layout != LAYOUT_SIMPLE && self.layout != LAYOUT_FRAMESHIFT {
            return Err(PackageError::ConfigInvalid(format!(
                "unknown payload layout {:?}",
                self.layout
            )));
        }
        if self.prng != PRNG_CHACHA20 {
            return Err(PackageError::ConfigInvalid(format!(
                "unknown scheduling PRNG {:?}",
                self.prng
            )));
        }
        if self.prng_config.len() != PRNG_SEED_LEN {
            return Err(PackageError::ConfigInvalid(format!(
                "scheduling PRNG seed must be {} bytes",
                PRNG_SEED_LEN
            )));
        }
        Ok(())
    }
}

/// Frameshift layout parameters, serialized into `layout_config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameshiftParams {
    pub pad_min: u32,
    pub pad_max: u32,
}

impl FrameshiftParams {
    pub fn verify(&self) -> Result<()> {
        if self.pad_min > self.pad_max {
            return Err(PackageError::ConfigInvalid(
                "frameshift pad_min exceeds pad_max".into(),
            ));
        }
        if self.pad_max > MAX_PAD_RUN {
            return Err(PackageError::ConfigInvalid(format!(
                "frameshift pad_max {} exceeds cap {}",
                self.pad_max, MAX_PAD_RUN
            )));
        }
        Ok(())
    }
}

/// Decrypted manifest: payload layout plus the ordered item list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub payload_config: PayloadConfig,
    pub items: Vec<PayloadItem>,
}

impl Manifest {
    pub fn verify(&self) -> Result<()> {
        self.payload_config.verify()?;
        for item in &self.items {
            item.verify()?;
        }
        Ok(())
    }

    pub fn wipe_keys(&mut self) {
        for item in &mut self.items {
            item.wipe_keys();
        }
    }
}

/// Plaintext header naming the manifest cryptography scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestHeader {
    pub format_version: i32,
    pub scheme_name: String,
    pub scheme_config: Vec<u8>,
}

/// Read-only projection of one decrypted manifest item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemView {
    pub identifier: [u8; 16],
    pub relative_path: String,
    pub kind: ItemKind,
    pub external_length: u64,
    pub internal_length: u64,
}

impl From<&PayloadItem> for ItemView {
    fn from(item: &PayloadItem) -> Self {
        ItemView {
            identifier: item.identifier,
            relative_path: item.relative_path.clone(),
            kind: item.kind,
            external_length: item.external_length,
            internal_length: item.internal_length,
        }
    }
}

/// Read-only projection of the decrypted manifest.
#[derive(Debug, Clone)]
pub struct ManifestView {
    pub layout: String,
    pub items: Vec<ItemView>,
}
