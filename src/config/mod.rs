//! Configuration and manifest data model plus its serialization.

pub mod codec;
pub mod types;

pub use codec::{decode_manifest_header, encode_manifest_header, from_bytes, to_bytes};
pub use types::{
    AuthConfig, BlockMode, CipherAlgorithm, CipherConfig, ConfirmationConfig, CurveName,
    EcPrivateKey, EcPublicKey, FrameshiftParams, HashAlgorithm, ItemKind, ItemView, KdfAlgorithm,
    KdfConfig, MacAlgorithm, Manifest, ManifestHeader, ManifestView, PaddingScheme, PayloadConfig,
    PayloadItem, SymmetricManifestConfig, Um1ManifestConfig,
};
