/// Magic marker opening every package.
/// "OCpkg" + version byte + two reserved zero bytes; fixed 8 bytes.
// If the constant represents a protocol magic field, use `[u8; 8]` so the
// type itself enforces the length and matches the struct field type.
pub const MAGIC_HEADER: [u8; 8] = *b"OCpkg\x01\x00\x00";

/// Magic marker closing every package. Distinct from the header marker so
/// a truncated or spliced file cannot present one tag as the other.
pub const MAGIC_TRAILER: [u8; 8] = *b"\x00\x00\x01gkpCO";

/// Manifest header format version.
pub const FORMAT_VERSION: i32 = 1;

/// Manifest scheme names carried in the plaintext header.
pub const SCHEME_SYMMETRIC: &str = "SymmetricOnly";
pub const SCHEME_UM1: &str = "UM1Hybrid";

/// Payload layout scheme names carried in the manifest.
pub const LAYOUT_SIMPLE: &str = "Simple";
pub const LAYOUT_FRAMESHIFT: &str = "Frameshift";

/// Scheduling PRNG name carried in the manifest.
pub const PRNG_CHACHA20: &str = "ChaCha20";

/// Seed length the scheduling PRNG accepts.
pub const PRNG_SEED_LEN: usize = 32;

/// Plaintext bytes moved per multiplexer selection.
pub const MUX_STRIDE: usize = 4096;

/// Frameshift inter-segment padding bounds (bytes), inclusive.
pub const DEFAULT_PAD_MIN: u32 = 16;
pub const DEFAULT_PAD_MAX: u32 = 256;

/// Upper bound a Frameshift configuration may request for one padding run.
pub const MAX_PAD_RUN: u32 = 64 * 1024;

/// Public canary MACed under a candidate pre-key for key confirmation.
/// The value is arbitrary but fixed for the life of the format.
pub const CONFIRMATION_CANARY: [u8; 32] = *b"obscur-core key confirmation v1\x00";

/// Sanity cap on the serialized manifest header (plaintext part).
pub const MAX_MANIFEST_HEADER_LEN: usize = 16 * 1024;

/// Sanity cap on manifest ciphertext length.
pub const MAX_MANIFEST_LEN: usize = 32 * 1024 * 1024;

/// Ring sizing for the cipher stream decorators, in operations.
pub const RING_OPS_ENCRYPT: usize = 256;
pub const RING_OPS_DECRYPT: usize = 4;

/// Operation size used by stream-cipher engines (keystream block).
pub const STREAM_OP_SIZE: usize = 64;

/// Symmetric cipher identifiers (mirrored in serialized configs).
pub mod cipher_ids {
    // Block ciphers
    pub const AES128: u16 = 0x0101;
    pub const AES192: u16 = 0x0102;
    pub const AES256: u16 = 0x0103;

    // Stream ciphers
    pub const CHACHA20: u16 = 0x0201;
    pub const XCHACHA20: u16 = 0x0202;
    pub const SALSA20: u16 = 0x0203;
    pub const XSALSA20: u16 = 0x0204;
}

/// Block-cipher mode identifiers. AEAD modes exist for the bare primitive
/// only; the packaging pipelines reject them.
pub mod mode_ids {
    pub const CTR: u16 = 0x0001;
    pub const CBC: u16 = 0x0002;
    pub const CFB: u16 = 0x0003;
    pub const OFB: u16 = 0x0004;
    /// CBC with ciphertext stealing; no padding, input must reach one block.
    pub const CTS: u16 = 0x0005;

    pub const GCM: u16 = 0x0011;
    pub const EAX: u16 = 0x0012;
    /// Poly1305 AEAD composition; valid with the ChaCha20 stream cipher.
    pub const POLY1305: u16 = 0x0013;

    /// Marker used by stream-cipher configs (no mode applies).
    pub const NONE: u16 = 0x0000;
}

/// Final-block padding identifiers (CBC only).
pub mod padding_ids {
    pub const NONE: u16 = 0x0000;
    pub const PKCS7: u16 = 0x0001;
    pub const ISO7816: u16 = 0x0002;
    pub const X923: u16 = 0x0003;
}

/// Keyed MAC identifiers.
pub mod mac_ids {
    pub const HMAC_SHA256: u16 = 0x0001;
    pub const HMAC_SHA512: u16 = 0x0002;
    pub const HMAC_SHA3_256: u16 = 0x0003;
    pub const BLAKE3_KEYED: u16 = 0x0004;
    pub const POLY1305: u16 = 0x0005;
}

/// Hash identifiers (key confirmation binds to one of these).
pub mod hash_ids {
    pub const SHA256: u16 = 0x0001;
    pub const SHA512: u16 = 0x0002;
    pub const SHA3_256: u16 = 0x0003;
    pub const BLAKE3: u16 = 0x0004;
}

/// KDF identifiers.
pub mod kdf_ids {
    pub const SCRYPT: u16 = 0x0001;
    pub const PBKDF2: u16 = 0x0002;
    pub const HKDF_SHA256: u16 = 0x0003;
}

/// Elliptic curve identifiers for the UM1 scheme.
pub mod curve_ids {
    pub const CURVE25519: u16 = 0x0001;
    pub const SECP256R1: u16 = 0x0002;
}

/// KDF policy bounds.
pub mod kdf_policy {
    /// scrypt cost exponent range; cost N = 1 << log2_n.
    pub const SCRYPT_MIN_LOG2_N: u8 = 1;
    pub const SCRYPT_MAX_LOG2_N: u8 = 22;

    /// Hard cap on the scrypt working set: 128 * N * r bytes.
    pub const SCRYPT_MAX_MEMORY: u64 = 64 * 1024 * 1024;

    /// PBKDF2 floor; anything below is misconfiguration, not tuning.
    pub const PBKDF2_MIN_ITERATIONS: u32 = 1024;
}
