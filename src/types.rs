use std::fmt;
use std::io;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, PackageError>;

/// Authentication failure granularity exposed to callers.
///
/// Deliberately coarse: messages must not reveal which byte, item, or
/// field failed beyond "manifest" vs "payload item".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScope {
    Manifest,
    PayloadItem,
}

/// Unified package error covering configuration, format, key resolution,
/// authentication, block/padding framing, length accounting, and I/O.
/// - Ergonomic `From<T>` impls enable `?` across the pipeline.
/// - Every variant is fatal for the enclosing package operation.
#[derive(Debug)]
pub enum PackageError {
    /// Configuration cannot produce a well-defined pipeline (unknown
    /// scheme, missing field, AEAD in a cipher stream, curve mismatch,
    /// KDF parameters out of policy).
    ConfigInvalid(String),

    /// Package framing is wrong: bad magic, truncated length field,
    /// declared length exceeding the remaining stream.
    FormatInvalid(String),

    /// Item carries neither embedded keys nor a resolvable pre-key.
    ItemKeyMissing,

    /// Computed MAC differs from the stored tag (constant-time compare),
    /// or key confirmation rejected the supplied pre-key.
    CiphertextAuthentication(AuthScope),

    /// End of stream mid-operation in a non-streamable mode.
    IncompleteBlock,

    /// Final-block padding does not parse under the configured scheme.
    PaddingCorrupt,

    /// Declared item length disagrees with the bytes observed.
    LengthMismatch { expected: u64, actual: u64 },

    /// Underlying stream failure.
    Io(io::Error),
}

impl fmt::Display for PackageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageError::ConfigInvalid(msg) => write!(f, "invalid configuration: {}", msg),
            PackageError::FormatInvalid(msg) => write!(f, "invalid package format: {}", msg),
            PackageError::ItemKeyMissing => write!(f, "payload item has no resolvable key material"),
            PackageError::CiphertextAuthentication(scope) => match scope {
                AuthScope::Manifest => write!(f, "manifest failed authentication"),
                AuthScope::PayloadItem => write!(f, "a payload item failed authentication"),
            },
            PackageError::IncompleteBlock => write!(f, "stream ended mid-operation"),
            PackageError::PaddingCorrupt => write!(f, "final-block padding is corrupt"),
            PackageError::LengthMismatch { expected, actual } =>
                write!(f, "length mismatch: declared {}, observed {}", expected, actual),
            PackageError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for PackageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PackageError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for PackageError {
    fn from(e: io::Error) -> Self {
        PackageError::Io(e)
    }
}
