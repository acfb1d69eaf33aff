//! Serialization for configuration objects and the manifest header.
//!
//! Design notes:
//! - DTOs travel as bincode (standard config) behind serde; the same byte
//!   encoding feeds the manifest MAC, so both sides must produce it from
//!   the identical structures.
//! - `ManifestHeader` is the one structure with an explicit hand-written
//!   layout: it is parsed before any key material exists, so it must be
//!   self-describing and strictly bounded.

use std::io::Read;

use bincode::config;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{de::DeserializeOwned, Serialize};

use crate::constants::{FORMAT_VERSION, MAX_MANIFEST_HEADER_LEN};
use crate::config::types::ManifestHeader;
use crate::types::{PackageError, Result};

/// Serialize a DTO with the crate's canonical codec.
pub fn to_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serde::encode_to_vec(value, config::standard())
        .map_err(|e| PackageError::FormatInvalid(format!("serialization failed: {}", e)))
}

/// Deserialize a DTO, rejecting trailing garbage.
pub fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let (value, consumed): (T, usize) =
        bincode::serde::decode_from_slice(bytes, config::standard())
            .map_err(|e| PackageError::FormatInvalid(format!("deserialization failed: {}", e)))?;
    if consumed != bytes.len() {
        return Err(PackageError::FormatInvalid(
            "trailing bytes after serialized object".into(),
        ));
    }
    Ok(value)
}

/// Encode a `ManifestHeader` into its explicit little-endian layout:
///
/// ```text
/// [ format_version (4, i32 LE) ]
/// [ scheme_name length (4, u32 LE) ][ scheme_name (UTF-8) ]
/// [ scheme_config length (4, u32 LE) ][ scheme_config ]
/// ```
pub fn encode_manifest_header(h: &ManifestHeader) -> Result<Vec<u8>> {
    let name = h.scheme_name.as_bytes();
    let mut out = Vec::with_capacity(12 + name.len() + h.scheme_config.len());
    out.write_i32::<LittleEndian>(h.format_version)?;
    out.write_u32::<LittleEndian>(name.len() as u32)?;
    out.extend_from_slice(name);
    out.write_u32::<LittleEndian>(h.scheme_config.len() as u32)?;
    out.extend_from_slice(&h.scheme_config);
    if out.len() > MAX_MANIFEST_HEADER_LEN {
        return Err(PackageError::FormatInvalid(
            "manifest header exceeds size cap".into(),
        ));
    }
    Ok(out)
}

/// Inverse of `encode_manifest_header`. The version must match; field
/// lengths are bounded by the buffer itself.
pub fn decode_manifest_header(buf: &[u8]) -> Result<ManifestHeader> {
    let mut r = buf;
    let format_version = r
        .read_i32::<LittleEndian>()
        .map_err(|_| PackageError::FormatInvalid("manifest header truncated".into()))?;
    if format_version != FORMAT_VERSION {
        return Err(PackageError::FormatInvalid(format!(
            "unsupported format version {}",
            format_version
        )));
    }
    let scheme_name = String::from_utf8(read_field(&mut r)?)
        .map_err(|_| PackageError::FormatInvalid("scheme name is not UTF-8".into()))?;
    let scheme_config = read_field(&mut r)?;
    if !r.is_empty() {
        return Err(PackageError::FormatInvalid(
            "trailing bytes after manifest header".into(),
        ));
    }
    Ok(ManifestHeader {
        format_version,
        scheme_name,
        scheme_config,
    })
}

fn read_field(r: &mut &[u8]) -> Result<Vec<u8>> {
    let len = r
        .read_u32::<LittleEndian>()
        .map_err(|_| PackageError::FormatInvalid("manifest header truncated".into()))?
        as usize;
    if len > r.len() {
        return Err(PackageError::FormatInvalid(
            "manifest header field overruns buffer".into(),
        ));
    }
    let mut field = vec![0u8; len];
    r.read_exact(&mut field)
        .map_err(|_| PackageError::FormatInvalid("manifest header truncated".into()))?;
    Ok(field)
}
