//! Byte-handling helpers shared by every layer: constant-time equality,
//! optimizer-proof wipe, little-endian framing, and debug formatting.
//!
//! Security notes:
//! - Every MAC tag and key-confirmation compare in the crate goes through
//!   `equal_ct`; no caller may fall back to `==` on secret-derived bytes.
//! - `wipe` must be used on key material the moment it stops being needed.

use std::fmt;
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use num_enum::TryFromPrimitive;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::types::{PackageError, Result};

/// Constant-time equality over byte ranges.
///
/// Unequal lengths return false without inspecting content; equal lengths
/// are compared in time independent of the number of differing bytes.
pub fn equal_ct(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Overwrite a buffer with zeros in a way the optimizer must not elide.
pub fn wipe(buf: &mut [u8]) {
    buf.zeroize();
}

/// Encode a u32 as 4 little-endian bytes.
#[inline]
pub fn u32_le(x: u32) -> [u8; 4] {
    x.to_le_bytes()
}

/// Inverse of `u32_le`.
#[inline]
pub fn u32_from_le(b: [u8; 4]) -> u32 {
    u32::from_le_bytes(b)
}

/// Write `bytes` prefixed with its u32 little-endian length.
pub fn write_length_prefixed<W: Write>(w: &mut W, bytes: &[u8]) -> Result<()> {
    if bytes.len() > u32::MAX as usize {
        return Err(PackageError::FormatInvalid("length prefix overflow".into()));
    }
    w.write_u32::<LittleEndian>(bytes.len() as u32)?;
    w.write_all(bytes)?;
    Ok(())
}

/// Read a u32 little-endian length, then exactly that many bytes.
///
/// `max_len` bounds the declared length; a larger value is treated as a
/// framing error rather than an allocation request.
pub fn read_length_prefixed<R: Read>(r: &mut R, max_len: usize) -> Result<Vec<u8>> {
    let len = r
        .read_u32::<LittleEndian>()
        .map_err(|_| PackageError::FormatInvalid("truncated length field".into()))?
        as usize;
    if len > max_len {
        return Err(PackageError::FormatInvalid(format!(
            "declared length {} exceeds cap {}",
            len, max_len
        )));
    }
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)
        .map_err(|_| PackageError::FormatInvalid("declared length exceeds remaining stream".into()))?;
    Ok(buf)
}

/// Read up to `len` bytes, stopping early only at end of stream.
pub fn read_exact_or_eof<R: Read + ?Sized>(r: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut off = 0;
    while off < buf.len() {
        let n = r.read(&mut buf[off..])?;
        if n == 0 {
            break;
        }
        off += n;
    }
    Ok(off)
}

pub fn enum_name_or_hex<T>(raw: T::Primitive) -> String
where
    T: TryFromPrimitive + fmt::Debug,
    T::Primitive: fmt::LowerHex,
{
    match T::try_from_primitive(raw) {
        Ok(variant) => format!("{:?}", variant),
        Err(_) => format!("0x{:x}", raw),
    }
}

pub fn fmt_bytes(b: &[u8]) -> String {
    if b.iter().all(|&c| c.is_ascii_graphic() || c == b' ') {
        format!("b\"{}\"", String::from_utf8_lossy(b))
    } else {
        format!("0x{}", hex::encode(b))
    }
}
