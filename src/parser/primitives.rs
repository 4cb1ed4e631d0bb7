//! Endian-aware primitive decoders shared by the header, metadata, and row
//! decoders. Every function here takes a byte slice already sliced to the
//! field's declared width; callers are responsible for bounds-checking.

use std::borrow::Cow;

use encoding_rs::Encoding;

use crate::error::{Error, Result};
use crate::metadata::Endianness;

/// Decodes a signed integer of 1, 2, 4, 6, or 8 bytes, honoring `endianness`.
///
/// The 6-byte case arises only in 64-bit layouts, where a value known to fit
/// in 48 bits is read from an 8-byte-aligned field; the two unused bytes are
/// treated as zero.
#[must_use]
pub fn read_int(bytes: &[u8], endianness: Endianness) -> i64 {
    let mut buf = [0u8; 8];
    match endianness {
        Endianness::Little => {
            buf[..bytes.len()].copy_from_slice(bytes);
            let sign_extend = bytes.last().is_some_and(|b| b & 0x80 != 0) && bytes.len() < 8;
            if sign_extend {
                for byte in &mut buf[bytes.len()..] {
                    *byte = 0xFF;
                }
            }
            i64::from_le_bytes(buf)
        }
        Endianness::Big => {
            let offset = 8 - bytes.len();
            buf[offset..].copy_from_slice(bytes);
            let sign_extend = bytes.first().is_some_and(|b| b & 0x80 != 0) && bytes.len() < 8;
            if sign_extend {
                for byte in &mut buf[..offset] {
                    *byte = 0xFF;
                }
            }
            i64::from_be_bytes(buf)
        }
    }
}

/// Decodes an unsigned integer of 1, 2, 4, or 8 bytes, honoring `endianness`.
#[must_use]
pub fn read_uint(bytes: &[u8], endianness: Endianness) -> u64 {
    let mut buf = [0u8; 8];
    match endianness {
        Endianness::Little => {
            buf[..bytes.len()].copy_from_slice(bytes);
            u64::from_le_bytes(buf)
        }
        Endianness::Big => {
            let offset = 8 - bytes.len();
            buf[offset..].copy_from_slice(bytes);
            u64::from_be_bytes(buf)
        }
    }
}

/// Decodes an IEEE-754 binary64. Fields shorter than 8 bytes are zero-padded
/// on the side away from the significant bits (high end for little-endian,
/// low end for big-endian) before decoding.
#[must_use]
pub fn read_double(bytes: &[u8], endianness: Endianness) -> f64 {
    let mut buf = [0u8; 8];
    match endianness {
        Endianness::Little => {
            buf[8 - bytes.len()..].copy_from_slice(bytes);
            f64::from_le_bytes(buf)
        }
        Endianness::Big => {
            buf[..bytes.len()].copy_from_slice(bytes);
            f64::from_be_bytes(buf)
        }
    }
}

/// Decodes `bytes` as text in `encoding`, stripping embedded NUL bytes and
/// trimming surrounding whitespace.
///
/// Column values are UTF-8 far more often than not, so a `utf-8`-configured
/// reader takes `simdutf8`'s validate-only fast path first and only falls
/// back to `encoding_rs`'s full decoder (which also repairs invalid
/// sequences) when that validation fails.
#[must_use]
pub fn read_text(bytes: &[u8], encoding: &'static Encoding) -> String {
    let decoded: Cow<'_, str> = if encoding == encoding_rs::UTF_8 {
        match simdutf8::basic::from_utf8(bytes) {
            Ok(text) => Cow::Borrowed(text),
            Err(_) => encoding.decode(bytes).0,
        }
    } else {
        encoding.decode(bytes).0
    };
    let without_nul: String = decoded.chars().filter(|&c| c != '\0').collect();
    without_nul.trim().to_owned()
}

/// Resolves a configured encoding name (e.g. `"utf-8"`, `"windows-1252"`) to
/// an `encoding_rs` table.
///
/// # Errors
///
/// Returns [`Error::UnknownEncoding`] if `label` does not name a character
/// set `encoding_rs` recognizes.
pub fn resolve_encoding(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.as_bytes()).ok_or_else(|| Error::UnknownEncoding {
        label: label.to_owned(),
    })
}
