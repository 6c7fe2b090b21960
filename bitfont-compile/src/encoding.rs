//! Mapping source codes to Unicode scalar values.

use std::borrow::Cow;

use encoding_rs::{SHIFT_JIS, WINDOWS_1252};
use serde::Deserialize;

use crate::{face::NormalizedGlyph, reader::GlyphRecord};

/// The encoding of the codes following `STARTCHAR` in a source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
pub enum SourceEncoding {
    /// Codes are already Unicode scalar values.
    #[serde(rename = "unicode", alias = "utf-32le")]
    Unicode,
    /// ISO-8859-1; codes are single bytes.
    #[serde(rename = "latin1", alias = "iso-8859-1")]
    Latin1,
    #[serde(rename = "windows-1252", alias = "cp1252")]
    Windows1252,
    /// Microsoft's Shift_JIS; codes are one or two bytes, low byte first.
    #[serde(rename = "cp932", alias = "shift_jis")]
    Cp932,
    /// JIS X 0208 row/cell codes, converted to CP932 before decoding.
    #[serde(rename = "jis-x0208")]
    JisX0208,
}

/// Why a code could not be normalized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NormalizeError {
    /// The bytes derived from the code are not valid in the source encoding.
    ///
    /// `mapped` is the code handed to the decoder: `raw_code` itself, or
    /// its Shift_JIS form for JIS X 0208. The glyph is dropped; the build
    /// continues.
    InvalidMapping { raw_code: u32, mapped: u32 },
    /// The bytes decoded to zero or several scalar values.
    InternalConsistency { raw_code: u32, decoded: String },
}

impl std::fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NormalizeError::InvalidMapping { mapped, .. } => {
                // high byte first, never fewer than two bytes
                let bytes = mapped.to_be_bytes();
                let skip = bytes.iter().take(2).take_while(|b| **b == 0).count();
                f.write_str("invalid code")?;
                for (i, byte) in bytes[skip..].iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{sep}0x{byte:02x}")?;
                }
                Ok(())
            }
            NormalizeError::InternalConsistency { raw_code, decoded } => write!(
                f,
                "code 0x{raw_code:04X} decoded to {decoded:?}, expected a single scalar value"
            ),
        }
    }
}

impl std::error::Error for NormalizeError {}

impl SourceEncoding {
    /// Map `raw_code` to a Unicode scalar value.
    pub fn normalize(self, raw_code: u32) -> Result<u32, NormalizeError> {
        let invalid = |mapped| NormalizeError::InvalidMapping { raw_code, mapped };
        match self {
            SourceEncoding::Unicode => char::from_u32(raw_code)
                .map(u32::from)
                .ok_or_else(|| invalid(raw_code)),
            SourceEncoding::Latin1 => {
                let bytes = legacy_bytes(raw_code).ok_or_else(|| invalid(raw_code))?;
                single_scalar(raw_code, encoding_rs::mem::decode_latin1(&bytes))
            }
            SourceEncoding::Windows1252 => decode_legacy(raw_code, |bytes| {
                WINDOWS_1252.decode_without_bom_handling_and_without_replacement(bytes)
            }),
            SourceEncoding::Cp932 => decode_legacy(raw_code, |bytes| {
                SHIFT_JIS.decode_without_bom_handling_and_without_replacement(bytes)
            }),
            SourceEncoding::JisX0208 => {
                let bytes = jis_to_shift_jis(raw_code).ok_or_else(|| invalid(raw_code))?;
                let decoded = SHIFT_JIS
                    .decode_without_bom_handling_and_without_replacement(&bytes)
                    .ok_or_else(|| invalid(u32::from(u16::from_be_bytes(bytes))))?;
                single_scalar(raw_code, decoded)
            }
        }
    }

    /// Normalize the code of `record`, keeping its bitmap.
    pub fn normalize_glyph(self, record: &GlyphRecord) -> Result<NormalizedGlyph, NormalizeError> {
        Ok(NormalizedGlyph {
            code: self.normalize(record.raw_code())?,
            is_full: record.width().is_full(),
            rows: *record.rows(),
        })
    }
}

/// Convert a JIS X 0208 code (`j1` in the high byte, `j2` in the low byte)
/// to its two-byte Shift_JIS form.
///
/// Returns `None` if the code does not fit in two bytes, or if the result
/// falls outside the byte range.
pub fn jis_to_shift_jis(code: u32) -> Option<[u8; 2]> {
    if code > 0xFFFF {
        return None;
    }
    let j1 = (code >> 8) & 0xFF;
    let j2 = code & 0xFF;

    let s1 = if 32 < j1 && j1 <= 94 {
        (j1 + 1) / 2 + 112
    } else {
        (j1 + 1) / 2 + 176
    };
    let s2 = if j1 & 1 == 1 {
        j2 + 31 + j2 / 96
    } else {
        j2 + 126
    };
    Some([u8::try_from(s1).ok()?, u8::try_from(s2).ok()?])
}

/// The bytes of a code in a one- or two-byte legacy encoding.
///
/// Codes below 0x100 are a single byte; larger codes are two bytes, low byte
/// first.
fn legacy_bytes(code: u32) -> Option<Vec<u8>> {
    match code {
        0..=0xFF => Some(vec![code as u8]),
        0x100..=0xFFFF => Some(vec![code as u8, (code >> 8) as u8]),
        _ => None,
    }
}

fn decode_legacy(
    raw_code: u32,
    decode: impl Fn(&[u8]) -> Option<Cow<'_, str>>,
) -> Result<u32, NormalizeError> {
    let invalid = || NormalizeError::InvalidMapping {
        raw_code,
        mapped: raw_code,
    };
    let bytes = legacy_bytes(raw_code).ok_or_else(invalid)?;
    let decoded = decode(&bytes).ok_or_else(invalid)?;
    single_scalar(raw_code, decoded)
}

fn single_scalar(raw_code: u32, decoded: Cow<str>) -> Result<u32, NormalizeError> {
    let mut chars = decoded.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c.into()),
        _ => Err(NormalizeError::InternalConsistency {
            raw_code,
            decoded: decoded.into_owned(),
        }),
    }
}
