//! String objects

use encoding_rs::UTF_16BE;
use std::fmt;

/// How a string was (and will be) written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StringFormat {
    /// `( ... )`
    #[default]
    Literal,
    /// `< ... >`
    Hexadecimal,
}

/// A byte string together with its preferred syntax.
///
/// Equality compares bytes only; the syntax is a presentation detail.
#[derive(Debug, Clone, Eq)]
pub struct PdfString {
    pub bytes: Vec<u8>,
    pub format: StringFormat,
}

impl PdfString {
    pub fn literal(bytes: impl Into<Vec<u8>>) -> Self {
        PdfString {
            bytes: bytes.into(),
            format: StringFormat::Literal,
        }
    }

    pub fn hexadecimal(bytes: impl Into<Vec<u8>>) -> Self {
        PdfString {
            bytes: bytes.into(),
            format: StringFormat::Hexadecimal,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Decode as a text string: UTF-16BE when it starts with a byte order
    /// mark, otherwise one byte per character.
    pub fn to_text(&self) -> String {
        if self.bytes.starts_with(&[0xFE, 0xFF]) {
            let (text, _, _) = UTF_16BE.decode(&self.bytes);
            text.into_owned()
        } else {
            self.bytes.iter().map(|&b| b as char).collect()
        }
    }

    /// Serialize with escapes (literal) or as hex digits.
    pub fn encode(&self) -> Vec<u8> {
        match self.format {
            StringFormat::Literal => encode_literal(&self.bytes),
            StringFormat::Hexadecimal => {
                let mut out = Vec::with_capacity(self.bytes.len() * 2 + 2);
                out.push(b'<');
                for &b in &self.bytes {
                    out.push(HEX_DIGITS[(b >> 4) as usize]);
                    out.push(HEX_DIGITS[(b & 0x0F) as usize]);
                }
                out.push(b'>');
                out
            }
        }
    }
}

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

fn encode_literal(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 2);
    out.push(b'(');
    for &b in bytes {
        match b {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(b);
            }
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x08 => out.extend_from_slice(b"\\b"),
            0x0C => out.extend_from_slice(b"\\f"),
            b if b < 0x20 || b == 0x7F => {
                out.extend_from_slice(format!("\\{:03o}", b).as_bytes());
            }
            b => out.push(b),
        }
    }
    out.push(b')');
    out
}

impl PartialEq for PdfString {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl From<&str> for PdfString {
    fn from(s: &str) -> Self {
        PdfString::literal(s.as_bytes())
    }
}

impl fmt::Display for PdfString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.encode()))
    }
}
