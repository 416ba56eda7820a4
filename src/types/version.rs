//! File format version

use crate::error::{PdfError, Result};
use std::fmt;

/// The `major.minor` version announced by the `%PDF-x.y` header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PdfVersion {
    pub major: u8,
    pub minor: u8,
}

impl PdfVersion {
    /// PDF 1.4, last version without object streams
    pub const V1_4: PdfVersion = PdfVersion::new(1, 4);
    /// PDF 1.5, first version with cross-reference and object streams
    pub const V1_5: PdfVersion = PdfVersion::new(1, 5);
    /// PDF 1.7
    pub const V1_7: PdfVersion = PdfVersion::new(1, 7);
    /// PDF 2.0
    pub const V2_0: PdfVersion = PdfVersion::new(2, 0);

    pub const fn new(major: u8, minor: u8) -> Self {
        PdfVersion { major, minor }
    }

    /// Parse `x.y`
    pub fn parse(text: &[u8]) -> Result<Self> {
        let invalid = || {
            PdfError::format(
                0,
                format!("invalid version '{}'", String::from_utf8_lossy(text)),
            )
        };
        let dot = text.iter().position(|&b| b == b'.').ok_or_else(invalid)?;
        let major = parse_digits(&text[..dot]).ok_or_else(invalid)?;
        let minor = parse_digits(&text[dot + 1..]).ok_or_else(invalid)?;
        Ok(PdfVersion::new(major, minor))
    }

    /// Whether this version can carry cross-reference and object streams
    pub fn supports_object_streams(&self) -> bool {
        *self >= Self::V1_5
    }
}

impl Default for PdfVersion {
    fn default() -> Self {
        Self::V1_7
    }
}

impl fmt::Display for PdfVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

fn parse_digits(bytes: &[u8]) -> Option<u8> {
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        assert_eq!(PdfVersion::parse(b"1.7").unwrap(), PdfVersion::V1_7);
        assert_eq!(PdfVersion::parse(b"2.0").unwrap(), PdfVersion::V2_0);
        assert!(PdfVersion::parse(b"17").is_err());
        assert!(PdfVersion::parse(b"1.x").is_err());
    }

    #[test]
    fn test_object_stream_support() {
        assert!(!PdfVersion::V1_4.supports_object_streams());
        assert!(PdfVersion::V1_5.supports_object_streams());
    }

    #[test]
    fn test_version_display() {
        assert_eq!(PdfVersion::new(1, 6).to_string(), "1.6");
    }
}
