//! Error types for pdfcore

use std::io;
use thiserror::Error;

/// Main error type for pdfcore operations
#[derive(Debug, Error)]
pub enum PdfError {
    /// IO error occurred during file operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Malformed input: bad token, unexpected end of input, bad keyword,
    /// malformed dictionary, hex string or stream header
    #[error("Format error at byte {offset}: {message}")]
    Format { offset: usize, message: String },

    /// A caller broke an API contract: out-of-range seek, a value of an
    /// unexpected kind, an invalid enumerated tag
    #[error("Contract violation: {0}")]
    Contract(String),

    /// Operation intentionally not implemented for this value kind
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Error while applying or removing a stream filter
    #[error("Compression error: {0}")]
    Compression(String),
}

/// Result type alias for pdfcore operations
pub type Result<T> = std::result::Result<T, PdfError>;

impl PdfError {
    /// Build a format error anchored at a byte offset.
    pub fn format(offset: usize, message: impl Into<String>) -> Self {
        PdfError::Format {
            offset,
            message: message.into(),
        }
    }

    /// Build a contract error.
    pub fn contract(message: impl Into<String>) -> Self {
        PdfError::Contract(message.into())
    }

    /// Build an unsupported-operation error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        PdfError::Unsupported(message.into())
    }

    /// Byte offset of a format error, if this is one.
    pub fn offset(&self) -> Option<usize> {
        match self {
            PdfError::Format { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_display() {
        let err = PdfError::format(42, "unterminated string");
        assert_eq!(
            err.to_string(),
            "Format error at byte 42: unterminated string"
        );
        assert_eq!(err.offset(), Some(42));
    }

    #[test]
    fn test_contract_error_has_no_offset() {
        let err = PdfError::contract("expected Dictionary, found Integer");
        assert!(err.to_string().contains("expected Dictionary"));
        assert_eq!(err.offset(), None);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let pdf_err: PdfError = io_err.into();
        assert!(matches!(pdf_err, PdfError::Io(_)));
    }
}
