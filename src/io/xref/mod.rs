//! Cross-reference sections.
//!
//! A section maps object numbers to [`Location`]s. It is stored either as a
//! plain `xref` table ([`table`]) or as a binary cross-reference stream
//! ([`stream`]). Sections chain to older ones through `/Prev`.

pub mod stream;
pub mod table;

pub use stream::{EncodedXref, XrefStreamCodec};

use crate::error::{PdfError, Result};
use crate::io::parser::Parser;
use crate::objects::{Dictionary, Location, Object, StreamKind};
use crate::types::ObjectId;
use std::collections::BTreeMap;

/// Which encoding a section uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum XrefFormat {
    /// `xref` keyword followed by 20-byte entries and a `trailer`
    Table,
    /// `/Type /XRef` stream with fixed-width binary fields
    #[default]
    Stream,
}

/// Keys of a cross-reference stream header that describe the stream
/// itself rather than the document trailer
const STREAM_ONLY_KEYS: &[&[u8]] = &[
    b"Type",
    b"W",
    b"Index",
    b"Length",
    b"Filter",
    b"DecodeParms",
];

/// One cross-reference section as read from or written to a file
#[derive(Debug, Clone, Default)]
pub struct XrefSection {
    pub entries: BTreeMap<u32, Location>,
    pub trailer: Dictionary,
    pub format: XrefFormat,
    /// Object carrying this section when it is a stream
    pub stream_id: Option<ObjectId>,
}

impl XrefSection {
    /// Offset of the previous section (`/Prev`)
    pub fn prev(&self) -> Option<u64> {
        offset_entry(&self.trailer, b"Prev")
    }

    /// Offset of the companion stream of a hybrid file (`/XRefStm`)
    pub fn hybrid_stream(&self) -> Option<u64> {
        offset_entry(&self.trailer, b"XRefStm")
    }

    /// `/Size` of the trailer
    pub fn size(&self) -> Option<u32> {
        match self.trailer.get(b"Size") {
            Some(Object::Integer(n)) => u32::try_from(*n).ok(),
            _ => None,
        }
    }
}

fn offset_entry(dict: &Dictionary, key: &[u8]) -> Option<u64> {
    match dict.get(key) {
        Some(Object::Integer(n)) => u64::try_from(*n).ok(),
        _ => None,
    }
}

/// Read the section starting at `offset`, whichever its encoding.
pub fn read_section(data: &[u8], offset: usize) -> Result<XrefSection> {
    let mut parser = Parser::at(data, offset);
    parser.lexer_mut().skip_whitespace();
    let start = parser.position();

    if data[start..].starts_with(b"xref") {
        return table::read_table(&mut parser);
    }

    let (id, value) = parser.parse_indirect_object()?;
    let stream = match value {
        Object::Stream(stream) if stream.kind() == StreamKind::XrefStream => stream,
        other => {
            return Err(PdfError::format(
                start,
                format!(
                    "expected cross-reference table or stream, found {} object",
                    other.type_name()
                ),
            ))
        }
    };

    let decoded = stream.decoded_content()?;
    let entries = XrefStreamCodec::decode(&stream.dict, &decoded)?;

    let mut trailer = stream.dict.clone();
    for key in STREAM_ONLY_KEYS {
        trailer.remove(key);
    }

    Ok(XrefSection {
        entries,
        trailer,
        format: XrefFormat::Stream,
        stream_id: Some(id),
    })
}

/// Locate the offset announced by the final `startxref`.
pub fn find_startxref(data: &[u8]) -> Result<u64> {
    const KEYWORD: &[u8] = b"startxref";
    let window_start = data.len().saturating_sub(2048);
    let pos = data[window_start..]
        .windows(KEYWORD.len())
        .rposition(|w| w == KEYWORD)
        .map(|p| p + window_start)
        .ok_or_else(|| PdfError::format(data.len(), "missing 'startxref'"))?;

    let mut parser = Parser::at(data, pos + KEYWORD.len());
    parser.expect_unsigned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_startxref() {
        let data = b"%PDF-1.7\n...\nstartxref\n1234\n%%EOF\n";
        assert_eq!(find_startxref(data).unwrap(), 1234);
    }

    #[test]
    fn test_find_last_startxref() {
        let data = b"startxref\n10\n%%EOF\nmore\nstartxref\n99\n%%EOF";
        assert_eq!(find_startxref(data).unwrap(), 99);
    }

    #[test]
    fn test_missing_startxref() {
        assert!(matches!(
            find_startxref(b"%PDF-1.7\n"),
            Err(PdfError::Format { .. })
        ));
    }

    #[test]
    fn test_prev_and_size() {
        let mut section = XrefSection::default();
        section.trailer.set("Prev", 500);
        section.trailer.set("Size", 12);
        assert_eq!(section.prev(), Some(500));
        assert_eq!(section.size(), Some(12));
        assert_eq!(section.hybrid_stream(), None);
    }
}
