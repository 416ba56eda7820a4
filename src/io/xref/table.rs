//! Classic `xref` tables.
//!
//! ```text
//! xref
//! 0 3
//! 0000000000 65535 f
//! 0000000017 00000 n
//! 0000000081 00000 n
//! trailer
//! << /Size 3 /Root 1 0 R >>
//! ```

use super::{XrefFormat, XrefSection};
use crate::error::{PdfError, Result};
use crate::io::lexer::Token;
use crate::io::parser::Parser;
use crate::io::serializer::write_dictionary;
use crate::objects::{Dictionary, Location};
use std::collections::BTreeMap;
use std::io::Write;

/// Parse a table positioned at the `xref` keyword, including its trailer.
pub fn read_table(parser: &mut Parser<'_, '_>) -> Result<XrefSection> {
    parser.expect_keyword(b"xref")?;
    let mut entries = BTreeMap::new();

    loop {
        let header_start = parser.position();
        match parser.next_token()? {
            Some(t) if t.is_keyword(b"trailer") => break,
            Some(Token::Integer(start)) => {
                let start = u32::try_from(start)
                    .map_err(|_| PdfError::format(header_start, "negative subsection start"))?;
                let count = parser.expect_unsigned()?;
                for i in 0..count {
                    let entry_start = parser.position();
                    let field1 = parser.expect_unsigned()?;
                    let generation = parser.expect_unsigned()?;
                    let generation = u16::try_from(generation)
                        .map_err(|_| PdfError::format(entry_start, "generation out of range"))?;
                    let number = start
                        .checked_add(i as u32)
                        .ok_or_else(|| PdfError::format(entry_start, "object number overflow"))?;
                    let location = match parser.next_token()? {
                        Some(t) if t.is_keyword(b"n") => Location::InUse {
                            offset: field1,
                            generation,
                        },
                        Some(t) if t.is_keyword(b"f") => Location::Free {
                            next: field1 as u32,
                            generation,
                        },
                        other => {
                            return Err(PdfError::format(
                                entry_start,
                                format!("expected entry type 'n' or 'f', found {:?}", other),
                            ))
                        }
                    };
                    entries.insert(number, location);
                }
            }
            other => {
                return Err(PdfError::format(
                    header_start,
                    format!("malformed xref subsection header: {:?}", other),
                ))
            }
        }
    }

    let trailer = parser.parse_dictionary()?;
    Ok(XrefSection {
        entries,
        trailer,
        format: XrefFormat::Table,
        stream_id: None,
    })
}

/// Group ascending object numbers into runs of consecutive numbers.
pub fn subsections(numbers: impl IntoIterator<Item = u32>) -> Vec<(u32, u32)> {
    let mut runs: Vec<(u32, u32)> = Vec::new();
    for number in numbers {
        match runs.last_mut() {
            Some((start, count)) if *start + *count == number => *count += 1,
            _ => runs.push((number, 1)),
        }
    }
    runs
}

/// Write `xref`, the entries and the `trailer` dictionary.
///
/// Compressed entries cannot be expressed in a table and are rejected.
pub fn write_table<W: Write>(
    out: &mut W,
    entries: &BTreeMap<u32, Location>,
    trailer: &Dictionary,
) -> Result<()> {
    writeln!(out, "xref")?;
    for (start, count) in subsections(entries.keys().copied()) {
        writeln!(out, "{} {}", start, count)?;
        for number in start..start + count {
            match entries[&number] {
                Location::InUse { offset, generation } => {
                    write!(out, "{:010} {:05} n\r\n", offset, generation)?
                }
                Location::Free { next, generation } => {
                    write!(out, "{:010} {:05} f\r\n", next, generation)?
                }
                Location::Compressed { .. } => {
                    return Err(PdfError::contract(format!(
                        "object {} is compressed and cannot be listed in an xref table",
                        number
                    )))
                }
            }
        }
    }
    writeln!(out, "trailer")?;
    write_dictionary(out, trailer)?;
    writeln!(out)?;
    Ok(())
}
