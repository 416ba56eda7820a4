//! Binary cross-reference streams.
//!
//! Each entry is three big-endian unsigned fields whose byte widths are
//! given by `/W [w0 w1 w2]`. Field 0 is the entry kind:
//!
//! | kind | field 1 | field 2 |
//! |------|---------|---------|
//! | 0 free | next free object number | generation |
//! | 1 in use | byte offset | generation |
//! | 2 compressed | object stream number | index inside the stream |
//!
//! `/Index [start count ...]` lists the subsections; it defaults to
//! `[0 Size]`.

use super::table::subsections;
use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Location, Object};
use byteorder::{BigEndian, ByteOrder};
use std::collections::BTreeMap;

/// Widths, subsections and packed rows produced by
/// [`XrefStreamCodec::encode`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedXref {
    pub widths: [usize; 3],
    pub index: Vec<(u32, u32)>,
    pub data: Vec<u8>,
}

impl EncodedXref {
    /// Write `/W` and `/Index` into a stream header
    pub fn apply_to(&self, dict: &mut Dictionary) {
        dict.set(
            "W",
            self.widths
                .iter()
                .map(|&w| Object::Integer(w as i64))
                .collect::<Vec<_>>(),
        );
        dict.set(
            "Index",
            self.index
                .iter()
                .flat_map(|&(start, count)| [Object::from(start), Object::from(count)])
                .collect::<Vec<_>>(),
        );
    }
}

/// Encoder/decoder for the packed entry rows
pub struct XrefStreamCodec;

impl XrefStreamCodec {
    /// Minimum number of bytes that can hold `max` (0 for 0).
    pub fn field_width(max: u64) -> usize {
        let bits = 64 - max.leading_zeros() as usize;
        bits.div_ceil(8)
    }

    /// Decode rows according to the `/W` and `/Index` of `dict`.
    pub fn decode(dict: &Dictionary, data: &[u8]) -> Result<BTreeMap<u32, Location>> {
        let widths = Self::read_widths(dict)?;
        let index = Self::read_index(dict)?;
        let row_len: usize = widths.iter().sum();
        if row_len == 0 {
            return Err(PdfError::contract("cross-reference stream /W is all zero"));
        }

        let mut entries = BTreeMap::new();
        let mut rows = data.chunks_exact(row_len);

        for (start, count) in index {
            for i in 0..count {
                let row = rows.next().ok_or_else(|| {
                    PdfError::format(
                        data.len(),
                        format!(
                            "cross-reference stream truncated in subsection starting at {}",
                            start
                        ),
                    )
                })?;
                let mut fields = [0u64; 3];
                let mut pos = 0;
                for (field, &width) in fields.iter_mut().zip(widths.iter()) {
                    if width > 0 {
                        *field = BigEndian::read_uint(&row[pos..pos + width], width);
                    }
                    pos += width;
                }
                if widths[0] == 0 {
                    fields[0] = 1;
                }
                let number = start
                    .checked_add(i)
                    .ok_or_else(|| PdfError::contract("/Index exceeds the object number range"))?;
                entries.insert(number, Self::location_from_fields(fields)?);
            }
        }

        Ok(entries)
    }

    /// Encode entries in ascending object-number order; a gap in the
    /// numbering starts a new subsection.
    pub fn encode(entries: &BTreeMap<u32, Location>) -> EncodedXref {
        let mut max = [1u64, 0, 0];
        for location in entries.values() {
            let fields = Self::fields_of(location);
            for (m, f) in max.iter_mut().zip(fields.iter()) {
                *m = (*m).max(*f);
            }
        }
        let widths = [
            Self::field_width(max[0]).max(1),
            Self::field_width(max[1]),
            Self::field_width(max[2]),
        ];

        let row_len: usize = widths.iter().sum();
        let mut data = vec![0u8; row_len * entries.len()];
        for (row, location) in data.chunks_exact_mut(row_len).zip(entries.values()) {
            let fields = Self::fields_of(location);
            let mut pos = 0;
            for (&field, &width) in fields.iter().zip(widths.iter()) {
                if width > 0 {
                    BigEndian::write_uint(&mut row[pos..pos + width], field, width);
                }
                pos += width;
            }
        }

        EncodedXref {
            widths,
            index: subsections(entries.keys().copied()),
            data,
        }
    }

    fn fields_of(location: &Location) -> [u64; 3] {
        match *location {
            Location::Free { next, generation } => [0, next as u64, generation as u64],
            Location::InUse { offset, generation } => [1, offset, generation as u64],
            Location::Compressed { stream, index } => [2, stream as u64, index as u64],
        }
    }

    fn location_from_fields(fields: [u64; 3]) -> Result<Location> {
        let narrow = |value: u64, what: &str| {
            u32::try_from(value)
                .map_err(|_| PdfError::contract(format!("{} {} out of range", what, value)))
        };
        let generation = |value: u64| {
            u16::try_from(value)
                .map_err(|_| PdfError::contract(format!("generation {} out of range", value)))
        };
        match fields[0] {
            0 => Ok(Location::Free {
                next: narrow(fields[1], "free-list link")?,
                generation: generation(fields[2])?,
            }),
            1 => Ok(Location::InUse {
                offset: fields[1],
                generation: generation(fields[2])?,
            }),
            2 => Ok(Location::Compressed {
                stream: narrow(fields[1], "object stream number")?,
                index: narrow(fields[2], "object stream index")?,
            }),
            other => Err(PdfError::contract(format!(
                "invalid cross-reference entry kind {}",
                other
            ))),
        }
    }

    fn read_widths(dict: &Dictionary) -> Result<[usize; 3]> {
        let array = dict.require(b"W")?.as_array()?;
        if array.len() < 3 {
            return Err(PdfError::contract("cross-reference stream /W needs 3 widths"));
        }
        let mut widths = [0usize; 3];
        for (w, item) in widths.iter_mut().zip(array.iter()) {
            let value = item.as_i64()?;
            *w = usize::try_from(value)
                .ok()
                .filter(|&v| v <= 8)
                .ok_or_else(|| PdfError::contract(format!("invalid /W field width {}", value)))?;
        }
        Ok(widths)
    }

    fn read_index(dict: &Dictionary) -> Result<Vec<(u32, u32)>> {
        match dict.get(b"Index") {
            Some(Object::Array(items)) => {
                if items.len() % 2 != 0 {
                    return Err(PdfError::contract("/Index must hold start/count pairs"));
                }
                items
                    .as_slice()
                    .chunks(2)
                    .map(|pair| -> Result<(u32, u32)> {
                        let start = u32::try_from(pair[0].as_i64()?)
                            .map_err(|_| PdfError::contract("negative /Index start"))?;
                        let count = u32::try_from(pair[1].as_i64()?)
                            .map_err(|_| PdfError::contract("negative /Index count"))?;
                        Ok((start, count))
                    })
                    .collect()
            }
            _ => {
                let size = dict.require(b"Size")?.as_i64()?;
                let size = u32::try_from(size)
                    .map_err(|_| PdfError::contract(format!("invalid /Size {}", size)))?;
                Ok(vec![(0, size)])
            }
        }
    }
}
