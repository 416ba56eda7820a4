//! File writer.
//!
//! Two modes:
//!
//! - [`SaveMode::Standard`] rewrites the whole file: header, every live
//!   object, regenerated object streams and one new cross-reference
//!   section.
//! - [`SaveMode::Incremental`] copies the loaded bytes unchanged and appends
//!   the dirty objects plus a cross-reference section chained to the
//!   previous one through `/Prev`.
//!
//! The document is never modified by a save. Streams get their `/Length`
//! recomputed and, unless disabled, an unfiltered body is deflated, but only
//! in the serialized copy.

use super::object_stream::ObjectStream;
use super::serializer::write_indirect;
use super::xref::{table::write_table, XrefFormat, XrefStreamCodec};
use crate::document::PdfDocument;
use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Location, Name, Object, ObjectTable, Stream, StreamKind};
use crate::types::{ObjectId, PdfVersion};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Trailer keys never carried over into a new section
const DROPPED_TRAILER_KEYS: &[&[u8]] = &[
    b"Prev",
    b"XRefStm",
    b"Size",
    b"Type",
    b"W",
    b"Index",
    b"Length",
    b"Filter",
    b"DecodeParms",
];

/// Binary marker line following the header
const BINARY_MARKER: &[u8] = b"%\xE2\xE3\xCF\xD3\n";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How much of the file a save writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SaveMode {
    /// Full rewrite
    #[default]
    Standard,
    /// Append-only update of a loaded file
    Incremental,
}

/// Configuration options for the writer.
#[derive(Debug, Clone)]
pub struct WriterConfiguration {
    pub mode: SaveMode,
    /// Encoding of the new cross-reference section. `None` means a stream
    /// for standard saves and the format of the newest loaded section for
    /// incremental saves.
    pub xref_format: Option<XrefFormat>,
    /// Deflate unfiltered stream bodies in the output.
    ///
    /// Default: `true`.
    pub compress_streams: bool,
}

impl Default for WriterConfiguration {
    fn default() -> Self {
        Self {
            mode: SaveMode::Standard,
            xref_format: None,
            compress_streams: true,
        }
    }
}

impl WriterConfiguration {
    pub fn new(mode: SaveMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }
}

/// What the last cross-reference section of a save contains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    /// Byte offset announced by `startxref`
    pub xref_offset: u64,
    /// Entries of the new section
    pub entries: BTreeMap<u32, Location>,
}

impl WriteSummary {
    /// Object numbers listed as free
    pub fn free_entries(&self) -> impl Iterator<Item = (u32, Location)> + '_ {
        self.entries
            .iter()
            .filter(|(_, l)| l.is_free())
            .map(|(&n, &l)| (n, l))
    }
}

// ---------------------------------------------------------------------------
// PdfWriter
// ---------------------------------------------------------------------------

/// Serializes a [`PdfDocument`]
pub struct PdfWriter<'d> {
    document: &'d mut PdfDocument,
    config: WriterConfiguration,
}

impl<'d> PdfWriter<'d> {
    /// Writer with the default configuration (standard mode)
    pub fn new(document: &'d mut PdfDocument) -> Self {
        Self {
            document,
            config: WriterConfiguration::default(),
        }
    }

    /// Set configuration options.
    pub fn with_config(mut self, config: WriterConfiguration) -> Self {
        self.config = config;
        self
    }

    /// Write to a file
    pub fn write_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<WriteSummary> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let summary = self.write_to_writer(&mut writer)?;
        writer.flush()?;
        Ok(summary)
    }

    /// Write to any writer
    pub fn write_to_writer<W: Write>(&mut self, mut writer: W) -> Result<WriteSummary> {
        let (bytes, summary) = self.write_with_summary()?;
        writer.write_all(&bytes)?;
        Ok(summary)
    }

    /// Write to a byte vector
    pub fn write_to_vec(&mut self) -> Result<Vec<u8>> {
        self.write_with_summary().map(|(bytes, _)| bytes)
    }

    /// Write to a byte vector and describe the new cross-reference section
    pub fn write_with_summary(&mut self) -> Result<(Vec<u8>, WriteSummary)> {
        let result = match self.config.mode {
            SaveMode::Standard => self.write_standard(),
            SaveMode::Incremental => self.write_incremental(),
        }?;
        tracing::debug!(
            mode = ?self.config.mode,
            bytes = result.0.len(),
            entries = result.1.entries.len(),
            xref_offset = result.1.xref_offset,
            "document written"
        );
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Standard mode
    // ------------------------------------------------------------------

    fn write_standard(&mut self) -> Result<(Vec<u8>, WriteSummary)> {
        let format = self.config.xref_format.unwrap_or(XrefFormat::Stream);
        let pack = format == XrefFormat::Stream;
        let compress = self.config.compress_streams;

        let mut version = self.document.version();
        if pack && version < PdfVersion::V1_5 {
            version = PdfVersion::V1_5;
        }
        let trailer = carried_trailer(self.document.trailer());
        let table = self.document.objects_mut();

        let mut out = Vec::new();
        writeln!(out, "%PDF-{}", version)?;
        out.extend_from_slice(BINARY_MARKER);

        let skipped_xref: BTreeSet<u32> = table.xref_streams().clone();
        let live: Vec<(ObjectId, Location)> = table
            .iter()
            .filter(|(n, e)| !e.is_free() && !skipped_xref.contains(*n))
            .map(|(_, e)| (e.id(), e.location()))
            .collect();

        let mut containers = BTreeSet::new();
        for (id, _) in &live {
            if let Some(Object::Stream(stream)) = table.resolve(*id)? {
                if stream.kind() == StreamKind::ObjectStream {
                    containers.insert(id.number);
                }
            }
        }

        let mut entries = BTreeMap::new();
        let mut placeholders: Vec<(u32, u16)> = skipped_xref
            .iter()
            .filter_map(|n| table.get(*n))
            .filter(|e| !e.is_free())
            .map(|e| (e.id().number, e.id().generation))
            .collect();

        for (id, location) in &live {
            if containers.contains(&id.number) {
                let members = table.packed_members(id.number);
                if pack && !members.is_empty() {
                    let offset = write_container(&mut out, table, *id, &members, compress)?;
                    entries.insert(id.number, in_use(offset, id.generation));
                    for (index, number) in members.iter().enumerate() {
                        entries.insert(
                            *number,
                            Location::Compressed {
                                stream: id.number,
                                index: index as u32,
                            },
                        );
                    }
                } else {
                    placeholders.push((id.number, id.generation));
                }
                continue;
            }
            if let Location::Compressed { stream, .. } = location {
                if pack && containers.contains(stream) {
                    continue;
                }
            }
            let offset = write_standalone(&mut out, table, *id, compress)?;
            entries.insert(id.number, in_use(offset, id.generation));
        }

        // Free chain: deleted slots first, then the skipped placeholders
        let mut free: Vec<(u32, u16)> = table
            .free_numbers()
            .into_iter()
            .map(|n| (n, table.location(n).map(|l| l.generation()).unwrap_or(0)))
            .collect();
        placeholders.sort_unstable();
        free.extend(
            placeholders
                .into_iter()
                .map(|(n, generation)| (n, generation.saturating_add(1))),
        );
        link_free_chain(&mut entries, &free);

        let size = table.size();
        let xref_offset = out.len() as u64;
        finish_section(&mut out, &mut entries, trailer, format, size, xref_offset, compress)?;
        Ok((
            out,
            WriteSummary {
                xref_offset,
                entries,
            },
        ))
    }

    // ------------------------------------------------------------------
    // Incremental mode
    // ------------------------------------------------------------------

    fn write_incremental(&mut self) -> Result<(Vec<u8>, WriteSummary)> {
        let previous = self.document.startxref().ok_or_else(|| {
            PdfError::contract("incremental save needs a document loaded from a file")
        })?;
        let format = self
            .config
            .xref_format
            .unwrap_or_else(|| self.document.xref_format());
        let pack = format == XrefFormat::Stream;
        let compress = self.config.compress_streams;

        let mut trailer = carried_trailer(self.document.trailer());
        let previous_size = match self.document.trailer().get(b"Size") {
            Some(Object::Integer(n)) => u32::try_from(*n).unwrap_or(0),
            _ => 0,
        };
        let table = self.document.objects_mut();

        let mut out = table
            .source()
            .ok_or_else(|| {
                PdfError::contract("incremental save needs a document loaded from a file")
            })?
            .to_vec();
        if !out.ends_with(b"\n") {
            out.push(b'\n');
        }

        let dirty: Vec<(ObjectId, Location)> = table
            .iter()
            .filter(|(_, e)| e.is_dirty() && !e.is_free())
            .map(|(_, e)| (e.id(), e.location()))
            .collect();

        let mut rewrite = BTreeSet::new();
        let mut standalone = Vec::new();
        for (id, location) in &dirty {
            match location {
                Location::Compressed { stream, .. } if pack => {
                    rewrite.insert(*stream);
                }
                _ => {
                    let is_container = matches!(
                        table.resolve(*id)?,
                        Some(Object::Stream(s)) if s.kind() == StreamKind::ObjectStream
                    );
                    if is_container && pack {
                        rewrite.insert(id.number);
                    } else {
                        standalone.push(*id);
                    }
                }
            }
        }

        let mut entries = BTreeMap::new();
        for id in standalone {
            let offset = write_standalone(&mut out, table, id, compress)?;
            entries.insert(id.number, in_use(offset, id.generation));
        }
        for number in rewrite {
            let id = match table.get(number) {
                Some(entry) if !entry.is_free() => entry.id(),
                _ => {
                    return Err(PdfError::contract(format!(
                        "object stream {} does not exist",
                        number
                    )))
                }
            };
            let members = table.packed_members(number);
            let offset = write_container(&mut out, table, id, &members, compress)?;
            entries.insert(number, in_use(offset, id.generation));
            for (index, member) in members.iter().enumerate() {
                entries.insert(
                    *member,
                    Location::Compressed {
                        stream: number,
                        index: index as u32,
                    },
                );
            }
        }

        if table.free_chain_changed() {
            let free: Vec<(u32, u16)> = table
                .free_numbers()
                .into_iter()
                .map(|n| (n, table.location(n).map(|l| l.generation()).unwrap_or(0)))
                .collect();
            link_free_chain(&mut entries, &free);
        }

        trailer.set("Prev", previous as i64);
        let size = table.size().max(previous_size);
        let xref_offset = out.len() as u64;
        finish_section(&mut out, &mut entries, trailer, format, size, xref_offset, compress)?;
        Ok((
            out,
            WriteSummary {
                xref_offset,
                entries,
            },
        ))
    }
}

fn in_use(offset: u64, generation: u16) -> Location {
    Location::InUse { offset, generation }
}

/// Document trailer without the keys that belong to one section
fn carried_trailer(trailer: &Dictionary) -> Dictionary {
    let mut carried = trailer.clone();
    for key in DROPPED_TRAILER_KEYS {
        carried.remove(key);
    }
    carried
}

/// Thread `free` into a chain starting at entry 0 and ending back at 0
fn link_free_chain(entries: &mut BTreeMap<u32, Location>, free: &[(u32, u16)]) {
    let head = free.first().map(|&(n, _)| n).unwrap_or(0);
    entries.insert(
        0,
        Location::Free {
            next: head,
            generation: ObjectId::MAX_GENERATION,
        },
    );
    for (i, &(number, generation)) in free.iter().enumerate() {
        let next = free.get(i + 1).map(|&(n, _)| n).unwrap_or(0);
        entries.insert(number, Location::Free { next, generation });
    }
}

/// Copy of a stream ready for output: `/Length` matches the body and an
/// unfiltered body is deflated when `compress` is set
fn prepare_stream(stream: &Stream, compress: bool) -> Result<Stream> {
    let mut copy = stream.clone();
    if compress && !copy.is_filtered() {
        copy.compress()?;
    }
    copy.dict.set("Length", copy.content.len() as i64);
    Ok(copy)
}

fn write_value(out: &mut Vec<u8>, id: ObjectId, value: &Object, compress: bool) -> Result<u64> {
    let offset = out.len() as u64;
    match value {
        Object::Stream(stream) => {
            let prepared = Object::Stream(prepare_stream(stream, compress)?);
            write_indirect(out, id.number, id.generation, &prepared)?;
        }
        other => write_indirect(out, id.number, id.generation, other)?,
    }
    Ok(offset)
}

fn write_standalone(
    out: &mut Vec<u8>,
    table: &mut ObjectTable,
    id: ObjectId,
    compress: bool,
) -> Result<u64> {
    let value = table
        .resolve(id)?
        .ok_or_else(|| PdfError::contract(format!("object {} does not exist", id)))?;
    write_value(out, id, value, compress)
}

/// Regenerate object stream `id` from the current values of `members`
fn write_container(
    out: &mut Vec<u8>,
    table: &mut ObjectTable,
    id: ObjectId,
    members: &[u32],
    compress: bool,
) -> Result<u64> {
    let extends = match table.resolve(id)? {
        Some(Object::Stream(stream)) => match stream.dict.get(b"Extends") {
            Some(Object::Reference(target)) => Some(*target),
            _ => None,
        },
        _ => None,
    };

    let mut values = Vec::with_capacity(members.len());
    for &number in members {
        let member = match table.get(number) {
            Some(entry) => entry.id(),
            None => return Err(PdfError::contract(format!("object {} does not exist", number))),
        };
        let value = table
            .resolve(member)?
            .cloned()
            .ok_or_else(|| PdfError::contract(format!("object {} does not exist", member)))?;
        values.push((number, value));
    }
    let refs: Vec<(u32, &Object)> = values.iter().map(|(n, v)| (*n, v)).collect();
    let stream = ObjectStream::build(&refs, extends)?;
    write_value(out, id, &Object::Stream(stream), compress)
}

/// Write the cross-reference section, `startxref` and `%%EOF`
fn finish_section(
    out: &mut Vec<u8>,
    entries: &mut BTreeMap<u32, Location>,
    mut trailer: Dictionary,
    format: XrefFormat,
    size: u32,
    xref_offset: u64,
    compress: bool,
) -> Result<()> {
    match format {
        XrefFormat::Table => {
            trailer.set("Size", size);
            write_table(out, entries, &trailer)?;
        }
        XrefFormat::Stream => {
            let number = size;
            entries.insert(number, in_use(xref_offset, 0));
            let encoded = XrefStreamCodec::encode(entries);

            let mut dict = Dictionary::new();
            dict.set("Type", Name::from("XRef"));
            dict.set("Size", number + 1);
            encoded.apply_to(&mut dict);
            for (key, value) in trailer {
                dict.set(key, value);
            }
            let stream = Stream::new(dict, encoded.data);
            write_value(out, ObjectId::new(number, 0), &Object::Stream(stream), compress)?;
        }
    }
    write!(out, "startxref\n{}\n%%EOF\n", xref_offset)?;
    Ok(())
}

/// Save `document` to `path` in standard mode
pub fn write_pdf<P: AsRef<Path>>(document: &mut PdfDocument, path: P) -> Result<WriteSummary> {
    PdfWriter::new(document).write_to_file(path)
}
