//! File reader.
//!
//! Reads the header version, walks the chain of cross-reference sections
//! from the last `startxref` backwards and hands the merged locations to an
//! [`ObjectTable`]. No object is parsed here; everything except the
//! cross-reference streams themselves is resolved lazily later.

use super::lexer::is_whitespace;
use super::xref::{self, XrefSection};
use crate::document::PdfDocument;
use crate::error::{PdfError, Result};
use crate::notification::{NotificationCollection, NotificationType};
use crate::objects::{Location, ObjectTable};
use crate::types::PdfVersion;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;

const HEADER: &[u8] = b"%PDF-";

/// Trailer keys that describe one section rather than the document
const SECTION_KEYS: &[&[u8]] = &[b"Prev", b"XRefStm"];

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration options for the reader.
#[derive(Debug, Clone, Default)]
pub struct ReaderConfiguration {
    /// When `true`, streams whose `/Length` is wrong or missing are
    /// recovered by scanning for `endstream`, and an unreadable older
    /// cross-reference section ends the `/Prev` walk instead of failing
    /// the load. Each recovery is reported as a notification.
    ///
    /// Default: `false` (strict mode).
    pub failsafe: bool,
}

// ---------------------------------------------------------------------------
// PdfReader
// ---------------------------------------------------------------------------

/// Reads a complete file into a [`PdfDocument`]
pub struct PdfReader {
    data: Arc<[u8]>,
    config: ReaderConfiguration,
    notifications: NotificationCollection,
}

impl PdfReader {
    /// Read a file by path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Ok(Self::from_bytes(data))
    }

    /// Read from an in-memory buffer
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        PdfReader {
            data: Arc::from(data.into()),
            config: ReaderConfiguration::default(),
            notifications: NotificationCollection::new(),
        }
    }

    /// Set configuration options.
    pub fn with_config(mut self, config: ReaderConfiguration) -> Self {
        self.config = config;
        self
    }

    /// Read the document structure.
    pub fn read(mut self) -> Result<PdfDocument> {
        let version = read_version(&self.data)?;
        let startxref = xref::find_startxref(&self.data)?;
        tracing::debug!(%version, startxref, bytes = self.data.len(), "reading document");

        let sections = self.read_sections(startxref)?;
        let newest_format = sections
            .first()
            .map(|s| s.format)
            .unwrap_or_default();

        let mut locations = BTreeMap::new();
        let mut size = 0u32;
        let mut xref_streams = BTreeSet::new();
        for section in sections.iter().rev() {
            for (&number, &location) in &section.entries {
                locations.insert(number, location);
            }
            size = size.max(section.size().unwrap_or(0));
            if let Some(id) = section.stream_id {
                xref_streams.insert(id.number);
            }
        }

        // The newest trailer describes the document; only /Root is taken
        // from an older section when the newest one lacks it.
        let mut trailer = sections
            .first()
            .map(|s| s.trailer.clone())
            .unwrap_or_default();
        for key in SECTION_KEYS {
            trailer.remove(key);
        }
        if !trailer.has(b"Root") {
            let root = sections
                .iter()
                .skip(1)
                .find_map(|s| s.trailer.get(b"Root"))
                .cloned();
            if let Some(root) = root {
                trailer.set("Root", root);
            }
        }

        if trailer.has(b"Encrypt") {
            return Err(PdfError::unsupported("encrypted documents"));
        }
        if !trailer.has(b"Root") {
            let message = "trailer has no /Root";
            if !self.config.failsafe {
                return Err(PdfError::format(startxref as usize, message));
            }
            self.notify(NotificationType::Warning, message);
        }

        let mut objects =
            ObjectTable::from_source(self.data.clone(), locations, size, self.config.failsafe);
        objects.set_xref_streams(xref_streams);
        for notification in self.notifications {
            objects
                .notifications_mut()
                .notify(notification.notification_type, notification.message);
        }
        tracing::debug!(
            sections = sections.len(),
            objects = objects.len(),
            "cross-reference data loaded"
        );

        Ok(PdfDocument::from_parts(
            version,
            trailer,
            objects,
            newest_format,
            Some(startxref),
        ))
    }

    /// Collect sections newest first. A hybrid section is followed by its
    /// `/XRefStm` companion folded into it.
    fn read_sections(&mut self, startxref: u64) -> Result<Vec<XrefSection>> {
        let mut sections = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(startxref);

        while let Some(offset) = next {
            if !visited.insert(offset) {
                self.notify(
                    NotificationType::Warning,
                    format!("cross-reference chain loops back to byte {}", offset),
                );
                break;
            }
            let mut section = match self.read_section_at(offset) {
                Ok(section) => section,
                Err(err) if self.config.failsafe && !sections.is_empty() => {
                    self.notify(
                        NotificationType::Error,
                        format!(
                            "skipped unreadable cross-reference section at byte {}: {}",
                            offset, err
                        ),
                    );
                    break;
                }
                Err(err) => return Err(err),
            };
            tracing::debug!(
                offset,
                format = ?section.format,
                entries = section.entries.len(),
                "read cross-reference section"
            );

            if let Some(stream_offset) = section.hybrid_stream() {
                if visited.insert(stream_offset) {
                    let companion = self.read_section_at(stream_offset)?;
                    merge_hybrid(&mut section, companion);
                }
            }

            next = section.prev();
            sections.push(section);
        }

        Ok(sections)
    }

    fn read_section_at(&self, offset: u64) -> Result<XrefSection> {
        let offset = usize::try_from(offset)
            .ok()
            .filter(|&o| o < self.data.len())
            .ok_or_else(|| {
                PdfError::format(
                    self.data.len(),
                    format!("cross-reference offset {} is outside the file", offset),
                )
            })?;
        xref::read_section(&self.data, offset)
    }

    fn notify(&mut self, notification_type: NotificationType, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.notifications.notify(notification_type, message);
    }
}

/// Entries of the `/XRefStm` companion fill the slots the table leaves
/// free or unlisted.
fn merge_hybrid(section: &mut XrefSection, companion: XrefSection) {
    for (number, location) in companion.entries {
        let replace = match section.entries.get(&number) {
            None | Some(Location::Free { .. }) => true,
            Some(_) => false,
        };
        if replace {
            section.entries.insert(number, location);
        }
    }
    section.stream_id = companion.stream_id;
}

/// Version from the `%PDF-x.y` header, searched within the first kilobyte
fn read_version(data: &[u8]) -> Result<PdfVersion> {
    let window = &data[..data.len().min(1024)];
    let start = window
        .windows(HEADER.len())
        .position(|w| w == HEADER)
        .ok_or_else(|| PdfError::format(0, "missing '%PDF-' header"))?
        + HEADER.len();
    let end = data[start..]
        .iter()
        .position(|&b| is_whitespace(b))
        .map(|p| start + p)
        .unwrap_or(data.len());
    PdfVersion::parse(&data[start..end]).map_err(|_| {
        PdfError::format(
            start,
            format!("invalid header version '{}'", String::from_utf8_lossy(&data[start..end])),
        )
    })
}

/// Read the file at `path`
pub fn read_pdf<P: AsRef<Path>>(path: P) -> Result<PdfDocument> {
    PdfReader::from_file(path)?.read()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::xref::XrefFormat;
    use crate::objects::Object;
    use crate::types::ObjectId;

    /// Minimal file: catalog (1), pages (2), classic table
    fn minimal() -> Vec<u8> {
        let mut data = b"%PDF-1.4\n".to_vec();
        let o1 = data.len();
        data.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
        let o2 = data.len();
        data.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n");
        let xref = data.len();
        data.extend_from_slice(
            format!(
                "xref\n0 3\n0000000000 65535 f\r\n{:010} 00000 n\r\n{:010} 00000 n\r\n\
                 trailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                o1, o2, xref
            )
            .as_bytes(),
        );
        data
    }

    #[test]
    fn test_read_minimal() {
        let mut doc = PdfReader::from_bytes(minimal()).read().unwrap();
        assert_eq!(doc.version(), PdfVersion::V1_4);
        assert_eq!(
            doc.trailer().get(b"Root"),
            Some(&Object::Reference(ObjectId::new(1, 0)))
        );
        assert_eq!(doc.catalog().unwrap().get_type(), Some(&b"Catalog"[..]));
        assert_eq!(doc.xref_format(), XrefFormat::Table);
    }

    #[test]
    fn test_missing_header() {
        assert!(matches!(
            PdfReader::from_bytes(b"hello".to_vec()).read(),
            Err(PdfError::Format { .. })
        ));
    }

    #[test]
    fn test_encrypted_is_unsupported() {
        let data = String::from_utf8(minimal())
            .unwrap()
            .replace("/Root 1 0 R", "/Root 1 0 R /Encrypt 5 0 R");
        // startxref still points at the table; only the trailer grew
        assert!(matches!(
            PdfReader::from_bytes(data.into_bytes()).read(),
            Err(PdfError::Unsupported(_))
        ));
    }

    #[test]
    fn test_prev_loop_is_detected() {
        let data = String::from_utf8(minimal()).unwrap();
        let xref = data.find("xref").unwrap();
        let looped = data.replace("/Size 3 /Root", &format!("/Size 3 /Prev {} /Root", xref));
        let doc = PdfReader::from_bytes(looped.into_bytes()).read().unwrap();
        assert_eq!(doc.notifications().len(), 1);
    }

    #[test]
    fn test_newest_trailer_wins() {
        let base = String::from_utf8(minimal())
            .unwrap()
            .replace("/Root 1 0 R", "/Root 1 0 R /Info 2 0 R");
        let prev = base.find("xref").unwrap();
        let mut data = base.into_bytes();
        let o2 = data.len();
        data.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n");
        let xref = data.len();
        data.extend_from_slice(
            format!(
                "xref\n2 1\n{:010} 00000 n\r\n\
                 trailer\n<< /Size 3 /Prev {} >>\nstartxref\n{}\n%%EOF\n",
                o2, prev, xref
            )
            .as_bytes(),
        );

        let mut doc = PdfReader::from_bytes(data).read().unwrap();
        // /Info was dropped by the update; /Root falls back to the older section
        assert!(!doc.trailer().has(b"Info"));
        assert!(!doc.trailer().has(b"Prev"));
        assert_eq!(
            doc.trailer().get(b"Root"),
            Some(&Object::Reference(ObjectId::new(1, 0)))
        );
        assert_eq!(doc.catalog().unwrap().get_type(), Some(&b"Catalog"[..]));
        assert!(doc.notifications().is_empty());
    }

    #[test]
    fn test_header_after_junk() {
        let mut data = b"junk\n".to_vec();
        data.extend_from_slice(b"%PDF-2.0\n");
        assert_eq!(read_version(&data).unwrap(), PdfVersion::V2_0);
    }
}
