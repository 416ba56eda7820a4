//! PDF document session

use crate::error::{PdfError, Result};
use crate::io::reader::{PdfReader, ReaderConfiguration};
use crate::io::writer::{PdfWriter, SaveMode, WriteSummary, WriterConfiguration};
use crate::io::xref::XrefFormat;
use crate::notification::NotificationCollection;
use crate::objects::{Array, Dictionary, Name, Object, ObjectTable};
use crate::types::{ObjectId, PdfVersion};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// One open document: its version, trailer and object table.
///
/// A clone is an independent session; objects cloned between a document
/// and its clone are deep-copied.
#[derive(Debug, Clone)]
pub struct PdfDocument {
    version: PdfVersion,
    trailer: Dictionary,
    objects: ObjectTable,
    /// Encoding of the newest cross-reference section of the loaded file
    xref_format: XrefFormat,
    /// Offset of the newest cross-reference section of the loaded file
    startxref: Option<u64>,
}

impl Default for PdfDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfDocument {
    /// Create an empty document holding a catalog and an empty page tree
    pub fn new() -> Self {
        let mut objects = ObjectTable::new();

        let mut pages = Dictionary::new();
        pages.set("Type", Name::from("Pages"));
        pages.set("Kids", Array::new());
        pages.set("Count", 0);
        let pages = objects.register(pages);

        let mut catalog = Dictionary::new();
        catalog.set("Type", Name::from("Catalog"));
        catalog.set("Pages", pages);
        let catalog = objects.register(catalog);

        let mut trailer = Dictionary::new();
        trailer.set("Root", catalog);

        PdfDocument {
            version: PdfVersion::default(),
            trailer,
            objects,
            xref_format: XrefFormat::default(),
            startxref: None,
        }
    }

    pub(crate) fn from_parts(
        version: PdfVersion,
        trailer: Dictionary,
        objects: ObjectTable,
        xref_format: XrefFormat,
        startxref: Option<u64>,
    ) -> Self {
        PdfDocument {
            version,
            trailer,
            objects,
            xref_format,
            startxref,
        }
    }

    /// Load a document from bytes
    pub fn load(data: impl Into<Vec<u8>>) -> Result<Self> {
        Self::load_with_configuration(data, ReaderConfiguration::default())
    }

    /// Load a document from bytes with reader options
    pub fn load_with_configuration(
        data: impl Into<Vec<u8>>,
        config: ReaderConfiguration,
    ) -> Result<Self> {
        PdfReader::from_bytes(data).with_config(config).read()
    }

    /// Load a document from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        PdfReader::from_file(path)?.read()
    }

    pub fn version(&self) -> PdfVersion {
        self.version
    }

    pub fn set_version(&mut self, version: PdfVersion) {
        self.version = version;
    }

    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    pub fn trailer_mut(&mut self) -> &mut Dictionary {
        &mut self.trailer
    }

    /// Encoding of the newest cross-reference section of the loaded file
    pub fn xref_format(&self) -> XrefFormat {
        self.xref_format
    }

    /// `startxref` offset of the loaded file, `None` for new documents
    pub fn startxref(&self) -> Option<u64> {
        self.startxref
    }

    /// Object table
    pub fn objects(&self) -> &ObjectTable {
        &self.objects
    }

    /// Object table, mutably
    pub fn objects_mut(&mut self) -> &mut ObjectTable {
        &mut self.objects
    }

    /// Recoveries made while reading or resolving
    pub fn notifications(&self) -> &NotificationCollection {
        self.objects.notifications()
    }

    fn trailer_reference(&self, key: &[u8]) -> Result<Option<ObjectId>> {
        match self.trailer.get(key) {
            Some(Object::Reference(id)) => Ok(Some(*id)),
            Some(other) => Err(PdfError::contract(format!(
                "trailer /{} must be a reference, found {}",
                String::from_utf8_lossy(key),
                other.type_name()
            ))),
            None => Ok(None),
        }
    }

    /// The document catalog (`/Root`)
    pub fn catalog(&mut self) -> Result<&Dictionary> {
        let root = self
            .trailer_reference(b"Root")?
            .ok_or_else(|| PdfError::contract("trailer has no /Root"))?;
        match self.objects.resolve(root)? {
            Some(object) => object.as_dict(),
            None => Err(PdfError::contract(format!("catalog {} does not exist", root))),
        }
    }

    /// The document information dictionary (`/Info`), if any
    pub fn info(&mut self) -> Result<Option<&Dictionary>> {
        let info = match self.trailer_reference(b"Info")? {
            Some(id) => id,
            None => return Ok(None),
        };
        match self.objects.resolve(info)? {
            Some(object) => object.as_dict().map(Some),
            None => Ok(None),
        }
    }

    // ------------------------------------------------------------------
    // Object access
    // ------------------------------------------------------------------

    /// Add a value as a new indirect object
    pub fn register(&mut self, value: impl Into<Object>) -> ObjectId {
        self.objects.register(value)
    }

    /// Resolve a reference; deleted or unknown objects give `None`
    pub fn resolve(&mut self, id: ObjectId) -> Result<Option<&Object>> {
        self.objects.resolve(id)
    }

    /// Resolve for editing; the object is marked updated
    pub fn resolve_mut(&mut self, id: ObjectId) -> Result<Option<&mut Object>> {
        self.objects.resolve_mut(id)
    }

    /// Follow `object` if it is a reference
    pub fn deref<'a>(&'a mut self, object: &'a Object) -> Result<Option<&'a Object>> {
        self.objects.deref(object)
    }

    pub fn set_value(&mut self, id: ObjectId, value: impl Into<Object>) -> Result<()> {
        self.objects.set_value(id, value)
    }

    pub fn mark_updated(&mut self, id: ObjectId) -> Result<()> {
        self.objects.mark_updated(id)
    }

    pub fn delete(&mut self, id: ObjectId) -> Result<()> {
        self.objects.delete(id)
    }

    /// Register an empty object stream
    pub fn new_object_stream(&mut self) -> Result<ObjectId> {
        self.objects.new_object_stream()
    }

    /// Pack `id` into the object stream `container`
    pub fn compress(&mut self, id: ObjectId, container: ObjectId) -> Result<()> {
        self.objects.compress(id, container)
    }

    /// Move `id` out of its object stream
    pub fn uncompress(&mut self, id: ObjectId) -> Result<()> {
        self.objects.uncompress(id)
    }

    /// Deep-copy object `id` of `source` into this document
    pub fn clone_object(&mut self, source: &mut PdfDocument, id: ObjectId) -> Result<ObjectId> {
        self.objects.clone_object(&mut source.objects, id)
    }

    // ------------------------------------------------------------------
    // Saving
    // ------------------------------------------------------------------

    /// Serialize to bytes
    pub fn save_to_vec(&mut self, mode: SaveMode) -> Result<Vec<u8>> {
        PdfWriter::new(self)
            .with_config(WriterConfiguration::new(mode))
            .write_to_vec()
    }

    /// Save to `path`.
    ///
    /// The output is staged in a temporary file next to `path` and moved
    /// into place only once it is complete, so a failed save leaves any
    /// existing file untouched.
    pub fn save<P: AsRef<Path>>(&mut self, path: P, mode: SaveMode) -> Result<WriteSummary> {
        self.save_with_configuration(path, WriterConfiguration::new(mode))
    }

    /// Save to `path` with writer options
    pub fn save_with_configuration<P: AsRef<Path>>(
        &mut self,
        path: P,
        config: WriterConfiguration,
    ) -> Result<WriteSummary> {
        let path = path.as_ref();
        let (bytes, summary) = PdfWriter::new(self).with_config(config).write_with_summary()?;

        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staged = NamedTempFile::new_in(directory)?;
        staged.write_all(&bytes)?;
        staged.as_file().sync_all()?;
        staged.persist(path).map_err(|e| PdfError::Io(e.error))?;

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "document saved");
        Ok(summary)
    }
}
