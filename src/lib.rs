//! # pdfcore
//!
//! A pure Rust engine for the low-level object layer of PDF files.
//!
//! It reads a file into a lazily resolved graph of typed objects, lets the
//! caller edit that graph, and writes it back either as a full rewrite or as
//! an append-only incremental update.
//!
//! ## Features
//!
//! - Tokenizer and composite-object parser, including `N G R` reference
//!   disambiguation and stream bodies with indirect `/Length`
//! - Classic `xref` tables and binary cross-reference streams
//! - Object streams (packed objects), read lazily and regenerated on save
//! - Free-slot recycling with generation numbers
//! - Standard and incremental saves
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pdfcore::{PdfDocument, SaveMode};
//!
//! let mut doc = PdfDocument::from_file("input.pdf")?;
//! let root = doc.trailer().require(b"Root")?.as_reference()?;
//! if let Some(catalog) = doc.resolve_mut(root)? {
//!     catalog.as_dict_mut()?.set("PageMode", pdfcore::Name::from("UseOutlines"));
//! }
//! doc.save("input.pdf", SaveMode::Incremental)?;
//! # Ok::<(), pdfcore::PdfError>(())
//! ```
//!
//! ## Architecture
//!
//! - [`Object`] - closed sum type of every value kind
//! - [`ObjectTable`] - indirect objects, lazy resolution and the free list
//! - [`io`] - lexer, parser, cross-reference and object-stream codecs,
//!   reader and writer
//! - [`PdfDocument`] - one open session

#![allow(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod document;
pub mod error;
pub mod io;
pub mod notification;
pub mod objects;
pub mod types;

// Re-export commonly used types
pub use document::PdfDocument;
pub use error::{PdfError, Result};
pub use io::{
    PdfReader, PdfWriter, ReaderConfiguration, SaveMode, WriteSummary, WriterConfiguration,
    XrefFormat,
};
pub use notification::{Notification, NotificationCollection, NotificationType};
pub use objects::{
    Array, Dictionary, IndirectObject, Location, Name, Object, ObjectTable, PdfString, Stream,
    StreamKind, StringFormat,
};
pub use types::{ObjectId, PdfDate, PdfVersion};
