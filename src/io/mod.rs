//! Reading and writing the file syntax.
//!
//! Bytes flow through [`lexer`] and [`parser`] into the object model;
//! [`xref`] and [`object_stream`] decode the two index structures; [`reader`]
//! ties them into a lazily loaded document and [`writer`] serializes it
//! back through [`serializer`].

pub mod lexer;
pub mod object_stream;
pub mod parser;
pub mod reader;
pub mod serializer;
pub mod writer;
pub mod xref;

pub use object_stream::ObjectStream;
pub use parser::{ObjectResolver, Parser};
pub use reader::{read_pdf, PdfReader, ReaderConfiguration};
pub use writer::{write_pdf, PdfWriter, SaveMode, WriteSummary, WriterConfiguration};
pub use xref::{XrefFormat, XrefSection};
