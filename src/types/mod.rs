//! Basic value types shared across the crate

mod date;
mod object_id;
mod version;

pub use date::PdfDate;
pub use object_id::ObjectId;
pub use version::PdfVersion;
