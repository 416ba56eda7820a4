//! The object model.
//!
//! Every value in a file is an [`Object`]: a closed set of scalar kinds plus
//! the composite kinds (array, dictionary, stream) that own their direct
//! children. A [`Object::Reference`] never owns anything; it designates an
//! entry of the [`ObjectTable`].

mod array;
mod dictionary;
pub mod filters;
mod name;
mod stream;
mod string;
mod table;

pub use array::Array;
pub use dictionary::Dictionary;
pub use name::Name;
pub use stream::{Stream, StreamKind};
pub use string::{PdfString, StringFormat};
pub use table::{IndirectObject, Location, ObjectTable};

use crate::error::{PdfError, Result};
use crate::types::{ObjectId, PdfDate};

/// A value of the object graph
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Object {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Name(Name),
    String(PdfString),
    Date(PdfDate),
    Array(Array),
    Dictionary(Dictionary),
    Stream(Stream),
    Reference(ObjectId),
}

impl Object {
    /// Kind name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::Name(_) => "Name",
            Object::String(_) => "String",
            Object::Date(_) => "Date",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream(_) => "Stream",
            Object::Reference(_) => "Reference",
        }
    }

    fn unexpected(&self, expected: &str) -> PdfError {
        PdfError::contract(format!(
            "expected {}, found {}",
            expected,
            self.type_name()
        ))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Object::Boolean(b) => Ok(*b),
            other => Err(other.unexpected("Boolean")),
        }
    }

    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Object::Integer(i) => Ok(*i),
            other => Err(other.unexpected("Integer")),
        }
    }

    /// Numeric value; integers are widened
    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Object::Integer(i) => Ok(*i as f64),
            Object::Real(r) => Ok(*r),
            other => Err(other.unexpected("Real")),
        }
    }

    pub fn as_name(&self) -> Result<&Name> {
        match self {
            Object::Name(n) => Ok(n),
            other => Err(other.unexpected("Name")),
        }
    }

    pub fn as_string(&self) -> Result<&PdfString> {
        match self {
            Object::String(s) => Ok(s),
            other => Err(other.unexpected("String")),
        }
    }

    /// Date value; a plain string is parsed on the fly
    pub fn as_date(&self) -> Result<PdfDate> {
        match self {
            Object::Date(d) => Ok(*d),
            Object::String(s) => {
                PdfDate::parse(s.as_bytes()).ok_or_else(|| other_date_error(s))
            }
            other => Err(other.unexpected("Date")),
        }
    }

    pub fn as_array(&self) -> Result<&Array> {
        match self {
            Object::Array(a) => Ok(a),
            other => Err(other.unexpected("Array")),
        }
    }

    pub fn as_array_mut(&mut self) -> Result<&mut Array> {
        match self {
            Object::Array(a) => Ok(a),
            other => Err(other.unexpected("Array")),
        }
    }

    /// Dictionary, or the header of a stream
    pub fn as_dict(&self) -> Result<&Dictionary> {
        match self {
            Object::Dictionary(d) => Ok(d),
            Object::Stream(s) => Ok(&s.dict),
            other => Err(other.unexpected("Dictionary")),
        }
    }

    pub fn as_dict_mut(&mut self) -> Result<&mut Dictionary> {
        match self {
            Object::Dictionary(d) => Ok(d),
            Object::Stream(s) => Ok(&mut s.dict),
            other => Err(other.unexpected("Dictionary")),
        }
    }

    pub fn as_stream(&self) -> Result<&Stream> {
        match self {
            Object::Stream(s) => Ok(s),
            other => Err(other.unexpected("Stream")),
        }
    }

    pub fn as_stream_mut(&mut self) -> Result<&mut Stream> {
        match self {
            Object::Stream(s) => Ok(s),
            other => Err(other.unexpected("Stream")),
        }
    }

    pub fn as_reference(&self) -> Result<ObjectId> {
        match self {
            Object::Reference(id) => Ok(*id),
            other => Err(other.unexpected("Reference")),
        }
    }

    /// Visit every reference reachable without crossing into other
    /// indirect objects.
    pub fn for_each_reference(&self, f: &mut impl FnMut(ObjectId)) {
        match self {
            Object::Reference(id) => f(*id),
            Object::Array(items) => items.iter().for_each(|o| o.for_each_reference(f)),
            Object::Dictionary(dict) => dict.iter().for_each(|(_, o)| o.for_each_reference(f)),
            Object::Stream(stream) => {
                stream.dict.iter().for_each(|(_, o)| o.for_each_reference(f))
            }
            _ => {}
        }
    }
}

fn other_date_error(s: &PdfString) -> PdfError {
    PdfError::contract(format!("string '{}' is not a date", s.to_text()))
}

impl From<bool> for Object {
    fn from(v: bool) -> Self {
        Object::Boolean(v)
    }
}

impl From<i64> for Object {
    fn from(v: i64) -> Self {
        Object::Integer(v)
    }
}

impl From<i32> for Object {
    fn from(v: i32) -> Self {
        Object::Integer(v as i64)
    }
}

impl From<u32> for Object {
    fn from(v: u32) -> Self {
        Object::Integer(v as i64)
    }
}

impl From<f64> for Object {
    fn from(v: f64) -> Self {
        Object::Real(v)
    }
}

impl From<Name> for Object {
    fn from(v: Name) -> Self {
        Object::Name(v)
    }
}

impl From<PdfString> for Object {
    fn from(v: PdfString) -> Self {
        Object::String(v)
    }
}

impl From<PdfDate> for Object {
    fn from(v: PdfDate) -> Self {
        Object::Date(v)
    }
}

impl From<Array> for Object {
    fn from(v: Array) -> Self {
        Object::Array(v)
    }
}

impl From<Vec<Object>> for Object {
    fn from(v: Vec<Object>) -> Self {
        Object::Array(v.into())
    }
}

impl From<Dictionary> for Object {
    fn from(v: Dictionary) -> Self {
        Object::Dictionary(v)
    }
}

impl From<Stream> for Object {
    fn from(v: Stream) -> Self {
        Object::Stream(v)
    }
}

impl From<ObjectId> for Object {
    fn from(v: ObjectId) -> Self {
        Object::Reference(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessor_kind_mismatch() {
        let obj = Object::Integer(5);
        assert_eq!(obj.as_i64().unwrap(), 5);
        assert_eq!(obj.as_f64().unwrap(), 5.0);
        let err = obj.as_dict().unwrap_err();
        assert!(err.to_string().contains("expected Dictionary, found Integer"));
    }

    #[test]
    fn test_stream_header_via_as_dict() {
        let stream = Stream::new(Dictionary::new(), b"abc".to_vec());
        let obj = Object::Stream(stream);
        assert_eq!(obj.as_dict().unwrap().get(b"Length"), Some(&Object::Integer(3)));
    }

    #[test]
    fn test_for_each_reference() {
        let mut dict = Dictionary::new();
        dict.set("Pages", ObjectId::new(2, 0));
        dict.set(
            "Kids",
            vec![Object::Reference(ObjectId::new(3, 0)), Object::Integer(1)],
        );
        let mut seen = Vec::new();
        Object::Dictionary(dict).for_each_reference(&mut |id| seen.push(id.number));
        seen.sort();
        assert_eq!(seen, vec![2, 3]);
    }

    #[test]
    fn test_string_as_date() {
        let obj = Object::String(PdfString::from("D:20200101"));
        assert!(obj.as_date().is_ok());
        assert!(Object::String(PdfString::from("nope")).as_date().is_err());
    }
}
