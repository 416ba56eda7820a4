//! Stream objects

use super::filters;
use super::{Dictionary, Name, Object};
use crate::error::{PdfError, Result};
use std::borrow::Cow;

/// Classification of a stream from the `/Type` entry of its header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StreamKind {
    /// Any stream without a structural role
    #[default]
    Generic,
    /// `/Type /ObjStm`: a container of packed objects
    ObjectStream,
    /// `/Type /XRef`: a binary cross-reference section
    XrefStream,
}

impl StreamKind {
    /// Classify a stream header
    pub fn classify(dict: &Dictionary) -> Self {
        match dict.get_type() {
            Some(b"ObjStm") => StreamKind::ObjectStream,
            Some(b"XRef") => StreamKind::XrefStream,
            _ => StreamKind::Generic,
        }
    }
}

/// A dictionary header plus a byte body.
///
/// `content` holds the body exactly as stored, i.e. still encoded by the
/// filters named in `/Filter`.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    pub dict: Dictionary,
    pub content: Vec<u8>,
    kind: StreamKind,
}

impl Stream {
    /// Create a stream; `/Length` is set from the body.
    pub fn new(mut dict: Dictionary, content: Vec<u8>) -> Self {
        dict.set("Length", content.len() as i64);
        let kind = StreamKind::classify(&dict);
        Stream { dict, content, kind }
    }

    /// Create a stream from parsed parts without touching the header
    pub(crate) fn from_parts(dict: Dictionary, content: Vec<u8>) -> Self {
        let kind = StreamKind::classify(&dict);
        Stream { dict, content, kind }
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Re-run classification after editing `/Type`
    pub fn reclassify(&mut self) {
        self.kind = StreamKind::classify(&self.dict);
    }

    /// Stored body
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Filter names from `/Filter`, in application order
    pub fn filters(&self) -> Result<Vec<Name>> {
        match self.dict.get(b"Filter") {
            None | Some(Object::Null) => Ok(Vec::new()),
            Some(Object::Name(name)) => Ok(vec![name.clone()]),
            Some(Object::Array(items)) => items
                .iter()
                .map(|item| item.as_name().cloned())
                .collect(),
            Some(other) => Err(PdfError::contract(format!(
                "/Filter must be a name or array, found {}",
                other.type_name()
            ))),
        }
    }

    /// Whether the body is stored encoded
    pub fn is_filtered(&self) -> bool {
        self.filters().map(|f| !f.is_empty()).unwrap_or(true)
    }

    fn decode_params(&self, index: usize) -> Option<&Dictionary> {
        match self.dict.get(b"DecodeParms") {
            Some(Object::Dictionary(params)) if index == 0 => Some(params),
            Some(Object::Array(items)) => items.get(index).and_then(|p| p.as_dict().ok()),
            _ => None,
        }
    }

    /// Body with all filters removed. Does not modify the stream.
    pub fn decoded_content(&self) -> Result<Cow<'_, [u8]>> {
        let filters = self.filters()?;
        if filters.is_empty() {
            return Ok(Cow::Borrowed(&self.content));
        }
        let mut data = self.content.clone();
        for (i, filter) in filters.iter().enumerate() {
            data = filters::decode(filter.as_bytes(), self.decode_params(i), &data)?;
        }
        Ok(Cow::Owned(data))
    }

    /// Decode in place and drop `/Filter` and `/DecodeParms`.
    ///
    /// Calling this on an already decoded stream changes nothing.
    pub fn decode(&mut self) -> Result<&[u8]> {
        if self.is_filtered() {
            let decoded = self.decoded_content()?.into_owned();
            self.content = decoded;
            self.dict.remove(b"Filter");
            self.dict.remove(b"DecodeParms");
            self.dict.set("Length", self.content.len() as i64);
        }
        Ok(&self.content)
    }

    /// Replace the body with unencoded bytes
    pub fn set_content(&mut self, content: Vec<u8>) {
        self.dict.remove(b"Filter");
        self.dict.remove(b"DecodeParms");
        self.dict.set("Length", content.len() as i64);
        self.content = content;
    }

    /// Deflate an unfiltered body in place. Filtered streams are left alone.
    pub fn compress(&mut self) -> Result<()> {
        if !self.is_filtered() {
            self.content = filters::deflate(&self.content)?;
            self.dict.set("Filter", Name::new(filters::FLATE_DECODE));
            self.dict.set("Length", self.content.len() as i64);
        }
        Ok(())
    }
}
