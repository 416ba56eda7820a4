//! Object streams (`/Type /ObjStm`).
//!
//! The decoded body starts with an index segment of `number offset` pairs,
//! followed by the data segment at `/First`. Offsets are relative to the
//! data segment. The index is parsed on first access; each entry is parsed
//! only when asked for.
//!
//! Membership edits go to an in-memory overlay. Nothing is patched in
//! place: [`ObjectStream::build`] regenerates the whole body on flush.

use super::parser::Parser;
use super::serializer::write_object;
use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Name, Object, Stream, StreamKind};
use crate::types::ObjectId;
use once_cell::unsync::OnceCell;

/// A packed container of small indirect objects
#[derive(Debug, Clone)]
pub struct ObjectStream {
    number: u32,
    data: Vec<u8>,
    count: usize,
    first: usize,
    extends: Option<ObjectId>,
    index: OnceCell<Vec<(u32, usize)>>,
    overlay: Option<Vec<u32>>,
}

impl ObjectStream {
    /// An empty container that will be filled through [`insert`](Self::insert)
    pub fn new(number: u32) -> Self {
        ObjectStream {
            number,
            data: Vec::new(),
            count: 0,
            first: 0,
            extends: None,
            index: OnceCell::with_value(Vec::new()),
            overlay: None,
        }
    }

    /// Wrap a parsed `/Type /ObjStm` stream stored as object `number`
    pub fn from_stream(number: u32, stream: &Stream) -> Result<Self> {
        if stream.kind() != StreamKind::ObjectStream {
            return Err(PdfError::contract(format!(
                "object {} is not an object stream",
                number
            )));
        }
        let count = non_negative(&stream.dict, b"N")?;
        let first = non_negative(&stream.dict, b"First")?;
        let data = stream.decoded_content()?.into_owned();
        if first > data.len() {
            return Err(PdfError::format(
                first,
                format!("object stream {}: /First beyond body of {} bytes", number, data.len()),
            ));
        }
        let extends = match stream.dict.get(b"Extends") {
            Some(Object::Reference(id)) => Some(*id),
            _ => None,
        };
        Ok(ObjectStream {
            number,
            data,
            count,
            first,
            extends,
            index: OnceCell::new(),
            overlay: None,
        })
    }

    /// Object number of the container itself
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Offset of the data segment in the decoded body
    pub fn first(&self) -> usize {
        self.first
    }

    /// Container this one extends, if any
    pub fn extends(&self) -> Option<ObjectId> {
        self.extends
    }

    /// The `(object number, relative offset)` pairs of the stored body
    pub fn index(&self) -> Result<&[(u32, usize)]> {
        self.index
            .get_or_try_init(|| self.parse_index())
            .map(|v| v.as_slice())
    }

    fn parse_index(&self) -> Result<Vec<(u32, usize)>> {
        let mut parser = Parser::new(&self.data[..self.first]);
        let mut pairs = Vec::with_capacity(self.count);
        for _ in 0..self.count {
            let pos = parser.position();
            let number = parser.expect_unsigned()?;
            let offset = parser.expect_unsigned()?;
            let number = u32::try_from(number)
                .map_err(|_| PdfError::format(pos, "object number out of range"))?;
            pairs.push((number, offset as usize));
        }
        Ok(pairs)
    }

    /// Parse the entry at `index` from the stored body.
    ///
    /// Returns the object number recorded in the index together with the
    /// value, or `None` when `index` is past the end.
    pub fn get(&self, index: u32) -> Result<Option<(u32, Object)>> {
        let (number, offset) = match self.index()?.get(index as usize) {
            Some(pair) => *pair,
            None => return Ok(None),
        };
        let start = self
            .first
            .checked_add(offset)
            .filter(|&s| s <= self.data.len())
            .ok_or_else(|| {
                PdfError::format(
                    self.first,
                    format!("object stream {}: entry {} offset out of range", self.number, index),
                )
            })?;
        let mut parser = Parser::at(&self.data, start);
        let value = parser.parse_value()?;
        Ok(Some((number, value)))
    }

    /// Current members in index order, overlay included
    pub fn members(&self) -> Result<Vec<u32>> {
        match &self.overlay {
            Some(members) => Ok(members.clone()),
            None => Ok(self.index()?.iter().map(|&(n, _)| n).collect()),
        }
    }

    /// Add a member, returning its inner index. Adding an existing member
    /// returns its current index.
    pub fn insert(&mut self, number: u32) -> Result<u32> {
        let mut members = self.members()?;
        if let Some(pos) = members.iter().position(|&n| n == number) {
            return Ok(pos as u32);
        }
        members.push(number);
        let index = (members.len() - 1) as u32;
        self.overlay = Some(members);
        Ok(index)
    }

    /// Drop a member; returns whether it was present.
    pub fn remove(&mut self, number: u32) -> Result<bool> {
        let mut members = self.members()?;
        let before = members.len();
        members.retain(|&n| n != number);
        let removed = members.len() != before;
        if removed {
            self.overlay = Some(members);
        }
        Ok(removed)
    }

    /// Regenerate a complete object stream from member values.
    ///
    /// The body is unfiltered; `/N`, `/First` and `/Length` describe it.
    pub fn build(members: &[(u32, &Object)], extends: Option<ObjectId>) -> Result<Stream> {
        let mut data = Vec::new();
        let mut offsets = Vec::with_capacity(members.len());
        for (number, value) in members {
            if matches!(value, Object::Stream(_)) {
                return Err(PdfError::contract(format!(
                    "object {} is a stream and cannot be packed into an object stream",
                    number
                )));
            }
            offsets.push((*number, data.len()));
            write_object(&mut data, value)?;
            data.push(b'\n');
        }

        let mut header = Vec::new();
        for (i, (number, offset)) in offsets.iter().enumerate() {
            if i > 0 {
                header.push(b' ');
            }
            header.extend_from_slice(format!("{} {}", number, offset).as_bytes());
        }
        header.push(b'\n');

        let first = header.len();
        header.extend_from_slice(&data);

        let mut dict = Dictionary::new();
        dict.set("Type", Name::from("ObjStm"));
        dict.set("N", members.len() as i64);
        dict.set("First", first as i64);
        if let Some(id) = extends {
            dict.set("Extends", id);
        }
        Ok(Stream::new(dict, header))
    }
}

fn non_negative(dict: &Dictionary, key: &[u8]) -> Result<usize> {
    let value = dict.require(key)?.as_i64()?;
    usize::try_from(value).map_err(|_| {
        PdfError::contract(format!(
            "/{} must be non-negative, found {}",
            String::from_utf8_lossy(key),
            value
        ))
    })
}
