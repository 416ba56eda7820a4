//! Shared fixtures for pdfcore integration tests.
//!
//! Files are assembled by hand with [`FileBuilder`] so that reading is
//! exercised against bytes the writer did not produce.

#![allow(dead_code)]

use pdfcore::io::serializer::write_indirect;
use pdfcore::io::ObjectStream;
use pdfcore::io::xref::XrefStreamCodec;
use pdfcore::{Dictionary, Location, Name, Object, PdfDocument, Stream};
use std::collections::BTreeMap;

/// Body of the content stream in the fixtures
pub const CONTENT: &[u8] = b"BT /F1 12 Tf 72 712 Td (Hello) Tj ET";

// ===========================================================================
// File builder
// ===========================================================================

/// Appends objects and records their offsets
pub struct FileBuilder {
    data: Vec<u8>,
    locations: BTreeMap<u32, Location>,
}

impl FileBuilder {
    pub fn new(version: &str) -> Self {
        FileBuilder {
            data: format!("%PDF-{}\n%\u{e2}\u{e3}\n", version).into_bytes(),
            locations: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Write `N 0 obj <body> endobj` from source text
    pub fn object(&mut self, number: u32, body: &str) -> &mut Self {
        self.locations.insert(
            number,
            Location::InUse {
                offset: self.data.len() as u64,
                generation: 0,
            },
        );
        self.data
            .extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", number, body).as_bytes());
        self
    }

    /// Write an object from a value
    pub fn value(&mut self, number: u32, value: &Object) -> &mut Self {
        self.locations.insert(
            number,
            Location::InUse {
                offset: self.data.len() as u64,
                generation: 0,
            },
        );
        write_indirect(&mut self.data, number, 0, value).unwrap();
        self
    }

    /// Record a packed object without writing anything
    pub fn packed(&mut self, number: u32, stream: u32, index: u32) -> &mut Self {
        self.locations
            .insert(number, Location::Compressed { stream, index });
        self
    }

    /// Finish with a classic table. Unlisted numbers below the highest one
    /// become free entries.
    pub fn finish_table(mut self, trailer: &str) -> Vec<u8> {
        let highest = self.locations.keys().next_back().copied().unwrap_or(0);
        let xref = self.data.len();
        let mut text = format!("xref\n0 {}\n0000000000 65535 f\r\n", highest + 1);
        for number in 1..=highest {
            match self.locations.get(&number) {
                Some(Location::InUse { offset, generation }) => {
                    text.push_str(&format!("{:010} {:05} n\r\n", offset, generation))
                }
                _ => text.push_str("0000000000 00001 f\r\n"),
            }
        }
        text.push_str(&format!(
            "trailer\n<< /Size {} {} >>\nstartxref\n{}\n%%EOF\n",
            highest + 1,
            trailer,
            xref
        ));
        self.data.extend_from_slice(text.as_bytes());
        self.data
    }

    /// Finish with a cross-reference stream stored as object `number`
    pub fn finish_stream(mut self, number: u32, trailer: Dictionary) -> Vec<u8> {
        let xref = self.data.len();
        self.locations.insert(
            number,
            Location::InUse {
                offset: xref as u64,
                generation: 0,
            },
        );
        self.locations.insert(
            0,
            Location::Free {
                next: 0,
                generation: 65535,
            },
        );
        let encoded = XrefStreamCodec::encode(&self.locations);
        let mut dict = trailer;
        dict.set("Type", Name::from("XRef"));
        dict.set("Size", number + 1);
        encoded.apply_to(&mut dict);
        let mut stream = Stream::new(dict, encoded.data);
        stream.compress().unwrap();
        write_indirect(&mut self.data, number, 0, &Object::Stream(stream)).unwrap();
        self.data
            .extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref).as_bytes());
        self.data
    }
}

// ===========================================================================
// Fixtures
// ===========================================================================

/// Table-based file: catalog 1, pages 2, page 3, content 4 with its
/// length in object 5, info 6
pub fn classic_pdf() -> Vec<u8> {
    let mut builder = FileBuilder::new("1.4");
    builder
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R >>",
        );
    let body = format!(
        "<< /Length 5 0 R >>\nstream\n{}\nendstream",
        String::from_utf8_lossy(CONTENT)
    );
    builder
        .object(4, &body)
        .object(5, &CONTENT.len().to_string())
        .object(6, "<< /Producer (fixture) /CreationDate (D:20240102030405Z) >>");
    builder.finish_table("/Root 1 0 R /Info 6 0 R")
}

/// Stream-based file: catalog 1, pages 2, object stream 3 packing 4 and 5
/// with its data segment starting at byte 20, xref stream 6
pub fn packed_pdf() -> Vec<u8> {
    let index = b"4 0 5 19";
    let mut body = index.to_vec();
    body.resize(20, b' ');
    body.extend_from_slice(b"<< /Kind /First >>\n<< /Kind /Second /N 2 >>\n");

    let mut header = Dictionary::new();
    header.set("Type", Name::from("ObjStm"));
    header.set("N", 2);
    header.set("First", 20);
    let mut container = Stream::new(header, body);
    container.compress().unwrap();

    let mut builder = FileBuilder::new("1.5");
    builder
        .object(1, "<< /Type /Catalog /Pages 2 0 R /Extra 4 0 R >>")
        .object(2, "<< /Type /Pages /Kids [] /Count 0 >>")
        .value(3, &Object::Stream(container))
        .packed(4, 3, 0)
        .packed(5, 3, 1);
    let mut trailer = Dictionary::new();
    trailer.set("Root", pdfcore::ObjectId::new(1, 0));
    builder.finish_stream(6, trailer)
}

/// Stream-based file with chained object streams: catalog 1, pages 2,
/// object stream 3 packing 4, object stream 5 packing 6 and extending 3,
/// xref stream 7
pub fn extending_pdf() -> Vec<u8> {
    let mut base = Dictionary::new();
    base.set("Kind", Name::from("Base"));
    let base = Object::Dictionary(base);
    let mut extra = Dictionary::new();
    extra.set("Kind", Name::from("Extra"));
    let extra = Object::Dictionary(extra);

    let first = ObjectStream::build(&[(4, &base)], None).unwrap();
    let second = ObjectStream::build(&[(6, &extra)], Some(pdfcore::ObjectId::new(3, 0))).unwrap();

    let mut builder = FileBuilder::new("1.5");
    builder
        .object(1, "<< /Type /Catalog /Pages 2 0 R /Base 4 0 R /Extra 6 0 R >>")
        .object(2, "<< /Type /Pages /Kids [] /Count 0 >>")
        .value(3, &Object::Stream(first))
        .packed(4, 3, 0)
        .value(5, &Object::Stream(second))
        .packed(6, 5, 0);
    let mut trailer = Dictionary::new();
    trailer.set("Root", pdfcore::ObjectId::new(1, 0));
    builder.finish_stream(7, trailer)
}

/// `/Extends` of the object stream `number` (generation 0)
pub fn extends_of(doc: &mut PdfDocument, number: u32) -> Option<Object> {
    let id = pdfcore::ObjectId::new(number, 0);
    doc.resolve(id)
        .unwrap()
        .unwrap()
        .as_stream()
        .unwrap()
        .dict
        .get(b"Extends")
        .cloned()
}

/// Stream whose `/Length` undercounts its body
pub fn bad_length_pdf() -> Vec<u8> {
    let mut builder = FileBuilder::new("1.4");
    builder
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [] /Count 0 >>")
        .object(3, "<< /Length 3 >>\nstream\nthirteen byte\nendstream");
    builder.finish_table("/Root 1 0 R")
}

/// Load `bytes`, panicking with the error on failure
pub fn load(bytes: &[u8]) -> PdfDocument {
    PdfDocument::load(bytes.to_vec()).unwrap_or_else(|e| panic!("load failed: {}", e))
}

/// Decoded body of the stream object `number` (generation 0)
pub fn stream_content(doc: &mut PdfDocument, number: u32) -> Vec<u8> {
    let id = pdfcore::ObjectId::new(number, 0);
    doc.resolve(id)
        .unwrap()
        .unwrap()
        .as_stream()
        .unwrap()
        .decoded_content()
        .unwrap()
        .into_owned()
}
