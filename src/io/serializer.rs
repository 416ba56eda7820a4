//! Object serialization.
//!
//! Renders values in canonical syntax. Streams are written with the header
//! exactly as given; callers that need a fresh `/Length` or a default filter
//! prepare a serialized copy first (see the writer).

use crate::objects::{Dictionary, Object};
use std::io::{self, Write};

/// Write a real without exponent notation; integral values keep a `.0`
/// suffix so they read back as reals.
pub fn format_real(value: f64) -> String {
    if !value.is_finite() {
        return "0.0".to_string();
    }
    let text = format!("{}", value);
    if text.contains('.') {
        text
    } else {
        format!("{}.0", text)
    }
}

/// Write any value
pub fn write_object<W: Write>(out: &mut W, object: &Object) -> io::Result<()> {
    match object {
        Object::Null => out.write_all(b"null"),
        Object::Boolean(true) => out.write_all(b"true"),
        Object::Boolean(false) => out.write_all(b"false"),
        Object::Integer(i) => write!(out, "{}", i),
        Object::Real(r) => out.write_all(format_real(*r).as_bytes()),
        Object::Name(name) => out.write_all(&name.encode()),
        Object::String(s) => out.write_all(&s.encode()),
        Object::Date(date) => {
            let literal = crate::objects::PdfString::literal(date.to_bytes());
            out.write_all(&literal.encode())
        }
        Object::Array(items) => {
            out.write_all(b"[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.write_all(b" ")?;
                }
                write_object(out, item)?;
            }
            out.write_all(b"]")
        }
        Object::Dictionary(dict) => write_dictionary(out, dict),
        Object::Stream(stream) => write_stream(out, &stream.dict, &stream.content),
        Object::Reference(id) => write!(out, "{} {} R", id.number, id.generation),
    }
}

/// Write `<< /Key value ... >>`
pub fn write_dictionary<W: Write>(out: &mut W, dict: &Dictionary) -> io::Result<()> {
    out.write_all(b"<<")?;
    for (key, value) in dict.iter() {
        out.write_all(&key.encode())?;
        out.write_all(b" ")?;
        write_object(out, value)?;
    }
    out.write_all(b">>")
}

/// Write a stream header and body as-is
pub fn write_stream<W: Write>(out: &mut W, dict: &Dictionary, content: &[u8]) -> io::Result<()> {
    write_dictionary(out, dict)?;
    out.write_all(b"\nstream\n")?;
    out.write_all(content)?;
    out.write_all(b"\nendstream")
}

/// Write `N G obj ... endobj` followed by a newline
pub fn write_indirect<W: Write>(
    out: &mut W,
    number: u32,
    generation: u16,
    object: &Object,
) -> io::Result<()> {
    writeln!(out, "{} {} obj", number, generation)?;
    write_object(out, object)?;
    out.write_all(b"\nendobj\n")
}
