//! Composite object parser.
//!
//! Builds [`Object`] trees from the token stream. Two grammar rules need
//! lookahead: a bare integer may start an `N G R` reference, and a
//! dictionary may be the header of a stream. Both go through
//! [`Parser::speculate`], which restores the cursor whenever the
//! speculative branch does not match.

use super::lexer::{Lexer, Token};
use crate::error::{PdfError, Result};
use crate::objects::{Array, Dictionary, Object, PdfString, Stream};
use crate::types::ObjectId;

/// Supplies values the parser cannot find inline, such as a stream
/// `/Length` stored as an indirect object.
pub trait ObjectResolver {
    /// Resolve an indirect integer. `Ok(None)` means the object is absent
    /// or not an integer.
    fn resolve_length(&mut self, id: ObjectId) -> Result<Option<i64>>;
}

/// Recursive-descent parser over a byte slice
pub struct Parser<'a, 'r> {
    lexer: Lexer<'a>,
    resolver: Option<&'r mut dyn ObjectResolver>,
    failsafe: bool,
    warnings: Vec<String>,
}

impl<'a, 'r> Parser<'a, 'r> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::at(data, 0)
    }

    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Parser {
            lexer: Lexer::at(data, pos),
            resolver: None,
            failsafe: false,
            warnings: Vec::new(),
        }
    }

    /// Attach a resolver for indirect stream lengths
    pub fn with_resolver(mut self, resolver: &'r mut dyn ObjectResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Recover from bad stream lengths by scanning for `endstream`
    pub fn with_failsafe(mut self, failsafe: bool) -> Self {
        self.failsafe = failsafe;
        self
    }

    pub fn position(&self) -> usize {
        self.lexer.position()
    }

    pub fn seek(&mut self, pos: usize) -> Result<()> {
        self.lexer.seek(pos)
    }

    pub fn lexer_mut(&mut self) -> &mut Lexer<'a> {
        &mut self.lexer
    }

    /// Recoveries performed in failsafe mode
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    /// Run `f` and keep its effect only when it yields `Some`. On `None`
    /// or an error the cursor goes back to where it was. Nested calls are
    /// safe because the saved position lives on this call's stack frame.
    pub fn speculate<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<Option<T>>) -> Option<T> {
        let saved = self.lexer.position();
        match f(self) {
            Ok(Some(value)) => Some(value),
            _ => {
                self.lexer.seek(saved).ok();
                None
            }
        }
    }

    /// Next raw token, skipping comments
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        loop {
            match self.lexer.move_next()? {
                Some(Token::Comment(_)) => continue,
                other => return Ok(other),
            }
        }
    }

    /// Next token with `N G R` collapsed into [`Token::Reference`]
    pub fn next_token_collapsed(&mut self) -> Result<Option<Token>> {
        match self.next_token()? {
            Some(Token::Integer(number)) => {
                Ok(Some(match self.try_reference_tail(number) {
                    Some(id) => Token::Reference(id),
                    None => Token::Integer(number),
                }))
            }
            other => Ok(other),
        }
    }

    /// Having read an integer, check whether `G R` follows.
    fn try_reference_tail(&mut self, number: i64) -> Option<ObjectId> {
        let number = u32::try_from(number).ok()?;
        self.speculate(|p| {
            let generation = match p.next_token()? {
                Some(Token::Integer(g)) => g,
                _ => return Ok(None),
            };
            let generation = match u16::try_from(generation) {
                Ok(g) => g,
                Err(_) => return Ok(None),
            };
            match p.next_token()? {
                Some(t) if t.is_keyword(b"R") => Ok(Some(ObjectId::new(number, generation))),
                _ => Ok(None),
            }
        })
    }

    /// Require a specific keyword
    pub fn expect_keyword(&mut self, keyword: &[u8]) -> Result<()> {
        match self.next_token()? {
            Some(t) if t.is_keyword(keyword) => Ok(()),
            Some(other) => Err(PdfError::format(
                self.lexer.token_start(),
                format!(
                    "expected keyword '{}', found {:?}",
                    String::from_utf8_lossy(keyword),
                    other
                ),
            )),
            None => Err(PdfError::format(
                self.lexer.position(),
                format!(
                    "unexpected end of input, expected '{}'",
                    String::from_utf8_lossy(keyword)
                ),
            )),
        }
    }

    /// Require a non-negative integer token
    pub fn expect_unsigned(&mut self) -> Result<u64> {
        match self.next_token()? {
            Some(Token::Integer(v)) if v >= 0 => Ok(v as u64),
            other => Err(PdfError::format(
                self.lexer.token_start(),
                format!("expected unsigned integer, found {:?}", other),
            )),
        }
    }

    /// Parse one value
    pub fn parse_value(&mut self) -> Result<Object> {
        match self.next_token()? {
            Some(token) => self.value_from_token(token),
            None => Err(PdfError::format(
                self.lexer.position(),
                "unexpected end of input, expected a value",
            )),
        }
    }

    fn value_from_token(&mut self, token: Token) -> Result<Object> {
        let start = self.lexer.token_start();
        match token {
            Token::Boolean(b) => Ok(Object::Boolean(b)),
            Token::Integer(n) => Ok(match self.try_reference_tail(n) {
                Some(id) => Object::Reference(id),
                None => Object::Integer(n),
            }),
            Token::Real(r) => Ok(Object::Real(r)),
            Token::Name(n) => Ok(Object::Name(n)),
            Token::Literal(bytes) => Ok(Object::String(PdfString::literal(bytes))),
            Token::Hex(bytes) => Ok(Object::String(PdfString::hexadecimal(bytes))),
            Token::Date(date) => Ok(Object::Date(date)),
            Token::Null => Ok(Object::Null),
            Token::Reference(id) => Ok(Object::Reference(id)),
            Token::ArrayBegin => self.parse_array_body(),
            Token::DictionaryBegin => {
                let dict = self.parse_dictionary_body()?;
                self.maybe_stream(dict)
            }
            Token::ArrayEnd | Token::DictionaryEnd => {
                Err(PdfError::format(start, format!("unexpected {:?}", token)))
            }
            Token::Keyword(word) => Err(PdfError::format(
                start,
                format!("unexpected keyword '{}'", String::from_utf8_lossy(&word)),
            )),
            Token::Comment(_) => self.parse_value(),
        }
    }

    fn parse_array_body(&mut self) -> Result<Object> {
        let mut array = Array::new();
        loop {
            match self.next_token()? {
                Some(Token::ArrayEnd) => return Ok(Object::Array(array)),
                Some(token) => array.push(self.value_from_token(token)?),
                None => {
                    return Err(PdfError::format(
                        self.lexer.position(),
                        "unexpected end of input in array",
                    ))
                }
            }
        }
    }

    fn parse_dictionary_body(&mut self) -> Result<Dictionary> {
        let mut dict = Dictionary::new();
        loop {
            match self.next_token()? {
                Some(Token::DictionaryEnd) => return Ok(dict),
                Some(Token::Name(key)) => {
                    let value = self.parse_value()?;
                    dict.set(key, value);
                }
                Some(other) => {
                    return Err(PdfError::format(
                        self.lexer.token_start(),
                        format!("expected name as dictionary key, found {:?}", other),
                    ))
                }
                None => {
                    return Err(PdfError::format(
                        self.lexer.position(),
                        "unexpected end of input in dictionary",
                    ))
                }
            }
        }
    }

    /// Parse a dictionary from the current position (`<<` included)
    pub fn parse_dictionary(&mut self) -> Result<Dictionary> {
        match self.next_token()? {
            Some(Token::DictionaryBegin) => self.parse_dictionary_body(),
            other => Err(PdfError::format(
                self.lexer.token_start(),
                format!("expected '<<', found {:?}", other),
            )),
        }
    }

    fn maybe_stream(&mut self, dict: Dictionary) -> Result<Object> {
        let is_stream = self
            .speculate(|p| {
                Ok(match p.next_token()? {
                    Some(t) if t.is_keyword(b"stream") => Some(()),
                    _ => None,
                })
            })
            .is_some();

        if is_stream {
            self.parse_stream_body(dict).map(Object::Stream)
        } else {
            Ok(Object::Dictionary(dict))
        }
    }

    fn declared_length(&mut self, dict: &Dictionary) -> Result<Option<usize>> {
        let length = match dict.get(b"Length") {
            Some(Object::Integer(n)) => Some(*n),
            Some(Object::Reference(id)) => match self.resolver.as_mut() {
                Some(resolver) => resolver.resolve_length(*id)?,
                None => None,
            },
            _ => None,
        };
        Ok(length.and_then(|n| usize::try_from(n).ok()))
    }

    fn parse_stream_body(&mut self, dict: Dictionary) -> Result<Stream> {
        let keyword_start = self.lexer.token_start();
        self.lexer.skip_stream_eol();
        let body_start = self.lexer.position();

        match self.declared_length(&dict)? {
            Some(length) => {
                let exact = self.speculate(|p| {
                    let body = p.lexer.read_bytes(length)?;
                    match p.next_token()? {
                        Some(t) if t.is_keyword(b"endstream") => Ok(Some(body.to_vec())),
                        _ => Ok(None),
                    }
                });
                match exact {
                    Some(content) => Ok(Stream::from_parts(dict, content)),
                    None if self.failsafe => {
                        self.warnings.push(format!(
                            "stream at byte {}: /Length {} misses 'endstream', scanned instead",
                            keyword_start, length
                        ));
                        self.scan_to_endstream(dict, body_start)
                    }
                    None => Err(PdfError::format(
                        body_start,
                        format!("stream /Length {} does not end at 'endstream'", length),
                    )),
                }
            }
            None if self.failsafe => {
                self.warnings.push(format!(
                    "stream at byte {}: missing or unresolvable /Length, scanned for 'endstream'",
                    keyword_start
                ));
                self.scan_to_endstream(dict, body_start)
            }
            None => Err(PdfError::format(
                keyword_start,
                "stream has a missing or unresolvable /Length",
            )),
        }
    }

    fn scan_to_endstream(&mut self, dict: Dictionary, body_start: usize) -> Result<Stream> {
        self.lexer.seek(body_start)?;
        let end = self
            .lexer
            .find(b"endstream")
            .ok_or_else(|| PdfError::format(body_start, "missing 'endstream'"))?;
        let data = self.lexer.data();
        let mut body_end = end;
        if body_end > body_start && data[body_end - 1] == b'\n' {
            body_end -= 1;
        }
        if body_end > body_start && data[body_end - 1] == b'\r' {
            body_end -= 1;
        }
        let content = data[body_start..body_end].to_vec();
        self.lexer.seek(end + b"endstream".len())?;
        Ok(Stream::from_parts(dict, content))
    }

    /// Parse `N G obj <value> [endobj]`
    pub fn parse_indirect_object(&mut self) -> Result<(ObjectId, Object)> {
        let start = self.lexer.position();
        let number = self.expect_unsigned()?;
        let generation = self.expect_unsigned()?;
        let number = u32::try_from(number)
            .map_err(|_| PdfError::format(start, "object number out of range"))?;
        let generation = u16::try_from(generation)
            .map_err(|_| PdfError::format(start, "generation out of range"))?;
        self.expect_keyword(b"obj")?;

        let value = self.parse_value()?;

        let closed = self
            .speculate(|p| {
                Ok(match p.next_token()? {
                    Some(t) if t.is_keyword(b"endobj") => Some(()),
                    _ => None,
                })
            })
            .is_some();
        if !closed {
            self.warnings.push(format!(
                "object {} {} at byte {} has no 'endobj'",
                number, generation, start
            ));
        }

        Ok((ObjectId::new(number, generation), value))
    }
}

/// Parse a single value from a complete buffer
pub fn parse_value(data: &[u8]) -> Result<Object> {
    Parser::new(data).parse_value()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{Name, StreamKind};
    use std::collections::HashMap;

    struct MapResolver(HashMap<u32, i64>);

    impl ObjectResolver for MapResolver {
        fn resolve_length(&mut self, id: ObjectId) -> Result<Option<i64>> {
            Ok(self.0.get(&id.number).copied())
        }
    }

    #[test]
    fn test_catalog_dictionary() {
        let obj = parse_value(b"<< /Type /Catalog /Pages 2 0 R >>").unwrap();
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.get_type(), Some(&b"Catalog"[..]));
        assert_eq!(
            dict.get(b"Pages"),
            Some(&Object::Reference(ObjectId::new(2, 0)))
        );
    }

    #[test]
    fn test_integers_that_are_not_references() {
        let obj = parse_value(b"[1 2 3 0 R 4 5]").unwrap();
        let array = obj.as_array().unwrap();
        assert_eq!(
            array.as_slice(),
            &[
                Object::Integer(1),
                Object::Integer(2),
                Object::Reference(ObjectId::new(3, 0)),
                Object::Integer(4),
                Object::Integer(5),
            ]
        );
    }

    #[test]
    fn test_rollback_leaves_next_token_intact() {
        let mut parser = Parser::new(b"7 8 /Name");
        assert_eq!(parser.parse_value().unwrap(), Object::Integer(7));
        assert_eq!(parser.parse_value().unwrap(), Object::Integer(8));
        assert_eq!(parser.parse_value().unwrap(), Object::Name(Name::from("Name")));
    }

    #[test]
    fn test_rollback_on_lexer_error_inside_lookahead() {
        // "(" opens an unterminated string; the lookahead must not surface it
        let mut parser = Parser::new(b"5 (oops");
        assert_eq!(parser.parse_value().unwrap(), Object::Integer(5));
        assert!(parser.parse_value().is_err());
    }

    #[test]
    fn test_nested_speculation() {
        let obj = parse_value(b"[1 2 1 0 R]").unwrap();
        assert_eq!(obj.as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_stream_with_direct_length() {
        let data = b"<< /Length 5 >>\nstream\nhello\nendstream";
        let obj = parse_value(data).unwrap();
        let stream = obj.as_stream().unwrap();
        assert_eq!(stream.content(), b"hello");
        assert_eq!(stream.kind(), StreamKind::Generic);
    }

    #[test]
    fn test_stream_with_indirect_length() {
        let data = b"<< /Length 9 0 R /Type /ObjStm >>\r\nstream\r\nabc\r\nendstream";
        let mut resolver = MapResolver(HashMap::from([(9, 3)]));
        let obj = Parser::new(data)
            .with_resolver(&mut resolver)
            .parse_value()
            .unwrap();
        let stream = obj.as_stream().unwrap();
        assert_eq!(stream.content(), b"abc");
        assert_eq!(stream.kind(), StreamKind::ObjectStream);
    }

    #[test]
    fn test_stream_bad_length_strict_and_failsafe() {
        let data = b"<< /Length 2 >>\nstream\nhello\nendstream";
        assert!(matches!(parse_value(data), Err(PdfError::Format { .. })));

        let mut parser = Parser::new(data).with_failsafe(true);
        let obj = parser.parse_value().unwrap();
        assert_eq!(obj.as_stream().unwrap().content(), b"hello");
        assert_eq!(parser.take_warnings().len(), 1);
    }

    #[test]
    fn test_dictionary_not_followed_by_stream() {
        let mut parser = Parser::new(b"<< /A 1 >> endobj");
        assert!(matches!(parser.parse_value().unwrap(), Object::Dictionary(_)));
        parser.expect_keyword(b"endobj").unwrap();
    }

    #[test]
    fn test_indirect_object() {
        let mut parser = Parser::new(b"12 0 obj\n<< /A [1 2] >>\nendobj\n");
        let (id, value) = parser.parse_indirect_object().unwrap();
        assert_eq!(id, ObjectId::new(12, 0));
        assert_eq!(value.as_dict().unwrap().get(b"A").unwrap().as_array().unwrap().len(), 2);
        assert!(parser.take_warnings().is_empty());
    }

    #[test]
    fn test_integer_value_before_endobj() {
        let mut parser = Parser::new(b"4 0 obj 42 endobj");
        let (_, value) = parser.parse_indirect_object().unwrap();
        assert_eq!(value, Object::Integer(42));
    }

    #[test]
    fn test_malformed_dictionary_key() {
        let err = parse_value(b"<< 1 2 >>").unwrap_err();
        assert_eq!(err.offset(), Some(3));
    }

    #[test]
    fn test_collapsed_tokens() {
        let mut parser = Parser::new(b"3 0 R 4");
        assert_eq!(
            parser.next_token_collapsed().unwrap(),
            Some(Token::Reference(ObjectId::new(3, 0)))
        );
        assert_eq!(parser.next_token_collapsed().unwrap(), Some(Token::Integer(4)));
    }
}
