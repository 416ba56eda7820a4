//! Tokenizer.
//!
//! Turns a byte slice into tokens: numbers, names, literal and hex strings,
//! delimiters and bare keywords. The lexer is a plain cursor over borrowed
//! bytes, so saving and restoring a position is free.

use crate::error::{PdfError, Result};
use crate::objects::Name;
use crate::types::{ObjectId, PdfDate};

/// A lexical token
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Name(Name),
    /// Decoded bytes of a `( ... )` string
    Literal(Vec<u8>),
    /// Decoded bytes of a `< ... >` string
    Hex(Vec<u8>),
    ArrayBegin,
    ArrayEnd,
    DictionaryBegin,
    DictionaryEnd,
    /// Any other bare word (`obj`, `stream`, `R`, `xref`, ...)
    Keyword(Vec<u8>),
    Comment(Vec<u8>),
    Null,
    Date(PdfDate),
    /// `N G R`; produced by the parser when it collapses three tokens
    Reference(ObjectId),
}

impl Token {
    /// Check whether this is the given keyword
    pub fn is_keyword(&self, keyword: &[u8]) -> bool {
        matches!(self, Token::Keyword(k) if k == keyword)
    }
}

/// Whitespace bytes: NUL, TAB, LF, FF, CR, SPACE
#[inline]
pub fn is_whitespace(b: u8) -> bool {
    matches!(b, 0 | 9 | 10 | 12 | 13 | 32)
}

#[inline]
pub fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

#[inline]
fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Byte cursor producing tokens
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
    token_start: usize,
}

impl<'a> Lexer<'a> {
    /// Create a lexer positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self::at(data, 0)
    }

    /// Create a lexer positioned at `pos`
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Lexer {
            data,
            pos: pos.min(data.len()),
            token_start: pos.min(data.len()),
        }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Offset where the last returned token started
    pub fn token_start(&self) -> usize {
        self.token_start
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Move the cursor to an absolute offset
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(PdfError::contract(format!(
                "seek to {} beyond end of input ({} bytes)",
                pos,
                self.data.len()
            )));
        }
        self.pos = pos;
        Ok(())
    }

    /// Advance the cursor by `count` bytes
    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.seek(self.pos + count)
    }

    pub fn peek_byte(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn next_byte(&mut self) -> Option<u8> {
        let b = self.peek_byte()?;
        self.pos += 1;
        Some(b)
    }

    fn eof_error(&self, what: &str) -> PdfError {
        PdfError::format(self.pos, format!("unexpected end of input in {}", what))
    }

    pub fn skip_whitespace(&mut self) {
        while matches!(self.peek_byte(), Some(b) if is_whitespace(b)) {
            self.pos += 1;
        }
    }

    /// Skip the end-of-line that follows the `stream` keyword: CRLF, LF,
    /// or a lone CR.
    pub fn skip_stream_eol(&mut self) {
        match self.peek_byte() {
            Some(b'\r') => {
                self.pos += 1;
                if self.peek_byte() == Some(b'\n') {
                    self.pos += 1;
                }
            }
            Some(b'\n') => self.pos += 1,
            _ => {}
        }
    }

    /// Take `count` raw bytes
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(count).filter(|&e| e <= self.data.len());
        match end {
            Some(end) => {
                let bytes = &self.data[self.pos..end];
                self.pos = end;
                Ok(bytes)
            }
            None => Err(self.eof_error("stream body")),
        }
    }

    /// Offset of the next occurrence of `needle` at or after the cursor
    pub fn find(&self, needle: &[u8]) -> Option<usize> {
        self.data[self.pos..]
            .windows(needle.len())
            .position(|w| w == needle)
            .map(|i| i + self.pos)
    }

    /// Advance past whitespace and return the next token, or `None` at end
    /// of input.
    pub fn move_next(&mut self) -> Result<Option<Token>> {
        self.skip_whitespace();
        self.token_start = self.pos;

        let b = match self.peek_byte() {
            Some(b) => b,
            None => return Ok(None),
        };

        let token = match b {
            b'%' => self.read_comment(),
            b'/' => self.read_name(),
            b'(' => self.read_literal()?,
            b'<' => {
                if self.data.get(self.pos + 1) == Some(&b'<') {
                    self.pos += 2;
                    Token::DictionaryBegin
                } else {
                    self.read_hex()?
                }
            }
            b'>' => {
                if self.data.get(self.pos + 1) == Some(&b'>') {
                    self.pos += 2;
                    Token::DictionaryEnd
                } else {
                    return Err(PdfError::format(self.pos, "expected '>>'"));
                }
            }
            b'[' => {
                self.pos += 1;
                Token::ArrayBegin
            }
            b']' => {
                self.pos += 1;
                Token::ArrayEnd
            }
            b')' => return Err(PdfError::format(self.pos, "unbalanced ')'")),
            b'{' | b'}' => {
                self.pos += 1;
                Token::Keyword(vec![b])
            }
            b'+' | b'-' | b'.' | b'0'..=b'9' => self.read_number()?,
            _ => self.read_keyword(),
        };

        Ok(Some(token))
    }

    fn read_comment(&mut self) -> Token {
        self.pos += 1;
        let start = self.pos;
        while matches!(self.peek_byte(), Some(b) if b != b'\r' && b != b'\n') {
            self.pos += 1;
        }
        Token::Comment(self.data[start..self.pos].to_vec())
    }

    fn read_name(&mut self) -> Token {
        self.pos += 1;
        let mut bytes = Vec::new();
        while let Some(b) = self.peek_byte() {
            if !is_regular(b) {
                break;
            }
            self.pos += 1;
            if b == b'#' {
                let hi = self.peek_byte().and_then(hex_value);
                let lo = self.data.get(self.pos + 1).copied().and_then(hex_value);
                if let (Some(hi), Some(lo)) = (hi, lo) {
                    bytes.push(hi << 4 | lo);
                    self.pos += 2;
                    continue;
                }
            }
            bytes.push(b);
        }
        Token::Name(Name::new(bytes))
    }

    fn read_number(&mut self) -> Result<Token> {
        let start = self.pos;
        let mut is_real = false;
        let mut has_digits = false;

        if matches!(self.peek_byte(), Some(b'+' | b'-')) {
            self.pos += 1;
        }
        while let Some(b) = self.peek_byte() {
            match b {
                b'0'..=b'9' => has_digits = true,
                b'.' if !is_real => is_real = true,
                _ => break,
            }
            self.pos += 1;
        }

        if !has_digits {
            // A lone sign or dot reads as zero
            return Ok(if is_real { Token::Real(0.0) } else { Token::Integer(0) });
        }

        let text = std::str::from_utf8(&self.data[start..self.pos])
            .map_err(|_| PdfError::format(start, "invalid number"))?;

        if !is_real {
            if let Ok(value) = text.parse::<i64>() {
                return Ok(Token::Integer(value));
            }
        }
        text.parse::<f64>()
            .map(Token::Real)
            .map_err(|_| PdfError::format(start, format!("invalid number '{}'", text)))
    }

    fn read_keyword(&mut self) -> Token {
        let start = self.pos;
        while matches!(self.peek_byte(), Some(b) if is_regular(b)) {
            self.pos += 1;
        }
        match &self.data[start..self.pos] {
            b"true" => Token::Boolean(true),
            b"false" => Token::Boolean(false),
            b"null" => Token::Null,
            word => Token::Keyword(word.to_vec()),
        }
    }

    fn read_literal(&mut self) -> Result<Token> {
        self.pos += 1;
        let mut bytes = Vec::new();
        let mut level = 0usize;

        loop {
            let b = self.next_byte().ok_or_else(|| self.eof_error("literal string"))?;
            match b {
                b'(' => {
                    level += 1;
                    bytes.push(b);
                }
                b')' => {
                    if level == 0 {
                        break;
                    }
                    level -= 1;
                    bytes.push(b);
                }
                b'\\' => self.read_escape(&mut bytes)?,
                b'\r' => {
                    if self.peek_byte() == Some(b'\n') {
                        self.pos += 1;
                    }
                    bytes.push(b'\n');
                }
                _ => bytes.push(b),
            }
        }

        if bytes.starts_with(PdfDate::PREFIX) {
            if let Some(date) = PdfDate::parse(&bytes) {
                return Ok(Token::Date(date));
            }
        }
        Ok(Token::Literal(bytes))
    }

    fn read_escape(&mut self, bytes: &mut Vec<u8>) -> Result<()> {
        let b = self
            .next_byte()
            .ok_or_else(|| self.eof_error("literal string escape"))?;
        match b {
            b'n' => bytes.push(b'\n'),
            b'r' => bytes.push(b'\r'),
            b't' => bytes.push(b'\t'),
            b'b' => bytes.push(0x08),
            b'f' => bytes.push(0x0C),
            b'(' | b')' | b'\\' => bytes.push(b),
            b'\r' => {
                if self.peek_byte() == Some(b'\n') {
                    self.pos += 1;
                }
            }
            b'\n' => {}
            b'0'..=b'7' => {
                let mut value = (b - b'0') as u32;
                for _ in 0..2 {
                    match self.peek_byte() {
                        Some(d @ b'0'..=b'7') => {
                            value = value * 8 + (d - b'0') as u32;
                            self.pos += 1;
                        }
                        _ => break,
                    }
                }
                bytes.push(value.min(255) as u8);
            }
            // Unknown escape: the backslash is dropped
            other => bytes.push(other),
        }
        Ok(())
    }

    fn read_hex(&mut self) -> Result<Token> {
        self.pos += 1;
        let mut digits = Vec::new();
        loop {
            let b = self.next_byte().ok_or_else(|| self.eof_error("hex string"))?;
            match b {
                b'>' => break,
                b if is_whitespace(b) => {}
                b => {
                    let v = hex_value(b).ok_or_else(|| {
                        PdfError::format(self.pos - 1, format!("invalid hex digit {:#04x}", b))
                    })?;
                    digits.push(v);
                }
            }
        }
        // An odd final digit is padded with 0
        let bytes = digits
            .chunks(2)
            .map(|pair| pair[0] << 4 | pair.get(1).copied().unwrap_or(0))
            .collect();
        Ok(Token::Hex(bytes))
    }
}
