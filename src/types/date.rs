//! Date values
//!
//! Dates are literal strings of the form `D:YYYYMMDDHHmmSSOHH'mm'`. Every
//! component after the year is optional; missing parts take their earliest
//! value and a missing zone means UTC.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Timelike};
use std::fmt;

/// An absolute point in time carried by a date literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PdfDate(DateTime<FixedOffset>);

impl PdfDate {
    /// Reserved prefix that marks a literal as a date
    pub const PREFIX: &'static [u8] = b"D:";

    /// Wrap an existing timestamp
    pub fn new(value: DateTime<FixedOffset>) -> Self {
        PdfDate(value)
    }

    /// Get the timestamp
    pub fn value(&self) -> DateTime<FixedOffset> {
        self.0
    }

    /// Parse a date literal body (including the `D:` prefix).
    ///
    /// Returns `None` when the bytes are not a well-formed date; callers keep
    /// such literals as plain strings.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let body = bytes.strip_prefix(Self::PREFIX)?;
        let mut cursor = DigitCursor { bytes: body, pos: 0 };

        let year = cursor.take(4)? as i32;
        let month = cursor.take_opt(2, 1)?;
        let day = cursor.take_opt(2, 1)?;
        let hour = cursor.take_opt(2, 0)?;
        let minute = cursor.take_opt(2, 0)?;
        let second = cursor.take_opt(2, 0)?;

        let offset_seconds = match cursor.next_byte() {
            None | Some(b'Z') => {
                // Some writers emit `Z00'00'`; trailing bytes after Z are ignored
                0
            }
            Some(sign @ (b'+' | b'-')) => {
                let hours = cursor.take_opt(2, 0)? as i32;
                if cursor.peek() == Some(b'\'') {
                    cursor.pos += 1;
                }
                let minutes = cursor.take_opt(2, 0)? as i32;
                let magnitude = hours * 3600 + minutes * 60;
                if sign == b'-' {
                    -magnitude
                } else {
                    magnitude
                }
            }
            Some(_) => return None,
        };

        let offset = FixedOffset::east_opt(offset_seconds)?;
        let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
        let value = offset.from_local_datetime(&naive).single()?;
        Some(PdfDate(value))
    }

    /// Render the canonical literal body `D:YYYYMMDDHHmmSS+HH'mm'`.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for PdfDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dt = self.0;
        write!(
            f,
            "D:{:04}{:02}{:02}{:02}{:02}{:02}",
            dt.year(),
            dt.month(),
            dt.day(),
            dt.hour(),
            dt.minute(),
            dt.second()
        )?;
        let offset = dt.offset().local_minus_utc();
        if offset == 0 {
            write!(f, "Z")
        } else {
            let sign = if offset < 0 { '-' } else { '+' };
            let abs = offset.abs();
            write!(f, "{}{:02}'{:02}'", sign, abs / 3600, (abs % 3600) / 60)
        }
    }
}

struct DigitCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl DigitCursor<'_> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn next_byte(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    /// Read exactly `count` digits.
    fn take(&mut self, count: usize) -> Option<u32> {
        let digits = self.bytes.get(self.pos..self.pos + count)?;
        let mut value = 0u32;
        for &d in digits {
            if !d.is_ascii_digit() {
                return None;
            }
            value = value * 10 + (d - b'0') as u32;
        }
        self.pos += count;
        Some(value)
    }

    /// Read `count` digits if any digit follows, else yield the default.
    fn take_opt(&mut self, count: usize, default: u32) -> Option<u32> {
        match self.peek() {
            Some(b) if b.is_ascii_digit() => self.take(count),
            _ => Some(default),
        }
    }
}
