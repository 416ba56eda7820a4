//! Stream filters.
//!
//! Supported decoders: FlateDecode (with PNG and TIFF predictors),
//! ASCIIHexDecode and ASCII85Decode. Only FlateDecode is used for encoding.

use super::{Dictionary, Object};
use crate::error::{PdfError, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Name of the default filter applied on save
pub const FLATE_DECODE: &[u8] = b"FlateDecode";

/// Decode `data` through one named filter.
pub fn decode(filter: &[u8], params: Option<&Dictionary>, data: &[u8]) -> Result<Vec<u8>> {
    match filter {
        FLATE_DECODE | b"Fl" => {
            let inflated = inflate(data)?;
            match params {
                Some(params) => apply_predictor(params, inflated),
                None => Ok(inflated),
            }
        }
        b"ASCIIHexDecode" | b"AHx" => ascii_hex_decode(data),
        b"ASCII85Decode" | b"A85" => ascii85_decode(data),
        other => Err(PdfError::unsupported(format!(
            "stream filter /{}",
            String::from_utf8_lossy(other)
        ))),
    }
}

/// Compress with zlib (FlateDecode).
pub fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| PdfError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| PdfError::Compression(e.to_string()))
}

fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| PdfError::Compression(format!("FlateDecode: {}", e)))?;
    Ok(out)
}

fn int_param(params: &Dictionary, key: &[u8], default: i64) -> i64 {
    match params.get(key) {
        Some(Object::Integer(v)) => *v,
        _ => default,
    }
}

/// A positive size parameter of `/DecodeParms`; absent means 1
fn usize_param(params: &Dictionary, key: &[u8]) -> Result<usize> {
    let value = int_param(params, key, 1).max(1);
    usize::try_from(value).map_err(|_| {
        PdfError::Compression(format!(
            "predictor: /{} {} is out of range",
            String::from_utf8_lossy(key),
            value
        ))
    })
}

fn apply_predictor(params: &Dictionary, data: Vec<u8>) -> Result<Vec<u8>> {
    let predictor = int_param(params, b"Predictor", 1);
    if predictor <= 1 {
        return Ok(data);
    }
    if data.is_empty() {
        return Ok(data);
    }
    let colors = usize_param(params, b"Colors")?;
    let bits = usize_param(params, b"BitsPerComponent")?;
    let columns = usize_param(params, b"Columns")?;

    let bits_per_pixel = colors.checked_mul(bits).ok_or_else(|| {
        PdfError::Compression("predictor: /Colors x /BitsPerComponent overflows".to_string())
    })?;
    let bytes_per_pixel = bits_per_pixel.div_ceil(8).max(1);
    let row_len = bits_per_pixel
        .checked_mul(columns)
        .map(|bits| bits.div_ceil(8))
        .filter(|&len| len <= data.len())
        .ok_or_else(|| {
            PdfError::Compression(format!(
                "predictor: row of {} columns exceeds the {} decoded bytes",
                columns,
                data.len()
            ))
        })?;

    match predictor {
        2 => tiff_predictor(data, bits, colors, row_len),
        10..=15 => png_predictor(&data, bytes_per_pixel, row_len),
        other => Err(PdfError::unsupported(format!("predictor {}", other))),
    }
}

fn tiff_predictor(
    mut data: Vec<u8>,
    bits: usize,
    colors: usize,
    row_len: usize,
) -> Result<Vec<u8>> {
    if bits != 8 {
        return Err(PdfError::unsupported(format!(
            "TIFF predictor with {} bits per component",
            bits
        )));
    }
    for row in data.chunks_mut(row_len) {
        for i in colors..row.len() {
            row[i] = row[i].wrapping_add(row[i - colors]);
        }
    }
    Ok(data)
}

fn png_predictor(data: &[u8], bpp: usize, row_len: usize) -> Result<Vec<u8>> {
    let stride = row_len + 1;
    let mut out = Vec::with_capacity(data.len() / stride * row_len);
    let mut previous = vec![0u8; row_len];

    for chunk in data.chunks(stride) {
        let (&kind, encoded) = chunk
            .split_first()
            .ok_or_else(|| PdfError::Compression("empty predictor row".to_string()))?;
        let mut row = encoded.to_vec();
        row.resize(row_len, 0);

        for i in 0..row_len {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = previous[i];
            let upper_left = if i >= bpp { previous[i - bpp] } else { 0 };
            row[i] = match kind {
                0 => row[i],
                1 => row[i].wrapping_add(left),
                2 => row[i].wrapping_add(up),
                3 => row[i].wrapping_add(((left as u16 + up as u16) / 2) as u8),
                4 => row[i].wrapping_add(paeth(left, up, upper_left)),
                other => {
                    return Err(PdfError::Compression(format!(
                        "invalid PNG predictor tag {}",
                        other
                    )))
                }
            };
        }

        out.extend_from_slice(&row);
        previous = row;
    }

    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn ascii_hex_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut high: Option<u8> = None;
    for &b in data {
        if b == b'>' {
            break;
        }
        if b.is_ascii_whitespace() || b == 0 {
            continue;
        }
        let nibble = hex_value(b).ok_or_else(|| {
            PdfError::Compression(format!("ASCIIHexDecode: invalid byte {:#04x}", b))
        })?;
        match high.take() {
            Some(h) => out.push(h << 4 | nibble),
            None => high = Some(nibble),
        }
    }
    if let Some(h) = high {
        out.push(h << 4);
    }
    Ok(out)
}

fn ascii85_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 4 / 5);
    let mut group = [0u8; 5];
    let mut count = 0;

    let body = data.strip_prefix(b"<~").unwrap_or(data);
    for &b in body {
        match b {
            b'~' => break,
            b'z' if count == 0 => out.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group[count] = b - b'!';
                count += 1;
                if count == 5 {
                    out.extend_from_slice(&ascii85_group(&group)?);
                    count = 0;
                }
            }
            b if b.is_ascii_whitespace() || b == 0 => {}
            other => {
                return Err(PdfError::Compression(format!(
                    "ASCII85Decode: invalid byte {:#04x}",
                    other
                )))
            }
        }
    }

    if count > 0 {
        for slot in group.iter_mut().skip(count) {
            *slot = b'u' - b'!';
        }
        let decoded = ascii85_group(&group)?;
        out.extend_from_slice(&decoded[..count - 1]);
    }
    Ok(out)
}

fn ascii85_group(group: &[u8; 5]) -> Result<[u8; 4]> {
    let value = group
        .iter()
        .try_fold(0u64, |acc, &d| Some(acc * 85 + d as u64))
        .filter(|v| *v <= u32::MAX as u64)
        .ok_or_else(|| PdfError::Compression("ASCII85Decode: group overflow".to_string()))?;
    Ok((value as u32).to_be_bytes())
}
