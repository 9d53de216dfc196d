//! Gzip wrapping and unwrapping
//!
//! The FM9 container needs the exact byte length of its gzip member so the
//! uncompressed tails can be located, which rules out the stock stream
//! decoders. The member is built and taken apart by hand: a fixed 10-byte
//! header, a raw-deflate body and the CRC32/size trailer.

use crate::error::{Error, Result};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};
use std::io::{Read, Write};

/// Safety cap on decompressed size
pub const MAX_DECOMPRESSED: usize = 64 * 1024 * 1024;

/// Fixed gzip member header: deflate, no flags, no mtime, unknown OS
const GZIP_HEADER: [u8; 10] = [0x1F, 0x8B, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF];

// Header flag bits
const FHCRC: u8 = 0x02;
const FEXTRA: u8 = 0x04;
const FNAME: u8 = 0x08;
const FCOMMENT: u8 = 0x10;

/// An unwrapped gzip member
#[derive(Debug)]
pub struct Unwrapped {
    /// Decompressed payload
    pub data: Vec<u8>,
    /// Total byte length of the gzip member, including header and trailer
    pub consumed: usize,
}

/// Check for the gzip magic bytes
pub fn is_gzip(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0x1F && data[1] == 0x8B
}

/// Wrap bytes in a gzip member
pub fn wrap(data: &[u8]) -> Result<Vec<u8>> {
    let mut crc = Crc::new();
    crc.update(data);

    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| Error::Compress(e.to_string()))?;
    let deflated = encoder
        .finish()
        .map_err(|e| Error::Compress(e.to_string()))?;

    let mut out = Vec::with_capacity(GZIP_HEADER.len() + deflated.len() + 8);
    out.extend_from_slice(&GZIP_HEADER);
    out.extend_from_slice(&deflated);
    out.extend_from_slice(&crc.sum().to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    Ok(out)
}

/// Unwrap a gzip member starting at the beginning of `data`. Trailing
/// bytes after the member are ignored; `consumed` reports where they start.
pub fn unwrap(data: &[u8]) -> Result<Unwrapped> {
    let body_start = parse_header(data)?;

    let mut decoder = DeflateDecoder::new(&data[body_start..]);
    let mut payload = Vec::new();
    let read = decoder
        .by_ref()
        .take((MAX_DECOMPRESSED + 1) as u64)
        .read_to_end(&mut payload)
        .map_err(|e| Error::Decompress(e.to_string()))?;
    if read > MAX_DECOMPRESSED {
        return Err(Error::Decompress(format!(
            "decompressed size exceeds {} byte cap",
            MAX_DECOMPRESSED
        )));
    }

    let deflate_len = decoder.total_in() as usize;
    let trailer_start = body_start + deflate_len;
    if trailer_start + 8 > data.len() {
        return Err(Error::Decompress("missing gzip trailer".into()));
    }

    let stored_crc = u32::from_le_bytes([
        data[trailer_start],
        data[trailer_start + 1],
        data[trailer_start + 2],
        data[trailer_start + 3],
    ]);
    let stored_size = u32::from_le_bytes([
        data[trailer_start + 4],
        data[trailer_start + 5],
        data[trailer_start + 6],
        data[trailer_start + 7],
    ]);

    let mut crc = Crc::new();
    crc.update(&payload);
    if crc.sum() != stored_crc {
        return Err(Error::Decompress("gzip CRC mismatch".into()));
    }
    if stored_size != payload.len() as u32 {
        return Err(Error::Decompress("gzip size mismatch".into()));
    }

    Ok(Unwrapped {
        data: payload,
        consumed: trailer_start + 8,
    })
}

/// Parse the gzip header, honouring the optional flag fields, and return
/// the offset of the deflate body.
fn parse_header(data: &[u8]) -> Result<usize> {
    if data.len() < 10 || !is_gzip(data) {
        return Err(Error::Decompress("not a gzip stream".into()));
    }
    if data[2] != 0x08 {
        return Err(Error::Decompress(format!(
            "unsupported gzip compression method {}",
            data[2]
        )));
    }

    let flags = data[3];
    let mut pos = 10;

    if flags & FEXTRA != 0 {
        if pos + 2 > data.len() {
            return Err(Error::Decompress("truncated gzip FEXTRA field".into()));
        }
        let xlen = u16::from_le_bytes([data[pos], data[pos + 1]]) as usize;
        pos += 2 + xlen;
    }
    if flags & FNAME != 0 {
        pos = skip_zero_terminated(data, pos)?;
    }
    if flags & FCOMMENT != 0 {
        pos = skip_zero_terminated(data, pos)?;
    }
    if flags & FHCRC != 0 {
        pos += 2;
    }

    if pos > data.len() {
        return Err(Error::Decompress("truncated gzip header".into()));
    }
    Ok(pos)
}

fn skip_zero_terminated(data: &[u8], mut pos: usize) -> Result<usize> {
    while pos < data.len() {
        pos += 1;
        if data[pos - 1] == 0 {
            return Ok(pos);
        }
    }
    Err(Error::Decompress("unterminated gzip header field".into()))
}
