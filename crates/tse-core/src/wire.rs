//! Low-level varint decoding shared by the container and metadata readers.
//!
//! Both the asset container header and the appearances blob store unsigned
//! integers as little-endian base-128 varints: 7 payload bits per byte, the
//! high bit set on every byte except the last.

use crate::error::{Error, Result};
use std::io::Read;

/// Largest shift accepted while accumulating continuation bytes.
///
/// Encodings that keep the continuation bit set past this point are
/// rejected instead of being read forever.
pub const MAX_VARINT_SHIFT: u32 = 70;

/// Decode a varint starting at `offset` in `data`.
///
/// Returns the decoded value and the offset immediately after the
/// terminating byte. On failure nothing is consumed; the error carries the
/// starting offset.
pub fn decode_varint(data: &[u8], offset: usize) -> Result<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    let mut position = offset;

    loop {
        let Some(&byte) = data.get(position) else {
            return Err(Error::varint_decode(offset));
        };
        position += 1;

        if byte & 0x80 == 0 {
            // A final byte past bit 63 cannot be represented
            if shift >= 64 {
                return Err(Error::varint_decode(offset));
            }
            value |= u64::from(byte) << shift;
            return Ok((value, position));
        }

        value |= u64::from(byte & 0x7F).checked_shl(shift).unwrap_or(0);
        shift += 7;
        if shift > MAX_VARINT_SHIFT {
            return Err(Error::varint_decode(offset));
        }
    }
}

/// Read a varint from a byte stream.
///
/// Returns the decoded value and the number of bytes consumed. Running out
/// of input is reported as [`Error::UnexpectedEof`].
pub fn read_varint<R: Read + ?Sized>(reader: &mut R) -> Result<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    let mut consumed = 0usize;

    loop {
        let byte = read_byte(reader, "varint")?;
        consumed += 1;

        if byte & 0x80 == 0 {
            if shift >= 64 {
                return Err(Error::varint_decode(consumed - 1));
            }
            value |= u64::from(byte) << shift;
            return Ok((value, consumed));
        }

        value |= u64::from(byte & 0x7F).checked_shl(shift).unwrap_or(0);
        shift += 7;
        if shift > MAX_VARINT_SHIFT {
            return Err(Error::varint_decode(consumed - 1));
        }
    }
}

/// Read exactly one byte, mapping EOF to a contextual error.
pub(crate) fn read_byte<R: Read + ?Sized>(reader: &mut R, context: &'static str) -> Result<u8> {
    let mut buf = [0u8; 1];
    reader
        .read_exact(&mut buf)
        .map_err(|e| Error::unexpected_eof(context, e))?;
    Ok(buf[0])
}

/// Encode a value as a varint. Used to build fixtures.
#[cfg(test)]
pub(crate) fn encode_varint(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return out;
        }
        out.push(byte | 0x80);
    }
}
