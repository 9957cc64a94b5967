//! LZMA "alone" header repair.
//!
//! The encoder that produced the client assets stores the *compressed* size
//! in the 8-byte size field of the LZMA header. A conforming decoder would
//! stop early or reject the stream, so the field is replaced by the
//! "unknown size" marker (all `0xFF`) and decoding runs until the end
//! marker.

use crate::error::{Error, Result};
use crate::wire::read_byte;
use std::io::{Chain, Cursor, Read};

/// Length of the lc/lp/pb byte plus the dictionary size.
pub const PROPERTIES_LEN: usize = 5;

/// Length of the size field that follows the properties.
pub const SIZE_FIELD_LEN: usize = 8;

/// Length of a complete LZMA "alone" header.
pub const HEADER_LEN: usize = PROPERTIES_LEN + SIZE_FIELD_LEN;

/// The first properties byte encodes `(pb * 5 + lp) * 9 + lc`.
const PROPERTIES_BYTE_LIMIT: u8 = 9 * 5 * 5;

/// Reader yielding the corrected header followed by the rest of the stream.
pub type RepairedStream<R> = Chain<Cursor<[u8; HEADER_LEN]>, R>;

/// Build a header from `properties` with the size field marked unknown.
pub fn repaired_header(properties: [u8; PROPERTIES_LEN]) -> [u8; HEADER_LEN] {
    let mut header = [0xFF; HEADER_LEN];
    header[..PROPERTIES_LEN].copy_from_slice(&properties);
    header
}

/// Read the stored header and return a stream that starts with a repaired one.
///
/// The 8 stored size bytes are discarded unconditionally.
pub fn repair_header<R: Read>(mut reader: R) -> Result<RepairedStream<R>> {
    let mut properties = [0u8; PROPERTIES_LEN];
    reader
        .read_exact(&mut properties)
        .map_err(|e| Error::unexpected_eof("lzma properties", e))?;

    if properties[0] >= PROPERTIES_BYTE_LIMIT {
        return Err(Error::InvalidLzmaProperties {
            props: properties[0],
        });
    }

    for _ in 0..SIZE_FIELD_LEN {
        read_byte(&mut reader, "lzma size field")?;
    }

    Ok(Cursor::new(repaired_header(properties)).chain(reader))
}
