//! Proprietary container header.
//!
//! Layout, as found in the client's asset directory:
//!
//! ```text
//! [N x 0x00][5-byte marker, first byte non-zero][varint length][LZMA stream...]
//! ```
//!
//! Neither the marker nor the length is validated. Older clients wrote
//! different marker bytes, and the length is only needed to know how many
//! bytes to skip.

use crate::error::Result;
use crate::wire::{read_byte, read_varint};
use std::io::Read;

/// Length of the marker that follows the zero run.
pub const MARKER_LEN: usize = 5;

/// What [`skip_header`] consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    /// Number of leading zero bytes
    pub zero_run: usize,
    /// Marker bytes, unvalidated
    pub marker: [u8; MARKER_LEN],
    /// Value of the length field (unused by decoding)
    pub payload_length: u64,
    /// Bytes occupied by the length field
    pub length_field_len: usize,
}

impl ContainerHeader {
    /// Total number of bytes the header occupies.
    pub fn byte_len(&self) -> usize {
        self.zero_run + MARKER_LEN + self.length_field_len
    }
}

/// Consume the container header, leaving the reader at the LZMA properties.
pub fn skip_header<R: Read + ?Sized>(reader: &mut R) -> Result<ContainerHeader> {
    let mut marker = [0u8; MARKER_LEN];
    let mut zero_run = 0usize;

    loop {
        let byte = read_byte(reader, "container zero run")?;
        if byte != 0x00 {
            marker[0] = byte;
            break;
        }
        zero_run += 1;
    }

    for slot in marker.iter_mut().skip(1) {
        *slot = read_byte(reader, "container marker")?;
    }

    let (payload_length, length_field_len) = read_varint(reader)?;

    Ok(ContainerHeader {
        zero_run,
        marker,
        payload_length,
        length_field_len,
    })
}
