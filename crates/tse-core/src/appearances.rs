//! Sprite group recovery from the appearances blob.
//!
//! The appearances file is an unframed, unversioned protobuf-like dump. The
//! parts we care about are sprite-info messages, which start with four
//! varint fields in a fixed order followed by a run of repeated sprite ids:
//!
//! ```text
//! 0x08 width  0x10 height  0x18 layers  0x20 pattern_width  (0x28 id)*
//! ```
//!
//! Each tag byte is `(field << 3) | 0`, a protobuf key with the varint wire
//! type. Nothing frames these messages, so the scanner tries every byte
//! offset and resynchronizes one byte at a time after a failed match. A
//! coincidental byte run that happens to satisfy the header is accepted;
//! only the non-zero field check filters such false positives.

use crate::wire::decode_varint;
use crate::SpriteId;
use std::ops::Range;
use tracing::{debug, trace};

/// Protobuf key for a varint field
const fn varint_key(field: u8) -> u8 {
    field << 3
}

/// Keys of the four header fields, in order
const HEADER_KEYS: [u8; 4] = [varint_key(1), varint_key(2), varint_key(3), varint_key(4)];

/// Key of the repeated sprite id field
const SPRITE_ID_KEY: u8 = varint_key(5);

/// Only the first few matches are traced individually
const TRACED_MATCHES: usize = 5;

/// One sprite-info message found in the blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpriteInfo {
    /// Sprite width in cells
    pub width: u64,
    /// Sprite height in cells
    pub height: u64,
    /// Layer count
    pub layers: u64,
    /// Pattern width
    pub pattern_width: u64,
    /// Sprite ids in encounter order (may be empty)
    pub sprite_ids: Vec<SpriteId>,
    /// Byte range the message occupied in the blob
    pub range: Range<usize>,
}

impl SpriteInfo {
    /// The ids as a group, or `None` when there are none
    pub fn group(&self) -> Option<&[SpriteId]> {
        if self.sprite_ids.is_empty() {
            None
        } else {
            Some(&self.sprite_ids)
        }
    }
}

/// Configuration for the scanner
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Maximum number of records to return (0 = unlimited)
    pub max_results: usize,
    /// Maximum sprite ids read for a single record
    pub max_sprite_ids: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_results: 0,
            max_sprite_ids: 1_000_000,
        }
    }
}

impl ScannerConfig {
    /// Creates a new scanner config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of results to return
    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    /// Sets the per-record sprite id bound
    pub fn max_sprite_ids(mut self, max: usize) -> Self {
        self.max_sprite_ids = max;
        self
    }
}

/// Byte-granular scanner for sprite-info messages
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    config: ScannerConfig,
}

impl Scanner {
    /// Creates a new scanner with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new scanner with custom configuration
    pub fn with_config(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// Scan the whole blob. Never fails; unmatched bytes are skipped.
    pub fn scan(&self, data: &[u8]) -> Vec<SpriteInfo> {
        let mut results = Vec::new();
        let mut position = 0;

        debug!("Starting scan of {} bytes", data.len());

        while position < data.len() {
            let Some((header, ids_start)) = match_header(data, position) else {
                position += 1;
                continue;
            };

            let (sprite_ids, end) = self.consume_sprite_ids(data, ids_start);
            let [width, height, layers, pattern_width] = header;

            if results.len() < TRACED_MATCHES {
                trace!(
                    "Sprite info at {}: w={} h={} layers={} pw={} ids={}",
                    position,
                    width,
                    height,
                    layers,
                    pattern_width,
                    sprite_ids.len()
                );
            }

            results.push(SpriteInfo {
                width,
                height,
                layers,
                pattern_width,
                sprite_ids,
                range: position..end,
            });

            if self.config.max_results > 0 && results.len() >= self.config.max_results {
                break;
            }

            position = end;
        }

        debug!("Scan complete: found {} sprite-info blocks", results.len());
        results
    }

    /// Read `0x28 <id>` pairs starting at `start`.
    ///
    /// Returns the ids and the offset after the last consumed byte.
    fn consume_sprite_ids(&self, data: &[u8], start: usize) -> (Vec<SpriteId>, usize) {
        let mut ids = Vec::new();
        let mut position = start;

        while ids.len() < self.config.max_sprite_ids && data.get(position) == Some(&SPRITE_ID_KEY)
        {
            match decode_varint(data, position + 1) {
                Ok((id, next)) => {
                    ids.push(id);
                    position = next;
                }
                Err(_) => break,
            }
        }

        (ids, position)
    }
}

/// Match the four header fields at `start`.
///
/// Returns the field values and the offset right after the last one. Any
/// missing key, undecodable varint, or zero value rejects the position.
fn match_header(data: &[u8], start: usize) -> Option<([u64; 4], usize)> {
    let mut fields = [0u64; 4];
    let mut position = start;

    for (slot, &key) in fields.iter_mut().zip(HEADER_KEYS.iter()) {
        if data.get(position) != Some(&key) {
            return None;
        }
        let (value, next) = decode_varint(data, position + 1).ok()?;
        if value == 0 {
            return None;
        }
        *slot = value;
        position = next;
    }

    Some((fields, position))
}

/// Scan a blob with the default configuration
pub fn scan_sprite_infos(data: &[u8]) -> Vec<SpriteInfo> {
    Scanner::new().scan(data)
}

/// Encode a sprite-info message. Used to build fixtures.
#[cfg(test)]
pub(crate) fn encode_sprite_info(header: [u64; 4], ids: &[SpriteId]) -> Vec<u8> {
    use crate::wire::encode_varint;

    let mut out = Vec::new();
    for (key, value) in HEADER_KEYS.iter().zip(header) {
        out.push(*key);
        out.extend(encode_varint(value));
    }
    for &id in ids {
        out.push(SPRITE_ID_KEY);
        out.extend(encode_varint(id));
    }
    out
}
