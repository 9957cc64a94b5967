//! Asset container decoding.
//!
//! A sprite asset goes through four stages before it becomes a sheet:
//!
//! 1. [`container::skip_header`] strips the proprietary wrapper
//! 2. [`lzma::repair_header`] fixes the bogus size field
//! 3. the LZMA stream is decompressed into memory
//! 4. the result is decoded as a BMP into an RGBA buffer
//!
//! [`convert_asset`] runs the whole chain for one catalog entry and writes
//! the sheet (and optionally its tiles) to disk.

pub mod container;
pub mod lzma;

use crate::config::{DecodeLimits, ExportConfig};
use crate::error::{Error, Result};
use crate::output::write_png;
use crate::sheet::{split_sheet, write_tiles};
use crate::SpriteId;
use image::{ImageFormat, RgbaImage};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use tracing::{debug, trace};

pub use container::{skip_header, ContainerHeader};
pub use lzma::{repair_header, repaired_header};

/// File name prefix of extracted sheets
pub const SHEET_PREFIX: &str = "Sprites-";

/// Read buffer for asset files
const READ_BUFFER_SIZE: usize = 1 << 20;

/// Result of converting one catalog entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversion {
    /// The sheet was written
    Converted {
        /// Path of the written sheet
        sheet: PathBuf,
        /// Number of tiles written alongside (0 unless splitting on extract)
        tiles: usize,
    },
    /// The referenced asset file does not exist
    Missing,
}

/// `Sprites-<first>-<last>.png`
pub fn sheet_file_name(first: SpriteId, last: SpriteId) -> String {
    format!("{}{}-{}.png", SHEET_PREFIX, first, last)
}

/// Parse a sheet file name back into its id range.
///
/// Returns `None` when the name is not a sheet name at all, and an error
/// when it looks like one but the numbers do not fit.
pub fn parse_sheet_file_name(name: &str) -> Option<Result<(SpriteId, SpriteId)>> {
    let range = name.strip_prefix(SHEET_PREFIX)?.strip_suffix(".png")?;
    let (first, last) = range.split_once('-')?;

    let is_number = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !is_number(first) || !is_number(last) {
        return None;
    }

    Some(match (first.parse(), last.parse()) {
        (Ok(first), Ok(last)) => Ok((first, last)),
        _ => Err(Error::InvalidSheetName {
            name: name.to_string(),
        }),
    })
}

/// Collects decompressed bytes, refusing to grow past a limit.
struct BoundedBuffer {
    data: Vec<u8>,
    limit: Option<u64>,
    exceeded: bool,
}

impl Write for BoundedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(limit) = self.limit {
            if (self.data.len() + buf.len()) as u64 > limit {
                self.exceeded = true;
                return Err(io::Error::other("decompressed size limit reached"));
            }
        }
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Prefix of the message `lzma-rs` reports when `memlimit` is hit
const MEMORY_LIMIT_MESSAGE: &str = "exceeded memory limit";

fn is_memory_limit_error(error: &lzma_rs::error::Error) -> bool {
    matches!(
        error,
        lzma_rs::error::Error::LzmaError(message) if message.starts_with(MEMORY_LIMIT_MESSAGE)
    )
}

/// Decompress a repaired LZMA stream into memory.
pub fn decompress<R: BufRead>(reader: &mut R, limits: &DecodeLimits) -> Result<Vec<u8>> {
    let mut out = BoundedBuffer {
        data: Vec::new(),
        limit: limits.max_decompressed_size,
        exceeded: false,
    };

    // The window buffer never holds more than has been decoded, so a
    // memlimit trip means the output passed the limit too
    let options = lzma_rs::decompress::Options {
        memlimit: limits
            .max_decompressed_size
            .map(|limit| usize::try_from(limit).unwrap_or(usize::MAX)),
        ..Default::default()
    };

    if let Err(e) = lzma_rs::lzma_decompress_with_options(reader, &mut out, &options) {
        return Err(match limits.max_decompressed_size {
            Some(limit) if out.exceeded || is_memory_limit_error(&e) => {
                Error::DecompressedSizeExceeded { limit }
            }
            _ => Error::Decompress(e),
        });
    }

    trace!("Decompressed {} bytes", out.data.len());
    Ok(out.data)
}

/// Decompress a repaired stream and decode the BMP it carries.
pub fn decode_sheet<R: BufRead>(reader: &mut R, limits: &DecodeLimits) -> Result<RgbaImage> {
    let raw = decompress(reader, limits)?;
    let image =
        image::load_from_memory_with_format(&raw, ImageFormat::Bmp).map_err(Error::ImageDecode)?;
    Ok(image.to_rgba8())
}

/// Run the full chain on a container stream, header included.
pub fn decode_container<R: BufRead>(mut reader: R, limits: &DecodeLimits) -> Result<RgbaImage> {
    let header = skip_header(&mut reader)?;
    trace!(
        "Container header: {} zero bytes, marker {:02X?}, length field {}",
        header.zero_run,
        header.marker,
        header.payload_length
    );

    let mut repaired = repair_header(reader)?;
    decode_sheet(&mut repaired, limits)
}

/// Convert the asset `file` holding sprites `first..=last`.
///
/// A missing file is not an error and yields [`Conversion::Missing`].
pub fn convert_asset(
    config: &ExportConfig,
    file: &str,
    first: SpriteId,
    last: SpriteId,
) -> Result<Conversion> {
    let path = config.asset_path(file);
    let handle = match File::open(&path) {
        Ok(handle) => handle,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(file, "Skipping: file does not exist");
            return Ok(Conversion::Missing);
        }
        Err(e) => return Err(Error::asset_read(&path, e)),
    };

    let name = sheet_file_name(first, last);
    debug!(input = file, output = %name, "Converting");

    let sheet = decode_container(
        BufReader::with_capacity(READ_BUFFER_SIZE, handle),
        &config.limits,
    )?;

    let sheet_path = config.extracted_dir.join(&name);
    write_png(&sheet_path, &sheet)?;

    let tiles = if config.split_on_extract {
        let tiles = split_sheet(&sheet, first, last);
        write_tiles(&tiles, &config.split_dir)?
    } else {
        0
    };

    Ok(Conversion::Converted {
        sheet: sheet_path,
        tiles,
    })
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn config_in(temp_dir: &TempDir) -> ExportConfig {
        ExportConfig::new(temp_dir.path().join("assets"))
            .extracted_dir(temp_dir.path().join("extracted"))
            .split_dir(temp_dir.path().join("split"))
    }

    #[test]
    fn test_sheet_file_names() {
        assert_eq!(sheet_file_name(5, 6), "Sprites-5-6.png");
        assert_eq!(parse_sheet_file_name("Sprites-1-36.png").unwrap().unwrap(), (1, 36));
        assert!(parse_sheet_file_name("Sprites-a-36.png").is_none());
        assert!(parse_sheet_file_name("Sprites-1-36.bmp").is_none());
        assert!(parse_sheet_file_name("other.png").is_none());
        assert!(parse_sheet_file_name("Sprites-1-99999999999999999999999.png")
            .unwrap()
            .is_err());
    }

    #[test]
    fn test_decode_container_preserves_pixels() {
        let source = gradient(48, 20);
        let data = container(&encode_bmp(&source));

        let sheet = decode_container(Cursor::new(data), &DecodeLimits::default()).unwrap();

        assert_eq!(sheet.dimensions(), (48, 20));
        for (x, y, pixel) in source.enumerate_pixels() {
            let [r, g, b] = pixel.0;
            assert_eq!(sheet.get_pixel(x, y).0, [r, g, b, 255]);
        }
    }

    #[test]
    fn test_decode_container_rejects_garbage_payload() {
        let result = decode_container(Cursor::new(corrupt_container()), &DecodeLimits::default());
        assert!(matches!(
            result,
            Err(Error::Decompress(_)) | Err(Error::ImageDecode(_))
        ));
    }

    #[test]
    fn test_decode_container_rejects_non_bmp_payload() {
        let data = container(b"definitely not a bitmap");
        let result = decode_container(Cursor::new(data), &DecodeLimits::default());
        assert!(matches!(result, Err(Error::ImageDecode(_))));
    }

    #[test]
    fn test_decompressed_size_cap() {
        let data = container(&vec![7u8; 64 * 1024]);
        let limits = DecodeLimits {
            max_decompressed_size: Some(1024),
        };
        let result = decode_container(Cursor::new(data.clone()), &limits);
        assert!(matches!(
            result,
            Err(Error::DecompressedSizeExceeded { limit: 1024 })
        ));

        // Same payload passes the default cap and only fails at the BMP stage
        let result = decode_container(Cursor::new(data), &DecodeLimits::default());
        assert!(matches!(result, Err(Error::ImageDecode(_))));
    }

    #[test]
    fn test_decompressed_size_cap_on_real_sheet() {
        let data = container(&encode_bmp(&gradient(384, 384)));
        let limits = DecodeLimits {
            max_decompressed_size: Some(100_000),
        };

        let err = decode_container(Cursor::new(data), &limits).unwrap_err();

        assert!(matches!(
            err,
            Error::DecompressedSizeExceeded { limit: 100_000 }
        ));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_other_lzma_errors_are_not_size_errors() {
        let error = lzma_rs::error::Error::LzmaError("invalid distance".to_string());
        assert!(!is_memory_limit_error(&error));
        let error = lzma_rs::error::Error::LzmaError("exceeded memory limit of 10".to_string());
        assert!(is_memory_limit_error(&error));
    }

    #[test]
    fn test_convert_asset_writes_sheet() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(&temp_dir);
        fs::create_dir_all(&config.assets_dir).unwrap();
        fs::write(
            config.asset_path("sprites-a.cip"),
            container(&encode_bmp(&gradient(64, 64))),
        )
        .unwrap();

        let outcome = convert_asset(&config, "sprites-a.cip", 10, 11).unwrap();

        let expected = config.extracted_dir.join("Sprites-10-11.png");
        assert_eq!(
            outcome,
            Conversion::Converted {
                sheet: expected.clone(),
                tiles: 0
            }
        );
        let written = image::open(&expected).unwrap().to_rgba8();
        assert_eq!(written.dimensions(), (64, 64));
        assert!(!config.split_dir.exists());
    }

    #[test]
    fn test_convert_asset_can_split_immediately() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(&temp_dir).split_on_extract(true);
        fs::create_dir_all(&config.assets_dir).unwrap();
        fs::write(
            config.asset_path("s.cip"),
            container(&encode_bmp(&gradient(128, 64))),
        )
        .unwrap();

        let outcome = convert_asset(&config, "s.cip", 1, 2).unwrap();

        assert!(matches!(outcome, Conversion::Converted { tiles: 2, .. }));
        assert!(config.split_dir.join("1.png").exists());
        assert!(config.split_dir.join("2.png").exists());
    }

    #[test]
    fn test_convert_asset_missing_file_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(&temp_dir);

        let outcome = convert_asset(&config, "missing.cip", 5, 6).unwrap();

        assert_eq!(outcome, Conversion::Missing);
        assert!(!config.extracted_dir.join("Sprites-5-6.png").exists());
    }

    #[test]
    fn test_convert_asset_invalid_bmp_fails() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(&temp_dir);
        fs::create_dir_all(&config.assets_dir).unwrap();
        fs::write(config.asset_path("bad.cip"), container(b"not a bmp")).unwrap();

        let result = convert_asset(&config, "bad.cip", 1, 1);

        assert!(matches!(result, Err(Error::ImageDecode(_))));
        assert!(!config.extracted_dir.join("Sprites-1-1.png").exists());
    }
}
