//! # tse-core
//!
//! A library for recovering sprite imagery from a legacy game client's asset
//! directory and regrouping multi-part sprites.
//!
//! This crate provides the core functionality for:
//! - Unwrapping the proprietary asset container and repairing its LZMA header
//! - Decoding the embedded BMP sprite sheets
//! - Cutting sheets into per-id tiles
//! - Recovering sprite groups from the undocumented appearances blob
//! - Stitching each group's tiles into one image
//!
//! ## Architecture
//!
//! - [`wire`]: varint decoding shared by the binary readers
//! - [`asset`]: container header, LZMA repair, sheet decoding
//! - [`sheet`]: sheet tiling
//! - [`appearances`]: sprite-info scanning
//! - [`compose`]: group composition
//! - [`catalog`]: streaming catalog reader
//! - [`pipeline`]: batch extract/split/group with per-item outcomes
//! - [`error`]: error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use tse_core::{extract_sprites, group_sprites, split_sprites, ExportConfig};
//!
//! let config = ExportConfig::new("/path/to/client/assets").jobs(4);
//!
//! let extracted = extract_sprites(&config)?;
//! let split = split_sprites(&config)?;
//! let grouped = group_sprites(&config)?;
//! println!("{} sheets, {} split, {} groups", extracted.exported, split.exported, grouped.exported);
//! # Ok::<(), tse_core::Error>(())
//! ```
//!
//! ## Extensibility
//!
//! [`TileSource`] lets composition read tiles from somewhere other than a
//! directory of PNG files; any `Fn(SpriteId) -> Result<RgbaImage>` works.
//!
//! [`RgbaImage`]: image::RgbaImage

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod appearances;
pub mod asset;
pub mod catalog;
pub mod compose;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod sheet;
pub mod wire;

// Re-export primary types for convenience
pub use appearances::{scan_sprite_infos, Scanner, ScannerConfig, SpriteInfo};
pub use asset::{convert_asset, decode_container, Conversion};
pub use catalog::{find_appearances_file, CatalogEntry, CatalogStream, EntryKind};
pub use compose::{compose_group, group_file_stem, TileDirectory, TileSource};
pub use config::{DecodeLimits, ExportConfig, CATALOG_FILE_NAME};
pub use error::{Error, Result};
pub use pipeline::{
    compose_groups, extract_sprites, group_sprites, split_sprites, BatchSummary, ItemOutcome,
};
pub use sheet::{split_sheet, write_tiles, Tile, TileLayout};

/// Numeric sprite identifier as used by the catalog and the appearances blob
pub type SpriteId = u64;

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
