//! Error types for the tse-core library.
//!
//! This module provides error handling using the `thiserror` crate. Variants
//! are grouped by how far a failure reaches: asset and group failures stay
//! local to one item, catalog and metadata failures abort the run.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for tse operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all tse operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to open or read a single asset file
    #[error("failed to read asset '{path}': {source}")]
    AssetRead {
        /// Path to the asset
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to load a previously exported tile
    #[error("failed to load tile {id}: {source}")]
    TileLoad {
        /// Sprite id of the tile
        id: u64,
        /// Underlying image error
        #[source]
        source: image::ImageError,
    },

    /// Failed to create output directory
    #[error("failed to create directory '{path}': {source}")]
    DirectoryCreate {
        /// Path to the directory that failed to create
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to encode or write an output image
    #[error("failed to write image '{path}': {source}")]
    ImageWrite {
        /// Destination path
        path: PathBuf,
        /// Underlying image error
        #[source]
        source: image::ImageError,
    },

    /// A stream ended before a complete structure could be read
    #[error("unexpected end of stream while reading {context}")]
    UnexpectedEof {
        /// What was being read
        context: &'static str,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to decode varint
    #[error("failed to decode varint at offset {offset}: buffer too small or invalid encoding")]
    VarintDecode {
        /// Byte offset where the varint started
        offset: usize,
    },

    /// LZMA properties byte does not encode a valid lc/lp/pb triple
    #[error("invalid LZMA properties byte 0x{props:02X}")]
    InvalidLzmaProperties {
        /// The rejected properties byte
        props: u8,
    },

    /// LZMA stream could not be decompressed
    #[error("lzma decode failed: {0}")]
    Decompress(#[source] lzma_rs::error::Error),

    /// Decompressed payload grew past the configured limit
    #[error("decompressed payload exceeds limit of {limit} bytes")]
    DecompressedSizeExceeded {
        /// The configured limit in bytes
        limit: u64,
    },

    /// Raster payload could not be decoded
    #[error("image decode failed: {0}")]
    ImageDecode(#[source] image::ImageError),

    /// None of a group's tiles could be loaded
    #[error("no tiles found for group of {count} sprite(s)")]
    NoTilesLoaded {
        /// Number of ids in the group
        count: usize,
    },

    /// First loaded tile is too small to be real sprite data
    #[error("tile size {width}x{height} is below the {min}px minimum")]
    TileTooSmall {
        /// Tile width
        width: u32,
        /// Tile height
        height: u32,
        /// Minimum edge length
        min: u32,
    },

    /// Group canvas would be wider than an image can be
    #[error("group of {count} tiles at {cell_width}px does not fit in one image")]
    GroupTooWide {
        /// Number of ids in the group
        count: usize,
        /// Width of one cell
        cell_width: u32,
    },

    /// Sheet file name does not carry a usable id range
    #[error("invalid sprite sheet name '{name}'")]
    InvalidSheetName {
        /// The offending file name
        name: String,
    },

    /// Catalog descriptor is not valid JSON or has the wrong shape
    #[error("failed to parse catalog '{path}': {source}")]
    CatalogParse {
        /// Catalog path
        path: PathBuf,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// Catalog has no appearances entry
    #[error("no appearances file listed in catalog '{path}'")]
    AppearancesNotFound {
        /// Catalog path
        path: PathBuf,
    },

    /// Generic internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new asset read error
    pub fn asset_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::AssetRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new directory creation error
    pub fn directory_create(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryCreate {
            path: path.into(),
            source,
        }
    }

    /// Creates a new image write error
    pub fn image_write(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        Self::ImageWrite {
            path: path.into(),
            source,
        }
    }

    /// Creates a new end-of-stream error
    pub fn unexpected_eof(context: &'static str, source: std::io::Error) -> Self {
        Self::UnexpectedEof { context, source }
    }

    /// Creates a new varint decode error
    pub fn varint_decode(offset: usize) -> Self {
        Self::VarintDecode { offset }
    }

    /// Creates a new catalog parse error
    pub fn catalog_parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::CatalogParse {
            path: path.into(),
            source,
        }
    }

    /// Creates a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns true if this error must abort the whole run.
    ///
    /// Everything else is scoped to a single asset or group and is reported
    /// as a failed item.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::FileRead { .. }
                | Self::DirectoryCreate { .. }
                | Self::CatalogParse { .. }
                | Self::AppearancesNotFound { .. }
                | Self::Internal(_)
        )
    }
}
