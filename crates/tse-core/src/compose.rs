//! Group composition.
//!
//! A group's tiles are laid side by side, left to right, in the order the
//! appearances blob lists them. Missing tiles leave a transparent gap so the
//! remaining tiles keep their position.

use crate::error::{Error, Result};
use crate::sheet::tile_path;
use crate::SpriteId;
use image::{imageops, RgbaImage};
use std::path::{Path, PathBuf};
use tracing::{error, trace};

/// Tiles smaller than this in either axis are treated as unusable
pub const MIN_TILE_EDGE: u32 = 32;

/// Source of per-id tile images
pub trait TileSource: Sync {
    /// Load the tile for `id`
    fn load_tile(&self, id: SpriteId) -> Result<RgbaImage>;
}

impl<F> TileSource for F
where
    F: Fn(SpriteId) -> Result<RgbaImage> + Sync,
{
    fn load_tile(&self, id: SpriteId) -> Result<RgbaImage> {
        self(id)
    }
}

/// Tiles stored as `<id>.png` in one directory
#[derive(Debug, Clone)]
pub struct TileDirectory {
    root: PathBuf,
}

impl TileDirectory {
    /// Creates a source reading from `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory the tiles are read from
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TileSource for TileDirectory {
    fn load_tile(&self, id: SpriteId) -> Result<RgbaImage> {
        let image = image::open(tile_path(&self.root, id))
            .map_err(|source| Error::TileLoad { id, source })?;
        Ok(image.to_rgba8())
    }
}

/// Output file stem for a group: `<id>` for one sprite, `<first>-<last>` otherwise.
///
/// Returns `None` for an empty group.
pub fn group_file_stem(ids: &[SpriteId]) -> Option<String> {
    match ids {
        [] => None,
        [only] => Some(only.to_string()),
        [first, .., last] => Some(format!("{}-{}", first, last)),
    }
}

/// Width of a strip of `count` cells
fn canvas_width(count: usize, cell_width: u32) -> Result<u32> {
    u32::try_from(count)
        .ok()
        .and_then(|n| n.checked_mul(cell_width))
        .ok_or(Error::GroupTooWide { count, cell_width })
}

/// Stitch the tiles of `ids` into one horizontal strip.
///
/// The first tile that loads fixes the cell size. The canvas is always
/// `cell_width * ids.len()` wide, whatever loaded.
pub fn compose_group<S: TileSource + ?Sized>(ids: &[SpriteId], tiles: &S) -> Result<RgbaImage> {
    let mut loaded: Vec<Option<RgbaImage>> = Vec::with_capacity(ids.len());
    let mut cell: Option<(u32, u32)> = None;

    for &id in ids {
        match tiles.load_tile(id) {
            Ok(tile) => {
                if cell.is_none() {
                    cell = Some(tile.dimensions());
                }
                loaded.push(Some(tile));
            }
            Err(e) => {
                error!(id, "Tile error: {}", e);
                loaded.push(None);
            }
        }
    }

    let Some((cell_width, cell_height)) = cell else {
        return Err(Error::NoTilesLoaded { count: ids.len() });
    };
    if cell_width < MIN_TILE_EDGE || cell_height < MIN_TILE_EDGE {
        return Err(Error::TileTooSmall {
            width: cell_width,
            height: cell_height,
            min: MIN_TILE_EDGE,
        });
    }

    let mut canvas = RgbaImage::new(canvas_width(ids.len(), cell_width)?, cell_height);

    for (index, tile) in loaded.iter().enumerate() {
        if let Some(tile) = tile {
            let x = index as i64 * i64::from(cell_width);
            imageops::overlay(&mut canvas, tile, x, 0);
        }
    }

    trace!(
        "Composed {} tiles into {}x{}",
        ids.len(),
        canvas.width(),
        canvas.height()
    );
    Ok(canvas)
}
