//! Sprite sheet tiling.
//!
//! A sheet packs a contiguous id range into a grid. Small ranges (up to 36
//! sprites) use 64px cells, larger ones 32px cells; the threshold does not
//! depend on the sheet's size. Cells are numbered row-major starting at the
//! range's first id.

use crate::error::Result;
use crate::output::{ensure_dir, write_png};
use crate::SpriteId;
use image::{imageops, RgbaImage};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Edge length used when a sheet holds few sprites
pub const LARGE_TILE: u32 = 64;

/// Edge length used otherwise
pub const SMALL_TILE: u32 = 32;

/// Largest sprite count still laid out with [`LARGE_TILE`] cells
pub const LARGE_TILE_MAX_COUNT: u64 = 36;

/// Edge length of the sheets the client ships
pub const CANONICAL_SHEET_SIZE: u32 = 384;

/// One exported sprite
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    /// Sprite id
    pub id: SpriteId,
    /// Pixel copy of the sheet cell
    pub image: RgbaImage,
}

/// Grid geometry for one sheet and id range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLayout {
    /// First sprite id
    pub first_id: SpriteId,
    /// Cell edge length
    pub tile_size: u32,
    /// Cells per row
    pub columns: u32,
    /// Rows of cells
    pub rows: u32,
    /// Number of tiles that will be emitted
    pub count: u64,
    /// Ids requested but dropped for lack of room
    pub truncated: u64,
}

impl TileLayout {
    /// Plan the grid for a `width` x `height` sheet holding `first..=last`.
    ///
    /// Returns `None` when the range is empty (`last < first`).
    pub fn plan(width: u32, height: u32, first: SpriteId, last: SpriteId) -> Option<Self> {
        if last < first {
            return None;
        }
        let requested = last - first + 1;

        let tile_size = if requested <= LARGE_TILE_MAX_COUNT {
            LARGE_TILE
        } else {
            SMALL_TILE
        };
        let columns = width / tile_size;
        let rows = height / tile_size;
        let capacity = u64::from(columns) * u64::from(rows);
        let count = requested.min(capacity);

        Some(Self {
            first_id: first,
            tile_size,
            columns,
            rows,
            count,
            truncated: requested - count,
        })
    }

    /// Number of cells the grid has room for
    pub fn capacity(&self) -> u64 {
        u64::from(self.columns) * u64::from(self.rows)
    }

    /// Top-left pixel and id of every emitted cell, row-major
    pub fn cells(&self) -> impl Iterator<Item = (SpriteId, u32, u32)> + '_ {
        (0..self.count).map(move |index| {
            // index < capacity, so row and column fit in u32
            let column = (index % u64::from(self.columns)) as u32;
            let row = (index / u64::from(self.columns)) as u32;
            (
                self.first_id + index,
                column * self.tile_size,
                row * self.tile_size,
            )
        })
    }
}

/// Cut `sheet` into tiles for `first..=last`.
///
/// An empty range yields no tiles. Ids that do not fit in the grid are
/// dropped with a warning.
pub fn split_sheet(sheet: &RgbaImage, first: SpriteId, last: SpriteId) -> Vec<Tile> {
    let (width, height) = sheet.dimensions();
    let Some(layout) = TileLayout::plan(width, height, first, last) else {
        return Vec::new();
    };

    if width != CANONICAL_SHEET_SIZE || height != CANONICAL_SHEET_SIZE {
        debug!(width, height, "Unexpected sheet size; proceeding to split");
    }
    if layout.truncated > 0 {
        warn!(
            first,
            last,
            capacity = layout.capacity(),
            dropped = layout.truncated,
            "Sprite count exceeds sheet capacity; truncating"
        );
    }

    layout
        .cells()
        .map(|(id, x, y)| Tile {
            id,
            image: imageops::crop_imm(sheet, x, y, layout.tile_size, layout.tile_size).to_image(),
        })
        .collect()
}

/// `<id>.png` inside `dir`
pub fn tile_path(dir: &Path, id: SpriteId) -> PathBuf {
    dir.join(format!("{}.png", id))
}

/// Write every tile as `<id>.png` into `dir`, returning how many were written.
pub fn write_tiles(tiles: &[Tile], dir: &Path) -> Result<usize> {
    ensure_dir(dir)?;
    for tile in tiles {
        write_png(&tile_path(dir, tile.id), &tile.image)?;
    }
    Ok(tiles.len())
}
