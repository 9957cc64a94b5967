//! Output file helpers.

use crate::error::{Error, Result};
use image::{ImageFormat, RgbaImage};
use std::fs;
use std::path::Path;

/// Create `dir` and its parents if missing.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| Error::directory_create(dir, e))
}

/// Encode `image` as PNG at `path`, creating parent directories first.
pub fn write_png(path: &Path, image: &RgbaImage) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    image
        .save_with_format(path, ImageFormat::Png)
        .map_err(|e| Error::image_write(path, e))
}
