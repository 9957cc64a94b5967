//! Run configuration shared by the batch entry points.

use std::path::{Path, PathBuf};

/// File name of the catalog descriptor inside the assets directory.
pub const CATALOG_FILE_NAME: &str = "catalog-content.json";

/// Default cap on a single decompressed asset (256 MiB).
pub const DEFAULT_MAX_DECOMPRESSED_SIZE: u64 = 256 * 1024 * 1024;

/// Resource limits applied while decoding one asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Maximum decompressed payload size in bytes (`None` = unlimited)
    pub max_decompressed_size: Option<u64>,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_decompressed_size: Some(DEFAULT_MAX_DECOMPRESSED_SIZE),
        }
    }
}

impl DecodeLimits {
    /// Limits with no decompressed-size cap
    pub fn unlimited() -> Self {
        Self {
            max_decompressed_size: None,
        }
    }
}

/// Paths and tuning for one export run
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Directory holding the catalog descriptor and the asset files
    pub assets_dir: PathBuf,
    /// Where `Sprites-<first>-<last>.png` sheets are written
    pub extracted_dir: PathBuf,
    /// Where per-id tiles are written and read back from
    pub split_dir: PathBuf,
    /// Where group composites are written
    pub grouped_dir: PathBuf,
    /// Also tile each sheet right after extracting it
    pub split_on_extract: bool,
    /// Worker threads (0 = one per CPU)
    pub jobs: usize,
    /// Decoding limits
    pub limits: DecodeLimits,
}

impl ExportConfig {
    /// Creates a config rooted at `assets_dir` with outputs under `./output`
    pub fn new(assets_dir: impl Into<PathBuf>) -> Self {
        let output = PathBuf::from("output");
        Self {
            assets_dir: assets_dir.into(),
            extracted_dir: output.join("extracted"),
            split_dir: output.join("split"),
            grouped_dir: output.join("grouped"),
            split_on_extract: false,
            jobs: 0,
            limits: DecodeLimits::default(),
        }
    }

    /// Path of the catalog descriptor
    pub fn catalog_path(&self) -> PathBuf {
        self.assets_dir.join(CATALOG_FILE_NAME)
    }

    /// Resolves an asset file name against the assets directory
    pub fn asset_path(&self, file: impl AsRef<Path>) -> PathBuf {
        self.assets_dir.join(file)
    }

    /// Sets the extracted sheet directory
    pub fn extracted_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.extracted_dir = dir.into();
        self
    }

    /// Sets the tile directory
    pub fn split_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.split_dir = dir.into();
        self
    }

    /// Sets the composite directory
    pub fn grouped_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.grouped_dir = dir.into();
        self
    }

    /// Enables tiling during extraction
    pub fn split_on_extract(mut self, enabled: bool) -> Self {
        self.split_on_extract = enabled;
        self
    }

    /// Sets the worker count
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Sets the decompressed-size cap (`None` = unlimited)
    pub fn max_decompressed_size(mut self, limit: Option<u64>) -> Self {
        self.limits.max_decompressed_size = limit;
        self
    }
}
