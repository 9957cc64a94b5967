//! Batch operations: extract, split and group.
//!
//! Every batch is a map over independent items. Items run on a bounded
//! worker pool and report an [`ItemOutcome`] through a channel to a single
//! aggregator that owns the [`BatchSummary`]. Per-item failures are logged
//! and counted; only failures that make the whole batch meaningless
//! (unreadable catalog or blob, malformed catalog, uncreatable output
//! directory) are returned as errors.

use crate::appearances::{Scanner, SpriteInfo};
use crate::asset::{convert_asset, parse_sheet_file_name, Conversion};
use crate::catalog::{find_appearances_file, CatalogEntry, CatalogStream, EntryKind};
use crate::compose::{compose_group, group_file_stem, TileDirectory, TileSource};
use crate::config::ExportConfig;
use crate::error::{Error, Result};
use crate::output::{ensure_dir, write_png};
use crate::sheet::{split_sheet, write_tiles};
use crate::SpriteId;
use rayon::iter::{ParallelBridge, ParallelIterator};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// How one item of a batch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Output was written
    Exported,
    /// Nothing to do for this item
    Skipped,
    /// The item failed; the error was logged
    Failed,
}

/// Aggregate counters for one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Items that produced output
    pub exported: usize,
    /// Items with nothing to do
    pub skipped: usize,
    /// Items that failed
    pub failed: usize,
}

impl BatchSummary {
    /// Count one outcome
    pub fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Exported => self.exported += 1,
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Failed => self.failed += 1,
        }
    }

    /// Number of items seen
    pub fn total(&self) -> usize {
        self.exported + self.skipped + self.failed
    }
}

/// Run `work` over `items` on a pool of `jobs` threads (0 = one per CPU).
///
/// `work` returns `Err` only for run-level failures; the first such error
/// is returned once every in-flight item has reported.
fn run_batch<I, T, F>(jobs: usize, items: I, work: F) -> Result<BatchSummary>
where
    I: Iterator<Item = T> + Send,
    T: Send,
    F: Fn(T) -> Result<ItemOutcome> + Send + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .thread_name(|index| format!("tse-worker-{}", index))
        .build()
        .map_err(|e| Error::internal(format!("failed to start worker pool: {}", e)))?;

    let (sender, receiver) = mpsc::channel();

    thread::scope(|scope| {
        scope.spawn(move || {
            pool.install(|| {
                items
                    .par_bridge()
                    .for_each_with(sender, |sender, item| {
                        // Receiver outlives the pool
                        let _ = sender.send(work(item));
                    })
            })
        });

        let mut summary = BatchSummary::default();
        let mut fatal = None;
        for report in receiver {
            match report {
                Ok(outcome) => summary.record(outcome),
                Err(e) => {
                    if fatal.is_none() {
                        fatal = Some(e);
                    }
                }
            }
        }

        match fatal {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    })
}

/// Convert every sprite entry of the catalog into a sheet PNG.
pub fn extract_sprites(config: &ExportConfig) -> Result<BatchSummary> {
    let catalog_path = config.catalog_path();
    let catalog = CatalogStream::open(&catalog_path)?;
    ensure_dir(&config.extracted_dir)?;
    info!(
        catalog = %catalog_path.display(),
        output = %config.extracted_dir.display(),
        "Extracting sprites"
    );

    let sprites = catalog.filter(|item| match item {
        Ok(entry) if entry.kind != EntryKind::Sprite => {
            debug!(kind = ?entry.kind, file = %entry.file, "Skipping catalog entry");
            false
        }
        _ => true,
    });

    let summary = run_batch(config.jobs, sprites, |item| {
        let entry = item?;
        Ok(extract_entry(config, &entry))
    })?;

    info!(
        exported = summary.exported,
        skipped = summary.skipped,
        failed = summary.failed,
        "Extracting sprites finished"
    );
    Ok(summary)
}

fn extract_entry(config: &ExportConfig, entry: &CatalogEntry) -> ItemOutcome {
    debug!(
        "Sprite range {}..{} file={}",
        entry.first_sprite_id, entry.last_sprite_id, entry.file
    );
    match convert_asset(
        config,
        &entry.file,
        entry.first_sprite_id,
        entry.last_sprite_id,
    ) {
        Ok(Conversion::Converted { sheet, tiles }) => {
            debug!(sheet = %sheet.display(), tiles, "Wrote sheet");
            ItemOutcome::Exported
        }
        Ok(Conversion::Missing) => ItemOutcome::Skipped,
        Err(e) => {
            error!(file = %entry.file, "Failed to convert asset: {}", e);
            ItemOutcome::Failed
        }
    }
}

/// A sheet file found in the extracted directory
struct SheetFile {
    path: PathBuf,
    range: Result<(SpriteId, SpriteId)>,
}

fn find_sheet_files(dir: &Path) -> Result<Vec<SheetFile>> {
    fs::metadata(dir).map_err(|e| Error::file_read(dir, e))?;

    let sheets = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let range = parse_sheet_file_name(e.file_name().to_str()?)?;
            Some(SheetFile {
                path: e.into_path(),
                range,
            })
        })
        .collect();

    Ok(sheets)
}

/// Tile every `Sprites-<first>-<last>.png` in the extracted directory.
pub fn split_sprites(config: &ExportConfig) -> Result<BatchSummary> {
    let sheets = find_sheet_files(&config.extracted_dir)?;
    if sheets.is_empty() {
        warn!(
            extracted = %config.extracted_dir.display(),
            "No sprites found to split. Did you run the extract command?"
        );
        return Ok(BatchSummary::default());
    }

    ensure_dir(&config.split_dir)?;
    info!(
        sheets = sheets.len(),
        output = %config.split_dir.display(),
        "Splitting sprites"
    );

    let summary = run_batch(config.jobs, sheets.into_iter(), |sheet| {
        Ok(split_sheet_file(&sheet, &config.split_dir))
    })?;

    info!(
        exported = summary.exported,
        skipped = summary.skipped,
        failed = summary.failed,
        "Splitting sprites finished"
    );
    Ok(summary)
}

fn split_sheet_file(sheet: &SheetFile, split_dir: &Path) -> ItemOutcome {
    let (first, last) = match &sheet.range {
        Ok(range) => *range,
        Err(e) => {
            error!(file = %sheet.path.display(), "{}", e);
            return ItemOutcome::Failed;
        }
    };

    let image = match image::open(&sheet.path) {
        Ok(image) => image.to_rgba8(),
        Err(e) => {
            error!(file = %sheet.path.display(), "Failed to decode PNG: {}", e);
            return ItemOutcome::Failed;
        }
    };

    debug!(
        "Processing {} (first={}, last={})",
        sheet.path.display(),
        first,
        last
    );
    let tiles = split_sheet(&image, first, last);
    match write_tiles(&tiles, split_dir) {
        Ok(_) => ItemOutcome::Exported,
        Err(e) => {
            error!(file = %sheet.path.display(), "Failed to split: {}", e);
            ItemOutcome::Failed
        }
    }
}

/// Compose every group listed in the appearances blob.
pub fn group_sprites(config: &ExportConfig) -> Result<BatchSummary> {
    let appearances = find_appearances_file(config.catalog_path())?;
    info!("Appearances file name: {}", appearances);

    let blob_path = config.asset_path(&appearances);
    let data = fs::read(&blob_path).map_err(|e| Error::file_read(&blob_path, e))?;
    debug!("Read {} bytes from {}", data.len(), blob_path.display());

    let infos = Scanner::new().scan(&data);
    debug!("Found {} candidate groups", infos.len());

    ensure_dir(&config.grouped_dir)?;
    let tiles = TileDirectory::new(&config.split_dir);
    let summary = compose_groups(config.jobs, infos, &tiles, &config.grouped_dir)?;

    info!(
        exported = summary.exported,
        skipped = summary.skipped,
        failed = summary.failed,
        output = %config.grouped_dir.display(),
        "Exporting groups finished"
    );
    Ok(summary)
}

/// Compose `infos` from `tiles` into `output_dir`.
pub fn compose_groups<S: TileSource + ?Sized>(
    jobs: usize,
    infos: Vec<SpriteInfo>,
    tiles: &S,
    output_dir: &Path,
) -> Result<BatchSummary> {
    run_batch(jobs, infos.into_iter().enumerate(), |(index, info)| {
        Ok(compose_one(index, &info, tiles, output_dir))
    })
}

fn compose_one<S: TileSource + ?Sized>(
    index: usize,
    info: &SpriteInfo,
    tiles: &S,
    output_dir: &Path,
) -> ItemOutcome {
    let Some(stem) = group_file_stem(&info.sprite_ids) else {
        debug!("[skip #{}] no sprite IDs", index);
        return ItemOutcome::Skipped;
    };

    debug!(group = index, sprites = info.sprite_ids.len(), "Compose group");
    let image = match compose_group(&info.sprite_ids, tiles) {
        Ok(image) => image,
        Err(e) => {
            error!("[compose #{}] {}", index, e);
            return ItemOutcome::Failed;
        }
    };

    let path = output_dir.join(format!("{}.png", stem));
    match write_png(&path, &image) {
        Ok(()) => {
            debug!(group = index, path = %path.display(), "Wrote grouped PNG");
            ItemOutcome::Exported
        }
        Err(e) => {
            error!("[write #{}] {}", index, e);
            ItemOutcome::Failed
        }
    }
}
