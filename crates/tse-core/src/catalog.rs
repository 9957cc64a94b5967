//! Catalog descriptor streaming.
//!
//! `catalog-content.json` is a top-level JSON array describing every file in
//! the client's asset directory. It can be large, so entries are decoded one
//! at a time on a producer thread and handed over through a rendezvous
//! channel: the producer blocks until the consumer has taken the previous
//! entry.

use crate::error::{Error, Result};
use crate::SpriteId;
use serde::de::{Deserializer as _, SeqAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread;
use tracing::{debug, trace};

/// Read buffer for the catalog file
const READ_BUFFER_SIZE: usize = 1 << 20;

/// What a catalog entry describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// A sprite sheet container
    Sprite,
    /// The appearances metadata blob
    Appearances,
    /// Anything else (static data, maps, ...)
    #[serde(other)]
    Other,
}

/// One element of the catalog array
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogEntry {
    /// Entry type
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// File name relative to the assets directory
    #[serde(default)]
    pub file: String,
    /// Sprite layout type as reported by the client
    #[serde(default, rename = "spritetype")]
    pub sprite_type: u32,
    /// First sprite id stored in the file
    #[serde(default, rename = "firstspriteid")]
    pub first_sprite_id: SpriteId,
    /// Last sprite id stored in the file
    #[serde(default, rename = "lastspriteid")]
    pub last_sprite_id: SpriteId,
    /// Area hint
    #[serde(default)]
    pub area: u32,
}

impl CatalogEntry {
    /// Number of sprites in the entry's id range (0 when the range is empty)
    pub fn sprite_count(&self) -> u64 {
        if self.last_sprite_id < self.first_sprite_id {
            0
        } else {
            self.last_sprite_id - self.first_sprite_id + 1
        }
    }
}

/// Lazily decoded catalog entries.
///
/// Yields `Ok` entries in file order. A malformed document yields a single
/// `Err` after the entries decoded so far, then ends. The stream cannot be
/// restarted.
#[derive(Debug)]
pub struct CatalogStream {
    receiver: Receiver<Result<CatalogEntry>>,
}

impl CatalogStream {
    /// Open `path` and start decoding it in the background.
    ///
    /// Fails immediately if the file cannot be opened.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::open(&path).map_err(|e| Error::file_read(&path, e))?;
        let (sender, receiver) = mpsc::sync_channel(0);

        thread::Builder::new()
            .name("catalog-reader".to_string())
            .spawn(move || produce_entries(file, &path, &sender))
            .map_err(|e| Error::internal(format!("failed to spawn catalog reader: {}", e)))?;

        Ok(Self { receiver })
    }
}

impl Iterator for CatalogStream {
    type Item = Result<CatalogEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.recv().ok()
    }
}

fn produce_entries(file: File, path: &Path, sender: &SyncSender<Result<CatalogEntry>>) {
    let reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);
    let mut deserializer = serde_json::Deserializer::from_reader(reader);

    let result = (&mut deserializer)
        .deserialize_seq(EntryForwarder { sender })
        .and_then(|()| deserializer.end());

    if let Err(e) = result {
        // The consumer may already be gone; nothing left to report to
        let _ = sender.send(Err(Error::catalog_parse(path, e)));
    }
    trace!("Catalog reader finished: {}", path.display());
}

/// Sends each array element to the consumer as soon as it is decoded.
struct EntryForwarder<'a> {
    sender: &'a SyncSender<Result<CatalogEntry>>,
}

impl<'de> Visitor<'de> for EntryForwarder<'_> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a top-level JSON array of catalog entries")
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        while let Some(entry) = seq.next_element::<CatalogEntry>()? {
            if self.sender.send(Ok(entry)).is_err() {
                break;
            }
        }
        Ok(())
    }
}

/// Name of the appearances blob listed in the catalog at `path`.
pub fn find_appearances_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    for entry in CatalogStream::open(path)? {
        let entry = entry?;
        match entry.kind {
            EntryKind::Appearances => return Ok(entry.file),
            _ => debug!(kind = ?entry.kind, file = %entry.file, "Skipping catalog entry"),
        }
    }
    Err(Error::AppearancesNotFound {
        path: path.to_path_buf(),
    })
}

/// Number of sprite entries in the catalog at `path`.
pub fn count_sprite_entries(path: impl AsRef<Path>) -> Result<usize> {
    let mut count = 0;
    for entry in CatalogStream::open(path.as_ref())? {
        if entry?.kind == EntryKind::Sprite {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn write_catalog(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("catalog-content.json");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_reads_entries_sequentially() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_catalog(
            &temp_dir,
            r#"[
                {"type":"appearances","file":"appearances-abc.dat"},
                {"type":"sprite","file":"sprites-1.cip","spritetype":0,"firstspriteid":1,"lastspriteid":36,"area":64},
                {"type":"staticdata","file":"staticdata.dat"}
            ]"#,
        );

        let entries: Vec<_> = CatalogStream::open(&path)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].kind, EntryKind::Appearances);
        assert_eq!(
            entries[1],
            CatalogEntry {
                kind: EntryKind::Sprite,
                file: "sprites-1.cip".to_string(),
                sprite_type: 0,
                first_sprite_id: 1,
                last_sprite_id: 36,
                area: 64,
            }
        );
        assert_eq!(entries[1].sprite_count(), 36);
        assert_eq!(entries[2].kind, EntryKind::Other);
    }

    #[test]
    fn test_invalid_json_yields_error_after_valid_entries() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_catalog(&temp_dir, r#"[{"type":"sprite","file":"a"}, {"type": 5}]"#);

        let items: Vec<_> = CatalogStream::open(&path).unwrap().collect();

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(Error::CatalogParse { .. })));
    }

    #[test]
    fn test_top_level_must_be_array() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_catalog(&temp_dir, r#"{"type":"sprite"}"#);

        let items: Vec<_> = CatalogStream::open(&path).unwrap().collect();

        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(Error::CatalogParse { .. })));
    }

    #[test]
    fn test_missing_file_fails_on_open() {
        let temp_dir = TempDir::new().unwrap();
        let result = CatalogStream::open(temp_dir.path().join("nope.json"));
        assert!(matches!(result, Err(Error::FileRead { .. })));
    }

    #[test]
    fn test_dropping_stream_early_is_fine() {
        let temp_dir = TempDir::new().unwrap();
        let body: Vec<String> = (0..100)
            .map(|i| format!(r#"{{"type":"sprite","file":"s{}.cip"}}"#, i))
            .collect();
        let path = write_catalog(&temp_dir, &format!("[{}]", body.join(",")));

        let first: Vec<_> = CatalogStream::open(&path).unwrap().take(2).collect();
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_find_appearances_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_catalog(
            &temp_dir,
            r#"[{"type":"sprite","file":"s.cip"},{"type":"appearances","file":"appearances.dat"}]"#,
        );
        assert_eq!(find_appearances_file(&path).unwrap(), "appearances.dat");

        let path = write_catalog(&temp_dir, r#"[{"type":"sprite","file":"s.cip"}]"#);
        assert!(matches!(
            find_appearances_file(&path),
            Err(Error::AppearancesNotFound { .. })
        ));
    }

    #[test]
    fn test_count_sprite_entries() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_catalog(
            &temp_dir,
            r#"[{"type":"sprite","file":"a"},{"type":"map","file":"m"},{"type":"sprite","file":"b"}]"#,
        );
        assert_eq!(count_sprite_entries(&path).unwrap(), 2);
    }
}
