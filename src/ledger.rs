//! Durable record of completed work units.
//!
//! Entries live in an append-only CSV next to the raw table (`<raw>.done.csv`).
//! An entry is written and synced only after the unit's rows are on disk, so a crash
//! between the two makes the next run redo the whole unit.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use fs_err::{File, OpenOptions};
use indexmap::IndexSet;
use log::{info, warn};
use roster_scraping_utils::fs_util::{create_parent_dir, is_missing_or_empty};
use thiserror::Error;

use crate::schema::UnitKey;
use crate::table::{read_table, Column, RawRow};

const HEADER: [&str; 3] = ["school_slug", "season", "sport"];

#[derive(Debug, Error)]
pub enum LedgerLoadError {
    #[error("An I/O error occurred when loading the marker log: {0}")]
    IOError(#[from] io::Error),
    #[error("Entry #{line} of the marker log {path:?} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        line: usize,
        source: csv::Error,
    },
}

pub struct ResumeLedger {
    done: IndexSet<UnitKey>,
    writer: csv::Writer<File>,
    path: PathBuf,
}

impl ResumeLedger {
    pub fn marker_path(raw_table: &Path) -> PathBuf {
        let mut name = raw_table
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| "raw".into());
        name.push(".done.csv");
        raw_table.with_file_name(name)
    }

    /// Opens the ledger belonging to `raw_table`.
    ///
    /// Without a marker log, every unit already present in an existing raw table is taken as done.
    pub fn open(raw_table: &Path) -> anyhow::Result<Self> {
        let path = Self::marker_path(raw_table);
        let (done, rewrite) = if path.exists() {
            Self::load(&path)?
        } else if raw_table.exists() {
            let done = seed_from_raw_table(raw_table)?;
            info!(
                "No marker log found; {} units recovered from {raw_table:?}",
                done.len()
            );
            (done, true)
        } else {
            (IndexSet::new(), false)
        };

        create_parent_dir(&path)?;
        let (file, needs_header) = if rewrite {
            (File::create(&path)?, true)
        } else {
            let needs_header = is_missing_or_empty(&path)?;
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            (file, needs_header)
        };
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if needs_header {
            writer.write_record(HEADER)?;
        }
        if rewrite {
            for key in &done {
                writer.serialize(key)?;
            }
        }
        let mut res = Self {
            done,
            writer,
            path,
        };
        res.sync()
            .with_context(|| format!("While initializing {:?}", res.path))?;
        Ok(res)
    }

    /// Loads the marker log. The second value tells whether the file has to be rewritten,
    /// which happens when its last entry was cut short by a crash.
    fn load(path: &Path) -> Result<(IndexSet<UnitKey>, bool), LedgerLoadError> {
        let bytes = fs_err::read(path)?;
        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let entries = reader.deserialize::<UnitKey>().collect::<Vec<_>>();
        let total = entries.len();
        let mut done = IndexSet::new();
        // Appending after a line without its newline would glue two entries together.
        let mut rewrite = bytes.last().is_some_and(|&b| b != b'\n');
        for (i, entry) in entries.into_iter().enumerate() {
            match entry {
                Ok(key) => {
                    done.insert(key);
                }
                Err(e) if i + 1 == total => {
                    warn!("Dropping the truncated last entry of {path:?}: {e}");
                    rewrite = true;
                }
                Err(source) => {
                    return Err(LedgerLoadError::Malformed {
                        path: path.to_owned(),
                        line: i + 1,
                        source,
                    })
                }
            }
        }
        info!("{} completed units loaded from {path:?}", done.len());
        Ok((done, rewrite))
    }

    pub fn is_done(&self, key: &UnitKey) -> bool {
        self.done.contains(key)
    }

    /// Records `key` as completed and waits until the entry is on disk.
    pub fn mark_done(&mut self, key: UnitKey) -> anyhow::Result<()> {
        if self.done.contains(&key) {
            return Ok(());
        }
        self.writer.serialize(&key)?;
        self.sync()
            .with_context(|| format!("While recording {key} in {:?}", self.path))?;
        self.done.insert(key);
        Ok(())
    }

    fn sync(&mut self) -> anyhow::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The unit a raw table row belongs to, if the row names one.
pub fn unit_key_of(row: &RawRow) -> Option<UnitKey> {
    let slug = row[Column::SchoolSlug].trim();
    if slug.is_empty() {
        return None;
    }
    Some(
        UnitKey::builder()
            .school_slug(slug.to_owned().into())
            .season(row[Column::Season].parse().ok()?)
            .sport(row[Column::Sport].trim().parse().ok()?)
            .build(),
    )
}

fn seed_from_raw_table(raw_table: &Path) -> anyhow::Result<IndexSet<UnitKey>> {
    let rows = read_table(raw_table)?;
    let mut unreadable = 0;
    let done = rows
        .iter()
        .filter_map(|row| {
            let key = unit_key_of(row);
            unreadable += usize::from(key.is_none());
            key
        })
        .collect();
    if unreadable > 0 {
        warn!("{unreadable} rows of {raw_table:?} do not name a unit and were ignored");
    }
    Ok(done)
}
