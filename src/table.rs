//! The CSV layout shared by raw, master and clean tables.
//!
//! Every table is written with the fixed [`Column`] header. Reading is lenient:
//! columns are matched by name, missing ones are left empty and unknown ones are dropped.

use std::path::Path;

use anyhow::{bail, Context};
use enum_map::{Enum, EnumMap};
use fs_err::{File, OpenOptions};
use itertools::Itertools;
use log::{debug, warn};
use roster_scraping_utils::fs_util::{create_parent_dir, is_missing_or_empty};
use strum::{EnumIter, IntoEnumIterator, IntoStaticStr};

use crate::schema::{PlayerRecord, RosterField};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Enum, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Column {
    SchoolSlug,
    SchoolName,
    Conference,
    Sport,
    Season,
    PlayerName,
    Number,
    Position,
    ClassYear,
    Height,
    Weight,
    Hometown,
    HighSchool,
}
impl Column {
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Names used by tables that predate the current header.
    fn legacy_names(self) -> &'static [&'static str] {
        use Column::*;
        match self {
            SchoolSlug => &["school"],
            PlayerName => &["player"],
            ClassYear => &["class"],
            _ => &[],
        }
    }

    pub fn from_header(header: &str) -> Option<Column> {
        let header = header.trim().to_ascii_lowercase();
        Column::iter()
            .find(|c| c.name() == header || c.legacy_names().contains(&header.as_str()))
    }

    pub fn header() -> impl Iterator<Item = &'static str> {
        Column::iter().map(Column::name)
    }
}
impl From<RosterField> for Column {
    fn from(field: RosterField) -> Self {
        use RosterField::*;
        match field {
            PlayerName => Column::PlayerName,
            Number => Column::Number,
            Position => Column::Position,
            ClassYear => Column::ClassYear,
            Height => Column::Height,
            Weight => Column::Weight,
            Hometown => Column::Hometown,
            HighSchool => Column::HighSchool,
        }
    }
}

/// One table row, every canonical column present.
pub type RawRow = EnumMap<Column, String>;

impl PlayerRecord {
    pub fn to_row(&self) -> RawRow {
        let mut row = RawRow::default();
        row[Column::SchoolSlug] = self.school().school_slug().to_string();
        row[Column::SchoolName] = self.school().school_name().to_string();
        row[Column::Conference] = self.school().conference().to_string();
        row[Column::Sport] = self.sport().to_string();
        row[Column::Season] = self.season().to_string();
        for (field, value) in self.fields() {
            row[Column::from(field)] = value.clone();
        }
        row
    }
}

/// Reads a table whose header may differ from the canonical one.
pub fn read_table(path: &Path) -> anyhow::Result<Vec<RawRow>> {
    (|| {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(File::open(path)?);
        let headers = reader.headers()?.clone();
        let mapping = headers.iter().map(Column::from_header).collect_vec();

        let dropped = headers
            .iter()
            .zip(&mapping)
            .filter_map(|(header, column)| column.is_none().then_some(header))
            .collect_vec();
        if !dropped.is_empty() {
            warn!("{path:?}: dropping columns outside the canonical header: {dropped:?}");
        }
        let missing = Column::iter()
            .filter(|c| !mapping.contains(&Some(*c)))
            .collect_vec();
        if !headers.is_empty() && !missing.is_empty() {
            debug!("{path:?}: filling absent columns with empty values: {missing:?}");
        }

        reader
            .records()
            .map(|record| {
                let record = record?;
                let mut row = RawRow::default();
                for (value, column) in record.iter().zip(&mapping) {
                    // With duplicated headers the first non-empty value wins.
                    if let Some(column) = *column {
                        if row[column].is_empty() {
                            row[column] = value.to_owned();
                        }
                    }
                }
                anyhow::Ok(row)
            })
            .collect::<anyhow::Result<Vec<_>>>()
    })()
    .with_context(|| format!("While reading table {path:?}"))
}

/// Writes `rows` to `path`, replacing any existing file.
pub fn write_table<'a>(
    path: &Path,
    rows: impl IntoIterator<Item = &'a RawRow>,
) -> anyhow::Result<usize> {
    create_parent_dir(path)?;
    let mut writer = TableWriter::new(File::create(path)?, true)?;
    for row in rows {
        writer.write_row(row)?;
    }
    writer.commit()?;
    Ok(writer.rows_written())
}

/// Append-only writer for the raw table.
pub struct TableWriter {
    writer: csv::Writer<File>,
    rows_written: usize,
}
impl TableWriter {
    fn new(file: File, write_header: bool) -> anyhow::Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if write_header {
            writer.write_record(Column::header())?;
        }
        Ok(Self {
            writer,
            rows_written: 0,
        })
    }

    /// Opens `path` for appending, writing the header when the file is new or empty.
    ///
    /// Appending to a file with a different header would mix layouts, so that is refused.
    pub fn append(path: &Path) -> anyhow::Result<Self> {
        create_parent_dir(path)?;
        let needs_header = is_missing_or_empty(path)?;
        if !needs_header {
            let mut reader = csv::Reader::from_reader(File::open(path)?);
            let headers = reader
                .headers()
                .with_context(|| format!("While reading the header of {path:?}"))?;
            if !headers.iter().map(str::trim).eq(Column::header()) {
                bail!(
                    "{path:?} does not have the expected header {:?} (found {:?}); consolidate it into a new table first",
                    Column::header().collect_vec(),
                    headers
                );
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = Self::new(file, needs_header)?;
        writer.commit()?;
        Ok(writer)
    }

    pub fn write_row(&mut self, row: &RawRow) -> anyhow::Result<()> {
        self.writer.write_record(row.values())?;
        self.rows_written += 1;
        Ok(())
    }

    pub fn write_records(&mut self, records: &[PlayerRecord]) -> anyhow::Result<()> {
        for record in records {
            self.write_row(&record.to_row())?;
        }
        Ok(())
    }

    /// Flushes buffered rows and waits until they reach the disk.
    pub fn commit(&mut self) -> anyhow::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }
}
