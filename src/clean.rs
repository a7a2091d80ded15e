use std::path::Path;

use anyhow::bail;
use indexmap::{map::Entry, IndexMap};
use itertools::Itertools;
use log::{debug, info};

use crate::schema::{Season, Sport};
use crate::table::{read_table, write_table, Column, RawRow};

/// Trims a value and collapses its inner whitespace runs into single spaces.
pub fn normalize_text(value: &str) -> String {
    value.split_whitespace().join(" ")
}

/// Normalizes every field of a row in place.
///
/// Season and sport are rewritten in their canonical form when they can be parsed.
pub fn normalize_row(row: &mut RawRow) {
    for value in row.values_mut() {
        *value = normalize_text(value);
    }
    row[Column::SchoolSlug] = row[Column::SchoolSlug].to_lowercase();
    if let Ok(season) = row[Column::Season].parse::<Season>() {
        row[Column::Season] = season.to_string();
    }
    if let Ok(sport) = row[Column::Sport].parse::<Sport>() {
        row[Column::Sport] = sport.to_string();
    }
}

/// Identity of a player-season. Expects a normalized row.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct DedupKey {
    school_slug: String,
    season: String,
    sport: String,
    player_name: String,
}
impl DedupKey {
    pub fn of(row: &RawRow) -> Self {
        Self {
            school_slug: row[Column::SchoolSlug].clone(),
            season: row[Column::Season].clone(),
            sport: row[Column::Sport].clone(),
            player_name: row[Column::PlayerName].to_lowercase(),
        }
    }
}

fn filled_fields(row: &RawRow) -> usize {
    row.values().filter(|value| !value.is_empty()).count()
}

/// Normalizes `rows` and keeps one row per [`DedupKey`].
///
/// The survivor of a group is the row with the most non-empty fields, the earliest one on ties.
/// Groups are emitted in the order their keys first appear.
pub fn clean_rows(rows: impl IntoIterator<Item = RawRow>) -> Vec<RawRow> {
    let mut groups = IndexMap::<DedupKey, RawRow>::new();
    for mut row in rows {
        normalize_row(&mut row);
        match groups.entry(DedupKey::of(&row)) {
            Entry::Vacant(entry) => {
                entry.insert(row);
            }
            Entry::Occupied(mut entry) => {
                if filled_fields(&row) > filled_fields(entry.get()) {
                    debug!("Replacing the survivor of {:?}", entry.key());
                    entry.insert(row);
                }
            }
        }
    }
    groups.into_values().collect()
}

/// Cleans the table at `raw` into a new table at `out`, returning the number of rows written.
pub fn clean_file(raw: &Path, out: &Path) -> anyhow::Result<usize> {
    if !raw.exists() {
        bail!("The raw table {raw:?} does not exist");
    }
    let rows = read_table(raw)?;
    let total = rows.len();
    let cleaned = clean_rows(rows);
    let written = write_table(out, &cleaned)?;
    info!(
        "{total} rows read from {raw:?}, {} duplicates removed, {written} rows written to {out:?}",
        total - written
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use enum_map::enum_map;

    use super::{clean_rows, normalize_text, DedupKey};
    use crate::table::{Column, RawRow};

    fn row(slug: &str, season: &str, sport: &str, player: &str, position: &str) -> RawRow {
        enum_map! {
            Column::SchoolSlug => slug.to_owned(),
            Column::Season => season.to_owned(),
            Column::Sport => sport.to_owned(),
            Column::PlayerName => player.to_owned(),
            Column::Position => position.to_owned(),
            _ => String::new(),
        }
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  John \t  Smith\n"), "John Smith");
        assert_eq!(normalize_text("   "), "");
    }

    #[test]
    fn test_same_player_different_casing() {
        let rows = vec![
            row("duke", "2018", "mbb", "John Smith", ""),
            row(" Duke ", "2017-18", "men", "john  smith", "G"),
            row("duke", "2018", "mbb", "Jack Doe", ""),
        ];
        let cleaned = clean_rows(rows);
        assert_eq!(
            cleaned,
            vec![
                row("duke", "2018", "mbb", "john smith", "G"),
                row("duke", "2018", "mbb", "Jack Doe", ""),
            ]
        );
    }

    #[test]
    fn test_tie_keeps_first() {
        let rows = vec![
            row("duke", "2018", "mbb", "John Smith", "G"),
            row("duke", "2018", "mbb", "JOHN SMITH", "F"),
        ];
        assert_eq!(
            clean_rows(rows),
            vec![row("duke", "2018", "mbb", "John Smith", "G")]
        );
    }

    #[test]
    fn test_unparsable_key_parts() {
        let rows = vec![
            row("duke", "n/a", "soccer", "John Smith", ""),
            row("duke", "n/a", "soccer", "John Smith", ""),
            row("duke", "2018", "soccer", "John Smith", ""),
            row("duke", "65535-0", "mbb", "John Smith", ""),
        ];
        let cleaned = clean_rows(rows);
        assert_eq!(cleaned.len(), 3);
        assert_eq!(cleaned[2][Column::Season], "65535-0");
        assert_eq!(cleaned[0][Column::Season], "n/a");
        assert_eq!(cleaned[0][Column::Sport], "soccer");
    }

    #[test]
    fn test_idempotent_and_total() {
        let rows = vec![
            row("ucla", "2019-20", "wbb", "Jane  Roe", ""),
            row("UCLA", "2020", "women", "jane roe", "C"),
            row("ucla", "2020", "wbb", "Ann Lee", "F"),
            row("alabama", "2020", "cfb", "Jim Roe", "QB"),
            row("alabama", "2020", "football", "Jim Roe ", "QB"),
        ];
        let once = clean_rows(rows);
        let twice = clean_rows(once.clone());
        assert_eq!(once, twice);
        let keys = once.iter().map(DedupKey::of).collect::<Vec<_>>();
        for (i, key) in keys.iter().enumerate() {
            assert!(!keys[..i].contains(key), "{key:?} appears twice");
        }
        assert_eq!(once.len(), 3);
    }
}
