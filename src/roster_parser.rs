use enum_map::EnumMap;
use itertools::Itertools;
use log::{debug, trace};
use roster_scraping_utils::selector;
use scraper::{ElementRef, Html};
use thiserror::Error;

use crate::schema::{PlayerRecord, RosterField, WorkUnit};

/// The page had a roster, but not one we can read.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("The roster has no player column (headers: {0:?})")]
    NoPlayerColumn(Vec<String>),
    #[error("The roster table has no header row")]
    NoHeaderRow,
    #[error("The CSV export could not be read: {0}")]
    Csv(#[from] csv::Error),
}

/// Extracts every player row of a roster page.
///
/// A page without any roster container means the school fielded no team,
/// which yields an empty list rather than an error.
pub fn parse(html: &Html, unit: &WorkUnit) -> Result<Vec<PlayerRecord>, ExtractError> {
    if let Some(table) = html.select(selector!("table#roster")).next() {
        return parse_table(table, unit);
    }
    // Secondary tables are shipped inside HTML comments and revealed by scripts.
    if let Some(commented) = find_commented_roster(html) {
        let fragment = Html::parse_fragment(&commented);
        if let Some(table) = fragment.select(selector!("table#roster")).next() {
            trace!("Roster table of {} found in a comment", unit.key());
            return parse_table(table, unit);
        }
    }
    for pre in html.select(selector!("pre")) {
        let text = pre.text().collect::<String>();
        if is_roster_export(&text) {
            return parse_csv_export(&text, unit);
        }
    }
    debug!("No roster container on the page of {}", unit.key());
    Ok(vec![])
}

fn find_commented_roster(html: &Html) -> Option<String> {
    html.tree
        .root()
        .descendants()
        .filter_map(|node| node.value().as_comment())
        .find(|comment| comment.contains(r#"id="roster""#))
        .map(|comment| String::from(&**comment))
}

/// Whether a `<pre>` block holds a CSV export, i.e. its first line names a roster column.
fn is_roster_export(text: &str) -> bool {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .is_some_and(|header| header.split(',').any(|label| field_for_header(label).is_some()))
}

/// Maps a column label of the roster (header text or `data-stat`) to a field.
pub fn field_for_header(label: &str) -> Option<RosterField> {
    use RosterField::*;
    let label = label.trim().to_ascii_lowercase();
    Some(match label.as_str() {
        "player" | "name" => PlayerName,
        "#" | "no" | "no." | "number" | "uniform_number" => Number,
        "pos" | "position" => Position,
        "class" | "cl" | "yr" | "year" | "class_year" => ClassYear,
        "height" | "ht" => Height,
        "weight" | "wt" => Weight,
        "hometown" | "home town" => Hometown,
        "high school" | "high_school" | "hs" | "high school (previous school)" => HighSchool,
        _ => return None,
    })
}

/// Assigns each column a field; a field claimed twice keeps its first column.
fn map_columns<'a>(
    labels: impl IntoIterator<Item = Option<RosterField>>,
    headers: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<Option<RosterField>>, ExtractError> {
    let mut seen = EnumMap::<RosterField, bool>::default();
    let mapping = labels
        .into_iter()
        .map(|field| {
            let field = field?;
            (!std::mem::replace(&mut seen[field], true)).then_some(field)
        })
        .collect_vec();
    if !seen[RosterField::PlayerName] {
        return Err(ExtractError::NoPlayerColumn(
            headers.into_iter().map(str::to_owned).collect(),
        ));
    }
    Ok(mapping)
}

/// Builds a record from the cells of one row, or `None` for rows that carry no player.
fn make_record<'a>(
    unit: &WorkUnit,
    mapping: &[Option<RosterField>],
    cells: impl IntoIterator<Item = &'a str>,
) -> Option<PlayerRecord> {
    let mut fields = EnumMap::<RosterField, String>::default();
    for (cell, field) in cells.into_iter().zip(mapping) {
        if let Some(field) = *field {
            fields[field] = cell.split_whitespace().join(" ");
        }
    }
    let name = &fields[RosterField::PlayerName];
    // Long rosters repeat the header row every so often.
    if name.is_empty() || field_for_header(name) == Some(RosterField::PlayerName) {
        return None;
    }
    Some(PlayerRecord::new(unit, fields))
}

fn parse_table(table: ElementRef, unit: &WorkUnit) -> Result<Vec<PlayerRecord>, ExtractError> {
    let header_row = table
        .select(selector!("thead tr"))
        .last()
        .ok_or(ExtractError::NoHeaderRow)?;
    let header_cells = header_row.select(selector!("th, td")).collect_vec();
    let header_texts = header_cells
        .iter()
        .map(|cell| cell.text().collect::<String>().trim().to_owned())
        .collect_vec();
    let labels = header_cells.iter().zip(&header_texts).map(|(cell, text)| {
        field_for_header(text).or_else(|| cell.value().attr("data-stat").and_then(field_for_header))
    });
    let mapping = map_columns(labels, header_texts.iter().map(String::as_str))?;

    let records = table
        .select(selector!("tbody tr"))
        .filter(|row| !row.value().has_class("thead", scraper::CaseSensitivity::AsciiCaseInsensitive))
        .filter_map(|row| {
            let cells = row
                .select(selector!("th, td"))
                .map(|cell| cell.text().collect::<String>())
                .collect_vec();
            make_record(unit, &mapping, cells.iter().map(String::as_str))
        })
        .collect_vec();
    debug!("{} players found for {}", records.len(), unit.key());
    Ok(records)
}

/// Reads the site's CSV export, as shown in a `<pre>` block.
pub fn parse_csv_export(text: &str, unit: &WorkUnit) -> Result<Vec<PlayerRecord>, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.trim().as_bytes());
    let headers = reader.headers()?.clone();
    let mapping = map_columns(headers.iter().map(field_for_header), headers.iter())?;
    let mut records = vec![];
    for row in reader.records() {
        if let Some(record) = make_record(unit, &mapping, row?.iter()) {
            records.push(record);
        }
    }
    debug!("{} players found in the CSV export for {}", records.len(), unit.key());
    Ok(records)
}
