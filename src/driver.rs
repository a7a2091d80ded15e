use std::fmt::Display;
use std::time::Duration;

use enum_map::EnumMap;
use getset::CopyGetters;
use itertools::iproduct;
use log::{debug, error, info, trace, warn};
use scraper::Html;
use strum::IntoEnumIterator;
use thiserror::Error;
use tokio::time::sleep;
use typed_builder::TypedBuilder;

use crate::api::{FetchError, FetchedPage, PageSource};
use crate::config::Config;
use crate::ledger::ResumeLedger;
use crate::roster_parser::{self, ExtractError};
use crate::schema::{PlayerRecord, School, Season, Sport, WorkUnit};
use crate::table::TableWriter;

#[derive(Clone, Debug, TypedBuilder, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct DriverOptions {
    /// Total number of tries per unit, the first one included.
    #[builder(default = 3)]
    max_attempts: u32,
    /// The n-th retry waits `retry_delay * n`.
    #[builder(default = Duration::from_secs(3))]
    retry_delay: Duration,
    /// Pause after every unit that touched the network.
    #[builder(default = Duration::from_secs(3))]
    request_delay: Duration,
}
impl TryFrom<&Config> for DriverOptions {
    type Error = anyhow::Error;

    fn try_from(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            max_attempts: config.max_attempts.max(1),
            retry_delay: config.retry_delay()?,
            request_delay: config.request_delay()?,
        })
    }
}

#[derive(Debug, Error)]
pub enum UnitError {
    #[error("Giving up after {attempts} attempt(s): {source}")]
    Fetch { attempts: u32, source: FetchError },
    #[error("Unrecognized page layout: {0}")]
    Layout(#[from] ExtractError),
}

#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct Tally {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub records: usize,
}
impl std::ops::AddAssign for Tally {
    fn add_assign(&mut self, rhs: Self) {
        self.completed += rhs.completed;
        self.failed += rhs.failed;
        self.skipped += rhs.skipped;
        self.records += rhs.records;
    }
}
impl Display for Tally {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} completed, {} failed, {} skipped, {} records written",
            self.completed, self.failed, self.skipped, self.records
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub per_sport: EnumMap<Sport, Tally>,
}
impl RunSummary {
    pub fn total(&self) -> Tally {
        let mut total = Tally::default();
        for tally in self.per_sport.values() {
            total += *tally;
        }
        total
    }
}
impl Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Units: {}", self.total())?;
        for (sport, tally) in &self.per_sport {
            if *tally != Tally::default() {
                writeln!(f, "  {sport}: {tally}")?;
            }
        }
        Ok(())
    }
}

/// Lists the units of a run: sport in declared order, then season, then school in file order.
pub fn enumerate_units(schools: &EnumMap<Sport, Vec<School>>, seasons: &[Season]) -> Vec<WorkUnit> {
    let mut seasons = seasons.to_vec();
    seasons.sort_unstable();
    seasons.dedup();
    Sport::iter()
        .flat_map(|sport| {
            iproduct!(seasons.iter().copied(), schools[sport].iter())
                .map(move |(season, school)| WorkUnit::new(school.clone(), season, sport))
        })
        .collect()
}

/// Scrapes every unit not yet in `ledger`, appending the players to `table`.
///
/// Failures of single units are logged and counted; only I/O errors on the
/// table or the ledger abort the run.
pub async fn scrape_all<S: PageSource>(
    source: &mut S,
    units: impl IntoIterator<Item = WorkUnit>,
    ledger: &mut ResumeLedger,
    table: &mut TableWriter,
    options: &DriverOptions,
) -> anyhow::Result<RunSummary> {
    let mut summary = RunSummary::default();
    for unit in units {
        let key = unit.key();
        let tally = &mut summary.per_sport[unit.sport()];
        if ledger.is_done(&key) {
            trace!("Skipping {key}");
            tally.skipped += 1;
            continue;
        }

        debug!("Fetching {key}...");
        match scrape_unit(source, &unit, options).await {
            Ok(records) => {
                table.write_records(&records)?;
                table.commit()?;
                ledger.mark_done(key.clone())?;
                info!("  {key}: {} players", records.len());
                tally.completed += 1;
                tally.records += records.len();
            }
            Err(e) => {
                error!("  {key} failed: {e}");
                tally.failed += 1;
            }
        }
        sleep(options.request_delay).await;
    }
    info!("Finished. {}", summary.total());
    Ok(summary)
}

/// Fetches and extracts one unit, retrying transient failures with a linear backoff.
pub async fn scrape_unit<S: PageSource>(
    source: &mut S,
    unit: &WorkUnit,
    options: &DriverOptions,
) -> Result<Vec<PlayerRecord>, UnitError> {
    let mut attempt = 1;
    loop {
        match source.fetch(unit).await {
            Ok(page) => return Ok(extract(&page, unit)?),
            Err(e) if e.is_transient() && attempt < options.max_attempts => {
                let delay = backoff(options.retry_delay, attempt);
                warn!(
                    "  {} attempt {attempt}/{} failed: {e}; retrying in {delay:?}",
                    unit.key(),
                    options.max_attempts
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(UnitError::Fetch {
                    attempts: attempt,
                    source: e,
                })
            }
        }
    }
}

/// Wait before the retry following the `attempt`-th failure.
fn backoff(retry_delay: Duration, attempt: u32) -> Duration {
    retry_delay.saturating_mul(attempt)
}

fn extract(page: &FetchedPage, unit: &WorkUnit) -> Result<Vec<PlayerRecord>, ExtractError> {
    match page {
        FetchedPage::Found(body) => roster_parser::parse(&Html::parse_document(body), unit),
        FetchedPage::Missing => {
            debug!("No page for {}; the school fielded no team", unit.key());
            Ok(vec![])
        }
    }
}
