use std::collections::{HashMap, VecDeque};
use std::path::Path;

use enum_map::enum_map;
use itertools::Itertools;
use reqwest::StatusCode;
use roster_scraping::api::{FetchError, FetchedPage, PageSource};
use roster_scraping::driver::{enumerate_units, scrape_all, DriverOptions, RunSummary};
use roster_scraping::ledger::ResumeLedger;
use roster_scraping::schema::{School, Season, Sport, WorkUnit};
use roster_scraping::table::{read_table, Column, TableWriter};

enum Reply {
    Roster(Vec<&'static str>),
    Missing,
    RateLimited,
    Unavailable,
    Forbidden,
    Unreadable,
}

/// Serves scripted replies per unit, then a one-player roster named after the school.
#[derive(Default)]
struct ScriptedSource {
    script: HashMap<String, VecDeque<Reply>>,
    fetches: HashMap<String, usize>,
}
impl ScriptedSource {
    fn script(mut self, key: &str, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.script.insert(key.to_owned(), replies.into_iter().collect());
        self
    }

    fn fetches(&self, key: &str) -> usize {
        self.fetches.get(key).copied().unwrap_or(0)
    }
}
impl PageSource for ScriptedSource {
    async fn fetch(&mut self, unit: &WorkUnit) -> Result<FetchedPage, FetchError> {
        let key = unit.key().to_string();
        *self.fetches.entry(key.clone()).or_default() += 1;
        let reply = self.script.get_mut(&key).and_then(VecDeque::pop_front);
        match reply {
            None => Ok(FetchedPage::Found(roster(&[&format!(
                "{} Star",
                unit.school().school_name()
            )]))),
            Some(Reply::Roster(players)) => Ok(FetchedPage::Found(roster(&players))),
            Some(Reply::Missing) => Ok(FetchedPage::Missing),
            Some(Reply::RateLimited) => Err(FetchError::RateLimited),
            Some(Reply::Unavailable) => Err(FetchError::Status(StatusCode::SERVICE_UNAVAILABLE)),
            Some(Reply::Forbidden) => Err(FetchError::Status(StatusCode::FORBIDDEN)),
            Some(Reply::Unreadable) => Ok(FetchedPage::Found(
                r#"<table id="roster"><thead><tr><th>Foo</th></tr></thead></table>"#.to_owned(),
            )),
        }
    }
}

fn roster<S: AsRef<str>>(players: &[S]) -> String {
    let rows = players
        .iter()
        .map(|player| format!("<tr><th>{}</th><td>G</td></tr>", player.as_ref()))
        .join("\n");
    format!(
        r#"<html><body><table id="roster"><thead><tr><th>Player</th><th>Pos</th></tr></thead>
<tbody>{rows}</tbody></table></body></html>"#
    )
}

fn school(slug: &str) -> School {
    School::builder()
        .school_slug(slug.to_owned().into())
        .school_name(slug.to_uppercase().into())
        .conference("ACC".to_owned().into())
        .build()
}

fn units() -> Vec<WorkUnit> {
    let schools = enum_map! {
        Sport::MensBasketball => vec![school("duke"), school("unc")],
        Sport::WomensBasketball => vec![school("uconn")],
        Sport::Football => vec![school("clemson")],
    };
    enumerate_units(&schools, &[Season::new(2018), Season::new(2019)])
}

fn options() -> DriverOptions {
    DriverOptions::builder()
        .max_attempts(3)
        .retry_delay(Default::default())
        .request_delay(Default::default())
        .build()
}

async fn run(
    source: &mut ScriptedSource,
    raw: &Path,
    units: impl IntoIterator<Item = WorkUnit>,
) -> RunSummary {
    let mut table = TableWriter::append(raw).unwrap();
    let mut ledger = ResumeLedger::open(raw).unwrap();
    scrape_all(source, units, &mut ledger, &mut table, &options())
        .await
        .unwrap()
}

fn players(raw: &Path) -> Vec<String> {
    read_table(raw)
        .unwrap()
        .iter()
        .map(|row| {
            format!(
                "{}/{}/{}/{}",
                row[Column::SchoolSlug],
                row[Column::Season],
                row[Column::Sport],
                row[Column::PlayerName]
            )
        })
        .collect()
}

#[tokio::test(flavor = "current_thread")]
async fn resume_matches_uninterrupted_run() {
    let dir = tempfile::tempdir().unwrap();

    let full = dir.path().join("full/raw.csv");
    let summary = run(&mut ScriptedSource::default(), &full, units()).await;
    assert_eq!(summary.total().completed, 8);
    assert_eq!(summary.total().records, 8);

    let resumed = dir.path().join("resumed/raw.csv");
    let mut source = ScriptedSource::default();
    run(&mut source, &resumed, units().into_iter().take(3)).await;
    let summary = run(&mut source, &resumed, units()).await;
    assert_eq!(summary.total().skipped, 3);
    assert_eq!(summary.total().completed, 5);
    assert_eq!(summary.per_sport[Sport::MensBasketball].skipped, 3);

    assert_eq!(players(&resumed), players(&full));
    for unit in units() {
        assert_eq!(source.fetches(&unit.key().to_string()), 1, "{}", unit.key());
    }
}

#[tokio::test(flavor = "current_thread")]
async fn transient_failures_are_retried() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("raw.csv");
    let mut source = ScriptedSource::default()
        .script(
            "duke/2017-18/mbb",
            [
                Reply::RateLimited,
                Reply::Unavailable,
                Reply::Roster(vec!["John Smith", "Jack Doe"]),
            ],
        )
        .script(
            "unc/2017-18/mbb",
            [Reply::Unavailable, Reply::Unavailable, Reply::Unavailable],
        );
    let summary = run(&mut source, &raw, units().into_iter().take(2)).await;

    assert_eq!(source.fetches("duke/2017-18/mbb"), 3);
    assert_eq!(source.fetches("unc/2017-18/mbb"), 3);
    let tally = summary.per_sport[Sport::MensBasketball];
    assert_eq!((tally.completed, tally.failed, tally.records), (1, 1, 2));
    assert_eq!(
        players(&raw),
        ["duke/2018/mbb/John Smith", "duke/2018/mbb/Jack Doe"]
    );

    // The failed unit is picked up by the next run, the completed one is not fetched again.
    let summary = run(&mut source, &raw, units().into_iter().take(2)).await;
    assert_eq!(summary.total().skipped, 1);
    assert_eq!(summary.total().completed, 1);
    assert_eq!(source.fetches("duke/2017-18/mbb"), 3);
    assert_eq!(source.fetches("unc/2017-18/mbb"), 4);
    assert_eq!(players(&raw).len(), 3);
}

#[tokio::test(flavor = "current_thread")]
async fn empty_roster_is_marked_done() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("raw.csv");
    let mut source = ScriptedSource::default()
        .script("uconn/2017-18/wbb", [Reply::Missing])
        .script("uconn/2018-19/wbb", [Reply::Roster(vec![])]);
    let wbb = || {
        units()
            .into_iter()
            .filter(|unit| unit.sport() == Sport::WomensBasketball)
    };

    let summary = run(&mut source, &raw, wbb()).await;
    let tally = summary.per_sport[Sport::WomensBasketball];
    assert_eq!((tally.completed, tally.records), (2, 0));
    assert!(players(&raw).is_empty());

    let summary = run(&mut source, &raw, wbb()).await;
    assert_eq!(summary.total().skipped, 2);
    assert_eq!(source.fetches("uconn/2017-18/wbb"), 1);
    assert_eq!(source.fetches("uconn/2018-19/wbb"), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn permanent_failures_are_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("raw.csv");
    let mut source = ScriptedSource::default()
        .script("clemson/2018/football", [Reply::Forbidden])
        .script("clemson/2019/football", [Reply::Unreadable]);
    let football = || {
        units()
            .into_iter()
            .filter(|unit| unit.sport() == Sport::Football)
    };

    let summary = run(&mut source, &raw, football()).await;
    assert_eq!(summary.total().failed, 2);
    assert_eq!(source.fetches("clemson/2018/football"), 1);
    assert_eq!(source.fetches("clemson/2019/football"), 1);
    assert!(ResumeLedger::open(&raw).unwrap().is_empty());

    // Both succeed once the site behaves.
    let summary = run(&mut source, &raw, football()).await;
    assert_eq!(summary.total().completed, 2);
    assert_eq!(
        players(&raw),
        ["clemson/2018/football/CLEMSON Star", "clemson/2019/football/CLEMSON Star"]
    );
}
