use std::path::PathBuf;

use anyhow::bail;
use clap::{Args, Parser, Subcommand};
use enum_map::EnumMap;
use log::info;
use roster_scraping::api::RosterClient;
use roster_scraping::clean::clean_file;
use roster_scraping::config::Config;
use roster_scraping::consolidate::consolidate;
use roster_scraping::driver::{enumerate_units, scrape_all, DriverOptions};
use roster_scraping::ledger::ResumeLedger;
use roster_scraping::school_index::{fetch_schools, write_schools};
use roster_scraping::schema::{School, Season, Sport};
use roster_scraping::table::TableWriter;
use roster_scraping_utils::fs_util::{read_csv, read_toml};

#[derive(Parser)]
#[command(version, about = "Scrapes NCAA team rosters into CSV tables")]
struct Opts {
    #[command(subcommand)]
    sub: Sub,
}

#[derive(Subcommand)]
enum Sub {
    /// Scrapes every (school, season, sport) not yet completed into a raw table.
    Scrape(Scrape),
    /// Concatenates raw tables into one master raw table.
    Consolidate(Consolidate),
    /// Normalizes a master raw table and removes duplicate players.
    Clean(Clean),
    /// Writes the school file of one sport and season from the site's index.
    Schools(Schools),
}

#[derive(Args)]
struct Scrape {
    /// School file of men's basketball.
    #[arg(long)]
    mbb: Option<PathBuf>,
    /// School file of women's basketball.
    #[arg(long)]
    wbb: Option<PathBuf>,
    /// School file of football.
    #[arg(long)]
    football: Option<PathBuf>,
    /// Raw table to append to. Its marker log lives next to it.
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    config: Option<PathBuf>,
    /// Seasons to scrape, as `2021` or `2020-21`. Overrides the config file.
    #[arg(long = "season")]
    seasons: Vec<Season>,
    #[arg(long)]
    max_attempts: Option<u32>,
    /// Seconds to wait after each unit.
    #[arg(long)]
    request_delay: Option<f64>,
    /// Seconds of the linear backoff between retries.
    #[arg(long)]
    retry_delay: Option<f64>,
}

#[derive(Args)]
struct Consolidate {
    #[arg(long)]
    out: PathBuf,
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

#[derive(Args)]
struct Clean {
    #[arg(long, default_value = "data/master_raw.csv")]
    raw: PathBuf,
    #[arg(long, default_value = "data/master_clean.csv")]
    out: PathBuf,
}

#[derive(Args)]
struct Schools {
    #[arg(long, value_enum)]
    sport: Sport,
    #[arg(long)]
    season: Season,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let opts = Opts::parse();

    match opts.sub {
        Sub::Scrape(sub) => scrape(sub).await?,
        Sub::Consolidate(sub) => {
            let rows = consolidate(&sub.inputs, &sub.out)?;
            println!("{rows} rows written to {:?}", sub.out);
        }
        Sub::Clean(sub) => {
            let rows = clean_file(&sub.raw, &sub.out)?;
            println!("{rows} rows written to {:?}", sub.out);
        }
        Sub::Schools(sub) => {
            let config = load_config(sub.config)?;
            let client = RosterClient::new(&config)?;
            let schools = fetch_schools(&client, sub.sport, sub.season).await?;
            write_schools(&sub.out, &schools)?;
            println!("{} schools written to {:?}", schools.len(), sub.out);
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => read_toml(path),
        None => Ok(Config::default()),
    }
}

async fn scrape(sub: Scrape) -> anyhow::Result<()> {
    let mut config = load_config(sub.config)?;
    if !sub.seasons.is_empty() {
        config.seasons = sub.seasons;
    }
    if let Some(max_attempts) = sub.max_attempts {
        config.max_attempts = max_attempts;
    }
    if let Some(request_delay) = sub.request_delay {
        config.request_delay_secs = request_delay;
    }
    if let Some(retry_delay) = sub.retry_delay {
        config.retry_delay_secs = retry_delay;
    }
    let options = DriverOptions::try_from(&config)?;

    let mut schools = EnumMap::<Sport, Vec<School>>::default();
    let files = [
        (Sport::MensBasketball, sub.mbb),
        (Sport::WomensBasketball, sub.wbb),
        (Sport::Football, sub.football),
    ];
    let mut given = 0;
    for (sport, path) in files {
        if let Some(path) = path {
            schools[sport] = read_csv(&path)?;
            info!("{} schools of {sport} loaded from {path:?}", schools[sport].len());
            given += 1;
        }
    }
    if given == 0 {
        bail!("At least one of --mbb, --wbb and --football is required");
    }

    let units = enumerate_units(&schools, &config.seasons);
    let mut table = TableWriter::append(&sub.out)?;
    let mut ledger = ResumeLedger::open(&sub.out)?;
    info!(
        "{} units to consider, {} already completed according to {:?}",
        units.len(),
        ledger.len(),
        ledger.path()
    );
    let mut client = RosterClient::new(&config)?;
    let summary = scrape_all(
        &mut client,
        units,
        &mut ledger,
        &mut table,
        &options,
    )
    .await?;
    print!("{summary}");
    Ok(())
}
