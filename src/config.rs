use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use url::Url;

use crate::schema::Season;

/// Settings of a scrape run, loaded from an optional TOML file.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub seasons: Vec<Season>,
    /// Total number of tries for one unit, the first one included.
    pub max_attempts: u32,
    /// Base of the linear backoff between tries.
    pub retry_delay_secs: f64,
    /// Pause after every fetched unit.
    pub request_delay_secs: f64,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub base_url: Url,
    pub proxies: Vec<Url>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seasons: Season::defaults(),
            max_attempts: 3,
            retry_delay_secs: 3.0,
            request_delay_secs: 3.0,
            timeout_secs: 30,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_owned(),
            base_url: Url::parse("https://www.sports-reference.com/")
                .expect("the default base URL is valid"),
            proxies: vec![],
        }
    }
}

fn seconds(name: &str, secs: f64) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(secs.max(0.))
        .with_context(|| format!("{name} = {secs} is not a usable number of seconds"))
}

impl Config {
    pub fn retry_delay(&self) -> anyhow::Result<Duration> {
        seconds("retry_delay_secs", self.retry_delay_secs)
    }

    pub fn request_delay(&self) -> anyhow::Result<Duration> {
        seconds("request_delay_secs", self.request_delay_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
