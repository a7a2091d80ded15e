use std::time::Duration;

use log::{debug, info, warn};
use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

use crate::config::Config;
use crate::schema::WorkUnit;

/// Body of a successfully fetched page.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum FetchedPage {
    Found(String),
    /// The site has no page for this unit (HTTP 404).
    Missing,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Rate limited by the server")]
    RateLimited,
    #[error("Unexpected status code: server returned {0}")]
    Status(StatusCode),
    #[error("Could not build the page URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
}
impl FetchError {
    /// Whether trying the same request again later may succeed.
    pub fn is_transient(&self) -> bool {
        use FetchError::*;
        match self {
            RateLimited => true,
            Status(status) => status.is_server_error() || *status == StatusCode::REQUEST_TIMEOUT,
            Url(_) => false,
            Request(e) => !(e.is_builder() || e.is_redirect() || e.is_status()),
        }
    }
}

/// Something that can hand out the page of a work unit.
#[allow(async_fn_in_trait)]
pub trait PageSource {
    async fn fetch(&mut self, unit: &WorkUnit) -> Result<FetchedPage, FetchError>;
}

/// Fetches roster pages over HTTP, rotating through proxies when rate limited.
pub struct RosterClient {
    client: reqwest::Client,
    base_url: Url,
    user_agent: String,
    timeout: Duration,
    proxies: Vec<Url>,
    proxy_idx: usize,
}

impl RosterClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let mut res = Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            user_agent: config.user_agent.clone(),
            timeout: config.timeout(),
            proxies: config.proxies.clone(),
            proxy_idx: 0,
        };
        res.client = res.build_client()?;
        Ok(res)
    }

    fn build_client(&self) -> reqwest::Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .timeout(self.timeout);
        if let Some(proxy) = self.proxies.get(self.proxy_idx) {
            debug!("Using proxy {proxy}");
            builder = builder.proxy(reqwest::Proxy::all(proxy.as_str())?);
        }
        builder.build()
    }

    /// Switches to the next configured proxy, if there is more than one.
    fn rotate_proxy(&mut self) -> reqwest::Result<()> {
        if self.proxies.len() < 2 {
            return Ok(());
        }
        self.proxy_idx = (self.proxy_idx + 1) % self.proxies.len();
        info!("Rotating to proxy #{}", self.proxy_idx);
        self.client = self.build_client()?;
        Ok(())
    }

    pub fn url_for(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path)
    }

    pub async fn get_page(&self, url: Url) -> Result<FetchedPage, FetchError> {
        debug!("GET {url}");
        let response = self.client.get(url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => return Ok(FetchedPage::Missing),
            StatusCode::TOO_MANY_REQUESTS => return Err(FetchError::RateLimited),
            status if !status.is_success() => return Err(FetchError::Status(status)),
            _ => {}
        }
        let body = response.text().await?;
        // The site sometimes answers 200 with a rate limit notice.
        if body.contains("Too Many Requests") {
            return Err(FetchError::RateLimited);
        }
        Ok(FetchedPage::Found(body))
    }
}

impl PageSource for RosterClient {
    async fn fetch(&mut self, unit: &WorkUnit) -> Result<FetchedPage, FetchError> {
        let path = unit
            .sport()
            .roster_path(unit.school().school_slug(), unit.season());
        let url = self.url_for(&path)?;
        let res = self.get_page(url).await;
        if matches!(res, Err(FetchError::RateLimited)) {
            if let Err(e) = self.rotate_proxy() {
                warn!("Could not switch proxies: {e}");
            }
        }
        res
    }
}
