use std::time::Duration;

use chrono::Utc;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::redirect;
use tracing::{info, instrument, warn};

use crate::error::{Result, ScrapeError};
use crate::model::{PlayerIdentity, PlayerRecord, Region};
use crate::scraper::{self, profile};

/// op.gg summoner profile root; region and summoner name are appended.
pub const DEFAULT_BASE_URL: &str = "https://www.op.gg/lol/summoners";
/// Per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
/// Pause between consecutive profile fetches in a batch.
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(3);
const MAX_REDIRECTS: usize = 5;
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// The main entry point for scraping op.gg.
///
/// `OpggClient` wraps a [`reqwest::Client`] and turns every profile fetch
/// into a [`PlayerRecord`], whether or not the fetch succeeded.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> lol_leaderboard::Result<()> {
/// use lol_leaderboard::{OpggClient, PlayerIdentity, Region};
///
/// let client = OpggClient::new(Region::Euw)?;
/// let record = client.scrape_player(&PlayerIdentity::new("Faker-KR1")).await;
/// println!("{} is {}", record.identity.summoner_name, record.rank());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct OpggClient {
    http: reqwest::Client,
    base_url: String,
    region: Region,
    request_delay: Duration,
}

impl OpggClient {
    /// Create a client with the default timeout, headers and base URL.
    pub fn new(region: Region) -> Result<Self> {
        Ok(Self::with_client(build_http_client(DEFAULT_TIMEOUT)?, region))
    }

    /// Create a client using the provided [`reqwest::Client`].
    ///
    /// Use this when you need different timeouts, proxies, headers, etc.
    pub fn with_client(client: reqwest::Client, region: Region) -> Self {
        Self {
            http: client,
            base_url: DEFAULT_BASE_URL.to_string(),
            region,
            request_delay: DEFAULT_REQUEST_DELAY,
        }
    }

    /// Point the client at another host, e.g. a local mock server.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Change the pause inserted between fetches in [`OpggClient::scrape_players`].
    pub fn request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn region(&self) -> Region {
        self.region
    }

    /// Profile URL for a summoner, with the name percent-encoded as a path segment.
    pub fn profile_url(&self, summoner_name: &str) -> Result<String> {
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| ScrapeError::InvalidUrl {
            base: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        url.path_segments_mut()
            .map_err(|()| ScrapeError::InvalidUrl {
                base: self.base_url.clone(),
                reason: "url cannot have path segments".to_string(),
            })?
            .pop_if_empty()
            .push(&self.region.to_string())
            .push(summoner_name);
        Ok(url.to_string())
    }

    /// Fetch and parse one profile.
    ///
    /// Never fails: network errors, timeouts and non-2xx responses produce a
    /// failed record carrying the error description.
    #[instrument(skip(self, identity), fields(summoner = %identity.summoner_name))]
    pub async fn scrape_player(&self, identity: &PlayerIdentity) -> PlayerRecord {
        let url = match self.profile_url(&identity.summoner_name) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "cannot build profile url");
                return PlayerRecord::failed(
                    identity.clone(),
                    self.base_url.clone(),
                    Utc::now(),
                    e.to_string(),
                );
            }
        };

        match scraper::get_page(&self.http, &url).await {
            Ok(body) => {
                let captured_at = Utc::now();
                let profile = profile::extract_profile(&body, captured_at);
                info!(matches = profile.recent_matches.len(), "scraped profile");
                PlayerRecord::scraped(identity.clone(), url, captured_at, profile)
            }
            Err(e) => {
                warn!(error = %e, "failed to scrape profile");
                PlayerRecord::failed(identity.clone(), url, Utc::now(), e.to_string())
            }
        }
    }

    /// Scrape every identity in order, one at a time, pausing between requests.
    ///
    /// The returned records line up with `identities`; a failed fetch yields a
    /// failed record and does not stop the batch.
    #[instrument(skip(self, identities), fields(count = identities.len()))]
    pub async fn scrape_players(&self, identities: &[PlayerIdentity]) -> Vec<PlayerRecord> {
        let total = identities.len();
        let mut records = Vec::with_capacity(total);

        for (index, identity) in identities.iter().enumerate() {
            info!(
                progress = index + 1,
                total,
                summoner = %identity.summoner_name,
                "scraping player"
            );
            records.push(self.scrape_player(identity).await);

            if index + 1 < total && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }
        }

        let failed = records.iter().filter(|r| r.is_failed()).count();
        info!(total, failed, "batch scrape complete");
        records
    }
}

/// Build the HTTP client used for profile fetches: bounded timeout and
/// redirects, plus browser-like headers so the site serves the normal page.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.5"),
    );

    reqwest::Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .default_headers(headers)
        .timeout(timeout)
        .redirect(redirect::Policy::limited(MAX_REDIRECTS))
        .build()
        .map_err(ScrapeError::ClientBuild)
}
