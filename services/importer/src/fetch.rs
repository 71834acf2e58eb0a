//! Upstream fetcher with exponential-backoff retries.
//!
//! Files live at `<base_url>/<parameter>/date/<region>.txt`. The Met Office
//! server sometimes answers 404 while still sending the full file, so a 404
//! with a substantial body is accepted as content.

use std::time::Duration;

use metrics::counter;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::DEFAULT_BASE_URL;
use crate::metrics::{FETCH_ATTEMPTS_TOTAL, FETCH_FAILURES_TOTAL};

/// Errors from fetching a series file.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },

    #[error("Failed to fetch {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: Box<FetchError>,
    },
}

/// Configuration for the fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub base_url: String,
    /// Total attempts, including the first. Zero is treated as one.
    pub max_retries: u32,
    /// Delay after the first failed attempt (doubles each retry)
    pub retry_delay: Duration,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub min_fallback_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            min_fallback_bytes: 100,
        }
    }
}

/// Delay before the attempt following failed attempt `failed_attempt` (1-based).
pub fn backoff_delay(base: Duration, failed_attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(failed_attempt.saturating_sub(1));
    base.saturating_mul(factor)
}

/// Fetches Met Office series files over HTTP.
#[derive(Debug, Clone)]
pub struct MetOfficeFetcher {
    client: Client,
    config: FetchConfig,
}

impl MetOfficeFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// URL of the series file for a parameter/region pair.
    pub fn url_for(&self, parameter_code: &str, region_code: &str) -> String {
        format!(
            "{}/{}/date/{}.txt",
            self.config.base_url.trim_end_matches('/'),
            parameter_code,
            region_code
        )
    }

    /// Fetch the raw text of a series file, retrying with exponential backoff.
    #[instrument(skip(self))]
    pub async fn fetch(&self, parameter_code: &str, region_code: &str) -> Result<String, FetchError> {
        let url = self.url_for(parameter_code, region_code);
        let attempts = self.config.max_retries.max(1);
        let mut attempt = 1;

        loop {
            counter!(FETCH_ATTEMPTS_TOTAL).increment(1);
            debug!(url = %url, attempt = attempt, max_attempts = attempts, "Fetching series file");

            match self.try_fetch(&url).await {
                Ok(body) => {
                    info!(url = %url, bytes = body.len(), attempt = attempt, "Fetched series file");
                    return Ok(body);
                }
                Err(e) if attempt >= attempts => {
                    counter!(FETCH_FAILURES_TOTAL).increment(1);
                    warn!(url = %url, error = %e, attempts = attempts, "Giving up on series file");
                    return Err(FetchError::Exhausted {
                        url,
                        attempts,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    counter!(FETCH_FAILURES_TOTAL).increment(1);
                    let delay = backoff_delay(self.config.retry_delay, attempt);
                    warn!(
                        url = %url,
                        error = %e,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn try_fetch(&self, url: &str) -> Result<String, FetchError> {
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status();

        if status.is_success() {
            return response.text().await.map_err(transport);
        }

        if status == StatusCode::NOT_FOUND {
            let body = response.text().await.map_err(transport)?;
            if body.len() > self.config.min_fallback_bytes {
                warn!(url = %url, bytes = body.len(), "Got 404 with content, using body");
                return Ok(body);
            }
            debug!(url = %url, bytes = body.len(), "Got 404 without usable content");
        }

        Err(FetchError::Status {
            url: url.to_string(),
            status,
        })
    }
}
