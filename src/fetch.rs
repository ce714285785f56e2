//! Page retrieval with browser-like headers and retry on blocks.
//!
//! # Architecture
//!
//! - [`PageSource`]: core trait, "give me the body of this URL"
//! - [`HttpSource`]: one HTTP attempt via `reqwest`, random user agent per call
//! - [`RetryingSource`]: decorator that retries any [`PageSource`] per a [`RetryPolicy`]
//!
//! The production fetcher is `RetryingSource<HttpSource>`; tests swap in
//! fixtures that serve canned HTML.
//!
//! # Retry Strategy
//!
//! - 403 / 429: treated as a block, wait `blocked_backoff × attempt`
//! - connect / timeout / body errors: wait `network_backoff × attempt`
//! - 5xx: fail immediately
//! - anything else (including 404) is returned as-is for the caller to judge

use crate::config::FetchSettings;
use crate::error::FetchError;
use rand::seq::IndexedRandom;
use rand::rng;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, CONNECTION, HeaderMap, HeaderName, HeaderValue,
    USER_AGENT,
};
use reqwest::{Client, StatusCode, redirect};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// Real desktop browser user agents; one is picked per attempt.
pub const BROWSER_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
];

pub fn random_user_agent() -> &'static str {
    BROWSER_USER_AGENTS
        .choose(&mut rng())
        .copied()
        .unwrap_or(BROWSER_USER_AGENTS[0])
}

/// Anything that can turn a URL into page content.
pub trait PageSource: Send + Sync {
    /// Fetch `url`, sending `headers` on top of whatever defaults the source uses.
    fn fetch(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
    ) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// When and how long to wait before trying a failed fetch again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub blocked_backoff: Duration,
    pub network_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &FetchSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            blocked_backoff: Duration::from_millis(settings.blocked_backoff_ms),
            network_backoff: Duration::from_millis(settings.network_backoff_ms),
        }
    }

    /// Delay before the next attempt, or `None` to give up.
    ///
    /// `attempt` is the 1-based number of the attempt that just failed.
    pub fn delay_after(&self, error: &FetchError, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts || !error.is_retryable() {
            return None;
        }
        let base = match error {
            FetchError::Blocked { .. } => self.blocked_backoff,
            _ => self.network_backoff,
        };
        Some(base * attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&FetchSettings::default())
    }
}

/// 403/429 are blocks, 5xx are server errors; anything else hands the body
/// to the caller, 404 included.
pub fn classify_status(url: &str, status: StatusCode) -> Result<(), FetchError> {
    if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
        return Err(FetchError::Blocked {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    if status.is_server_error() {
        return Err(FetchError::Server {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(())
}

/// Single-attempt HTTP fetcher.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new(settings: &FetchSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .redirect(redirect::Policy::limited(settings.max_redirects))
            .build()?;
        Ok(Self { client })
    }

    /// Browser defaults overlaid with the site's own headers.
    fn headers_for(extra: &BTreeMap<String, String>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(random_user_agent()));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("es-MX,es;q=0.9,en;q=0.8"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

        for (name, value) in extra {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!(header = %name, "Skipping invalid site header"),
            }
        }
        headers
    }
}

impl PageSource for HttpSource {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<String, FetchError> {
        let network = |e: reqwest::Error| FetchError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = self
            .client
            .get(url)
            .headers(Self::headers_for(headers))
            .send()
            .await
            .map_err(network)?;

        let status = response.status();
        classify_status(url, status)?;

        let body = response.text().await.map_err(network)?;
        debug!(status = status.as_u16(), bytes = body.len(), "Fetched page");
        Ok(body)
    }
}

/// Wrapper that adds [`RetryPolicy`] handling to any [`PageSource`].
pub struct RetryingSource<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: PageSource> RetryingSource<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

impl<T> fmt::Debug for RetryingSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryingSource")
            .field("policy", &self.policy)
            .finish()
    }
}

impl<T: PageSource> PageSource for RetryingSource<T> {
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<String, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.inner.fetch(url, headers).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    let Some(delay) = self.policy.delay_after(&e, attempt) else {
                        error!(
                            attempt,
                            max = self.policy.max_attempts,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            error = %e,
                            "fetch() giving up"
                        );
                        return Err(e);
                    };
                    warn!(
                        attempt,
                        max = self.policy.max_attempts,
                        ?delay,
                        error = %e,
                        "fetch() attempt failed; backing off"
                    );
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                }
            }
        }
    }
}

/// The production fetcher.
pub type PageFetcher = RetryingSource<HttpSource>;

pub fn page_fetcher(settings: &FetchSettings) -> Result<PageFetcher, reqwest::Error> {
    Ok(RetryingSource::new(
        HttpSource::new(settings)?,
        RetryPolicy::from_settings(settings),
    ))
}
