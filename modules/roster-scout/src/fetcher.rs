use std::time::Duration;

use async_trait::async_trait;
use browserless_client::{BrowserlessClient, BrowserlessError, ContentOptions, WaitUntil};
use rand::Rng;
use roster_common::Document;
use thiserror::Error;
use tracing::{info, warn};

/// How long the renderer should wait before handing back the DOM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlePolicy {
    /// Take the document as soon as it loads.
    Immediate,
    /// Wait for network activity to quiet down (client-rendered listings).
    NetworkIdle,
    /// Wait until the CSS selector matches.
    WaitForSelector(String),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("Timed out fetching {url}")]
    Timeout { url: String },

    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout { .. })
    }
}

// --- PageFetcher trait ---

/// Loads a rendered document for a URL. Every error is treated as "no data"
/// by callers; none of them abort a team.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, settle: &SettlePolicy) -> Result<Document, FetchError>;
    fn name(&self) -> &str;
}

fn check_url(url: &str) -> Result<(), FetchError> {
    match url::Url::parse(url) {
        Ok(u) if u.scheme() == "http" || u.scheme() == "https" => Ok(()),
        _ => Err(FetchError::InvalidUrl(url.to_string())),
    }
}

// --- Browserless fetcher ---

/// Base backoff for Browserless retries. Actual delay is base * 3^attempt + jitter.
const RETRY_BASE: Duration = Duration::from_secs(1);

pub struct BrowserlessFetcher {
    client: BrowserlessClient,
    timeout: Duration,
    max_attempts: u32,
}

impl BrowserlessFetcher {
    pub fn new(client: BrowserlessClient, timeout: Duration, max_attempts: u32) -> Self {
        info!(max_attempts, timeout_secs = timeout.as_secs(), "Using BrowserlessFetcher");
        Self {
            client,
            timeout,
            max_attempts: max_attempts.max(1),
        }
    }

    fn options(&self, settle: &SettlePolicy) -> ContentOptions {
        let mut options = ContentOptions {
            timeout: Some(self.timeout),
            ..Default::default()
        };
        match settle {
            SettlePolicy::Immediate => options.wait_until = Some(WaitUntil::DomContentLoaded),
            SettlePolicy::NetworkIdle => options.wait_until = Some(WaitUntil::NetworkIdle2),
            SettlePolicy::WaitForSelector(css) => {
                options.wait_until = Some(WaitUntil::DomContentLoaded);
                options.wait_for_selector = Some(css.clone());
            }
        }
        options
    }
}

fn map_browserless(url: &str, err: BrowserlessError) -> FetchError {
    match err {
        BrowserlessError::Timeout(_) => FetchError::Timeout { url: url.to_string() },
        BrowserlessError::Network(message) => FetchError::Network {
            url: url.to_string(),
            message,
        },
        BrowserlessError::Api { status, .. } => FetchError::Status {
            url: url.to_string(),
            status,
        },
    }
}

#[async_trait]
impl PageFetcher for BrowserlessFetcher {
    async fn fetch(&self, url: &str, settle: &SettlePolicy) -> Result<Document, FetchError> {
        check_url(url)?;
        let options = self.options(settle);

        let mut attempt = 0;
        loop {
            match self.client.content_with(url, &options).await {
                Ok(html) => return Ok(Document::new(url, html)),
                Err(e) if e.is_transient() && attempt + 1 < self.max_attempts => {
                    let backoff = RETRY_BASE * 3u32.pow(attempt);
                    let jitter = Duration::from_millis(rand::rng().random_range(0..500));
                    warn!(
                        url,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Browserless fetch failed, retrying after backoff"
                    );
                    tokio::time::sleep(backoff + jitter).await;
                    attempt += 1;
                }
                Err(e) => return Err(map_browserless(url, e)),
            }
        }
    }

    fn name(&self) -> &str {
        "browserless"
    }
}

// --- Plain HTTP fetcher ---

/// Fetches server-rendered markup without a browser. Settle policies are
/// ignored; client-rendered listings will come back thin.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("roster-scout/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Network {
                url: String::new(),
                message: e.to_string(),
            })?;
        info!("Using HttpFetcher (no JavaScript rendering)");
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, _settle: &SettlePolicy) -> Result<Document, FetchError> {
        check_url(url)?;
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                FetchError::Timeout { url: url.to_string() }
            } else {
                FetchError::Network {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        };

        let resp = self.client.get(url).send().await.map_err(map_err)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let final_url = resp.url().to_string();
        let html = resp.text().await.map_err(map_err)?;
        Ok(Document::new(final_url, html))
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_urls() {
        assert!(check_url("https://gostate.com/roster").is_ok());
        assert!(matches!(check_url("ftp://x.com/a"), Err(FetchError::InvalidUrl(_))));
        assert!(matches!(check_url("/roster"), Err(FetchError::InvalidUrl(_))));
    }

    #[test]
    fn settle_policy_maps_to_render_options() {
        let client = BrowserlessClient::new("http://localhost:3000", None, Duration::from_secs(5)).unwrap();
        let fetcher = BrowserlessFetcher::new(client, Duration::from_secs(20), 2);

        let idle = fetcher.options(&SettlePolicy::NetworkIdle);
        assert_eq!(idle.wait_until, Some(WaitUntil::NetworkIdle2));
        assert_eq!(idle.timeout, Some(Duration::from_secs(20)));

        let sel = fetcher.options(&SettlePolicy::WaitForSelector(".roster".into()));
        assert_eq!(sel.wait_for_selector.as_deref(), Some(".roster"));
    }

    #[test]
    fn browserless_errors_map_to_fetch_errors() {
        let e = map_browserless("https://x.com", BrowserlessError::Timeout("slow".into()));
        assert!(e.is_timeout());
        let e = map_browserless(
            "https://x.com",
            BrowserlessError::Api {
                status: 404,
                message: String::new(),
            },
        );
        assert!(matches!(e, FetchError::Status { status: 404, .. }));
    }
}
