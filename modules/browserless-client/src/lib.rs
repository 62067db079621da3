pub mod error;

pub use error::{BrowserlessError, Result};

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

/// Navigation milestones understood by Browserless `gotoOptions.waitUntil`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    Load,
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    #[serde(rename = "networkidle0")]
    NetworkIdle0,
    #[serde(rename = "networkidle2")]
    NetworkIdle2,
}

/// Per-request rendering options for `/content`.
#[derive(Debug, Clone, Default)]
pub struct ContentOptions {
    pub wait_until: Option<WaitUntil>,
    /// CSS selector that must be present before the DOM is dumped.
    pub wait_for_selector: Option<String>,
    /// Navigation timeout passed through to the browser.
    pub timeout: Option<Duration>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContentRequest<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    goto_options: Option<GotoOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wait_for_selector: Option<WaitForSelector<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GotoOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    wait_until: Option<WaitUntil>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout: Option<u64>,
}

#[derive(Serialize)]
struct WaitForSelector<'a> {
    selector: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout: Option<u64>,
}

pub struct BrowserlessClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BrowserlessClient {
    pub fn new(base_url: &str, token: Option<&str>, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| BrowserlessError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        })
    }

    /// Fetch fully-rendered HTML for a URL via the Browserless /content endpoint.
    pub async fn content_with(&self, url: &str, options: &ContentOptions) -> Result<String> {
        let mut endpoint = format!("{}/content", self.base_url);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }

        let timeout_ms = options.timeout.map(|t| t.as_millis() as u64);
        let goto_options = if options.wait_until.is_some() || timeout_ms.is_some() {
            Some(GotoOptions {
                wait_until: options.wait_until,
                timeout: timeout_ms,
            })
        } else {
            None
        };
        let body = ContentRequest {
            url,
            goto_options,
            wait_for_selector: options
                .wait_for_selector
                .as_deref()
                .map(|selector| WaitForSelector {
                    selector,
                    timeout: timeout_ms,
                }),
        };

        debug!(url, selector = ?options.wait_for_selector, "Browserless content request");

        let resp = self
            .client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BrowserlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_omits_unset_options() {
        let body = ContentRequest {
            url: "https://example.com/roster",
            goto_options: None,
            wait_for_selector: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "url": "https://example.com/roster" }));
    }

    #[test]
    fn request_body_carries_settle_options() {
        let body = ContentRequest {
            url: "https://example.com/roster",
            goto_options: Some(GotoOptions {
                wait_until: Some(WaitUntil::NetworkIdle2),
                timeout: Some(15_000),
            }),
            wait_for_selector: Some(WaitForSelector {
                selector: ".roster",
                timeout: Some(15_000),
            }),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["gotoOptions"]["waitUntil"], "networkidle2");
        assert_eq!(json["gotoOptions"]["timeout"], 15_000);
        assert_eq!(json["waitForSelector"]["selector"], ".roster");
    }

    #[test]
    fn transient_classification() {
        assert!(BrowserlessError::Network("reset".into()).is_transient());
        assert!(BrowserlessError::Api { status: 503, message: String::new() }.is_transient());
        assert!(BrowserlessError::Api { status: 429, message: String::new() }.is_transient());
        assert!(!BrowserlessError::Api { status: 404, message: String::new() }.is_transient());
    }
}
