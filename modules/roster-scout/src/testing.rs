// Test doubles for the reconciliation pipeline.
//
// MockFetcher stands in for PageFetcher: a URL → HTML map with injectable
// failures and a request log. The builders below make canonical records
// with sensible defaults.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use roster_common::{CanonicalAthlete, CanonicalTeam, Document, TeamId};
use uuid::Uuid;

use crate::fetcher::{FetchError, PageFetcher, SettlePolicy};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// HashMap-based page fetcher. Unregistered URLs fail with a network error.
/// Builder pattern: `.on_page()`, `.failing()`, `.timing_out()`, `.on_fetched()`.
#[derive(Default)]
pub struct MockFetcher {
    pages: HashMap<String, String>,
    failing: HashSet<String>,
    timing_out: HashSet<String>,
    cancel_on: HashMap<String, Arc<AtomicBool>>,
    hooks: HashMap<String, Box<dyn Fn() + Send + Sync>>,
    requests: Mutex<Vec<(String, SettlePolicy)>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    /// Fail `url` with an HTTP 503.
    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    /// Fail `url` with a timeout.
    pub fn timing_out(mut self, url: &str) -> Self {
        self.timing_out.insert(url.to_string());
        self
    }

    /// Raise `flag` when `url` is fetched, as if the operator hit Ctrl-C
    /// while that page was loading.
    pub fn cancel_when_fetched(mut self, url: &str, flag: Arc<AtomicBool>) -> Self {
        self.cancel_on.insert(url.to_string(), flag);
        self
    }

    /// Run `hook` while `url` is loading, e.g. to edit the store mid-pass.
    pub fn on_fetched(mut self, url: &str, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.insert(url.to_string(), Box::new(hook));
        self
    }

    /// Every fetch so far, in order, with the settle policy requested.
    pub fn requests(&self) -> Vec<(String, SettlePolicy)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests.lock().unwrap().iter().filter(|(u, _)| u == url).count()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str, settle: &SettlePolicy) -> Result<Document, FetchError> {
        self.requests.lock().unwrap().push((url.to_string(), settle.clone()));
        if let Some(flag) = self.cancel_on.get(url) {
            flag.store(true, Ordering::SeqCst);
        }
        if let Some(hook) = self.hooks.get(url) {
            hook();
        }

        if self.timing_out.contains(url) {
            return Err(FetchError::Timeout { url: url.to_string() });
        }
        if self.failing.contains(url) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 503,
            });
        }
        self.pages
            .get(url)
            .map(|html| Document::new(url, html.clone()))
            .ok_or_else(|| FetchError::Network {
                url: url.to_string(),
                message: "MockFetcher: no page registered".to_string(),
            })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// Record builders
// ---------------------------------------------------------------------------

pub const TEST_LOGO: &str = "https://gostate.com/images/logos/site/site.png";

pub fn test_team(id: TeamId, name: &str, roster_url: Option<&str>) -> CanonicalTeam {
    CanonicalTeam {
        id,
        name: name.to_string(),
        conference: Some("Big Pool".to_string()),
        primary_color: Some("#8b0000".to_string()),
        secondary_color: None,
        logo_url: Some(TEST_LOGO.to_string()),
        roster_url: roster_url.map(String::from),
        athlete_count: 0,
    }
}

pub fn test_athlete(team_id: TeamId, name: &str, photo: Option<&str>) -> CanonicalAthlete {
    CanonicalAthlete {
        id: Uuid::new_v4(),
        team_id,
        name: name.to_string(),
        photo_url: photo.map(String::from),
        profile_url: None,
        role_type: Some("swimmer".to_string()),
        class_year: None,
        hometown: None,
    }
}
