//! Photo-reference audit classifier.
//!
//! Works from the stored URL text alone and never fetches anything. Rules
//! are evaluated top to bottom and the first match wins. Malformed input
//! lands in `KnownBadPattern` rather than erroring.

use roster_common::media::{host_of, host_matches, is_absolute_http, is_proxy_reference, requested_size};
use roster_common::{AuditConfig, EngineConfig};

use crate::types::PhotoCategory;

#[derive(Debug, Clone)]
pub struct PhotoClassifier {
    audit: AuditConfig,
    proxy_hosts: Vec<String>,
}

impl PhotoClassifier {
    pub fn new(audit: AuditConfig, proxy_hosts: Vec<String>) -> Self {
        Self { audit, proxy_hosts }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.audit.clone(), config.photo.proxy_hosts.clone())
    }

    pub fn classify(&self, photo: Option<&str>, team_logo: Option<&str>) -> PhotoCategory {
        self.classify_with_note(photo, team_logo).0
    }

    /// Category plus a short human note for the review queue.
    pub fn classify_with_note(
        &self,
        photo: Option<&str>,
        team_logo: Option<&str>,
    ) -> (PhotoCategory, String) {
        let Some(url) = photo.map(str::trim).filter(|u| !u.is_empty()) else {
            return (PhotoCategory::Null, "no photo stored".to_string());
        };

        if team_logo.is_some_and(|logo| same_reference(url, logo)) {
            return (PhotoCategory::TeamLogo, "photo is the team logo".to_string());
        }

        if !is_absolute_http(url) {
            return (
                PhotoCategory::KnownBadPattern,
                "not an absolute http(s) URL".to_string(),
            );
        }
        if let Some(host) = host_of(url).filter(|h| host_matches(h, &self.audit.deny_hosts)) {
            return (
                PhotoCategory::KnownBadPattern,
                format!("host {host} is on the deny list"),
            );
        }
        let lowered = url.to_lowercase();
        if let Some(marker) = self
            .audit
            .deny_markers
            .iter()
            .find(|m| !m.is_empty() && lowered.contains(&m.to_lowercase()))
        {
            return (
                PhotoCategory::KnownBadPattern,
                format!("URL contains deny marker '{marker}'"),
            );
        }

        if let Some(size) = requested_size(url).filter(|s| *s < self.audit.low_res_threshold) {
            return (
                PhotoCategory::LowResolutionMarker,
                format!(
                    "requests {size}px, below {}px",
                    self.audit.low_res_threshold
                ),
            );
        }
        if let Some(path) = self
            .audit
            .low_quality_paths
            .iter()
            .find(|p| !p.is_empty() && lowered.contains(&p.to_lowercase()))
        {
            return (
                PhotoCategory::LowResolutionMarker,
                format!("hosted on low-quality path '{path}'"),
            );
        }

        if is_proxy_reference(url, &self.proxy_hosts) {
            return (
                PhotoCategory::ProxyReference,
                "unresolved proxy-encoded reference".to_string(),
            );
        }

        (PhotoCategory::DirectOk, String::new())
    }
}

/// Equal after trimming, ignoring a trailing slash and ASCII case.
fn same_reference(a: &str, b: &str) -> bool {
    let a = a.trim().trim_end_matches('/');
    let b = b.trim().trim_end_matches('/');
    !b.is_empty() && a.eq_ignore_ascii_case(b)
}
