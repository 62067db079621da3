use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::RosterError;
use crate::names::normalize_name;
use crate::types::TeamId;

/// TOML-backed engine tuning. Every section is optional; missing values fall
/// back to the defaults below. Loaded once per run and shared immutably.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub pacing: PacingConfig,
    pub photo: PhotoConfig,
    pub audit: AuditConfig,
    /// Team id (as a string key) → raw names that must never be inserted
    /// for that team: coaches, staff, athletes from the wrong roster.
    pub exclusions: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Minimum gap between request starts against the same host.
    pub min_host_delay_ms: u64,
    pub fetch_timeout_secs: u64,
    /// Profile pages fetched concurrently within one team.
    pub profile_concurrency: usize,
    pub max_attempts: u32,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_host_delay_ms: 500,
            fetch_timeout_secs: 30,
            profile_concurrency: 1,
            max_attempts: 2,
        }
    }
}

impl PacingConfig {
    pub fn min_host_delay(&self) -> Duration {
        Duration::from_millis(self.min_host_delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PhotoConfig {
    /// Width/height ratio of a typical headshot crop.
    pub ideal_ratio: f64,
    /// Candidates with known geometry outside [min_ratio, max_ratio] are dropped.
    pub min_ratio: f64,
    pub max_ratio: f64,
    /// Images smaller than this on either axis are rejected.
    pub min_dimension: u32,
    /// Width requested when rewriting resize parameters.
    pub upgrade_width: u32,
    /// Score bonus for roster/crop-looking URL paths.
    pub roster_path_boost: f64,
    /// Known headshot containers, tried in order.
    pub headshot_selectors: Vec<String>,
    /// Athletic-media hosts (CDNs, storage buckets, image proxies).
    pub media_hosts: Vec<String>,
    /// Hosts a decoded proxy reference may be substituted with.
    pub direct_storage_hosts: Vec<String>,
    /// Hosts that serve base64 proxy-encoded references.
    pub proxy_hosts: Vec<String>,
    /// Case-insensitive URL substrings that disqualify an image.
    pub reject_markers: Vec<String>,
}

impl Default for PhotoConfig {
    fn default() -> Self {
        Self {
            ideal_ratio: 0.66,
            min_ratio: 0.4,
            max_ratio: 1.1,
            min_dimension: 80,
            upgrade_width: 1200,
            roster_path_boost: 25.0,
            headshot_selectors: strings(&[
                ".sidearm-roster-player-image img",
                ".s-person-details__bio-image img",
                "[data-test-id='s-person-details__bio-image'] img",
                ".roster-bio-photo img",
                ".player-headshot img",
                "img.headshot",
                ".bio-photo img",
                ".roster-photo img",
            ]),
            media_hosts: strings(&[
                "sidearmdev.com",
                "sidearmsports.com",
                "cloudfront.net",
                "storage.googleapis.com",
                "amazonaws.com",
                "prestosports.com",
                "wmt.digital",
                "imgix.net",
                "cloudinary.com",
            ]),
            direct_storage_hosts: strings(&[
                "storage.googleapis.com",
                "amazonaws.com",
                "cloudfront.net",
            ]),
            proxy_hosts: strings(&["images.sidearmdev.com", "imgproxy.wmt.digital"]),
            reject_markers: strings(&[
                "placeholder",
                "default",
                "silhouette",
                "no-image",
                "noimage",
                "no_photo",
                "blank",
                "logo",
                "sponsor",
                "missing",
            ]),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Ad-tracker, dummy-image and unrelated-logo hosts.
    pub deny_hosts: Vec<String>,
    /// URL substrings that mark a tracker pixel or dummy image on any host.
    pub deny_markers: Vec<String>,
    /// Requested sizes below this count as low resolution.
    pub low_res_threshold: u32,
    /// Upload paths known to hold low-quality renditions.
    pub low_quality_paths: Vec<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            deny_hosts: strings(&[
                "doubleclick.net",
                "googlesyndication.com",
                "googleadservices.com",
                "adsrvr.org",
                "facebook.com",
                "placeholder.com",
                "placehold.co",
                "placehold.it",
                "dummyimage.com",
                "logos-world.net",
                "seeklogo.com",
            ]),
            deny_markers: strings(&["spacer.gif", "1x1.gif", "/pixel", "tracking"]),
            low_res_threshold: 200,
            low_quality_paths: strings(&["/thumbnails/", "/thumb/", "_thumb", "/small/"]),
        }
    }
}

impl EngineConfig {
    /// Normalized exclusion names for a team.
    pub fn exclusions_for(&self, team_id: TeamId) -> Vec<String> {
        self.exclusions
            .get(&team_id.to_string())
            .map(|names| names.iter().map(|n| normalize_name(n)).collect())
            .unwrap_or_default()
    }

    pub fn validate(&self) -> std::result::Result<(), RosterError> {
        let p = &self.photo;
        if !(p.min_ratio > 0.0 && p.min_ratio < p.max_ratio) {
            return Err(RosterError::Validation(format!(
                "photo ratio band is empty: min_ratio={} max_ratio={}",
                p.min_ratio, p.max_ratio
            )));
        }
        if !(p.min_ratio..=p.max_ratio).contains(&p.ideal_ratio) {
            return Err(RosterError::Validation(format!(
                "photo.ideal_ratio {} lies outside [{}, {}]",
                p.ideal_ratio, p.min_ratio, p.max_ratio
            )));
        }
        if self.pacing.profile_concurrency == 0 {
            return Err(RosterError::Validation(
                "pacing.profile_concurrency must be at least 1".to_string(),
            ));
        }
        if self.pacing.max_attempts == 0 {
            return Err(RosterError::Validation(
                "pacing.max_attempts must be at least 1".to_string(),
            ));
        }
        for key in self.exclusions.keys() {
            if key.parse::<TeamId>().is_err() {
                return Err(RosterError::Validation(format!(
                    "exclusions key '{key}' is not a team id"
                )));
            }
        }
        Ok(())
    }
}

/// Load and validate a TOML engine config file.
pub fn load_engine_config(path: &Path) -> Result<EngineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: EngineConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config file: {}", path.display()))?;
    Ok(config)
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
