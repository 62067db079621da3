use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::names::normalize_name;

pub type TeamId = i64;

// --- Canonical records ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalTeam {
    pub id: TeamId,
    pub name: String,
    pub conference: Option<String>,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    /// Team logo URL. Doubles as the photo fallback for the team's athletes.
    pub logo_url: Option<String>,
    /// Roster listing page on the team's athletics site.
    pub roster_url: Option<String>,
    /// Derived; recomputed after reconciliation passes that insert or delete.
    pub athlete_count: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalAthlete {
    pub id: Uuid,
    pub team_id: TeamId,
    pub name: String,
    pub photo_url: Option<String>,
    pub profile_url: Option<String>,
    /// e.g. "swimmer", "diver"
    pub role_type: Option<String>,
    pub class_year: Option<String>,
    pub hometown: Option<String>,
}

impl CanonicalAthlete {
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }
}

// --- Scraped (transient) records ---

/// One `<img>`-like reference found on a third-party page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageCandidate {
    /// Absolute URL (resolved against the page URL when possible).
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub alt_text: Option<String>,
    /// Attribute the URL was read from: `src`, `data-src`, `srcset`, ...
    pub source_attribute: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedCandidate {
    pub normalized_name: String,
    pub raw_name: String,
    pub profile_url: Option<String>,
    pub image_candidates: Vec<ImageCandidate>,
    pub class_year: Option<String>,
    pub hometown: Option<String>,
}

impl ScrapedCandidate {
    pub fn new(raw_name: &str, profile_url: Option<String>) -> Self {
        let raw_name = raw_name.split_whitespace().collect::<Vec<_>>().join(" ");
        Self {
            normalized_name: normalize_name(&raw_name),
            raw_name,
            profile_url,
            image_candidates: Vec::new(),
            class_year: None,
            hometown: None,
        }
    }
}

/// A fetched page: final URL plus rendered markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub url: String,
    pub html: String,
}

impl Document {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.html.trim().is_empty()
    }
}

// --- Match decisions ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    Exact,
    Containment,
    TokenOverlap,
    None,
}

impl std::fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfidenceTier::Exact => write!(f, "exact"),
            ConfidenceTier::Containment => write!(f, "containment"),
            ConfidenceTier::TokenOverlap => write!(f, "token_overlap"),
            ConfidenceTier::None => write!(f, "none"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchAction {
    Insert,
    Update,
    Skip,
    FlagAmbiguous,
}

impl std::fmt::Display for MatchAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchAction::Insert => write!(f, "insert"),
            MatchAction::Update => write!(f, "update"),
            MatchAction::Skip => write!(f, "skip"),
            MatchAction::FlagAmbiguous => write!(f, "flag_ambiguous"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchDecision {
    /// Index into the candidate slice the decision was made for.
    pub candidate: usize,
    pub canonical: Option<Uuid>,
    /// Every canonical record involved when `action` is `FlagAmbiguous`.
    pub ambiguous_with: Vec<Uuid>,
    pub tier: ConfidenceTier,
    pub action: MatchAction,
}

// --- Photo resolution ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionTier {
    Selector,
    DomainHeuristic,
    AltText,
    None,
}

impl std::fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionTier::Selector => write!(f, "selector"),
            ResolutionTier::DomainHeuristic => write!(f, "domain_heuristic"),
            ResolutionTier::AltText => write!(f, "alt_text"),
            ResolutionTier::None => write!(f, "none"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoResolution {
    pub url: Option<String>,
    pub tier: ResolutionTier,
    /// Resize parameters were bumped or a proxy reference was unwrapped.
    pub upgraded: bool,
}

impl PhotoResolution {
    pub fn none() -> Self {
        Self {
            url: None,
            tier: ResolutionTier::None,
            upgraded: false,
        }
    }

    pub fn is_none(&self) -> bool {
        self.url.is_none()
    }
}
