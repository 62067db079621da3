use std::fmt;

use roster_common::TeamId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Quality category of a stored photo reference. Exactly one per athlete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoCategory {
    Null,
    TeamLogo,
    KnownBadPattern,
    LowResolutionMarker,
    ProxyReference,
    DirectOk,
}

impl PhotoCategory {
    /// Categories counted as problematic in rollups. A stored photo in one of
    /// these may be replaced by any better resolution.
    pub fn is_problematic(self) -> bool {
        matches!(
            self,
            Self::Null | Self::TeamLogo | Self::KnownBadPattern | Self::LowResolutionMarker
        )
    }
}

impl fmt::Display for PhotoCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::TeamLogo => write!(f, "team_logo"),
            Self::KnownBadPattern => write!(f, "known_bad_pattern"),
            Self::LowResolutionMarker => write!(f, "low_resolution_marker"),
            Self::ProxyReference => write!(f, "proxy_reference"),
            Self::DirectOk => write!(f, "direct_ok"),
        }
    }
}

/// Every finding category: the photo taxonomy plus the name checks, which
/// are reported independently of the photo finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    Null,
    TeamLogo,
    KnownBadPattern,
    LowResolutionMarker,
    ProxyReference,
    DirectOk,
    DuplicateName,
    ExclusionListed,
}

impl AuditCategory {
    pub fn photo(self) -> Option<PhotoCategory> {
        match self {
            Self::Null => Some(PhotoCategory::Null),
            Self::TeamLogo => Some(PhotoCategory::TeamLogo),
            Self::KnownBadPattern => Some(PhotoCategory::KnownBadPattern),
            Self::LowResolutionMarker => Some(PhotoCategory::LowResolutionMarker),
            Self::ProxyReference => Some(PhotoCategory::ProxyReference),
            Self::DirectOk => Some(PhotoCategory::DirectOk),
            Self::DuplicateName | Self::ExclusionListed => None,
        }
    }

    pub fn is_problematic(self) -> bool {
        self.photo().is_some_and(PhotoCategory::is_problematic)
    }

    /// Whether an operator should look at it. Everything but a clean photo.
    pub fn needs_review(self) -> bool {
        self != Self::DirectOk
    }
}

impl From<PhotoCategory> for AuditCategory {
    fn from(c: PhotoCategory) -> Self {
        match c {
            PhotoCategory::Null => Self::Null,
            PhotoCategory::TeamLogo => Self::TeamLogo,
            PhotoCategory::KnownBadPattern => Self::KnownBadPattern,
            PhotoCategory::LowResolutionMarker => Self::LowResolutionMarker,
            PhotoCategory::ProxyReference => Self::ProxyReference,
            PhotoCategory::DirectOk => Self::DirectOk,
        }
    }
}

impl fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.photo() {
            Some(photo) => photo.fmt(f),
            None if *self == Self::DuplicateName => write!(f, "duplicate_name"),
            None => write!(f, "exclusion_listed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFinding {
    pub athlete_id: Uuid,
    pub team_id: TeamId,
    pub athlete_name: String,
    pub category: AuditCategory,
    pub note: String,
}

/// Stats from an audit run.
#[derive(Debug, Default, Clone, Copy)]
pub struct AuditStats {
    pub teams_audited: u64,
    pub teams_failed: u64,
    pub athletes_audited: u64,
    pub problematic_photos: u64,
    pub duplicate_names: u64,
    pub exclusion_listed: u64,
}

impl fmt::Display for AuditStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "teams_audited={} teams_failed={} athletes_audited={} problematic_photos={} duplicate_names={} exclusion_listed={}",
            self.teams_audited, self.teams_failed, self.athletes_audited,
            self.problematic_photos, self.duplicate_names, self.exclusion_listed,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problematic_union() {
        assert!(PhotoCategory::Null.is_problematic());
        assert!(PhotoCategory::TeamLogo.is_problematic());
        assert!(PhotoCategory::KnownBadPattern.is_problematic());
        assert!(PhotoCategory::LowResolutionMarker.is_problematic());
        assert!(!PhotoCategory::ProxyReference.is_problematic());
        assert!(!PhotoCategory::DirectOk.is_problematic());
        assert!(!AuditCategory::DuplicateName.is_problematic());
    }

    #[test]
    fn display_matches_serde() {
        for c in [
            AuditCategory::LowResolutionMarker,
            AuditCategory::DuplicateName,
            AuditCategory::ExclusionListed,
        ] {
            let json = serde_json::to_string(&c).unwrap();
            assert_eq!(json, format!("\"{c}\""));
        }
    }
}
