use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use roster_common::{ConfidenceTier, PhotoResolution, ResolutionTier, TeamId};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// How a team's pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamOutcome {
    Completed,
    NoRosterUrl,
    FetchFailed,
    ExtractionEmpty,
    Cancelled,
    /// Team record or athlete list could not be read.
    StoreFailed,
}

impl fmt::Display for TeamOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TeamOutcome::Completed => "completed",
            TeamOutcome::NoRosterUrl => "no_roster_url",
            TeamOutcome::FetchFailed => "fetch_failed",
            TeamOutcome::ExtractionEmpty => "extraction_empty",
            TeamOutcome::Cancelled => "cancelled",
            TeamOutcome::StoreFailed => "store_failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoTierCounts {
    pub selector: u32,
    pub domain_heuristic: u32,
    pub alt_text: u32,
    pub none: u32,
    /// Resolutions whose URL was rewritten to a larger rendition or unwrapped.
    pub upgraded: u32,
    /// Inserts or fills that fell back to the team logo.
    pub logo_fallbacks: u32,
}

impl PhotoTierCounts {
    pub fn record(&mut self, resolution: &PhotoResolution) {
        match resolution.tier {
            ResolutionTier::Selector => self.selector += 1,
            ResolutionTier::DomainHeuristic => self.domain_heuristic += 1,
            ResolutionTier::AltText => self.alt_text += 1,
            ResolutionTier::None => self.none += 1,
        }
        if resolution.upgraded {
            self.upgraded += 1;
        }
    }

    fn add(&mut self, other: &PhotoTierCounts) {
        self.selector += other.selector;
        self.domain_heuristic += other.domain_heuristic;
        self.alt_text += other.alt_text;
        self.none += other.none;
        self.upgraded += other.upgraded;
        self.logo_fallbacks += other.logo_fallbacks;
    }
}

/// A candidate left for an operator to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbiguousMatch {
    pub candidate_name: String,
    pub tier: ConfidenceTier,
    pub canonical_ids: Vec<Uuid>,
}

/// Per-team counts for one reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamReport {
    pub team_id: TeamId,
    pub team_name: String,
    pub outcome: TeamOutcome,
    pub candidates: u32,
    pub inserted: u32,
    pub updated: u32,
    pub unchanged: u32,
    pub skipped: u32,
    pub flagged_ambiguous: u32,
    pub deleted: u32,
    pub missing_from_source: u32,
    pub write_failures: u32,
    pub profile_fetch_failures: u32,
    pub photo_tiers: PhotoTierCounts,
    pub ambiguous: Vec<AmbiguousMatch>,
}

impl TeamReport {
    pub fn new(team_id: TeamId, team_name: impl Into<String>) -> Self {
        Self {
            team_id,
            team_name: team_name.into(),
            outcome: TeamOutcome::Completed,
            candidates: 0,
            inserted: 0,
            updated: 0,
            unchanged: 0,
            skipped: 0,
            flagged_ambiguous: 0,
            deleted: 0,
            missing_from_source: 0,
            write_failures: 0,
            profile_fetch_failures: 0,
            photo_tiers: PhotoTierCounts::default(),
            ambiguous: Vec::new(),
        }
    }

    pub fn with_outcome(mut self, outcome: TeamOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    /// Store mutations issued (or, in dry-run, that would have been).
    pub fn writes(&self) -> u32 {
        self.inserted + self.updated + self.deleted
    }
}

impl fmt::Display for TeamReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] candidates={} inserted={} updated={} unchanged={} skipped={} ambiguous={} deleted={} missing={} write_failures={} | photos: selector={} domain={} alt={} none={} upgraded={} logo={}",
            self.team_name,
            self.outcome,
            self.candidates,
            self.inserted,
            self.updated,
            self.unchanged,
            self.skipped,
            self.flagged_ambiguous,
            self.deleted,
            self.missing_from_source,
            self.write_failures,
            self.photo_tiers.selector,
            self.photo_tiers.domain_heuristic,
            self.photo_tiers.alt_text,
            self.photo_tiers.none,
            self.photo_tiers.upgraded,
            self.photo_tiers.logo_fallbacks,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub full_resync: bool,
    pub dry_run: bool,
    pub cancelled: bool,
    pub teams: Vec<TeamReport>,
}

impl RunReport {
    pub fn new(full_resync: bool, dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            full_resync,
            dry_run,
            cancelled: false,
            teams: Vec::new(),
        }
    }

    pub fn team(&self, team_id: TeamId) -> Option<&TeamReport> {
        self.teams.iter().find(|t| t.team_id == team_id)
    }

    /// Counts summed across every team. Outcome is meaningless here.
    pub fn totals(&self) -> TeamReport {
        let mut total = TeamReport::new(0, "TOTAL");
        for t in &self.teams {
            total.candidates += t.candidates;
            total.inserted += t.inserted;
            total.updated += t.updated;
            total.unchanged += t.unchanged;
            total.skipped += t.skipped;
            total.flagged_ambiguous += t.flagged_ambiguous;
            total.deleted += t.deleted;
            total.missing_from_source += t.missing_from_source;
            total.write_failures += t.write_failures;
            total.profile_fetch_failures += t.profile_fetch_failures;
            total.photo_tiers.add(&t.photo_tiers);
        }
        total
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match (self.full_resync, self.dry_run) {
            (true, true) => "full resync, dry run",
            (true, false) => "full resync",
            (false, true) => "dry run",
            (false, false) => "incremental",
        };
        writeln!(f, "Reconciliation run {} ({mode})", self.run_id)?;
        if self.cancelled {
            writeln!(f, "  CANCELLED before all teams were processed")?;
        }
        for team in &self.teams {
            writeln!(f, "  {team}")?;
            for amb in &team.ambiguous {
                writeln!(
                    f,
                    "    ambiguous: {} ({}, {} canonical)",
                    amb.candidate_name,
                    amb.tier,
                    amb.canonical_ids.len()
                )?;
            }
        }
        write!(f, "  {}", self.totals())
    }
}

/// Write the run report to `data_dir/run-reports/<date>-<run_id>.json`.
pub fn save_run_report(data_dir: &Path, report: &RunReport) -> Result<PathBuf> {
    let dir = data_dir.join("run-reports");
    std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let date = report.started_at.format("%Y-%m-%d");
    let path = dir.join(format!("{date}-{}.json", report.run_id));
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;

    info!(path = %path.display(), teams = report.teams.len(), "Run report saved");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_counts_record_each_resolution() {
        let mut counts = PhotoTierCounts::default();
        counts.record(&PhotoResolution::none());
        counts.record(&PhotoResolution {
            url: Some("https://x.com/a.jpg".into()),
            tier: ResolutionTier::Selector,
            upgraded: true,
        });
        assert_eq!(counts.none, 1);
        assert_eq!(counts.selector, 1);
        assert_eq!(counts.upgraded, 1);
    }

    #[test]
    fn totals_sum_teams() {
        let mut report = RunReport::new(false, false);
        let mut a = TeamReport::new(1, "A");
        a.inserted = 2;
        a.photo_tiers.alt_text = 1;
        let mut b = TeamReport::new(2, "B").with_outcome(TeamOutcome::FetchFailed);
        b.updated = 3;
        b.write_failures = 1;
        report.teams = vec![a, b];

        let total = report.totals();
        assert_eq!(total.writes(), 5);
        assert_eq!(total.write_failures, 1);
        assert_eq!(total.photo_tiers.alt_text, 1);
        assert!(report.to_string().contains("B [fetch_failed]"));
    }

    #[test]
    fn saves_json_under_run_reports() {
        let dir = tempfile::tempdir().unwrap();
        let report = RunReport::new(true, true);
        let path = save_run_report(dir.path(), &report).unwrap();
        assert!(path.starts_with(dir.path().join("run-reports")));

        let loaded: RunReport = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.run_id, report.run_id);
        assert!(loaded.full_resync && loaded.dry_run);
    }
}
