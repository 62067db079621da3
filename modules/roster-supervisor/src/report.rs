use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use roster_common::TeamId;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::types::{AuditCategory, AuditFinding};

/// One audit run. Only the findings are kept; every rollup is derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub team_names: BTreeMap<TeamId, String>,
    pub findings: Vec<AuditFinding>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rollup {
    pub athletes: usize,
    pub counts: BTreeMap<AuditCategory, usize>,
    pub problematic: usize,
    pub percent_problematic: f64,
}

impl Rollup {
    fn from_findings<'a>(findings: impl Iterator<Item = &'a AuditFinding>) -> Self {
        let mut counts: BTreeMap<AuditCategory, usize> = BTreeMap::new();
        for f in findings {
            *counts.entry(f.category).or_default() += 1;
        }
        // Every audited athlete has exactly one photo finding.
        let athletes = counts
            .iter()
            .filter(|(c, _)| c.photo().is_some())
            .map(|(_, n)| n)
            .sum();
        let problematic = counts
            .iter()
            .filter(|(c, _)| c.is_problematic())
            .map(|(_, n)| n)
            .sum();
        let percent_problematic = if athletes == 0 {
            0.0
        } else {
            problematic as f64 * 100.0 / athletes as f64
        };
        Self {
            athletes,
            counts,
            problematic,
            percent_problematic,
        }
    }

    pub fn count(&self, category: AuditCategory) -> usize {
        self.counts.get(&category).copied().unwrap_or(0)
    }
}

/// What lands on disk: the report plus its derived rollups, so readers do
/// not have to recompute them.
#[derive(Serialize)]
struct PersistedReport<'a> {
    #[serde(flatten)]
    report: &'a AuditReport,
    global: Rollup,
    teams: BTreeMap<TeamId, Rollup>,
}

impl AuditReport {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            generated_at: Utc::now(),
            team_names: BTreeMap::new(),
            findings: Vec::new(),
        }
    }

    pub fn global_rollup(&self) -> Rollup {
        Rollup::from_findings(self.findings.iter())
    }

    pub fn team_rollups(&self) -> BTreeMap<TeamId, Rollup> {
        let mut team_ids: Vec<TeamId> = self.team_names.keys().copied().collect();
        team_ids.extend(self.findings.iter().map(|f| f.team_id));
        team_ids.sort_unstable();
        team_ids.dedup();

        team_ids
            .into_iter()
            .map(|id| {
                let rollup = Rollup::from_findings(self.findings.iter().filter(|f| f.team_id == id));
                (id, rollup)
            })
            .collect()
    }

    /// Findings an operator should act on, problematic photos first.
    pub fn review_queue(&self) -> Vec<&AuditFinding> {
        let mut queue: Vec<&AuditFinding> = self
            .findings
            .iter()
            .filter(|f| f.category.needs_review())
            .collect();
        queue.sort_by_key(|f| (!f.category.is_problematic(), f.team_id, f.category));
        queue
    }

    /// Plain-text summary for the terminal.
    pub fn summary(&self) -> String {
        let global = self.global_rollup();
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Audit {}: {} athletes, {} problematic ({:.1}%)",
            self.run_id, global.athletes, global.problematic, global.percent_problematic
        );
        for (category, n) in &global.counts {
            let _ = writeln!(out, "  {:<22} {n}", category.to_string());
        }

        for (team_id, rollup) in self.team_rollups() {
            let name = self.team_names.get(&team_id).map(String::as_str).unwrap_or("?");
            let _ = writeln!(
                out,
                "\n[{team_id}] {name}: {} athletes, {:.1}% problematic",
                rollup.athletes, rollup.percent_problematic
            );
            for f in self.review_queue().into_iter().filter(|f| f.team_id == team_id) {
                let _ = writeln!(out, "  - {:<22} {} ({})", f.category.to_string(), f.athlete_name, f.note);
            }
        }
        out
    }
}

/// Write the report to `<data_dir>/audit-reports/`: `latest.json` is
/// replaced on every run and a dated copy is kept next to it. Returns the
/// path of `latest.json`.
pub fn save_report(data_dir: &Path, report: &AuditReport) -> Result<PathBuf> {
    let dir = data_dir.join("audit-reports");
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let persisted = PersistedReport {
        report,
        global: report.global_rollup(),
        teams: report.team_rollups(),
    };
    let json = serde_json::to_string_pretty(&persisted)?;

    let date = report.generated_at.format("%Y-%m-%d");
    let dated = dir.join(format!("{date}-{}.json", report.run_id));
    std::fs::write(&dated, &json)
        .with_context(|| format!("Failed to write {}", dated.display()))?;

    let latest = dir.join("latest.json");
    std::fs::write(&latest, &json)
        .with_context(|| format!("Failed to write {}", latest.display()))?;

    info!(path = %latest.display(), findings = report.findings.len(), "Audit report saved");
    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(team_id: TeamId, category: AuditCategory) -> AuditFinding {
        AuditFinding {
            athlete_id: Uuid::new_v4(),
            team_id,
            athlete_name: "Jane Doe".to_string(),
            category,
            note: String::new(),
        }
    }

    fn sample() -> AuditReport {
        let mut report = AuditReport::new(Uuid::new_v4());
        report.team_names.insert(1, "State".into());
        report.team_names.insert(2, "Tech".into());
        report.findings = vec![
            finding(1, AuditCategory::DirectOk),
            finding(1, AuditCategory::Null),
            finding(1, AuditCategory::DuplicateName),
            finding(1, AuditCategory::ProxyReference),
            finding(2, AuditCategory::TeamLogo),
            finding(2, AuditCategory::LowResolutionMarker),
        ];
        report
    }

    #[test]
    fn rollups_are_derived_from_findings() {
        let report = sample();
        let global = report.global_rollup();
        assert_eq!(global.athletes, 5);
        assert_eq!(global.problematic, 3);
        assert!((global.percent_problematic - 60.0).abs() < 1e-9);
        assert_eq!(global.count(AuditCategory::DuplicateName), 1);

        let teams = report.team_rollups();
        assert_eq!(teams[&1].athletes, 3);
        assert_eq!(teams[&1].problematic, 1);
        assert_eq!(teams[&2].problematic, 2);
        assert!((teams[&2].percent_problematic - 100.0).abs() < 1e-9);
    }

    #[test]
    fn team_without_athletes_has_zero_percent() {
        let mut report = AuditReport::new(Uuid::new_v4());
        report.team_names.insert(7, "Empty".into());
        let teams = report.team_rollups();
        assert_eq!(teams[&7].athletes, 0);
        assert_eq!(teams[&7].percent_problematic, 0.0);
    }

    #[test]
    fn review_queue_puts_problematic_first_and_skips_clean() {
        let report = sample();
        let queue = report.review_queue();
        assert_eq!(queue.len(), 5);
        assert!(queue[..3].iter().all(|f| f.category.is_problematic()));
        assert!(queue.iter().all(|f| f.category != AuditCategory::DirectOk));
    }

    #[test]
    fn save_overwrites_latest_and_keeps_dated_copy() {
        let dir = tempfile::tempdir().unwrap();
        let first = sample();
        save_report(dir.path(), &first).unwrap();
        let second = AuditReport::new(Uuid::new_v4());
        let latest = save_report(dir.path(), &second).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&latest).unwrap()).unwrap();
        assert_eq!(json["run_id"], second.run_id.to_string());
        assert_eq!(json["findings"].as_array().unwrap().len(), 0);

        let files = std::fs::read_dir(dir.path().join("audit-reports")).unwrap().count();
        assert_eq!(files, 3);
    }
}
