use std::sync::Arc;

use anyhow::Result;
use roster_common::{EngineConfig, TeamId};
use roster_store::CanonicalStore;
use tracing::{info, warn};
use uuid::Uuid;

use crate::checks::{duplicate_names, excluded_names};
use crate::classifier::PhotoClassifier;
use crate::report::AuditReport;
use crate::types::{AuditCategory, AuditFinding, AuditStats};

/// Read-only audit of the canonical store's photos and names. Never touches
/// third-party sites and never writes to the store.
pub struct Auditor {
    store: Arc<dyn CanonicalStore>,
    config: Arc<EngineConfig>,
    classifier: PhotoClassifier,
}

impl Auditor {
    pub fn new(store: Arc<dyn CanonicalStore>, config: Arc<EngineConfig>) -> Self {
        let classifier = PhotoClassifier::from_config(&config);
        Self {
            store,
            config,
            classifier,
        }
    }

    /// Audit the given teams, or every team when `team_ids` is empty.
    ///
    /// A team whose athletes cannot be read is skipped with a warning; only
    /// an unreachable store fails the run.
    pub async fn run(&self, team_ids: &[TeamId]) -> Result<(AuditReport, AuditStats)> {
        let mut report = AuditReport::new(Uuid::new_v4());
        let mut stats = AuditStats::default();

        let teams = if team_ids.is_empty() {
            self.store.list_teams().await?
        } else {
            let mut teams = Vec::with_capacity(team_ids.len());
            for &id in team_ids {
                match self.store.get_team(id).await {
                    Ok(team) => teams.push(team),
                    Err(e) if e.is_fatal() => return Err(e.into()),
                    Err(e) => {
                        warn!(team_id = id, error = %e, "Skipping team");
                        stats.teams_failed += 1;
                    }
                }
            }
            teams
        };

        info!(teams = teams.len(), run_id = %report.run_id, "Audit starting");

        for team in &teams {
            let athletes = match self.store.list_athletes(team.id).await {
                Ok(a) => a,
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!(team_id = team.id, error = %e, "Failed to list athletes, skipping team");
                    stats.teams_failed += 1;
                    continue;
                }
            };

            report.team_names.insert(team.id, team.name.clone());
            stats.teams_audited += 1;

            let mut problematic = 0u64;
            for athlete in &athletes {
                let (category, note) = self
                    .classifier
                    .classify_with_note(athlete.photo_url.as_deref(), team.logo_url.as_deref());
                if category.is_problematic() {
                    problematic += 1;
                }
                report.findings.push(AuditFinding {
                    athlete_id: athlete.id,
                    team_id: team.id,
                    athlete_name: athlete.name.clone(),
                    category: AuditCategory::from(category),
                    note,
                });
            }
            stats.athletes_audited += athletes.len() as u64;
            stats.problematic_photos += problematic;

            let duplicates = duplicate_names(&athletes);
            stats.duplicate_names += duplicates.len() as u64;
            report.findings.extend(duplicates);

            let excluded = excluded_names(&athletes, &self.config.exclusions_for(team.id));
            stats.exclusion_listed += excluded.len() as u64;
            report.findings.extend(excluded);

            info!(
                team_id = team.id,
                team = team.name.as_str(),
                athletes = athletes.len(),
                problematic,
                "Team audited"
            );
        }

        Ok((report, stats))
    }
}
