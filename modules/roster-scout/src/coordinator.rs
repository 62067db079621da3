//! Per-team reconciliation: fetch the listing, extract, match, resolve
//! photos, write.
//!
//! Teams run one at a time. Within a team, profile pages are fetched by a
//! small ordered pool while decisions are written sequentially, so the
//! cancellation flag is honored between athletes and never mid-write.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use roster_common::{
    CanonicalAthlete, CanonicalTeam, Document, EngineConfig, MatchAction, MatchDecision, PhotoResolution,
    ScrapedCandidate, TeamId,
};
use roster_store::{AthleteChanges, CanonicalStore, StoreError};
use roster_supervisor::PhotoClassifier;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::extractor::extract;
use crate::fetcher::{FetchError, PageFetcher, SettlePolicy};
use crate::matcher::match_candidates;
use crate::pacing::HostPacer;
use crate::photo::PhotoResolver;
use crate::policy::{merge_update, new_athlete};
use crate::stats::{AmbiguousMatch, RunReport, TeamOutcome, TeamReport};

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Delete canonical athletes the source no longer lists.
    pub full_resync: bool,
    /// Decide and report, but issue no store writes.
    pub dry_run: bool,
}

pub(crate) fn check_cancelled_flag(cancelled: &AtomicBool) -> bool {
    if cancelled.load(Ordering::Relaxed) {
        info!("Reconciliation run cancelled by user");
        return true;
    }
    false
}

enum AthleteWrite<'a> {
    Insert(&'a CanonicalAthlete),
    /// Only the columns that changed, with the photo guarded by the value
    /// the decision was made from.
    Update(&'a AthleteChanges),
}

/// Photo outcome for one candidate, plus whether its profile page failed.
struct ResolvedPhoto {
    resolution: PhotoResolution,
    profile_failed: bool,
}

pub struct Coordinator {
    store: Arc<dyn CanonicalStore>,
    fetcher: Arc<dyn PageFetcher>,
    config: Arc<EngineConfig>,
    resolver: PhotoResolver,
    classifier: PhotoClassifier,
    pacer: HostPacer,
    cancelled: Arc<AtomicBool>,
    options: RunOptions,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn CanonicalStore>,
        fetcher: Arc<dyn PageFetcher>,
        config: Arc<EngineConfig>,
        cancelled: Arc<AtomicBool>,
        options: RunOptions,
    ) -> Self {
        Self {
            resolver: PhotoResolver::new(config.photo.clone()),
            classifier: PhotoClassifier::from_config(&config),
            pacer: HostPacer::new(config.pacing.min_host_delay()),
            store,
            fetcher,
            config,
            cancelled,
            options,
        }
    }

    /// Reconcile the given teams, or every team when `team_ids` is empty.
    ///
    /// Per-team failures are recorded in the report. Only an unreachable
    /// store ends the run with an error.
    pub async fn run(&self, team_ids: &[TeamId]) -> Result<RunReport> {
        let mut report = RunReport::new(self.options.full_resync, self.options.dry_run);

        let team_ids: Vec<TeamId> = if team_ids.is_empty() {
            self.store
                .list_teams()
                .await
                .context("Failed to list teams")?
                .into_iter()
                .map(|t| t.id)
                .collect()
        } else {
            team_ids.to_vec()
        };

        info!(
            run_id = %report.run_id,
            teams = team_ids.len(),
            fetcher = self.fetcher.name(),
            full_resync = self.options.full_resync,
            dry_run = self.options.dry_run,
            "Starting reconciliation run"
        );

        for team_id in team_ids {
            if check_cancelled_flag(&self.cancelled) {
                report.cancelled = true;
                break;
            }
            let team_report = self
                .reconcile_team(team_id)
                .await
                .with_context(|| format!("Canonical store unreachable while reconciling team {team_id}"))?;
            info!(team_id, "{team_report}");
            if team_report.outcome == TeamOutcome::Cancelled {
                report.cancelled = true;
            }
            report.teams.push(team_report);
            if report.cancelled {
                break;
            }
        }

        report.finished_at = Some(Utc::now());
        Ok(report)
    }

    /// One team's pass. `Err` only for fatal store failures.
    async fn reconcile_team(&self, team_id: TeamId) -> Result<TeamReport, StoreError> {
        let team = match self.store.get_team(team_id).await {
            Ok(team) => team,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(team_id, error = %e, "Failed to load team, skipping");
                return Ok(TeamReport::new(team_id, format!("team {team_id}")).with_outcome(TeamOutcome::StoreFailed));
            }
        };
        let report = TeamReport::new(team.id, &team.name);

        let Some(roster_url) = team.roster_url.clone() else {
            warn!(team_id, team = team.name.as_str(), "Team has no roster URL, skipping");
            return Ok(report.with_outcome(TeamOutcome::NoRosterUrl));
        };

        let canonical = match self.store.list_athletes(team.id).await {
            Ok(athletes) => athletes,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(team_id, error = %e, "Failed to list athletes, skipping team");
                return Ok(report.with_outcome(TeamOutcome::StoreFailed));
            }
        };

        info!(team_id, team = team.name.as_str(), url = roster_url.as_str(), "Fetching roster listing");
        let listing = match self.fetch(&roster_url, &SettlePolicy::NetworkIdle).await {
            Ok(doc) => doc,
            Err(e) => {
                warn!(team_id, url = roster_url.as_str(), error = %e, "Roster listing fetch failed, skipping team");
                return Ok(report.with_outcome(TeamOutcome::FetchFailed));
            }
        };

        let candidates = extract(&listing);
        if candidates.is_empty() {
            warn!(team_id, url = roster_url.as_str(), "No candidates extracted from roster listing");
            return Ok(report.with_outcome(TeamOutcome::ExtractionEmpty));
        }

        let exclusions = self.config.exclusions_for(team.id);
        let decisions = match_candidates(&candidates, &canonical, &exclusions);
        info!(team_id, candidates = candidates.len(), canonical = canonical.len(), "Matched candidates");

        self.apply_decisions(&team, &canonical, &candidates, &decisions, report)
            .await
    }

    async fn apply_decisions(
        &self,
        team: &CanonicalTeam,
        canonical: &[CanonicalAthlete],
        candidates: &[ScrapedCandidate],
        decisions: &[MatchDecision],
        mut report: TeamReport,
    ) -> Result<TeamReport, StoreError> {
        report.candidates = candidates.len() as u32;
        let by_id: HashMap<Uuid, &CanonicalAthlete> = canonical.iter().map(|a| (a.id, a)).collect();

        // Records the source still lists, including contested ones.
        let mut claimed: HashSet<Uuid> = HashSet::new();
        for d in decisions {
            claimed.extend(d.canonical);
            claimed.extend(d.ambiguous_with.iter().copied());
        }

        let jobs = decisions.iter().map(|decision| {
            let candidate = &candidates[decision.candidate];
            let wanted = self.needs_photo(decision, &by_id, team);
            async move {
                if !wanted || self.cancelled.load(Ordering::Relaxed) {
                    return (decision, None);
                }
                (decision, Some(self.resolve_photo(candidate).await))
            }
        });
        let concurrency = self.config.pacing.profile_concurrency.max(1);
        let mut results = std::pin::pin!(stream::iter(jobs).buffered(concurrency));

        let mut cancelled = false;
        while let Some((decision, photo)) = results.next().await {
            if check_cancelled_flag(&self.cancelled) {
                cancelled = true;
                break;
            }
            let candidate = &candidates[decision.candidate];

            let resolution = match photo {
                Some(resolved) => {
                    if resolved.profile_failed {
                        report.profile_fetch_failures += 1;
                    }
                    report.photo_tiers.record(&resolved.resolution);
                    resolved.resolution
                }
                None => PhotoResolution::none(),
            };

            match decision.action {
                MatchAction::Skip => report.skipped += 1,
                MatchAction::FlagAmbiguous => {
                    warn!(
                        team_id = team.id,
                        athlete = candidate.raw_name.as_str(),
                        tier = %decision.tier,
                        matches = decision.ambiguous_with.len(),
                        "Ambiguous match, leaving for review"
                    );
                    report.flagged_ambiguous += 1;
                    report.ambiguous.push(AmbiguousMatch {
                        candidate_name: candidate.raw_name.clone(),
                        tier: decision.tier,
                        canonical_ids: decision.ambiguous_with.clone(),
                    });
                }
                MatchAction::Insert => {
                    let record = new_athlete(team, candidate, &resolution);
                    if resolution.is_none() && record.photo_url.is_some() {
                        report.photo_tiers.logo_fallbacks += 1;
                    }
                    if self.write(team, &record.name, AthleteWrite::Insert(&record)).await? {
                        report.inserted += 1;
                    } else {
                        report.write_failures += 1;
                    }
                }
                MatchAction::Update => {
                    let Some(existing) = decision.canonical.and_then(|id| by_id.get(&id)) else {
                        report.skipped += 1;
                        continue;
                    };
                    match merge_update(existing, candidate, &resolution, team, &self.classifier) {
                        None => report.unchanged += 1,
                        Some(merged) => {
                            if existing.photo_url.is_none() && merged.photo_url == team.logo_url {
                                report.photo_tiers.logo_fallbacks += 1;
                            }
                            let changes = AthleteChanges::between(existing, &merged);
                            if self.write(team, &merged.name, AthleteWrite::Update(&changes)).await? {
                                report.updated += 1;
                            } else {
                                report.write_failures += 1;
                            }
                        }
                    }
                }
            }
        }

        let unclaimed: Vec<&CanonicalAthlete> = canonical.iter().filter(|a| !claimed.contains(&a.id)).collect();
        if cancelled {
            report.outcome = TeamOutcome::Cancelled;
        } else if self.options.full_resync {
            self.delete_unclaimed(team, &unclaimed, &mut report).await?;
        } else if !unclaimed.is_empty() {
            report.missing_from_source = unclaimed.len() as u32;
            info!(
                team_id = team.id,
                missing = unclaimed.len(),
                "Canonical athletes absent from the source (kept; use --full-resync to remove)"
            );
        }

        if !self.options.dry_run && (report.inserted > 0 || report.deleted > 0) {
            self.refresh_athlete_count(team).await?;
        }
        Ok(report)
    }

    /// Inserts always need a photo. Updates only when the stored one could
    /// still be replaced, which spares a profile fetch per settled athlete.
    fn needs_photo(&self, decision: &MatchDecision, by_id: &HashMap<Uuid, &CanonicalAthlete>, team: &CanonicalTeam) -> bool {
        match decision.action {
            MatchAction::Insert => true,
            MatchAction::Update => decision.canonical.and_then(|id| by_id.get(&id)).is_some_and(|a| {
                self.classifier
                    .classify(a.photo_url.as_deref(), team.logo_url.as_deref())
                    .is_problematic()
            }),
            MatchAction::Skip | MatchAction::FlagAmbiguous => false,
        }
    }

    /// Profile page first, then the listing's inline images.
    async fn resolve_photo(&self, candidate: &ScrapedCandidate) -> ResolvedPhoto {
        let mut profile_failed = false;
        if let Some(profile_url) = candidate.profile_url.as_deref() {
            match self.fetch(profile_url, &SettlePolicy::Immediate).await {
                Ok(doc) => {
                    let resolution = self.resolver.resolve(&doc, Some(&candidate.raw_name));
                    if !resolution.is_none() {
                        debug!(athlete = candidate.raw_name.as_str(), tier = %resolution.tier, "Photo resolved from profile");
                        return ResolvedPhoto {
                            resolution,
                            profile_failed,
                        };
                    }
                }
                Err(e) => {
                    warn!(athlete = candidate.raw_name.as_str(), url = profile_url, error = %e, "Profile fetch failed, using listing images");
                    profile_failed = true;
                }
            }
        }
        ResolvedPhoto {
            resolution: self
                .resolver
                .resolve_inline(&candidate.image_candidates, Some(&candidate.raw_name)),
            profile_failed,
        }
    }

    /// Paced fetch bounded by the per-fetch timeout across all attempts.
    async fn fetch(&self, url: &str, settle: &SettlePolicy) -> Result<Document, FetchError> {
        self.pacer.wait(url).await;
        let budget = self.config.pacing.fetch_timeout() * self.config.pacing.max_attempts.max(1);
        match tokio::time::timeout(budget, self.fetcher.fetch(url, settle)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout { url: url.to_string() }),
        }
    }

    /// Write one record. `Ok(false)` is a recorded, non-fatal failure.
    async fn write(&self, team: &CanonicalTeam, athlete: &str, op: AthleteWrite<'_>) -> Result<bool, StoreError> {
        if self.options.dry_run {
            debug!(team_id = team.id, athlete, "Dry run, not writing");
            return Ok(true);
        }
        let result = match op {
            AthleteWrite::Insert(record) => self.store.upsert_athlete(record).await.map(|_| ()),
            AthleteWrite::Update(changes) => self.store.update_athlete(changes).await.map(|stored| {
                if let Some(swap) = changes.photo.as_ref().filter(|s| s.new != stored.photo_url) {
                    info!(
                        team_id = team.id,
                        athlete,
                        photo = stored.photo_url.as_deref().unwrap_or("none"),
                        skipped = swap.new.as_deref().unwrap_or("none"),
                        "Photo changed since the listing pass began, keeping the stored one"
                    );
                }
            }),
        };
        match result {
            Ok(()) => Ok(true),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(team_id = team.id, athlete, error = %e, "Athlete write failed");
                Ok(false)
            }
        }
    }

    async fn delete_unclaimed(
        &self,
        team: &CanonicalTeam,
        unclaimed: &[&CanonicalAthlete],
        report: &mut TeamReport,
    ) -> Result<(), StoreError> {
        for athlete in unclaimed {
            if check_cancelled_flag(&self.cancelled) {
                report.outcome = TeamOutcome::Cancelled;
                return Ok(());
            }
            info!(team_id = team.id, athlete = athlete.name.as_str(), "Removing athlete absent from source");
            if self.options.dry_run {
                report.deleted += 1;
                continue;
            }
            match self.store.delete_athlete(athlete.id).await {
                Ok(()) => report.deleted += 1,
                Err(StoreError::AthleteNotFound(_)) => {
                    debug!(athlete = athlete.name.as_str(), "Already removed");
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(team_id = team.id, athlete = athlete.name.as_str(), error = %e, "Athlete delete failed");
                    report.write_failures += 1;
                }
            }
        }
        Ok(())
    }

    async fn refresh_athlete_count(&self, team: &CanonicalTeam) -> Result<(), StoreError> {
        let count = match self.store.list_athletes(team.id).await {
            Ok(athletes) => athletes.len() as i32,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(team_id = team.id, error = %e, "Failed to recount athletes");
                return Ok(());
            }
        };
        match self.store.update_team_athlete_count(team.id, count).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(team_id = team.id, error = %e, "Failed to update athlete count");
                Ok(())
            }
        }
    }
}
