//! Non-destructive merge of a scraped candidate into canonical records.
//!
//! A stored photo is replaced only when a real new photo was found and the
//! stored one is missing, the team logo, or flagged by the audit
//! classifier. Non-photo fields take any non-null new value.

use roster_common::{CanonicalAthlete, CanonicalTeam, PhotoResolution, ScrapedCandidate};
use roster_supervisor::PhotoClassifier;
use uuid::Uuid;

/// The record an `update` should write, or `None` when nothing would change.
pub fn merge_update(
    existing: &CanonicalAthlete,
    candidate: &ScrapedCandidate,
    resolution: &PhotoResolution,
    team: &CanonicalTeam,
    classifier: &PhotoClassifier,
) -> Option<CanonicalAthlete> {
    let mut merged = existing.clone();

    let stored = existing.photo_url.as_deref();
    let replaceable = classifier
        .classify(stored, team.logo_url.as_deref())
        .is_problematic();
    match resolution.url.as_deref() {
        Some(new) if replaceable => merged.photo_url = Some(new.to_string()),
        None if stored.is_none() => merged.photo_url = team.logo_url.clone(),
        _ => {}
    }

    overwrite_if_some(&mut merged.profile_url, &candidate.profile_url);
    overwrite_if_some(&mut merged.class_year, &candidate.class_year);
    overwrite_if_some(&mut merged.hometown, &candidate.hometown);

    (merged != *existing).then_some(merged)
}

/// A fresh record for an unmatched candidate. Falls back to the team logo
/// when no photo was resolved.
pub fn new_athlete(team: &CanonicalTeam, candidate: &ScrapedCandidate, resolution: &PhotoResolution) -> CanonicalAthlete {
    CanonicalAthlete {
        id: Uuid::new_v4(),
        team_id: team.id,
        name: candidate.raw_name.clone(),
        photo_url: resolution.url.clone().or_else(|| team.logo_url.clone()),
        profile_url: candidate.profile_url.clone(),
        role_type: None,
        class_year: candidate.class_year.clone(),
        hometown: candidate.hometown.clone(),
    }
}

fn overwrite_if_some(field: &mut Option<String>, new: &Option<String>) {
    if let Some(v) = new.as_ref().filter(|v| !v.trim().is_empty()) {
        *field = Some(v.clone());
    }
}
