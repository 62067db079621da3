//! Name checks over one team's canonical athletes. Independent of the photo
//! classification: an athlete can carry findings from both.

use std::collections::HashMap;

use roster_common::{normalize_name, CanonicalAthlete};

use crate::types::{AuditCategory, AuditFinding};

/// One finding per athlete whose normalized name is shared with another
/// record on the same team.
pub fn duplicate_names(athletes: &[CanonicalAthlete]) -> Vec<AuditFinding> {
    let mut groups: HashMap<String, Vec<&CanonicalAthlete>> = HashMap::new();
    for athlete in athletes {
        groups.entry(athlete.normalized_name()).or_default().push(athlete);
    }

    // Walk the input again so findings keep roster order.
    athletes
        .iter()
        .filter_map(|athlete| {
            let key = athlete.normalized_name();
            let group = groups.get(&key)?;
            if group.len() < 2 {
                return None;
            }
            let others: Vec<String> = group
                .iter()
                .filter(|other| other.id != athlete.id)
                .map(|other| other.id.to_string())
                .collect();
            Some(AuditFinding {
                athlete_id: athlete.id,
                team_id: athlete.team_id,
                athlete_name: athlete.name.clone(),
                category: AuditCategory::DuplicateName,
                note: format!("normalized name '{key}' also used by {}", others.join(", ")),
            })
        })
        .collect()
}

/// Athletes whose name is on the team's configured exclusion list.
/// `exclusions` must already be normalized.
pub fn excluded_names(athletes: &[CanonicalAthlete], exclusions: &[String]) -> Vec<AuditFinding> {
    if exclusions.is_empty() {
        return Vec::new();
    }
    athletes
        .iter()
        .filter(|a| exclusions.contains(&normalize_name(&a.name)))
        .map(|a| AuditFinding {
            athlete_id: a.id,
            team_id: a.team_id,
            athlete_name: a.name.clone(),
            category: AuditCategory::ExclusionListed,
            note: "name is on the team exclusion list".to_string(),
        })
        .collect()
}
