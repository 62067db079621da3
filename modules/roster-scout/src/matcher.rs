//! Aligns scraped candidates with a team's canonical athletes.
//!
//! Precedence per candidate is exact, then containment, then token overlap;
//! the first tier with any hit decides. Several hits, or a canonical record
//! claimed by several candidates, is flagged for an operator instead of
//! guessed.

use std::collections::{HashMap, HashSet};

use roster_common::{name_tokens, CanonicalAthlete, ConfidenceTier, MatchAction, MatchDecision, ScrapedCandidate};
use tracing::debug;
use uuid::Uuid;

/// Tokens at least this long tolerate one edit in the token-overlap tier
/// ("booler" / "booker").
const FUZZY_TOKEN_MIN_LEN: usize = 5;

/// Decide an action for every candidate, in candidate order.
///
/// `exclusions` holds normalized names that must never be inserted for this
/// team (coaches, staff, athletes from another roster).
pub fn match_candidates(
    candidates: &[ScrapedCandidate],
    canonical: &[CanonicalAthlete],
    exclusions: &[String],
) -> Vec<MatchDecision> {
    let known: Vec<(Uuid, String)> = canonical
        .iter()
        .map(|a| (a.id, a.normalized_name()))
        .filter(|(_, name)| !name.is_empty())
        .collect();

    let hits: Vec<(ConfidenceTier, Vec<Uuid>)> = candidates
        .iter()
        .map(|c| find_hits(&c.normalized_name, &known))
        .collect();

    // Distinct names that landed on each canonical record. A listing that
    // repeats one athlete is a single claim.
    let mut claims: HashMap<Uuid, HashSet<&str>> = HashMap::new();
    for (candidate, (_, ids)) in candidates.iter().zip(&hits) {
        for id in ids {
            claims.entry(*id).or_default().insert(candidate.normalized_name.as_str());
        }
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let mut decisions = Vec::with_capacity(candidates.len());

    for (index, (candidate, (tier, ids))) in candidates.iter().zip(hits).enumerate() {
        let name = candidate.normalized_name.as_str();
        if !name.is_empty() && !seen.insert(name) {
            debug!(candidate = candidate.raw_name.as_str(), "Repeated name in listing, skipping");
            decisions.push(MatchDecision {
                candidate: index,
                canonical: None,
                ambiguous_with: Vec::new(),
                tier,
                action: MatchAction::Skip,
            });
            continue;
        }

        let decision = match ids.as_slice() {
            [] => {
                let action = if exclusions.iter().any(|e| e == name) {
                    debug!(candidate = candidate.raw_name.as_str(), "Excluded name, not inserting");
                    MatchAction::Skip
                } else {
                    MatchAction::Insert
                };
                MatchDecision {
                    candidate: index,
                    canonical: None,
                    ambiguous_with: Vec::new(),
                    tier: ConfidenceTier::None,
                    action,
                }
            }
            [id] if claims.get(id).is_some_and(|names| names.len() > 1) => MatchDecision {
                candidate: index,
                canonical: Some(*id),
                ambiguous_with: vec![*id],
                tier,
                action: MatchAction::FlagAmbiguous,
            },
            [id] => MatchDecision {
                candidate: index,
                canonical: Some(*id),
                ambiguous_with: Vec::new(),
                tier,
                action: MatchAction::Update,
            },
            _ => MatchDecision {
                candidate: index,
                canonical: None,
                ambiguous_with: ids.clone(),
                tier,
                action: MatchAction::FlagAmbiguous,
            },
        };
        decisions.push(decision);
    }

    decisions
}

/// Hits at the first tier that produces any.
fn find_hits(name: &str, known: &[(Uuid, String)]) -> (ConfidenceTier, Vec<Uuid>) {
    if name.is_empty() {
        return (ConfidenceTier::None, Vec::new());
    }
    let tiers: [(ConfidenceTier, fn(&str, &str) -> bool); 3] = [
        (ConfidenceTier::Exact, |a, b| a == b),
        (ConfidenceTier::Containment, |a, b| a.contains(b) || b.contains(a)),
        (ConfidenceTier::TokenOverlap, tokens_overlap),
    ];
    for (tier, matches) in tiers {
        let ids: Vec<Uuid> = known
            .iter()
            .filter(|(_, canonical)| matches(name, canonical))
            .map(|(id, _)| *id)
            .collect();
        if !ids.is_empty() {
            return (tier, ids);
        }
    }
    (ConfidenceTier::None, Vec::new())
}

/// Every token of the shorter name appears in the longer one. Only used
/// when the shorter name has at least two tokens.
fn tokens_overlap(a: &str, b: &str) -> bool {
    let (ta, tb) = (name_tokens(a), name_tokens(b));
    let (short, long, long_tokens) = if (ta.len(), a.len()) <= (tb.len(), b.len()) {
        (ta, b, tb)
    } else {
        (tb, a, ta)
    };
    if short.len() < 2 {
        return false;
    }
    short.iter().all(|token| token_present(token, long, &long_tokens))
}

fn token_present(token: &str, long: &str, long_tokens: &[&str]) -> bool {
    let len = token.chars().count();
    if len == 1 {
        // An initial stands for a whole word, not any letter in the name.
        return long_tokens.iter().any(|t| t.starts_with(token));
    }
    long.contains(token)
        || (len >= FUZZY_TOKEN_MIN_LEN && long_tokens.iter().any(|t| strsim::levenshtein(token, t) <= 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_common::normalize_name;

    fn athlete(name: &str) -> CanonicalAthlete {
        CanonicalAthlete {
            id: Uuid::new_v4(),
            team_id: 1,
            name: name.to_string(),
            photo_url: None,
            profile_url: None,
            role_type: None,
            class_year: None,
            hometown: None,
        }
    }

    fn candidate(name: &str) -> ScrapedCandidate {
        ScrapedCandidate::new(name, None)
    }

    #[test]
    fn punctuated_initials_match_exactly() {
        let aj = athlete("AJ Terry");
        let c = ScrapedCandidate::new("A. J. Terry", Some("https://gostate.com/roster/aj-terry".into()));
        let decisions = match_candidates(&[c], &[aj.clone()], &[]);
        assert_eq!(decisions[0].action, MatchAction::Update);
        assert_eq!(decisions[0].tier, ConfidenceTier::Exact);
        assert_eq!(decisions[0].canonical, Some(aj.id));
    }

    #[test]
    fn nickname_matches_at_token_overlap_not_containment() {
        let will = athlete("Will Chen");
        let decisions = match_candidates(&[candidate("William Chen")], &[will.clone()], &[]);
        assert_eq!(decisions[0].tier, ConfidenceTier::TokenOverlap);
        assert_eq!(decisions[0].action, MatchAction::Update);
        assert_eq!(decisions[0].canonical, Some(will.id));
    }

    #[test]
    fn containment_beats_token_overlap() {
        let decisions = match_candidates(&[candidate("Jane Doe")], &[athlete("Jane Doe Smith")], &[]);
        assert_eq!(decisions[0].tier, ConfidenceTier::Containment);
    }

    #[test]
    fn initial_against_two_similar_names_is_ambiguous() {
        let booler = athlete("Chris Booler");
        let booker = athlete("Chris Booker");
        let decisions = match_candidates(&[candidate("C. Booler")], &[booler.clone(), booker.clone()], &[]);
        let d = &decisions[0];
        assert_eq!(d.action, MatchAction::FlagAmbiguous);
        assert_eq!(d.tier, ConfidenceTier::TokenOverlap);
        assert_eq!(d.canonical, None);
        assert_eq!(d.ambiguous_with.len(), 2);
        assert!(d.ambiguous_with.contains(&booler.id) && d.ambiguous_with.contains(&booker.id));
    }

    #[test]
    fn initial_must_start_a_word() {
        // "o" appears inside "jones" but no token starts with it.
        assert!(!tokens_overlap("o jones", "sam jones"));
        assert!(tokens_overlap("s jones", "sam jones"));
    }

    #[test]
    fn single_token_names_never_overlap() {
        let decisions = match_candidates(&[candidate("Chenoweth")], &[athlete("Will Chen")], &[]);
        assert_eq!(decisions[0].action, MatchAction::Insert);
        assert!(!tokens_overlap("chen", "will chen"));
    }

    #[test]
    fn canonical_claimed_twice_flags_both_candidates() {
        let jane = athlete("Jane Doe");
        let decisions = match_candidates(&[candidate("Jane Doe"), candidate("Jane Doe-Smith")], &[jane.clone()], &[]);
        assert!(decisions.iter().all(|d| d.action == MatchAction::FlagAmbiguous));
        assert!(decisions.iter().all(|d| d.canonical == Some(jane.id)));
    }

    #[test]
    fn unmatched_become_inserts_unless_excluded() {
        let exclusions = vec![normalize_name("Coach Pat O'Neil")];
        let decisions = match_candidates(
            &[candidate("New Swimmer"), candidate("Coach Pat ONeil")],
            &[athlete("Jane Doe")],
            &exclusions,
        );
        assert_eq!(decisions[0].action, MatchAction::Insert);
        assert_eq!(decisions[0].tier, ConfidenceTier::None);
        assert_eq!(decisions[1].action, MatchAction::Skip);
    }

    #[test]
    fn excluded_name_with_canonical_match_still_updates() {
        let staff = athlete("Sam Staff");
        let decisions = match_candidates(&[candidate("Sam Staff")], &[staff.clone()], &["sam staff".to_string()]);
        assert_eq!(decisions[0].action, MatchAction::Update);
    }

    #[test]
    fn repeated_new_name_inserted_once() {
        let decisions = match_candidates(&[candidate("New Swimmer"), candidate("New  Swimmer")], &[], &[]);
        assert_eq!(decisions[0].action, MatchAction::Insert);
        assert_eq!(decisions[1].action, MatchAction::Skip);
    }

    #[test]
    fn repeated_listing_entry_decides_the_same_across_runs() {
        let first = ScrapedCandidate::new("Sam Lee", Some("https://gostate.com/roster/sam-lee/105".into()));
        let second = ScrapedCandidate::new("Sam  Lee", Some("https://gostate.com/roster/sam-lee-2/106".into()));
        let listing = [first, second];

        let run1: Vec<MatchAction> = match_candidates(&listing, &[], &[]).into_iter().map(|d| d.action).collect();
        assert_eq!(run1, vec![MatchAction::Insert, MatchAction::Skip]);

        let sam = athlete("Sam Lee");
        let run2 = match_candidates(&listing, &[sam.clone()], &[]);
        assert_eq!(run2[0].action, MatchAction::Update);
        assert_eq!(run2[0].canonical, Some(sam.id));
        assert_eq!(run2[1].action, MatchAction::Skip);
    }

    #[test]
    fn decisions_follow_candidate_order() {
        let decisions = match_candidates(&[candidate("A One"), candidate("B Two"), candidate("C Three")], &[], &[]);
        let order: Vec<usize> = decisions.iter().map(|d| d.candidate).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }
}
