//! Candidate scoring
//!
//! Scores a single sensor against a metric profile. Literal substring hits
//! outrank fuzzy matches; priority terms earn a bonus in both cases. A sensor
//! of the wrong kind, or one whose name contains an exclude fragment, is never
//! a candidate.

use crate::resolution::profiles::MetricProfile;
use crate::settings::ScoringSettings;
use crate::tree::SensorNode;

/// A scored (sensor, profile) pairing
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate<'a> {
    pub sensor: &'a SensorNode,
    pub score: f32,
    pub matched_term: &'static str,
    pub is_priority: bool,
}

/// Normalized similarity of two strings in `0.0..=1.0`.
///
/// Longest-matching-blocks ratio (`2 * matches / total length`), which is
/// symmetric and deterministic.
pub fn similarity(a: &str, b: &str) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    similar::TextDiff::from_chars(a, b).ratio()
}

/// Score `sensor` against `profile`, or `None` if it is not a candidate
pub fn score<'a>(
    profile: &MetricProfile,
    sensor: &'a SensorNode,
    settings: &ScoringSettings,
) -> Option<MatchCandidate<'a>> {
    if !sensor.kind.eq_ignore_ascii_case(profile.sensor_kind) {
        return None;
    }

    let name = sensor.name.to_lowercase();
    if profile.exclude_terms.iter().any(|ex| name.contains(ex)) {
        return None;
    }

    let mut best: Option<(f32, &'static str, bool)> = None;
    for &term in profile.search_terms {
        let is_priority = profile.is_priority_term(term);

        let term_score = if name.contains(term) {
            if is_priority {
                settings.priority_exact_score
            } else {
                settings.exact_match_score
            }
        } else {
            let ratio = similarity(term, &name);
            if ratio <= settings.fuzzy_accept_ratio {
                continue;
            }
            if is_priority {
                ratio + settings.priority_fuzzy_bonus
            } else {
                ratio
            }
        };

        // strict comparison: on ties the earlier term keeps its place
        if best.map_or(true, |(s, _, _)| term_score > s) {
            best = Some((term_score, term, is_priority));
        }
    }

    let (score, matched_term, is_priority) = best?;
    if score <= settings.min_candidate_score {
        return None;
    }

    Some(MatchCandidate {
        sensor,
        score,
        matched_term,
        is_priority,
    })
}
