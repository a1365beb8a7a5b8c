//! Tree search
//!
//! Walks a hardware node and all of its descendants, scores every sensor and
//! picks the best-ranked candidate. Each decision is written to a trace so the
//! diagnostic report can explain why a sensor was (or was not) chosen.

use tracing::{debug, warn};

use crate::resolution::profiles::{profile_for, MetricProfile};
use crate::resolution::scorer::{score, MatchCandidate};
use crate::settings::ScoringSettings;
use crate::tree::{HardwareNode, HardwareProvider, SensorNode};

/// Score every sensor in the subtree, parent before children, ranked best first.
///
/// Ranking is `(is_priority, score)` descending; the sort is stable so equal
/// candidates keep their encounter order.
pub fn rank_candidates<'a>(
    profile: &MetricProfile,
    root: &'a HardwareNode,
    settings: &ScoringSettings,
) -> Vec<MatchCandidate<'a>> {
    let mut candidates = Vec::new();
    collect(profile, root, settings, &mut candidates);
    candidates.sort_by(|a, b| {
        b.is_priority
            .cmp(&a.is_priority)
            .then_with(|| b.score.total_cmp(&a.score))
    });
    candidates
}

fn collect<'a>(
    profile: &MetricProfile,
    node: &'a HardwareNode,
    settings: &ScoringSettings,
    out: &mut Vec<MatchCandidate<'a>>,
) {
    out.extend(node.sensors.iter().filter_map(|s| score(profile, s, settings)));
    for child in &node.children {
        collect(profile, child, settings, out);
    }
}

fn trace_nodes(node: &HardwareNode, depth: usize, trace: &mut Vec<String>) {
    trace.push(format!("{}reading '{}' ({} sensors)", "  ".repeat(depth), node.name, node.sensors.len()));
    for child in &node.children {
        trace_nodes(child, depth + 1, trace);
    }
}

/// Locate the sensor behind `metric_name` in the subtree rooted at `root`.
///
/// Every node is refreshed through `provider` before its sensors are scored.
/// Refresh failures are traced and the search continues on stale values.
pub fn find_sensor(
    metric_name: &str,
    root: &mut HardwareNode,
    provider: &mut dyn HardwareProvider,
    settings: &ScoringSettings,
    trace: &mut Vec<String>,
) -> Option<SensorNode> {
    let Some(profile) = profile_for(metric_name) else {
        warn!(metric = %metric_name, "No search profile for metric");
        trace.push(format!("No search profile defined for {}", metric_name));
        return None;
    };

    for err in root.refresh_all(provider) {
        trace.push(format!("Refresh failed: {}", err));
    }

    trace.push(format!(
        "Searching {} ({}) under '{}' ({} sensors)",
        metric_name,
        profile.sensor_kind,
        root.name,
        root.sensor_count()
    ));
    trace_nodes(root, 1, trace);

    let candidates = rank_candidates(profile, root, settings);
    let Some(best) = candidates.first() else {
        debug!(metric = %metric_name, hardware = %root.name, "No candidates found");
        trace.push(format!(
            "No {} sensor scored above {:.2}",
            profile.sensor_kind, settings.min_candidate_score
        ));
        return None;
    };

    trace.push(format!(
        "Selected '{}' (score {:.2}, term '{}'{})",
        best.sensor.name,
        best.score,
        best.matched_term,
        if best.is_priority { ", priority" } else { "" }
    ));
    if let Some(runner_up) = candidates.get(1) {
        trace.push(format!(
            "Runner-up '{}' (score {:.2}, term '{}')",
            runner_up.sensor.name, runner_up.score, runner_up.matched_term
        ));
    }

    debug!(
        metric = %metric_name,
        hardware = %root.name,
        sensor = %best.sensor.name,
        score = best.score,
        candidates = candidates.len(),
        "Sensor resolved by search"
    );

    Some(best.sensor.clone())
}
