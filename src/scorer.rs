//! Pressure-relief candidate ranking: when aggregate memory crosses the
//! high-water mark, pick the worst few offenders independent of their leak
//! classification.
//!
//! Grounded on `core::process_scorer::ProcessScorer::get_trim_candidates`,
//! which likewise scores by a weighted combination of signals and returns a
//! ranked, capped subset rather than every process in memory order.

use crate::fsm::ProcState;
use crate::history::{ProcessRecord, RecordKey};

/// Fixed weight on the FSM-state contribution (w1): KILLABLE counts fully,
/// CONFIRMING half, everything else is not a candidate at all.
const W_STATE: f64 = 3.0;
/// Fixed weight on normalized slope (w2).
const W_SLOPE: f64 = 2.0;
/// Fixed weight on normalized RSS (w3).
const W_RSS: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub key: RecordKey,
    pub score: f64,
}

struct Metrics {
    key: RecordKey,
    state_score: f64,
    slope_mbpm: f64,
    rss_bytes: f64,
    child_count: f64,
    inverse_age: f64,
}

/// Ranks every non-whitelisted candidate record by weighted, min-max
/// normalized score and returns at most `len(candidates) / 3` of them, worst
/// first. A record outside KILLABLE/CONFIRMING still gets ranked (state
/// contributes 0) so ordinary, non-leaking memory hogs remain eligible for
/// pressure relief.
///
/// `w_child` and `w_recent` are the tunable w4/w5 weights (child count,
/// inverse age); w1-w3 are fixed at 1.0.
pub fn rank<'a>(
    records: impl Iterator<Item = &'a ProcessRecord>,
    now: f64,
    w_child: f64,
    w_recent: f64,
) -> Vec<ScoredCandidate> {
    let metrics: Vec<Metrics> = records
        .map(|r| {
            let state_score = match r.state {
                ProcState::Killable => 1.0,
                ProcState::Confirming => 0.5,
                _ => 0.0,
            };
            let last_rss = r.samples.back().map(|s| s.rss_bytes as f64).unwrap_or(0.0);
            let first_t = r.samples.front().map(|s| s.t_s).unwrap_or(now);
            let age = (now - first_t).max(0.0);
            Metrics {
                key: r.key.clone(),
                state_score,
                slope_mbpm: r.last_classification.map(|c| c.slope_mbpm).unwrap_or(0.0),
                rss_bytes: last_rss,
                child_count: r.child_count as f64,
                // Raw, not normalized: the spec's w5 term is 1/age directly.
                inverse_age: 1.0 / age.max(1.0),
            }
        })
        .collect();

    if metrics.is_empty() {
        return Vec::new();
    }

    let slope_norm = normalize(metrics.iter().map(|m| m.slope_mbpm));
    let rss_norm = normalize(metrics.iter().map(|m| m.rss_bytes));
    let child_norm = normalize(metrics.iter().map(|m| m.child_count));

    let mut scored: Vec<ScoredCandidate> = metrics
        .iter()
        .enumerate()
        .map(|(i, m)| ScoredCandidate {
            key: m.key.clone(),
            score: W_STATE * m.state_score
                + W_SLOPE * slope_norm[i]
                + W_RSS * rss_norm[i]
                + w_child * child_norm[i]
                + w_recent * m.inverse_age,
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let cap = scored.len() / 3;
    scored.truncate(cap);
    scored
}

/// Min-max normalizes a sequence to `[0, 1]`; an all-equal sequence maps to
/// all zeros rather than dividing by zero.
fn normalize(values: impl Iterator<Item = f64> + Clone) -> Vec<f64> {
    let min = values.clone().fold(f64::INFINITY, f64::min);
    let max = values.clone().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    if span <= 0.0 {
        return values.map(|_| 0.0).collect();
    }
    values.map(|v| (v - min) / span).collect()
}
