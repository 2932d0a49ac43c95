//! Ordinary least squares regression over a process's RSS samples.
//!
//! The regression itself is carried over from
//! `features::leaks::ProcessTracker::linear_regression`; this module adapts
//! it to operate on bounded history windows and to fold the result into the
//! three-way `fsm::Classification` (leaking / predictive / plateaued) the
//! rest of the crate consumes.

use crate::fsm::Classification;
use crate::history::ProcessRecord;
use crate::tuner::EffectiveThresholds;

/// Net RSS change across a full window below this, in MB, combined with a
/// near-zero slope, is read as a plateau rather than ongoing growth.
const PLATEAU_SLOPE_EPSILON_MBPM: f64 = 1.0;

/// Fraction of total RAM kept as headroom when projecting forward for the
/// predictive-kill shortcut.
const SAFETY_MARGIN_FRACTION: f64 = 0.05;

/// Computes `(slope, r_squared)` for `y` regressed on `x` via OLS.
/// Returns `(0.0, 0.0)` if fewer than two points or all `x` values coincide.
fn linear_regression(points: &[(f64, f64)]) -> (f64, f64) {
    let n = points.len() as f64;
    if points.len() < 2 {
        return (0.0, 0.0);
    }

    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    for &(x, y) in points {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x).powi(2);
    }

    if var_x == 0.0 {
        return (0.0, 0.0);
    }

    let slope = cov / var_x;
    let intercept = mean_y - slope * mean_x;

    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for &(x, y) in points {
        let predicted = slope * x + intercept;
        ss_res += (y - predicted).powi(2);
        ss_tot += (y - mean_y).powi(2);
    }
    let r_squared = if ss_tot == 0.0 { 1.0 } else { 1.0 - ss_res / ss_tot };

    (slope, r_squared)
}

/// Regresses a record's window and classifies it against `thresholds`.
/// Returns `None` if the window is not yet full — the record is still
/// effectively unclassified regardless of its current FSM state.
pub fn classify(
    record: &ProcessRecord,
    thresholds: &EffectiveThresholds,
    total_ram_bytes: u64,
    interval_s: f64,
) -> Option<Classification> {
    if record.samples.len() < thresholds.history_len {
        return None;
    }

    let points: Vec<(f64, f64)> = record
        .samples
        .iter()
        .map(|s| (s.t_s, s.rss_bytes as f64 / (1024.0 * 1024.0)))
        .collect();

    let (slope_mb_per_s, r_squared) = linear_regression(&points);
    let slope_mbpm = slope_mb_per_s * 60.0;

    let first_mb = points.first().map(|(_, y)| *y).unwrap_or(0.0);
    let last_mb = points.last().map(|(_, y)| *y).unwrap_or(0.0);
    let growth_mb = last_mb - first_mb;

    let leaking = slope_mbpm >= thresholds.slope_mbpm && growth_mb >= thresholds.growth_mb;

    let predictive = if slope_mb_per_s > 0.0 {
        let projected_mb = last_mb + slope_mb_per_s * (2.0 * interval_s);
        let ceiling_mb = (total_ram_bytes as f64 / (1024.0 * 1024.0)) * (1.0 - SAFETY_MARGIN_FRACTION);
        projected_mb > ceiling_mb
    } else {
        false
    };

    let plateaued = !leaking
        && slope_mbpm.abs() < PLATEAU_SLOPE_EPSILON_MBPM
        && growth_mb >= 0.0;

    Some(Classification {
        slope_mbpm,
        growth_mb,
        r_squared,
        leaking,
        predictive,
        plateaued,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{HistoryStore, RecordKey};
    use crate::sampler::ProcessSample;

    fn thresholds(history_len: usize) -> EffectiveThresholds {
        EffectiveThresholds {
            history_len,
            growth_mb: 50.0,
            slope_mbpm: 5.0,
            high_pct: 85.0,
            low_pct: 70.0,
        }
    }

    fn sample(rss_mb: u64) -> ProcessSample {
        ProcessSample {
            pid: 42,
            ppid: 1,
            basename: "leaker".into(),
            cmdline: "leaker".into(),
            rss_bytes: rss_mb * 1024 * 1024,
            child_count: 0,
            terminal_descendant: false,
        }
    }

    #[test]
    fn upward_trend_classified_as_leaking() {
        let mut store = HistoryStore::new();
        for t in 0..10 {
            store.observe(&[sample(100 + t * 20)], &[], t as f64 * 60.0, 10, 0.0);
        }
        let record = store.get(&RecordKey::Process(42)).unwrap();
        let c = classify(record, &thresholds(10), 16 * 1024 * 1024 * 1024, 60.0).unwrap();
        assert!(c.leaking);
        assert!(c.slope_mbpm > 0.0);
    }

    #[test]
    fn flat_trend_not_leaking_and_plateaued() {
        let mut store = HistoryStore::new();
        for t in 0..10 {
            store.observe(&[sample(200)], &[], t as f64 * 60.0, 10, 0.0);
        }
        let record = store.get(&RecordKey::Process(42)).unwrap();
        let c = classify(record, &thresholds(10), 16 * 1024 * 1024 * 1024, 60.0).unwrap();
        assert!(!c.leaking);
        assert!(c.plateaued);
    }

    #[test]
    fn incomplete_window_is_unclassified() {
        let mut store = HistoryStore::new();
        store.observe(&[sample(100)], &[], 0.0, 10, 0.0);
        let record = store.get(&RecordKey::Process(42)).unwrap();
        assert!(classify(record, &thresholds(10), 16 * 1024 * 1024 * 1024, 60.0).is_none());
    }

    #[test]
    fn steep_slope_near_total_ram_is_predictive() {
        let mut store = HistoryStore::new();
        // Small host: 1200 MB total, already near the ceiling and rising fast.
        for t in 0..5 {
            store.observe(&[sample(1000 + t * 50)], &[], t as f64 * 60.0, 5, 0.0);
        }
        let record = store.get(&RecordKey::Process(42)).unwrap();
        let total_bytes = 1200u64 * 1024 * 1024;
        let c = classify(record, &thresholds(5), total_bytes, 60.0).unwrap();
        assert!(c.predictive);
    }
}
