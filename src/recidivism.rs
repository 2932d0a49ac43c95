//! Repeat-offender tracking: the same command line getting killed over and
//! over within a rolling window triggers a desktop notification instead of
//! silently cycling forever.
//!
//! There is no direct teacher analogue (the optimizer doesn't re-identify
//! processes across restarts); the fingerprinting shape — basename plus a
//! few leading, path-stripped argv tokens — follows the same "identify by
//! command, not PID" idea `features::leaks`'s command-based suspect list
//! uses when a leaking process is relaunched under a new PID.

use std::collections::{HashMap, HashSet, VecDeque};

/// How many leading argv tokens (after the basename) contribute to a
/// fingerprint, with filesystem paths stripped to their last component.
const FINGERPRINT_ARGV_TOKENS: usize = 3;

/// Builds a stable identity for a command line, surviving PID reuse and
/// relaunches under a different working directory.
pub fn fingerprint(basename: &str, cmdline: &str) -> String {
    let stripped_basename = strip_path(basename);
    let mut parts = vec![stripped_basename];

    for token in cmdline.split_whitespace().skip(1).take(FINGERPRINT_ARGV_TOKENS) {
        parts.push(strip_path(token));
    }

    parts.join(" ")
}

fn strip_path(token: &str) -> String {
    token.rsplit('/').next().unwrap_or(token).to_string()
}

/// Tracks kill timestamps per fingerprint and notification dedup state.
#[derive(Debug, Default)]
pub struct RecidivismTracker {
    kills: HashMap<String, VecDeque<f64>>,
    notified: HashSet<String>,
}

impl RecidivismTracker {
    pub fn new() -> Self {
        RecidivismTracker {
            kills: HashMap::new(),
            notified: HashSet::new(),
        }
    }

    /// Records a kill for `fingerprint` at `now`, evicts entries older than
    /// `window_s`, and returns the in-window kill count.
    pub fn record_kill(&mut self, fingerprint: &str, now: f64, window_s: f64) -> usize {
        let entry = self.kills.entry(fingerprint.to_string()).or_default();
        entry.push_back(now);
        evict_older_than(entry, now, window_s);
        entry.len()
    }

    /// True exactly once per "crossing" of `threshold` within the window: a
    /// fingerprint that has already fired a notification for its current
    /// streak won't fire again until the window rolls off below threshold.
    pub fn should_notify(&mut self, fingerprint: &str, now: f64, window_s: f64, threshold: u32) -> bool {
        let count = self
            .kills
            .get_mut(fingerprint)
            .map(|entry| {
                evict_older_than(entry, now, window_s);
                entry.len()
            })
            .unwrap_or(0);

        if (count as u32) >= threshold {
            if self.notified.contains(fingerprint) {
                false
            } else {
                self.notified.insert(fingerprint.to_string());
                true
            }
        } else {
            self.notified.remove(fingerprint);
            false
        }
    }
}

fn evict_older_than(entry: &mut VecDeque<f64>, now: f64, window_s: f64) {
    while let Some(&oldest) = entry.front() {
        if now - oldest > window_s {
            entry.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_strips_paths_and_limits_tokens() {
        let fp = fingerprint("leaky", "/usr/bin/leaky --config /etc/leaky/cfg.toml --verbose --extra --more");
        assert_eq!(fp, "leaky --config cfg.toml --verbose");
    }

    #[test]
    fn notifies_once_per_threshold_crossing() {
        let mut tracker = RecidivismTracker::new();
        tracker.record_kill("leaky", 0.0, 600.0);
        tracker.record_kill("leaky", 10.0, 600.0);
        assert!(!tracker.should_notify("leaky", 10.0, 600.0, 3));

        tracker.record_kill("leaky", 20.0, 600.0);
        assert!(tracker.should_notify("leaky", 20.0, 600.0, 3));
        // Already notified for this streak; no repeat until it resets.
        assert!(!tracker.should_notify("leaky", 25.0, 600.0, 3));
    }

    #[test]
    fn window_rolloff_resets_notification_dedup() {
        let mut tracker = RecidivismTracker::new();
        tracker.record_kill("leaky", 0.0, 100.0);
        tracker.record_kill("leaky", 10.0, 100.0);
        tracker.record_kill("leaky", 20.0, 100.0);
        assert!(tracker.should_notify("leaky", 20.0, 100.0, 3));

        // Far enough later that all three kills have rolled off the window.
        assert!(!tracker.should_notify("leaky", 500.0, 100.0, 3));

        tracker.record_kill("leaky", 500.0, 100.0);
        tracker.record_kill("leaky", 510.0, 100.0);
        tracker.record_kill("leaky", 520.0, 100.0);
        assert!(tracker.should_notify("leaky", 520.0, 100.0, 3));
    }
}
