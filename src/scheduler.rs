//! The tick loop: ties the sampler, oracle, history, detector, tuner,
//! scorer, killer, recidivism tracker, and whitelist together.
//!
//! Structurally grounded on `core::optimizer::IntelligentOptimizer::run_loop`
//! (evaluate -> act -> sleep) and on `platform::linux::daemon`'s
//! signal-hook-based graceful shutdown. Deliberately NOT async: the
//! specification calls for "a single-threaded cooperative loop... no locks
//! are required", so this uses `std::thread::sleep` rather than the
//! teacher's `tokio::time::sleep` — the one place this crate departs from
//! the teacher's own concurrency primitive, recorded in the design ledger.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use signal_hook::consts::{SIGINT, SIGTERM};

use crate::actionlog::ActionLog;
use crate::config::{Config, Mode};
use crate::detector;
use crate::fsm::{self, ProcState};
use crate::history::{HistoryStore, RecordKey};
use crate::killer::{self, Reason};
use crate::oracle::MemoryOracle;
use crate::recidivism::{self, RecidivismTracker};
use crate::sampler::Sampler;
use crate::scorer;
use crate::tuner;
use crate::whitelist::Whitelist;

/// How often a summary line is logged, independent of the tick interval.
const STATUS_REPORT_INTERVAL_S: f64 = 60.0;

pub struct Scheduler {
    config: Config,
    sampler: Sampler,
    oracle: MemoryOracle,
    history: HistoryStore,
    recidivism: RecidivismTracker,
    whitelist: Whitelist,
    log: ActionLog,
    started_at: Instant,
    last_status_report_s: f64,
}

impl Scheduler {
    pub fn new(config: Config) -> std::io::Result<Self> {
        let log = ActionLog::open(&config.log_path)?;
        let own_pid = std::process::id();
        let session_leader = session_leader_pid();
        let whitelist = Whitelist::new(own_pid, session_leader, config.iterm_only);

        Ok(Scheduler {
            config,
            sampler: Sampler::new(),
            oracle: MemoryOracle::new(),
            history: HistoryStore::new(),
            recidivism: RecidivismTracker::new(),
            whitelist,
            log,
            started_at: Instant::now(),
            last_status_report_s: 0.0,
        })
    }

    fn now(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    /// Runs until a termination signal arrives. Monotonic pacing: each
    /// tick's duration is measured and the sleep is `interval - elapsed`,
    /// clamped to zero.
    pub fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let shutdown = register_signal_handlers()?;
        let interval = Duration::from_secs(self.config.interval_s);

        while !shutdown.load(Ordering::Relaxed) {
            let tick_started = Instant::now();
            let now = self.now();

            if let Err(e) = self.tick(now) {
                tracing::warn!("tick failed, state preserved for next tick: {e}");
            }

            let elapsed = tick_started.elapsed();
            let remaining = interval.saturating_sub(elapsed);
            sleep_interruptible(remaining, &shutdown);
        }

        self.log.flush()?;
        tracing::info!("shutdown signal received, exiting cleanly");
        Ok(())
    }

    fn tick(&mut self, now: f64) -> Result<(), Box<dyn std::error::Error>> {
        let mem = self.oracle.read()?;
        let thresholds = tuner::compute(&self.config, mem.total_mb(), mem.used_pct());

        let processes = self.sampler.snapshot(self.config.interval_s);
        let containers = if self.config.docker {
            self.sampler
                .container_snapshot("docker")
                .or_else(|_| self.sampler.container_snapshot("podman"))
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        self.history.observe(
            &processes,
            &containers,
            now,
            thresholds.history_len,
            self.config.grace_s as f64,
        );

        self.classify_all(now, &thresholds, mem.total_bytes);
        self.process_killable(now, &mem);

        if mem.used_pct() >= thresholds.high_pct {
            self.run_pressure_relief(now, &thresholds)?;
        }

        if now - self.last_status_report_s >= STATUS_REPORT_INTERVAL_S {
            tracing::info!(
                "status: tracked={} used_pct={:.1} mode={:?}",
                self.history.len(),
                mem.used_pct(),
                self.config.mode,
            );
            self.last_status_report_s = now;
        }

        Ok(())
    }

    fn classify_all(&mut self, now: f64, thresholds: &tuner::EffectiveThresholds, total_ram_bytes: u64) {
        let mut keys = self.history.keys();
        keys.sort_by_key(sort_key);

        for key in keys {
            let Some(record) = self.history.get(&key) else { continue };
            if record.state == ProcState::Killable {
                // Left to process_killable; re-classifying a still-killable
                // record here would race with the kill attempt below.
                continue;
            }

            let whitelisted = match &key {
                RecordKey::Process(pid) => {
                    self.whitelist
                        .is_whitelisted(&record.basename, *pid, record.terminal_descendant)
                }
                RecordKey::Container(_) => false,
            };

            let classification = detector::classify(record, thresholds, total_ram_bytes, self.config.interval_s as f64);
            let (state, confirm, not_before) = fsm::advance(
                record.state,
                record.confirm,
                record.not_before,
                now,
                self.config.cool_s as f64,
                classification.as_ref(),
                self.config.conf,
                whitelisted,
            );

            if let Some(record) = self.history.get_mut(&key) {
                record.state = state;
                record.confirm = confirm;
                record.not_before = not_before;
                record.last_classification = classification;
            }
        }
    }

    fn process_killable(&mut self, now: f64, mem: &crate::oracle::SystemMemory) {
        let gated = matches!(self.config.mode, Mode::Protection)
            && mem.used_pct() < self.config.leak_threshold_pct;
        if gated {
            return;
        }

        let mut keys = self.history.keys();
        keys.sort_by_key(sort_key);

        for key in keys {
            let Some(record) = self.history.get(&key) else { continue };
            if record.state != ProcState::Killable {
                continue;
            }

            let reason = if record
                .last_classification
                .map(|c| c.predictive)
                .unwrap_or(false)
            {
                Reason::Predictive
            } else {
                Reason::Leak
            };

            self.kill_record(&key, now, reason);
        }
    }

    fn run_pressure_relief(
        &mut self,
        now: f64,
        thresholds: &tuner::EffectiveThresholds,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let candidates: Vec<_> = self
            .history
            .iter()
            .filter(|r| match &r.key {
                RecordKey::Process(pid) => {
                    !self.whitelist.is_whitelisted(&r.basename, *pid, r.terminal_descendant)
                }
                RecordKey::Container(_) => true,
            })
            .collect();

        let ranked = scorer::rank(candidates.into_iter(), now, self.config.w_child, self.config.w_recent);

        for candidate in ranked {
            self.kill_record(&candidate.key, now, Reason::Pressure);

            let mem = self.oracle.read()?;
            if mem.used_pct() <= thresholds.low_pct {
                break;
            }
        }
        Ok(())
    }

    fn kill_record(&mut self, key: &RecordKey, now: f64, reason: Reason) {
        let Some(record) = self.history.get(key) else { return };
        let basename = record.basename.clone();
        let cmdline = record.cmdline.clone();
        let rss_mb = record
            .samples
            .back()
            .map(|s| s.rss_bytes as f64 / (1024.0 * 1024.0))
            .unwrap_or(0.0);
        let slope = record.last_classification.map(|c| c.slope_mbpm).unwrap_or(0.0);

        let outcome = match key {
            RecordKey::Process(pid) => killer::kill_process(*pid, &mut self.sampler),
            RecordKey::Container(id) => killer::stop_container("docker", id),
        };

        let pid_for_log = match key {
            RecordKey::Process(pid) => *pid,
            RecordKey::Container(_) => 0,
        };

        match outcome {
            Ok(()) => {
                let _ = self.log.record("killed", pid_for_log, &basename, reason, rss_mb, slope);
                self.history.remove(key);

                let fp = recidivism::fingerprint(&basename, &cmdline);
                let count = self.recidivism.record_kill(&fp, now, self.config.notify_window_s as f64);
                if self
                    .recidivism
                    .should_notify(&fp, now, self.config.notify_window_s as f64, self.config.notify_threshold)
                {
                    crate::notify::notify_recidivist(&fp, count);
                }
            }
            Err(e) => {
                let event = match e {
                    killer::KillError::PermissionDenied => "kill_permission_denied",
                    killer::KillError::NotFound => "kill_not_found",
                    _ => "kill_failed",
                };
                let _ = self.log.record(event, pid_for_log, &basename, reason, rss_mb, slope);

                if let Some(record) = self.history.get_mut(key) {
                    let (state, confirm, not_before) = fsm::cooldown(now, self.config.cool_s as f64);
                    record.state = state;
                    record.confirm = confirm;
                    record.not_before = not_before;
                }
            }
        }
    }
}

fn sort_key(key: &RecordKey) -> (u8, u32, String) {
    match key {
        RecordKey::Process(pid) => (0, *pid, String::new()),
        RecordKey::Container(id) => (1, 0, id.clone()),
    }
}

fn session_leader_pid() -> Option<u32> {
    let sid = unsafe { libc::getsid(0) };
    if sid < 0 {
        None
    } else {
        Some(sid as u32)
    }
}

fn register_signal_handlers() -> Result<Arc<AtomicBool>, Box<dyn std::error::Error>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGTERM, Arc::clone(&shutdown))?;
    signal_hook::flag::register(SIGINT, Arc::clone(&shutdown))?;
    Ok(shutdown)
}

/// Sleeps in short slices so a signal arriving mid-sleep is noticed promptly
/// rather than after the full remaining interval.
fn sleep_interruptible(duration: Duration, shutdown: &Arc<AtomicBool>) {
    const SLICE: Duration = Duration::from_millis(100);
    let mut remaining = duration;
    while remaining > Duration::ZERO {
        if shutdown.load(Ordering::Relaxed) {
            return;
        }
        let slice = remaining.min(SLICE);
        std::thread::sleep(slice);
        remaining -= slice;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_key_orders_processes_before_containers() {
        let mut keys = vec![
            RecordKey::Container("zzz".into()),
            RecordKey::Process(50),
            RecordKey::Process(10),
        ];
        keys.sort_by_key(sort_key);
        assert_eq!(
            keys,
            vec![
                RecordKey::Process(10),
                RecordKey::Process(50),
                RecordKey::Container("zzz".into()),
            ]
        );
    }

    #[test]
    fn session_leader_lookup_does_not_panic() {
        let _ = session_leader_pid();
    }

    #[test]
    fn unused_candidate_set_never_touches_whitelisted_pid_one() {
        // Invariant 2 at the filter stage: PID 1 never survives the
        // candidate filter even if somehow tracked.
        let whitelist = Whitelist::new(std::process::id(), None, false);
        assert!(whitelist.is_protected_pid(1));
    }
}
