//! Process and container enumeration for one tick.
//!
//! Grounded on `features::leaks::ProcessTracker::take_memory_snapshot` for
//! the sysinfo-based process walk, and on `apps::docker::DockerManager` for
//! the `docker stats` shell-out used when `--docker` is set.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use sysinfo::{Pid, System};

use crate::container::{self, ContainerError};
use crate::whitelist::TERMINAL_EMULATOR_BASENAMES;

/// One process's state as observed on a single tick.
#[derive(Debug, Clone)]
pub struct ProcessSample {
    pub pid: u32,
    pub ppid: u32,
    pub basename: String,
    pub cmdline: String,
    pub rss_bytes: u64,
    pub child_count: u32,
    pub terminal_descendant: bool,
}

/// One container's aggregate memory usage as reported by the runtime CLI.
#[derive(Debug, Clone)]
pub struct ContainerSample {
    pub id: String,
    pub name: String,
    pub rss_bytes: u64,
}

const MAX_ANCESTRY_DEPTH: u32 = 32;

/// Walks `/proc` (via `sysinfo`) once per tick; no caching between calls.
pub struct Sampler {
    sys: System,
}

impl Sampler {
    pub fn new() -> Self {
        Sampler { sys: System::new() }
    }

    /// Enumerates every process, bounded by a soft deadline of
    /// `interval_s / 2`: elapsed time is checked on every entry, and once the
    /// deadline is exceeded the scan stops and returns whatever it has
    /// gathered so far rather than risk overrunning the tick.
    pub fn snapshot(&mut self, interval_s: u64) -> Vec<ProcessSample> {
        self.sys.refresh_processes();
        let deadline = Duration::from_secs_f64(interval_s as f64 / 2.0);
        let started = Instant::now();

        let mut child_counts: HashMap<u32, u32> = HashMap::new();
        for process in self.sys.processes().values() {
            if let Some(parent) = process.parent() {
                *child_counts.entry(parent.as_u32()).or_insert(0) += 1;
            }
        }

        let mut basenames: HashMap<u32, String> = HashMap::new();
        let mut parents: HashMap<u32, u32> = HashMap::new();
        for process in self.sys.processes().values() {
            let pid = process.pid().as_u32();
            basenames.insert(pid, process.name().to_string());
            if let Some(parent) = process.parent() {
                parents.insert(pid, parent.as_u32());
            }
        }

        let mut out = Vec::new();
        for process in self.sys.processes().values() {
            if started.elapsed() > deadline {
                tracing::warn!("sampler deadline exceeded, returning partial snapshot");
                break;
            }
            let pid = process.pid().as_u32();
            let ppid = process.parent().map(|p| p.as_u32()).unwrap_or(0);
            let basename = process.name().to_string();
            let cmdline = process.cmd().join(" ");
            out.push(ProcessSample {
                pid,
                ppid,
                basename: basename.clone(),
                cmdline,
                rss_bytes: process.memory(),
                child_count: *child_counts.get(&pid).unwrap_or(&0),
                terminal_descendant: is_terminal_descendant(pid, &parents, &basenames),
            });
        }
        out
    }

    /// Looks up a single process by pid, used by the killer to re-check
    /// liveness without a full re-snapshot.
    pub fn is_alive(&mut self, pid: u32) -> bool {
        self.sys.refresh_processes();
        self.sys.process(Pid::from_u32(pid)).is_some()
    }

    pub fn container_snapshot(&self, runtime: &str) -> Result<Vec<ContainerSample>, ContainerError> {
        container::stats(runtime)
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}

fn is_terminal_descendant(
    pid: u32,
    parents: &HashMap<u32, u32>,
    basenames: &HashMap<u32, String>,
) -> bool {
    let mut current = pid;
    for _ in 0..MAX_ANCESTRY_DEPTH {
        let Some(name) = basenames.get(&current) else {
            return false;
        };
        if TERMINAL_EMULATOR_BASENAMES.iter().any(|t| name == t) {
            return true;
        }
        match parents.get(&current) {
            Some(&parent) if parent != current && parent != 0 => current = parent,
            _ => return false,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_terminal_ancestry_through_shell() {
        let mut parents = HashMap::new();
        let mut names = HashMap::new();
        names.insert(1u32, "systemd".to_string());
        names.insert(100u32, "xterm".to_string());
        names.insert(200u32, "bash".to_string());
        names.insert(300u32, "vim".to_string());
        parents.insert(100u32, 1u32);
        parents.insert(200u32, 100u32);
        parents.insert(300u32, 200u32);

        assert!(is_terminal_descendant(300, &parents, &names));
        // xterm itself counts as its own terminal ancestry.
        assert!(is_terminal_descendant(100, &parents, &names));
        assert!(!is_terminal_descendant(1, &parents, &names));
    }

    #[test]
    fn snapshot_respects_a_zero_deadline() {
        // interval_s=0 gives a deadline of 0s, so the scan must stop almost
        // immediately instead of enumerating every process on the host.
        let mut sampler = Sampler::new();
        let full = sampler.snapshot(3600).len();
        let partial = sampler.snapshot(0).len();
        assert!(partial <= full);
    }

    #[test]
    fn non_terminal_ancestry_returns_false() {
        let mut parents = HashMap::new();
        let mut names = HashMap::new();
        names.insert(1u32, "systemd".to_string());
        names.insert(50u32, "sshd".to_string());
        names.insert(60u32, "firefox".to_string());
        parents.insert(60u32, 1u32);

        assert!(!is_terminal_descendant(60, &parents, &names));
    }
}
