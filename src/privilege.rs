//! Startup capability check: can this process send signals to processes
//! owned by other users?
//!
//! Adapted from `security::privileges::PrivilegeManager::detect_level`,
//! which performs the equivalent elevation check on Windows via `net
//! session`; here the Linux analogue is effective UID 0 or `CAP_KILL` in the
//! effective capability set, read from `/proc/self/status`.

use std::fmt;
use std::fs;

const CAP_KILL_BIT: u64 = 1 << 5;

#[derive(Debug)]
pub struct InsufficientPrivilege;

impl fmt::Display for InsufficientPrivilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "insufficient privilege: need CAP_KILL or root to signal other users' processes"
        )
    }
}

impl std::error::Error for InsufficientPrivilege {}

/// Exits the caller's error path with `InsufficientPrivilege` (mapped to
/// process exit code 2) unless this process can plausibly signal processes
/// it does not own.
pub fn check() -> Result<(), InsufficientPrivilege> {
    if has_kill_capability() {
        Ok(())
    } else {
        Err(InsufficientPrivilege)
    }
}

fn has_kill_capability() -> bool {
    if unsafe { libc::geteuid() } == 0 {
        return true;
    }
    effective_capabilities()
        .map(|bits| bits & CAP_KILL_BIT != 0)
        .unwrap_or(false)
}

fn effective_capabilities() -> Option<u64> {
    let status = fs::read_to_string("/proc/self/status").ok()?;
    for line in status.lines() {
        if let Some(hex) = line.strip_prefix("CapEff:") {
            return u64::from_str_radix(hex.trim(), 16).ok();
        }
    }
    None
}

/// Best-effort self-protection: ask the kernel's OOM killer to leave this
/// process alone. Failure is logged and otherwise ignored — under extreme
/// pressure the watchdog may still be killed, but that's not fatal to
/// startup.
///
/// Grounded on `other_examples/marvinbraga-oom_guard`'s
/// `set_daemon_priority`, which writes the same `-100` to
/// `/proc/self/oom_score_adj` for the identical reason.
pub fn protect_from_oom_killer() {
    match fs::write("/proc/self/oom_score_adj", "-100") {
        Ok(()) => tracing::info!("set oom_score_adj to -100"),
        Err(e) => tracing::warn!("failed to set oom_score_adj: {e}"),
    }
}
