//! CLI flags and the run-time configuration derived from them.
//!
//! Argument parsing, help text, and version reporting are the "outer CLI" the
//! specification deliberately treats as plumbing; this module only owns the
//! flag *values* the core subsystems consume, mirroring the shape of
//! `ruvector-memopt`'s `core::config::OptimizerConfig`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Detection posture. Exactly one of `--protection-mode` / `--hunting-mode`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Kill confirmed leaks only once aggregate usage crosses `leak_threshold`.
    #[default]
    Protection,
    /// Kill confirmed leaks unconditionally.
    Hunting,
}

#[derive(Parser, Debug)]
#[command(name = "memory-leak-killer")]
#[command(about = "Detects and kills processes with a leaking memory trend", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the foreground watchdog loop.
    Run(RunArgs),
    /// Print current memory usage and tracked-process state, then exit.
    Status,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Tick period in seconds.
    #[arg(long, default_value_t = 5)]
    pub interval: u64,

    /// Sliding-window length in samples. Unset falls back to the RAM-tier default.
    #[arg(long)]
    pub history: Option<usize>,

    /// Minimum net growth in MB across the window to call it a leak. Unset
    /// falls back to the RAM-tier default.
    #[arg(long)]
    pub growth: Option<f64>,

    /// Minimum slope in MB/min to call it a leak. Unset falls back to the
    /// RAM-tier default.
    #[arg(long)]
    pub slope: Option<f64>,

    /// Consecutive confirming ticks required before a record becomes killable.
    #[arg(long, default_value_t = 2)]
    pub conf: u32,

    /// Grace period in seconds after first observation before classification starts.
    #[arg(long, default_value_t = 60)]
    pub grace: u64,

    /// Cooldown in seconds after a failed kill or a plateau before re-watching.
    #[arg(long, default_value_t = 300)]
    pub cool: u64,

    /// Used% at or above which pressure relief runs. Unset falls back to the
    /// RAM-tier default.
    #[arg(long)]
    pub high: Option<f64>,

    /// Used% at or below which pressure relief stops. Unset falls back to the
    /// RAM-tier default.
    #[arg(long)]
    pub low: Option<f64>,

    /// Recency weight (w5) in the pressure-relief score.
    #[arg(long)]
    pub recent: Option<f64>,

    /// Child-count weight (w4) in the pressure-relief score.
    #[arg(long = "child-wt")]
    pub child_wt: Option<f64>,

    /// Kills of the same fingerprint within `notify_window` before a notification fires.
    #[arg(long = "notify-threshold", default_value_t = 3)]
    pub notify_threshold: u32,

    /// Rolling window in seconds over which repeat kills are counted.
    #[arg(long = "notify-window", default_value_t = 600)]
    pub notify_window: u64,

    /// Only track processes descended from the terminal emulator's session.
    #[arg(long = "iterm-only", default_value_t = false)]
    pub iterm_only: bool,

    /// Also track containers managed by an external container runtime.
    #[arg(long, default_value_t = false)]
    pub docker: bool,

    /// Kill confirmed leaks regardless of aggregate memory pressure.
    #[arg(long = "hunting-mode", default_value_t = false)]
    pub hunting_mode: bool,

    /// Kill confirmed leaks only once usage crosses `leak_threshold` (default).
    #[arg(long = "protection-mode", default_value_t = false)]
    pub protection_mode: bool,

    /// Used% at or above which protection mode is allowed to kill.
    #[arg(long = "leak-threshold", default_value_t = 85.0)]
    pub leak_threshold: f64,
}

/// Fully resolved configuration for one run of the scheduler.
#[derive(Debug, Clone)]
pub struct Config {
    pub interval_s: u64,
    pub history: Option<usize>,
    pub growth_mb: Option<f64>,
    pub slope_mbpm: Option<f64>,
    pub conf: u32,
    pub grace_s: u64,
    pub cool_s: u64,
    pub high_pct: Option<f64>,
    pub low_pct: Option<f64>,
    pub w_recent: f64,
    pub w_child: f64,
    pub notify_threshold: u32,
    pub notify_window_s: u64,
    pub iterm_only: bool,
    pub docker: bool,
    pub mode: Mode,
    pub leak_threshold_pct: f64,
    pub log_path: PathBuf,
}

/// An invalid combination of flags was supplied. Maps to process exit code 3.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidFlagCombination(pub String);

impl std::fmt::Display for InvalidFlagCombination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid flag combination: {}", self.0)
    }
}

impl std::error::Error for InvalidFlagCombination {}

impl Config {
    pub fn from_args(args: RunArgs) -> Result<Self, InvalidFlagCombination> {
        if args.hunting_mode && args.protection_mode {
            return Err(InvalidFlagCombination(
                "--hunting-mode and --protection-mode are mutually exclusive".into(),
            ));
        }
        if let (Some(low), Some(high)) = (args.low, args.high) {
            if low >= high {
                return Err(InvalidFlagCombination(format!(
                    "--low ({low}) must be less than --high ({high})"
                )));
            }
        }
        if args.interval == 0 {
            return Err(InvalidFlagCombination("--interval must be > 0".into()));
        }

        let mode = if args.hunting_mode {
            Mode::Hunting
        } else {
            Mode::Protection
        };

        let log_path = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("memory_leak_killer.log");

        Ok(Config {
            interval_s: args.interval,
            history: args.history,
            growth_mb: args.growth,
            slope_mbpm: args.slope,
            conf: args.conf,
            grace_s: args.grace,
            cool_s: args.cool,
            high_pct: args.high,
            low_pct: args.low,
            w_recent: args.recent.unwrap_or(1.0),
            w_child: args.child_wt.unwrap_or(1.0),
            notify_threshold: args.notify_threshold,
            notify_window_s: args.notify_window,
            iterm_only: args.iterm_only,
            docker: args.docker,
            mode,
            leak_threshold_pct: args.leak_threshold,
            log_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> RunArgs {
        RunArgs {
            interval: 5,
            history: None,
            growth: None,
            slope: None,
            conf: 2,
            grace: 60,
            cool: 300,
            high: None,
            low: None,
            recent: None,
            child_wt: None,
            notify_threshold: 3,
            notify_window: 600,
            iterm_only: false,
            docker: false,
            hunting_mode: false,
            protection_mode: false,
            leak_threshold: 85.0,
        }
    }

    #[test]
    fn rejects_both_modes() {
        let mut args = base_args();
        args.hunting_mode = true;
        args.protection_mode = true;
        assert!(Config::from_args(args).is_err());
    }

    #[test]
    fn rejects_low_above_high() {
        let mut args = base_args();
        args.low = Some(90.0);
        args.high = Some(85.0);
        assert!(Config::from_args(args).is_err());
    }

    #[test]
    fn default_mode_is_protection() {
        let cfg = Config::from_args(base_args()).unwrap();
        assert_eq!(cfg.mode, Mode::Protection);
    }
}
