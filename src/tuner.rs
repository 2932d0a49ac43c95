//! Adaptive threshold tuning: a RAM-tier table crossed with a pressure
//! multiplier, recomputed once per tick from current total RAM and used%.
//!
//! There is no direct teacher analogue for this scoring (the optimizer's own
//! thresholds are static), so the tier/multiplier shape is new to this crate;
//! it reuses the teacher's `SystemMemoryInfo::is_high_pressure`-style
//! percentage gating as its building block.

use crate::config::Config;

const MIB_PER_GIB: f64 = 1024.0;

/// One RAM-size tier's baseline detection thresholds.
#[derive(Debug, Clone, Copy)]
struct Tier {
    max_total_mb: f64,
    history_len: usize,
    growth_mb: f64,
    slope_mbpm: f64,
    high_pct: f64,
    low_pct: f64,
}

const TIERS: &[Tier] = &[
    Tier {
        max_total_mb: 8.0 * MIB_PER_GIB,
        history_len: 8,
        growth_mb: 20.0,
        slope_mbpm: 10.0,
        high_pct: 85.0,
        low_pct: 80.0,
    },
    Tier {
        max_total_mb: 16.0 * MIB_PER_GIB,
        history_len: 6,
        growth_mb: 50.0,
        slope_mbpm: 20.0,
        high_pct: 90.0,
        low_pct: 85.0,
    },
    Tier {
        max_total_mb: 32.0 * MIB_PER_GIB,
        history_len: 6,
        growth_mb: 100.0,
        slope_mbpm: 30.0,
        high_pct: 92.0,
        low_pct: 87.0,
    },
    // "loose": anything above the relaxed ceiling.
    Tier {
        max_total_mb: f64::INFINITY,
        history_len: 6,
        growth_mb: 200.0,
        slope_mbpm: 40.0,
        high_pct: 94.0,
        low_pct: 89.0,
    },
];

/// Thresholds actually in force for the current tick, after tier lookup,
/// user overrides, and pressure adjustment.
#[derive(Debug, Clone, Copy)]
pub struct EffectiveThresholds {
    pub history_len: usize,
    pub growth_mb: f64,
    pub slope_mbpm: f64,
    pub high_pct: f64,
    pub low_pct: f64,
}

fn tier_for(total_mb: f64) -> &'static Tier {
    TIERS
        .iter()
        .find(|t| total_mb <= t.max_total_mb)
        .unwrap_or(&TIERS[TIERS.len() - 1])
}

/// Computes the effective thresholds for a tick.
///
/// `used_pct` drives the pressure multiplier: above `high_pct - 5` the leak
/// thresholds tighten by 0.7x, and above `high_pct` by 0.5x (rounded to the
/// nearest integer MB/minute or MB), so a host already under pressure flags
/// leaks sooner. A user-supplied override always wins outright, bypassing
/// both tier lookup and multiplier.
pub fn compute(config: &Config, total_mb: f64, used_pct: f64) -> EffectiveThresholds {
    let tier = tier_for(total_mb);

    let high_pct = config.high_pct.unwrap_or(tier.high_pct);
    let low_pct = config.low_pct.unwrap_or(tier.low_pct);
    let history_len = config.history.unwrap_or(tier.history_len);

    let pressure_mult = if used_pct > high_pct {
        0.5
    } else if used_pct > high_pct - 5.0 {
        0.7
    } else {
        1.0
    };

    let growth_mb = config
        .growth_mb
        .unwrap_or_else(|| (tier.growth_mb * pressure_mult).round());
    let slope_mbpm = config
        .slope_mbpm
        .unwrap_or_else(|| (tier.slope_mbpm * pressure_mult).round());

    EffectiveThresholds {
        history_len,
        growth_mb,
        slope_mbpm,
        high_pct,
        low_pct,
    }
}
