//! The per-process detection state machine.
//!
//! A tagged variant with six states, not class polymorphism: `advance` is a
//! pure function of `(state, classification, now, config)`, matching the
//! design note in the specification that transitions should not carry hidden
//! ownership or side effects.

/// Lifecycle state of a tracked process or container record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    /// Newly observed; too young to classify.
    Grace,
    /// Classified every tick, not currently showing a leak.
    Watch,
    /// Leaking on the most recent classification; accumulating confirmations.
    Confirming,
    /// Confirmed leak; eligible for termination.
    Killable,
    /// Flat trend sustained across a full window; about to cool down.
    Plateau,
    /// Past a kill failure or a plateau; waiting out `cool` before re-watching.
    Cooling,
}

/// One tick's regression-derived verdict for a record with a full window.
#[derive(Debug, Clone, Copy)]
pub struct Classification {
    pub slope_mbpm: f64,
    pub growth_mb: f64,
    pub r_squared: f64,
    /// Slope and growth both clear the effective thresholds.
    pub leaking: bool,
    /// Projected RSS at `now + 2*interval` would exceed the safety ceiling.
    pub predictive: bool,
    /// Window is full, slope ~0, and RSS has not decreased across it.
    pub plateaued: bool,
}

/// Advance one record's state machine by one tick.
///
/// `classification` is `None` when the record does not yet have enough
/// samples to regress over (still effectively a grace-period observation as
/// far as leak detection is concerned, even once it has left `Grace`).
#[allow(clippy::too_many_arguments)]
pub fn advance(
    state: ProcState,
    confirm: u32,
    not_before: f64,
    now: f64,
    cool_s: f64,
    classification: Option<&Classification>,
    conf_required: u32,
    whitelisted: bool,
) -> (ProcState, u32, f64) {
    match state {
        ProcState::Grace => {
            if now >= not_before {
                (ProcState::Watch, 0, not_before)
            } else {
                (ProcState::Grace, 0, not_before)
            }
        }
        ProcState::Watch => match classification {
            Some(c) if c.predictive && !whitelisted => {
                (ProcState::Killable, confirm.max(conf_required), not_before)
            }
            Some(c) if c.leaking => (ProcState::Confirming, 1, not_before),
            Some(c) if c.plateaued => (ProcState::Plateau, 0, not_before),
            _ => (ProcState::Watch, 0, not_before),
        },
        ProcState::Confirming => match classification {
            Some(c) if c.predictive && !whitelisted => {
                (ProcState::Killable, confirm.max(conf_required), not_before)
            }
            Some(c) if c.leaking => {
                let next = confirm + 1;
                if next >= conf_required && !whitelisted {
                    (ProcState::Killable, next, not_before)
                } else {
                    // Whitelisted records stay in CONFIRMING indefinitely.
                    (ProcState::Confirming, next, not_before)
                }
            }
            _ => (ProcState::Watch, 0, not_before),
        },
        // Re-evaluated only if a kill attempt did not remove the record;
        // the scheduler drives the Killable -> Cooling edge via `cooldown`
        // on kill failure, so a bare classification pass leaves it as-is.
        ProcState::Killable => (ProcState::Killable, confirm, not_before),
        ProcState::Plateau => cooldown(now, cool_s),
        ProcState::Cooling => {
            if now >= not_before {
                (ProcState::Watch, 0, not_before)
            } else {
                (ProcState::Cooling, confirm, not_before)
            }
        }
    }
}

/// Transition into `Cooling`, used directly by the killer when a kill
/// attempt on a `Killable` record fails (process survives the signal).
pub fn cooldown(now: f64, cool_s: f64) -> (ProcState, u32, f64) {
    (ProcState::Cooling, 0, now + cool_s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaking_classification() -> Classification {
        Classification {
            slope_mbpm: 100.0,
            growth_mb: 300.0,
            r_squared: 0.98,
            leaking: true,
            predictive: false,
            plateaued: false,
        }
    }

    #[test]
    fn grace_holds_until_not_before() {
        let (s, c, nb) = advance(ProcState::Grace, 0, 100.0, 50.0, 300.0, None, 2, false);
        assert_eq!(s, ProcState::Grace);
        assert_eq!(c, 0);
        assert_eq!(nb, 100.0);
    }

    #[test]
    fn grace_expires_into_watch() {
        let (s, _, _) = advance(ProcState::Grace, 0, 100.0, 100.0, 300.0, None, 2, false);
        assert_eq!(s, ProcState::Watch);
    }

    #[test]
    fn watch_to_confirming_to_killable_matches_s1() {
        let leak = leaking_classification();
        let (s1, c1, _) = advance(ProcState::Watch, 0, 0.0, 3.0, 300.0, Some(&leak), 2, false);
        assert_eq!(s1, ProcState::Confirming);
        assert_eq!(c1, 1);

        let (s2, c2, _) = advance(ProcState::Confirming, c1, 0.0, 4.0, 300.0, Some(&leak), 2, false);
        assert_eq!(s2, ProcState::Killable);
        assert_eq!(c2, 2);
    }

    #[test]
    fn confirming_drops_back_to_watch_when_not_leaking() {
        let not_leaking = Classification {
            slope_mbpm: 0.0,
            growth_mb: 0.0,
            r_squared: 0.0,
            leaking: false,
            predictive: false,
            plateaued: false,
        };
        let (s, c, _) = advance(
            ProcState::Confirming,
            1,
            0.0,
            10.0,
            300.0,
            Some(&not_leaking),
            2,
            false,
        );
        assert_eq!(s, ProcState::Watch);
        assert_eq!(c, 0);
    }

    #[test]
    fn whitelisted_never_becomes_killable() {
        let leak = leaking_classification();
        let (s, c, _) = advance(ProcState::Confirming, 1, 0.0, 4.0, 300.0, Some(&leak), 2, true);
        assert_eq!(s, ProcState::Confirming);
        assert_eq!(c, 2);
    }

    #[test]
    fn predictive_shortcut_bypasses_conf_count() {
        let predictive = Classification {
            slope_mbpm: 5000.0,
            growth_mb: 10.0,
            r_squared: 0.9,
            leaking: false,
            predictive: true,
            plateaued: false,
        };
        let (s, _, _) = advance(ProcState::Watch, 0, 0.0, 1.0, 300.0, Some(&predictive), 2, false);
        assert_eq!(s, ProcState::Killable);
    }

    #[test]
    fn cooling_blocks_killable_until_not_before_elapses() {
        // Invariant 5: COOLING with now < not_before never reaches KILLABLE.
        let leak = leaking_classification();
        let (s, _, _) = advance(ProcState::Cooling, 0, 100.0, 50.0, 300.0, Some(&leak), 2, false);
        assert_eq!(s, ProcState::Cooling);
    }

    #[test]
    fn cooling_expires_into_watch() {
        let (s, c, _) = advance(ProcState::Cooling, 0, 100.0, 100.0, 300.0, None, 2, false);
        assert_eq!(s, ProcState::Watch);
        assert_eq!(c, 0);
    }

    #[test]
    fn plateau_always_cools_down() {
        let (s, c, nb) = advance(ProcState::Plateau, 0, 0.0, 100.0, 300.0, None, 2, false);
        assert_eq!(s, ProcState::Cooling);
        assert_eq!(c, 0);
        assert_eq!(nb, 400.0);
    }
}
