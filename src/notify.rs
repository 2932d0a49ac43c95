//! One-shot desktop notification for the recidivism tracker.
//!
//! Grounded on `other_examples/marvinbraga-oom_guard`'s use of `notify-rust`
//! (declared `optional` behind a cargo feature, same as here) and on
//! `platform::traits::SystemTray::show_notification`'s
//! `(title, message, urgency)` shape. `notify-rust` has no built-in deadline,
//! so the call runs on a helper thread and is abandoned after 2s per §5;
//! failures are swallowed, matching the "notification shell-out... failures
//! are swallowed" resource model.

#[cfg(feature = "notify-dbus")]
use std::sync::mpsc;
#[cfg(feature = "notify-dbus")]
use std::thread;
#[cfg(feature = "notify-dbus")]
use std::time::Duration;

#[cfg(feature = "notify-dbus")]
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(2);
#[cfg(feature = "notify-dbus")]
const TITLE: &str = "Process Killer";

/// Fires a one-shot notification summarizing a repeat-offender fingerprint
/// and its kill count. Never blocks longer than 2s and never returns an
/// error the caller must handle — a failed or slow notification is not
/// allowed to stall the scheduler loop.
pub fn notify_recidivist(fingerprint: &str, count: usize) {
    #[cfg(feature = "notify-dbus")]
    {
        send_with_timeout(fingerprint, count);
    }
    #[cfg(not(feature = "notify-dbus"))]
    {
        let _ = (fingerprint, count);
        tracing::debug!("notify-dbus feature disabled; skipping desktop notification");
    }
}

#[cfg(feature = "notify-dbus")]
fn send_with_timeout(fingerprint: &str, count: usize) {
    let body = format!("{fingerprint} has been killed {count} times recently");
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        let result = notify_rust::Notification::new()
            .summary(TITLE)
            .body(&body)
            .show();
        let _ = tx.send(result.is_ok());
    });

    match rx.recv_timeout(NOTIFY_TIMEOUT) {
        Ok(true) => tracing::debug!("desktop notification sent"),
        Ok(false) => tracing::warn!("desktop notification failed"),
        Err(_) => tracing::warn!("desktop notification timed out after {NOTIFY_TIMEOUT:?}"),
    }
    // Don't join: a wedged D-Bus call must not block the tick loop.
    drop(handle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_never_panics_without_a_session_bus() {
        // CI/headless environments have no D-Bus session; this must return
        // promptly regardless of the feature flag.
        notify_recidivist("leaky --flag", 3);
    }
}
