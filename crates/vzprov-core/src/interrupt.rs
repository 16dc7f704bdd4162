//! SIGINT/SIGTERM handling for provisioning runs.

use std::sync::atomic::{AtomicU8, Ordering};

/// Signals received so far, saturating at 2.
static SIGNALS: AtomicU8 = AtomicU8::new(0);

/// Install the process signal handler. The first signal lets the current
/// backend command finish and stops the run before the next one; a second
/// signal exits with status 130.
pub fn install_signal_handler() {
    let result = ctrlc::set_handler(|| {
        let seen = SIGNALS
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(n.saturating_add(1).min(2))
            })
            .unwrap_or(2);
        if seen > 0 {
            std::process::exit(130);
        }
        eprintln!("\ninterrupted: stopping before the next backend command (again to abort)");
    });
    if let Err(e) = result {
        tracing::debug!("signal handler not installed: {e}");
    }
}

/// Whether a signal has asked the current run to stop.
pub fn shutdown_requested() -> bool {
    SIGNALS.load(Ordering::SeqCst) > 0
}
