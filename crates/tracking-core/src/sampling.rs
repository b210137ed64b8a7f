//! Liveness-aware waiting and fixed-interval sampling windows.
//!
//! Long waits are sliced so a cleared liveness flag ends them within one
//! slice instead of after the full duration.

use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

/// Longest uninterrupted sleep inside [`wait_while_live`].
pub const WAIT_SLICE: Duration = Duration::from_millis(25);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The full duration passed with the flag still set.
    Elapsed,
    /// The liveness flag was cleared first.
    Cancelled,
}

/// Result of a sampling window.
#[derive(Clone, Debug, PartialEq)]
pub enum Sampling<T> {
    /// The window closed; holds every reading the probe produced.
    Complete(Vec<T>),
    /// The liveness flag was cleared before the window closed.
    Cancelled,
}

/// Sleep for `duration` unless `live` is cleared first.
pub fn wait_while_live(duration: Duration, live: &AtomicBool) -> WaitOutcome {
    wait_until(Instant::now() + duration, live)
}

/// Sleep until `deadline` unless `live` is cleared first.
pub fn wait_until(deadline: Instant, live: &AtomicBool) -> WaitOutcome {
    loop {
        if !live.load(Ordering::Relaxed) {
            return WaitOutcome::Cancelled;
        }
        let now = Instant::now();
        if now >= deadline {
            return WaitOutcome::Elapsed;
        }
        thread::sleep((deadline - now).min(WAIT_SLICE));
    }
}

/// Call `probe` every `interval` until `window` has passed, collecting the
/// readings it returns. `Ok(None)` readings are skipped; the first error
/// ends the window and is returned.
pub fn sample_for<T, E>(
    window: Duration,
    interval: Duration,
    live: &AtomicBool,
    mut probe: impl FnMut() -> Result<Option<T>, E>,
) -> Result<Sampling<T>, E> {
    let deadline = Instant::now() + window;
    let mut samples = Vec::new();
    while Instant::now() < deadline {
        if !live.load(Ordering::Relaxed) {
            return Ok(Sampling::Cancelled);
        }
        if let Some(sample) = probe()? {
            samples.push(sample);
        }
        let next = (Instant::now() + interval).min(deadline);
        if wait_until(next, live) == WaitOutcome::Cancelled {
            return Ok(Sampling::Cancelled);
        }
    }
    Ok(Sampling::Complete(samples))
}
