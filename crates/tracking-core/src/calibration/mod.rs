//! Three-phase calibration wizard.
//!
//! A session walks `Idle → RangeCalibration → PinchCalibration →
//! StabilityCalibration → Complete`. Each phase shows an instruction, lets
//! the user settle, samples the store's landmarks for a fixed window, and
//! commits one clamped parameter. A phase without usable samples reports a
//! failure in the status message and the session moves on. Any other fault
//! ends the session in `Failed`.
//!
//! At most one session runs at a time. The session's [`SessionGuard`]
//! clears the calibration flag, the status message, and the single-flight
//! latch when it is dropped, on every exit path including unwinding.

pub mod stats;

use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    config::{CalibrationTiming, ERROR_MESSAGE_LIMIT},
    gesture::pinch_distance,
    landmarks::{HandLandmark, LandmarkError},
    sampling::{Sampling, WaitOutcome, sample_for, wait_while_live},
    state::SharedState,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CalibrationPhase {
    #[default]
    Idle,
    RangeCalibration,
    PinchCalibration,
    StabilityCalibration,
    Complete,
    Failed,
}

impl CalibrationPhase {
    pub fn label(self) -> &'static str {
        match self {
            CalibrationPhase::Idle => "idle",
            CalibrationPhase::RangeCalibration => "range",
            CalibrationPhase::PinchCalibration => "pinch",
            CalibrationPhase::StabilityCalibration => "stability",
            CalibrationPhase::Complete => "complete",
            CalibrationPhase::Failed => "failed",
        }
    }
}

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error(transparent)]
    Landmark(#[from] LandmarkError),
    #[error("calibration cancelled")]
    Cancelled,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CalibrationOutcome {
    Completed,
    /// Ended by an internal fault; holds the full error text.
    Failed(String),
    /// The liveness flag was cleared mid-session.
    Cancelled,
}

impl CalibrationOutcome {
    fn label(&self) -> &'static str {
        match self {
            CalibrationOutcome::Completed => "completed",
            CalibrationOutcome::Failed(_) => "failed",
            CalibrationOutcome::Cancelled => "cancelled",
        }
    }
}

/// Parameters committed by one session, and how it ended.
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationReport {
    pub margin: Option<f64>,
    pub click_threshold: Option<f64>,
    pub smoothing_alpha: Option<f64>,
    pub outcome: CalibrationOutcome,
}

/// The statistic each sampling phase computes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PhaseKind {
    Range,
    Pinch,
    Stability,
}

impl PhaseKind {
    fn instruction(self) -> &'static str {
        match self {
            PhaseKind::Range => "Step 1/3: Move hand FAR LEFT -> FAR RIGHT",
            PhaseKind::Pinch => "Step 2/3: Pinch fingers naturally (Hold Pinch)",
            PhaseKind::Stability => "Step 3/3: Hold hand STEADY",
        }
    }

    fn failure(self) -> &'static str {
        match self {
            PhaseKind::Range => "Step 1 Failed: No hand detected",
            PhaseKind::Pinch => "Step 2 Failed: No hand detected",
            PhaseKind::Stability => "Step 3 Failed: Not enough data",
        }
    }

    fn window(self, timing: &CalibrationTiming) -> Duration {
        match self {
            PhaseKind::Range => timing.range_window,
            PhaseKind::Pinch => timing.pinch_window,
            PhaseKind::Stability => timing.stability_window,
        }
    }
}

#[derive(Default)]
struct SessionSlot {
    running: AtomicBool,
    phase: Mutex<CalibrationPhase>,
}

impl SessionSlot {
    fn set_phase(&self, phase: CalibrationPhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    fn phase(&self) -> CalibrationPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Proof that the caller owns the single active session. Dropping it tears
/// the session down.
struct SessionGuard {
    state: Arc<SharedState>,
    slot: Arc<SessionSlot>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.state.set_calibrating(false);
        self.state.clear_calibration_message();
        self.slot.set_phase(CalibrationPhase::Idle);
        self.slot.running.store(false, Ordering::Release);
        debug!("calibration session torn down");
    }
}

/// Runs calibration sessions against a shared store. Clones share the
/// single-flight latch.
#[derive(Clone)]
pub struct CalibrationWizard {
    state: Arc<SharedState>,
    timing: CalibrationTiming,
    slot: Arc<SessionSlot>,
}

impl CalibrationWizard {
    pub fn new(state: Arc<SharedState>) -> Self {
        Self::with_timing(state, CalibrationTiming::default())
    }

    pub fn with_timing(state: Arc<SharedState>, timing: CalibrationTiming) -> Self {
        Self {
            state,
            timing,
            slot: Arc::new(SessionSlot::default()),
        }
    }

    pub fn timing(&self) -> CalibrationTiming {
        self.timing
    }

    /// Whether a session is in progress.
    pub fn is_running(&self) -> bool {
        self.slot.running.load(Ordering::Acquire)
    }

    /// Phase of the active session, `Idle` when none is running.
    pub fn phase(&self) -> CalibrationPhase {
        self.slot.phase()
    }

    /// Start a session on a dedicated thread.
    ///
    /// Returns `None` and leaves the active session untouched when one is
    /// already running. The session ends early once `live` is cleared.
    pub fn start(&self, live: Arc<AtomicBool>) -> Option<thread::JoinHandle<CalibrationReport>> {
        let guard = self.try_begin()?;
        let wizard = self.clone();
        let dispatch = tracing::dispatcher::get_default(|current| current.clone());
        let spawned = thread::Builder::new()
            .name("calibration".into())
            .spawn(move || {
                tracing::dispatcher::with_default(&dispatch, || wizard.run_session(guard, &live))
            });
        match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                error!("failed to spawn calibration thread: {err}");
                None
            }
        }
    }

    /// Run a session on the calling thread. `None` when one is already
    /// running elsewhere.
    pub fn run_blocking(&self, live: &AtomicBool) -> Option<CalibrationReport> {
        let guard = self.try_begin()?;
        Some(self.run_session(guard, live))
    }

    fn try_begin(&self) -> Option<SessionGuard> {
        if self
            .slot
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("calibration already running; ignoring start request");
            return None;
        }
        self.state.set_calibrating(true);
        Some(SessionGuard {
            state: self.state.clone(),
            slot: self.slot.clone(),
        })
    }

    fn run_session(&self, guard: SessionGuard, live: &AtomicBool) -> CalibrationReport {
        let _span = tracing::info_span!("calibration.session").entered();
        info!("Calibration started");

        let mut report = CalibrationReport {
            margin: None,
            click_threshold: None,
            smoothing_alpha: None,
            outcome: CalibrationOutcome::Completed,
        };

        report.outcome = match self.drive(&mut report, live) {
            Ok(()) => CalibrationOutcome::Completed,
            Err(CalibrationError::Cancelled) => {
                warn!("Calibration cancelled");
                CalibrationOutcome::Cancelled
            }
            Err(err) => {
                error!("Calibration error: {err}");
                self.slot.set_phase(CalibrationPhase::Failed);
                self.state
                    .set_calibration_message(format!("Error: {}", truncate(&err.to_string())));
                let _ = wait_while_live(self.timing.result_hold, live);
                CalibrationOutcome::Failed(err.to_string())
            }
        };

        metrics::counter!(
            "handcursor_calibration_sessions_total",
            "outcome" => report.outcome.label()
        )
        .increment(1);
        info!(outcome = report.outcome.label(), "Calibration finished");
        drop(guard);
        report
    }

    /// Step the state machine from `RangeCalibration` to a terminal phase.
    fn drive(
        &self,
        report: &mut CalibrationReport,
        live: &AtomicBool,
    ) -> Result<(), CalibrationError> {
        let mut phase = CalibrationPhase::RangeCalibration;
        loop {
            self.slot.set_phase(phase);
            debug!(phase = phase.label(), "calibration phase");
            phase = match phase {
                CalibrationPhase::Idle => CalibrationPhase::RangeCalibration,
                CalibrationPhase::RangeCalibration => {
                    report.margin = self.run_phase(PhaseKind::Range, live)?;
                    CalibrationPhase::PinchCalibration
                }
                CalibrationPhase::PinchCalibration => {
                    report.click_threshold = self.run_phase(PhaseKind::Pinch, live)?;
                    CalibrationPhase::StabilityCalibration
                }
                CalibrationPhase::StabilityCalibration => {
                    report.smoothing_alpha = self.run_phase(PhaseKind::Stability, live)?;
                    CalibrationPhase::Complete
                }
                CalibrationPhase::Complete => {
                    self.state.set_calibration_message("Calibration Complete!");
                    self.hold(self.timing.result_hold, live)?;
                    return Ok(());
                }
                CalibrationPhase::Failed => return Ok(()),
            };
        }
    }

    /// Instruction, settle, sample, commit, result, pause.
    fn run_phase(&self, kind: PhaseKind, live: &AtomicBool) -> Result<Option<f64>, CalibrationError> {
        self.state.set_calibration_message(kind.instruction());
        self.hold(self.timing.settle, live)?;

        let sampled = sample_for(
            kind.window(&self.timing),
            self.timing.sample_interval,
            live,
            || self.probe(kind),
        )?;
        let Sampling::Complete(samples) = sampled else {
            return Err(CalibrationError::Cancelled);
        };
        debug!(phase = ?kind, samples = samples.len(), "sampling window closed");

        let committed = self.commit(kind, &samples);
        match committed {
            Some(value) => info!(phase = ?kind, value, "Calibration parameter committed"),
            None => {
                warn!(phase = ?kind, samples = samples.len(), "Calibration phase failed");
                self.state.set_calibration_message(kind.failure());
            }
        }

        self.hold(self.timing.result_hold, live)?;
        Ok(committed)
    }

    /// One reading from the latest observation, `None` when no hand.
    fn probe(&self, kind: PhaseKind) -> Result<Option<f64>, CalibrationError> {
        let Some(landmarks) = self.state.landmarks() else {
            return Ok(None);
        };
        let reading = match kind {
            PhaseKind::Range | PhaseKind::Stability => {
                landmarks.point(HandLandmark::IndexTip)?.x
            }
            PhaseKind::Pinch => pinch_distance(&landmarks)?,
        };
        Ok(Some(reading))
    }

    /// Compute, clamp, and write the phase's parameter; publish the result.
    fn commit(&self, kind: PhaseKind, samples: &[f64]) -> Option<f64> {
        match kind {
            PhaseKind::Range => {
                let margin = stats::margin_from_range(samples)?;
                self.state.set_margin(margin);
                self.state
                    .set_calibration_message(format!("Range Set! Margin: {margin:.2}"));
                Some(margin)
            }
            PhaseKind::Pinch => {
                let threshold = stats::threshold_from_pinch(samples)?;
                self.state.set_click_threshold(threshold);
                self.state
                    .set_calibration_message(format!("Pinch Set! Threshold: {threshold:.3}"));
                Some(threshold)
            }
            PhaseKind::Stability => {
                let alpha = stats::alpha_from_stability(samples)?;
                self.state.set_smoothing_alpha(alpha);
                self.state
                    .set_calibration_message(format!("Stability Set! Alpha: {alpha:.2}"));
                Some(alpha)
            }
        }
    }

    fn hold(&self, duration: Duration, live: &AtomicBool) -> Result<(), CalibrationError> {
        match wait_while_live(duration, live) {
            WaitOutcome::Elapsed => Ok(()),
            WaitOutcome::Cancelled => Err(CalibrationError::Cancelled),
        }
    }
}

fn truncate(text: &str) -> String {
    text.chars().take(ERROR_MESSAGE_LIMIT).collect()
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::{
        config::{CALIBRATED_ALPHA_RANGE, CLICK_THRESHOLD_RANGE, MARGIN_RANGE, in_range},
        landmarks::{HandLandmarks, LANDMARK_COUNT, Landmark},
        state::Parameters,
    };

    fn fast_timing() -> CalibrationTiming {
        CalibrationTiming {
            settle: Duration::from_millis(5),
            sample_interval: Duration::from_millis(1),
            range_window: Duration::from_millis(40),
            pinch_window: Duration::from_millis(40),
            stability_window: Duration::from_millis(80),
            result_hold: Duration::from_millis(5),
        }
    }

    fn hand_at(x: f64, pinch: f64) -> HandLandmarks {
        let mut hand = HandLandmarks::new(vec![Landmark::new(0.5, 0.5); LANDMARK_COUNT]);
        hand.set(HandLandmark::IndexTip, Landmark::new(x, 0.5));
        hand.set(HandLandmark::ThumbTip, Landmark::new(x, 0.5 + pinch));
        hand
    }

    #[test]
    fn test_full_session_commits_all_parameters() {
        let state = Arc::new(SharedState::new());
        state.set_landmarks(Some(hand_at(0.3, 0.04)));
        let wizard = CalibrationWizard::with_timing(state.clone(), fast_timing());
        let live = AtomicBool::new(true);

        let report = wizard.run_blocking(&live).expect("no session running");
        assert_eq!(report.outcome, CalibrationOutcome::Completed);

        // A motionless hand at x=0.3: margin (0.3 + 0.7) / 2 = 0.5 → 0.4.
        assert_eq!(report.margin, Some(0.4));
        let threshold = report.click_threshold.expect("pinch committed");
        assert!((threshold - 0.052).abs() < 1e-9);
        assert_eq!(report.smoothing_alpha, Some(0.8));

        let params = state.parameters();
        assert_eq!(params.margin, 0.4);
        assert!((params.click_threshold - 0.052).abs() < 1e-9);
        assert_eq!(params.smoothing_alpha, 0.8);
        assert!(in_range(params.margin, MARGIN_RANGE));
        assert!(in_range(params.click_threshold, CLICK_THRESHOLD_RANGE));
        assert!(in_range(params.smoothing_alpha, CALIBRATED_ALPHA_RANGE));

        assert!(!state.is_calibrating());
        assert_eq!(state.calibration_message(), "");
        assert!(!wizard.is_running());
        assert_eq!(wizard.phase(), CalibrationPhase::Idle);
    }

    #[test]
    fn test_no_hand_fails_each_phase_but_continues() {
        let state = Arc::new(SharedState::new());
        let wizard = CalibrationWizard::with_timing(state.clone(), fast_timing());
        let live = AtomicBool::new(true);

        let report = wizard.run_blocking(&live).expect("no session running");
        assert_eq!(report.outcome, CalibrationOutcome::Completed);
        assert_eq!(report.margin, None);
        assert_eq!(report.click_threshold, None);
        assert_eq!(report.smoothing_alpha, None);
        assert_eq!(state.parameters(), Parameters::default());
    }

    #[test]
    fn test_failure_message_shown_then_next_phase_begins() {
        let mut timing = fast_timing();
        timing.result_hold = Duration::from_millis(150);
        let state = Arc::new(SharedState::new());
        let wizard = CalibrationWizard::with_timing(state.clone(), timing);
        let live = Arc::new(AtomicBool::new(true));
        let handle = wizard.start(live.clone()).expect("no session running");

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut saw_failure = false;
        while Instant::now() < deadline {
            let message = state.calibration_message();
            if message == "Step 1 Failed: No hand detected" {
                saw_failure = true;
            }
            if saw_failure && wizard.phase() == CalibrationPhase::PinchCalibration {
                break;
            }
            thread::sleep(Duration::from_millis(2));
        }
        assert!(saw_failure, "range failure message never published");
        assert_eq!(wizard.phase(), CalibrationPhase::PinchCalibration);

        live.store(false, Ordering::SeqCst);
        let report = handle.join().expect("calibration thread");
        assert_eq!(report.outcome, CalibrationOutcome::Cancelled);
    }

    #[test]
    fn test_second_start_is_rejected() {
        let mut timing = fast_timing();
        timing.settle = Duration::from_millis(300);
        let state = Arc::new(SharedState::new());
        let wizard = CalibrationWizard::with_timing(state.clone(), timing);
        let live = Arc::new(AtomicBool::new(true));

        let handle = wizard.start(live.clone()).expect("no session running");
        assert!(wizard.is_running());
        assert!(state.is_calibrating());
        assert!(wizard.start(live.clone()).is_none());
        assert!(wizard.clone().run_blocking(&live).is_none());
        // The running session is untouched by the rejected requests.
        assert!(wizard.is_running());
        let deadline = Instant::now() + Duration::from_secs(2);
        while state.calibration_message().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(
            state.calibration_message(),
            "Step 1/3: Move hand FAR LEFT -> FAR RIGHT"
        );

        live.store(false, Ordering::SeqCst);
        handle.join().expect("calibration thread");
        assert!(!wizard.is_running());

        let live = Arc::new(AtomicBool::new(true));
        let again = wizard.start(live.clone()).expect("latch released");
        live.store(false, Ordering::SeqCst);
        again.join().expect("calibration thread");
    }

    #[test]
    fn test_fault_mid_phase_cleans_up() {
        let state = Arc::new(SharedState::new());
        // A malformed detector result: hand present, index tip missing.
        state.set_landmarks(Some(HandLandmarks::new(vec![Landmark::new(0.5, 0.5); 4])));
        let wizard = CalibrationWizard::with_timing(state.clone(), fast_timing());
        let live = AtomicBool::new(true);

        let report = wizard.run_blocking(&live).expect("no session running");
        let CalibrationOutcome::Failed(reason) = &report.outcome else {
            panic!("expected a failed session, got {:?}", report.outcome);
        };
        assert!(reason.contains("index-tip"));
        assert_eq!(report.margin, None);

        assert!(!state.is_calibrating());
        assert_eq!(state.calibration_message(), "");
        assert!(!wizard.is_running());
        assert_eq!(wizard.phase(), CalibrationPhase::Idle);
        assert_eq!(state.parameters(), Parameters::default());
    }

    #[test]
    fn test_fault_message_is_truncated() {
        let mut timing = fast_timing();
        timing.result_hold = Duration::from_millis(300);
        let state = Arc::new(SharedState::new());
        state.set_landmarks(Some(HandLandmarks::new(vec![Landmark::new(0.5, 0.5); 4])));
        let wizard = CalibrationWizard::with_timing(state.clone(), timing);
        let live = Arc::new(AtomicBool::new(true));
        let handle = wizard.start(live.clone()).expect("no session running");

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = String::new();
        while Instant::now() < deadline {
            let message = state.calibration_message();
            if message.starts_with("Error: ") {
                seen = message;
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(seen, "Error: landmark index-tip m");
        assert_eq!(wizard.phase(), CalibrationPhase::Failed);

        let report = handle.join().expect("calibration thread");
        assert!(matches!(report.outcome, CalibrationOutcome::Failed(_)));
        assert_eq!(state.calibration_message(), "");
        assert!(!state.is_calibrating());
    }

    #[test]
    fn test_cancel_releases_session() {
        let state = Arc::new(SharedState::new());
        let wizard = CalibrationWizard::new(state.clone());
        let live = Arc::new(AtomicBool::new(true));
        let handle = wizard.start(live.clone()).expect("no session running");
        thread::sleep(Duration::from_millis(20));
        live.store(false, Ordering::SeqCst);

        let start = Instant::now();
        let report = handle.join().expect("calibration thread");
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(report.outcome, CalibrationOutcome::Cancelled);
        assert!(!state.is_calibrating());
        assert!(!wizard.is_running());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short"), "short");
        assert_eq!(truncate("abcdefghijklmnopqrstuvwxyz").len(), ERROR_MESSAGE_LIMIT);
    }
}
