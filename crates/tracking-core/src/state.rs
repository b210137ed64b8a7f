//! Synchronized store shared by the control loop, the UI refresh tick, and
//! the calibration wizard.
//!
//! The store is a "latest value wins" register: every accessor takes the
//! lock for a single field copy and releases it immediately. There is no
//! history and no queue; slow readers simply observe the most recent value.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::{
    config::{DEFAULT_CLICK_THRESHOLD, DEFAULT_MARGIN, DEFAULT_SMOOTHING_ALPHA},
    landmarks::HandLandmarks,
};

/// Discrete gesture published once per control cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum GestureLabel {
    /// A hand is visible and no pinch is held.
    #[default]
    None,
    /// A pinch press is currently held.
    Pinch,
    /// Reserved for a future scroll gesture; never produced today.
    Scroll,
    /// No hand in the last observation.
    NoHand,
}

impl GestureLabel {
    /// Human readable label used by the dashboard and log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            GestureLabel::None => "None",
            GestureLabel::Pinch => "Click (Pinch)",
            GestureLabel::Scroll => "Scroll",
            GestureLabel::NoHand => "No Hand",
        }
    }
}

impl fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest annotated frame, handed to the preview surface untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct PreviewFrame {
    pub data: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    pub timestamp_ms: i64,
}

/// The three tunable parameters, always read and written as one unit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Parameters {
    pub margin: f64,
    pub click_threshold: f64,
    pub smoothing_alpha: f64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            margin: DEFAULT_MARGIN,
            click_threshold: DEFAULT_CLICK_THRESHOLD,
            smoothing_alpha: DEFAULT_SMOOTHING_ALPHA,
        }
    }
}

/// Read-only view for the UI refresh tick.
#[derive(Clone, Debug, PartialEq)]
pub struct Telemetry {
    pub fps: f64,
    pub gesture: GestureLabel,
    pub hand_detected: bool,
    pub calibrating: bool,
    pub calibration_message: String,
    pub cursor_enabled: bool,
}

struct StateInner {
    landmarks: Option<HandLandmarks>,
    frame: Option<PreviewFrame>,
    hand_detected: bool,
    gesture: GestureLabel,
    fps: f64,
    cursor_enabled: bool,
    calibrating: bool,
    calibration_message: String,
    params: Parameters,
}

/// Single source of truth for live observations and tunable parameters.
///
/// Values outside a parameter's documented range are stored as given;
/// writers are responsible for clamping.
pub struct SharedState {
    inner: Mutex<StateInner>,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    pub fn new() -> Self {
        Self::with_parameters(Parameters::default())
    }

    pub fn with_parameters(params: Parameters) -> Self {
        Self {
            inner: Mutex::new(StateInner {
                landmarks: None,
                frame: None,
                hand_detected: false,
                gesture: GestureLabel::None,
                fps: 0.0,
                cursor_enabled: true,
                calibrating: false,
                calibration_message: String::new(),
                params,
            }),
        }
    }

    /// A panicking writer cannot leave a field half-written, so a poisoned
    /// lock still guards consistent data.
    fn lock(&self) -> MutexGuard<'_, StateInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Observations ───────────────────────────────────────

    pub fn set_landmarks(&self, landmarks: Option<HandLandmarks>) {
        self.lock().landmarks = landmarks;
    }

    pub fn landmarks(&self) -> Option<HandLandmarks> {
        self.lock().landmarks.clone()
    }

    pub fn set_frame(&self, frame: PreviewFrame) {
        self.lock().frame = Some(frame);
    }

    pub fn frame(&self) -> Option<PreviewFrame> {
        self.lock().frame.clone()
    }

    // ── Live telemetry ─────────────────────────────────────

    pub fn set_hand_detected(&self, detected: bool) {
        self.lock().hand_detected = detected;
    }

    pub fn is_hand_detected(&self) -> bool {
        self.lock().hand_detected
    }

    pub fn set_gesture(&self, gesture: GestureLabel) {
        self.lock().gesture = gesture;
    }

    pub fn gesture(&self) -> GestureLabel {
        self.lock().gesture
    }

    pub fn set_fps(&self, fps: f64) {
        self.lock().fps = fps;
    }

    pub fn fps(&self) -> f64 {
        self.lock().fps
    }

    /// Copy every telemetry field under one short lock.
    pub fn telemetry(&self) -> Telemetry {
        let inner = self.lock();
        Telemetry {
            fps: inner.fps,
            gesture: inner.gesture,
            hand_detected: inner.hand_detected,
            calibrating: inner.calibrating,
            calibration_message: inner.calibration_message.clone(),
            cursor_enabled: inner.cursor_enabled,
        }
    }

    // ── Cursor control ─────────────────────────────────────

    pub fn set_cursor_enabled(&self, enabled: bool) {
        self.lock().cursor_enabled = enabled;
    }

    pub fn cursor_enabled(&self) -> bool {
        self.lock().cursor_enabled
    }

    /// Flip cursor control and return the new value.
    pub fn toggle_cursor(&self) -> bool {
        let mut inner = self.lock();
        inner.cursor_enabled = !inner.cursor_enabled;
        inner.cursor_enabled
    }

    // ── Calibration ────────────────────────────────────────

    pub fn set_calibrating(&self, calibrating: bool) {
        self.lock().calibrating = calibrating;
    }

    pub fn is_calibrating(&self) -> bool {
        self.lock().calibrating
    }

    pub fn set_calibration_message(&self, message: impl Into<String>) {
        self.lock().calibration_message = message.into();
    }

    pub fn clear_calibration_message(&self) {
        self.lock().calibration_message.clear();
    }

    pub fn calibration_message(&self) -> String {
        self.lock().calibration_message.clone()
    }

    // ── Parameters ─────────────────────────────────────────

    pub fn parameters(&self) -> Parameters {
        self.lock().params
    }

    pub fn set_parameters(&self, params: Parameters) {
        self.lock().params = params;
    }

    pub fn margin(&self) -> f64 {
        self.lock().params.margin
    }

    pub fn set_margin(&self, margin: f64) {
        self.lock().params.margin = margin;
    }

    pub fn click_threshold(&self) -> f64 {
        self.lock().params.click_threshold
    }

    pub fn set_click_threshold(&self, threshold: f64) {
        self.lock().params.click_threshold = threshold;
    }

    pub fn smoothing_alpha(&self) -> f64 {
        self.lock().params.smoothing_alpha
    }

    pub fn set_smoothing_alpha(&self, alpha: f64) {
        self.lock().params.smoothing_alpha = alpha;
    }
}
