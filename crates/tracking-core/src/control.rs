//! Per-frame control loop and its detector and cursor seams.
//!
//! One cycle takes one observation, publishes it to the shared store,
//! steers the cursor toward the index fingertip and turns the pinch into
//! edge-triggered press/release events.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Instant,
};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    config::{CONTROL_LOOP_YIELD, ScreenSize},
    gesture::{GestureEngine, classify_pinch, map_to_screen},
    landmarks::{HandLandmark, HandLandmarks, LandmarkError},
    state::{GestureLabel, Parameters, PreviewFrame, SharedState},
};

/// What the detector produced for one captured frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Observation {
    /// `None` when no hand was detected.
    pub landmarks: Option<HandLandmarks>,
    pub frame: Option<PreviewFrame>,
}

impl Observation {
    pub fn hand(landmarks: HandLandmarks) -> Self {
        Self {
            landmarks: Some(landmarks),
            frame: None,
        }
    }

    pub fn no_hand() -> Self {
        Self::default()
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("observation source closed")]
    Closed,
    #[error("observation source failed: {reason}")]
    Failed { reason: String },
}

/// Capture device plus hand detector.
pub trait ObservationSource: Send {
    /// Next observation. `Ok(None)` is an empty capture read and is skipped.
    fn next_observation(&mut self) -> Result<Option<Observation>, SourceError>;

    /// Release the capture device. Called once when the loop stops.
    fn close(&mut self) {}
}

impl<T: ObservationSource + ?Sized> ObservationSource for Box<T> {
    fn next_observation(&mut self) -> Result<Option<Observation>, SourceError> {
        (**self).next_observation()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

#[derive(Debug, Error)]
#[error("cursor injection failed: {reason}")]
pub struct CursorError {
    pub reason: String,
}

impl CursorError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// OS pointer injection in absolute pixels.
pub trait CursorSink {
    fn move_to(&mut self, x: i32, y: i32) -> Result<(), CursorError>;
    fn press(&mut self) -> Result<(), CursorError>;
    fn release(&mut self) -> Result<(), CursorError>;
}

impl<T: CursorSink + ?Sized> CursorSink for Box<T> {
    fn move_to(&mut self, x: i32, y: i32) -> Result<(), CursorError> {
        (**self).move_to(x, y)
    }

    fn press(&mut self) -> Result<(), CursorError> {
        (**self).press()
    }

    fn release(&mut self) -> Result<(), CursorError> {
        (**self).release()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClickEvent {
    Press,
    Release,
}

impl ClickEvent {
    fn label(self) -> &'static str {
        match self {
            ClickEvent::Press => "press",
            ClickEvent::Release => "release",
        }
    }
}

/// Outcome of one control cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct CycleReport {
    pub hand_detected: bool,
    pub gesture: GestureLabel,
    pub event: Option<ClickEvent>,
    pub fps: f64,
    /// Pixel position the cursor was moved to, if it moved.
    pub cursor: Option<(i32, i32)>,
}

pub struct ControlLoop<S, C> {
    source: S,
    cursor: C,
    state: Arc<SharedState>,
    screen: ScreenSize,
    engine: GestureEngine,
    pressed: bool,
    last_cycle: Option<Instant>,
    closed: bool,
}

impl<S: ObservationSource, C: CursorSink> ControlLoop<S, C> {
    pub fn new(source: S, cursor: C, state: Arc<SharedState>, screen: ScreenSize) -> Self {
        Self::with_engine(source, cursor, state, screen, GestureEngine::new())
    }

    /// Resume from a smoothed cursor position carried over from an earlier
    /// loop in the same process.
    pub fn with_engine(
        source: S,
        cursor: C,
        state: Arc<SharedState>,
        screen: ScreenSize,
        engine: GestureEngine,
    ) -> Self {
        Self {
            source,
            cursor,
            state,
            screen,
            engine,
            pressed: false,
            last_cycle: None,
            closed: false,
        }
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    /// Smoothing state to hand to the next loop after this one stops.
    pub fn engine(&self) -> GestureEngine {
        self.engine
    }

    /// Whether a pinch press is currently held.
    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// Pull observations until `live` is cleared or the source closes.
    ///
    /// `on_tick` runs once per iteration, with the cycle's report when an
    /// observation was processed. A held press is released and the source
    /// closed on every exit.
    pub fn run(
        &mut self,
        live: &AtomicBool,
        mut on_tick: impl FnMut(Option<&CycleReport>),
    ) -> Result<(), SourceError> {
        let _span = tracing::info_span!("control.loop", screen = %self.screen).entered();
        info!("Control loop started");

        let result = loop {
            if !live.load(Ordering::Relaxed) {
                break Ok(());
            }
            match self.source.next_observation() {
                Ok(Some(observation)) => {
                    let started = Instant::now();
                    let report = self.cycle(observation, started);
                    metrics::histogram!("handcursor_cycle_seconds")
                        .record(started.elapsed().as_secs_f64());
                    on_tick(Some(&report));
                }
                Ok(None) => on_tick(None),
                Err(SourceError::Closed) => {
                    info!("Observation source closed");
                    break Ok(());
                }
                Err(err) => break Err(err),
            }
            thread::sleep(CONTROL_LOOP_YIELD);
        };

        self.shutdown();
        info!("Control loop stopped");
        result
    }

    /// Process one observation received at `now`.
    pub fn cycle(&mut self, observation: Observation, now: Instant) -> CycleReport {
        let fps = match self.last_cycle.replace(now) {
            Some(previous) => {
                let dt = now.saturating_duration_since(previous).as_secs_f64();
                if dt > 0.0 { 1.0 / dt } else { 0.0 }
            }
            None => 0.0,
        };

        let Observation { landmarks, frame } = observation;
        if let Some(frame) = frame {
            self.state.set_frame(frame);
        }
        let landmarks = landmarks.filter(|hand| {
            let complete = hand.is_complete();
            if !complete {
                debug!(points = hand.len(), "Skipping incomplete landmark set");
            }
            complete
        });

        let mut report = CycleReport {
            hand_detected: landmarks.is_some(),
            gesture: GestureLabel::NoHand,
            event: None,
            fps,
            cursor: None,
        };

        match landmarks {
            None => {
                self.state.set_landmarks(None);
                report.event = self.release_click();
            }
            Some(hand) => {
                self.state.set_landmarks(Some(hand.clone()));
                let params = self.state.parameters();
                let control_active = self.state.cursor_enabled() && !self.state.is_calibrating();
                if control_active {
                    match self.drive_cursor(&hand, &params) {
                        Ok((position, event)) => {
                            report.cursor = Some(position);
                            report.event = event;
                        }
                        Err(err) => warn!("Skipping cursor update: {err}"),
                    }
                } else {
                    report.event = self.release_click();
                }
                report.gesture = if self.pressed {
                    GestureLabel::Pinch
                } else {
                    GestureLabel::None
                };
            }
        }

        self.state.set_hand_detected(report.hand_detected);
        self.state.set_gesture(report.gesture);
        self.state.set_fps(fps);
        metrics::gauge!("handcursor_fps").set(fps);
        report
    }

    /// Release any held press and close the source. Safe to call twice.
    pub fn shutdown(&mut self) {
        self.release_click();
        if !self.closed {
            self.source.close();
            self.closed = true;
        }
    }

    fn drive_cursor(
        &mut self,
        hand: &HandLandmarks,
        params: &Parameters,
    ) -> Result<((i32, i32), Option<ClickEvent>), LandmarkError> {
        let tip = hand.point(HandLandmark::IndexTip)?;
        let pinching = classify_pinch(hand, params.click_threshold)?;

        let width = f64::from(self.screen.width);
        let height = f64::from(self.screen.height);
        let target_x = map_to_screen(tip.x, params.margin, width);
        let target_y = map_to_screen(tip.y, params.margin, height);
        let (x, y) = self
            .engine
            .smooth(target_x, target_y, params.smoothing_alpha);
        let position = (
            x.clamp(0.0, (width - 1.0).max(0.0)).round() as i32,
            y.clamp(0.0, (height - 1.0).max(0.0)).round() as i32,
        );
        if let Err(err) = self.cursor.move_to(position.0, position.1) {
            warn!("Cursor move failed: {err}");
        }

        let event = if pinching && !self.pressed {
            self.press_click()
        } else if !pinching && self.pressed {
            self.release_click()
        } else {
            None
        };
        Ok((position, event))
    }

    fn press_click(&mut self) -> Option<ClickEvent> {
        if let Err(err) = self.cursor.press() {
            warn!("Cursor press failed: {err}");
            return None;
        }
        self.pressed = true;
        Some(self.record(ClickEvent::Press))
    }

    fn release_click(&mut self) -> Option<ClickEvent> {
        if !self.pressed {
            return None;
        }
        self.pressed = false;
        if let Err(err) = self.cursor.release() {
            warn!("Cursor release failed: {err}");
        }
        Some(self.record(ClickEvent::Release))
    }

    fn record(&self, event: ClickEvent) -> ClickEvent {
        debug!(event = event.label(), "Click");
        metrics::counter!("handcursor_click_events_total", "kind" => event.label()).increment(1);
        event
    }
}
