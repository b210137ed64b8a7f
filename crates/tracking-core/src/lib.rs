//! Real-time hand tracking core: turns landmark observations into cursor
//! movement and pinch clicks, and tunes its own parameters through a timed
//! calibration wizard.
//!
//! The crate is split into focused modules:
//! - `landmarks`: normalized hand keypoints and joint lookup.
//! - `state`: the synchronized store shared by every timing domain.
//! - `gesture`: pinch/extension geometry and cursor smoothing.
//! - `sampling`: liveness-aware waits and timed sampling windows.
//! - `calibration`: the three-phase calibration state machine.
//! - `control`: the per-frame control loop and its detector/cursor seams.
//! - `config`: defaults, parameter ranges and timing constants.

pub mod calibration;
pub mod config;
pub mod control;
pub mod gesture;
pub mod landmarks;
pub mod sampling;
pub mod state;

pub use calibration::{
    CalibrationError, CalibrationOutcome, CalibrationPhase, CalibrationReport, CalibrationWizard,
};
pub use config::{CalibrationTiming, ScreenSize};
pub use control::{
    ClickEvent, ControlLoop, CursorError, CursorSink, CycleReport, Observation, ObservationSource,
    SourceError,
};
pub use gesture::GestureEngine;
pub use landmarks::{Finger, HandLandmark, HandLandmarks, Landmark, LandmarkError};
pub use state::{GestureLabel, Parameters, PreviewFrame, SharedState, Telemetry};
