//! Live control pipeline: a landmark source drives the OS cursor while a
//! console dashboard reports telemetry and accepts commands.
//!
//! The module is split into focused submodules:
//! - `config`: CLI configuration parsing.
//! - `pipeline`: Supervisor that wires the source, control loop, dashboard
//!   and watchdog together and restarts on faults.
//! - `dashboard`: UI refresh tick and stdin commands.
//! - `watchdog`: Health monitoring for the pipeline threads.

/// Re-export pipeline settings so callers can configure runs without reaching
/// into submodules.
pub use config::{ControlCliArgs, ControlConfig, SourceKind};
/// Launch the control pipeline with a ready-made configuration.
pub use pipeline::run;

mod config;
mod dashboard;
mod pipeline;
mod watchdog;
