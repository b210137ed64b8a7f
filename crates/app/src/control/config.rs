//! Configuration parsing for the control pipeline.
//!
//! This module owns translation of CLI arguments into a `ControlConfig`
//! struct which the supervisor uses without re-parsing flags.

use std::{net::SocketAddr, path::PathBuf};

use anyhow::{Result, anyhow, bail};
use clap::Args;
use landmark_ingest::ReplayOptions;
use tracking_core::{
    Parameters, ScreenSize,
    config::{CLICK_THRESHOLD_RANGE, MARGIN_RANGE, SMOOTHING_ALPHA_RANGE, in_range},
};

use crate::telemetry::TelemetryOptions;

/// Where landmark observations come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// JSON-lines recording replayed from disk.
    Replay(PathBuf),
    /// Live records from an external detector, one per UDP datagram.
    Udp(String),
}

impl SourceKind {
    /// Infer the source from a URI: `udp://host:port` or a file path.
    pub(crate) fn from_uri(uri: &str) -> Result<Self> {
        if let Some(addr) = uri.strip_prefix("udp://") {
            if addr.is_empty() {
                bail!("UDP source needs an address, e.g. udp://127.0.0.1:5005");
            }
            return Ok(SourceKind::Udp(addr.to_string()));
        }
        if uri.trim().is_empty() {
            bail!("Source must not be empty");
        }
        Ok(SourceKind::Replay(PathBuf::from(uri)))
    }
}

/// Canonical configuration for a control session.
#[derive(Clone, Debug)]
pub struct ControlConfig {
    /// Source URI as given on the command line.
    pub source_uri: String,
    pub source: SourceKind,
    /// Pacing for recordings.
    pub replay: ReplayOptions,
    /// Screen extent; queried from the OS when absent.
    pub screen: Option<ScreenSize>,
    /// Log cursor actions instead of injecting them.
    pub dry_run: bool,
    /// Initial state of the cursor-control toggle.
    pub cursor_enabled: bool,
    /// Start a calibration session as soon as the pipeline is up.
    pub calibrate_on_start: bool,
    /// Initial tunable parameters.
    pub parameters: Parameters,
    pub telemetry: TelemetryOptions,
}

/// CLI arguments accepted by the `run` subcommand.
#[derive(Debug, Args)]
pub struct ControlCliArgs {
    /// Landmark source: a JSON-lines recording or udp://host:port.
    #[arg(long = "source", value_name = "URI")]
    pub source: String,
    /// Replay rate for recordings without timestamps.
    #[arg(long = "replay-fps", value_name = "FPS", default_value_t = 30.0)]
    pub replay_fps: f64,
    /// Restart the recording when it ends.
    #[arg(long = "loop", action = clap::ArgAction::SetTrue)]
    pub looping: bool,
    /// Screen size in pixels, e.g. 1920x1080. Queried from the OS by default.
    #[arg(long = "screen", value_name = "WxH")]
    pub screen: Option<ScreenSize>,
    /// Log cursor actions instead of moving the real pointer.
    #[arg(long = "dry-run", action = clap::ArgAction::SetTrue)]
    pub dry_run: bool,
    /// Start with cursor control disabled.
    #[arg(long = "no-cursor", action = clap::ArgAction::SetTrue)]
    pub no_cursor: bool,
    /// Run the calibration wizard at startup.
    #[arg(long = "calibrate", action = clap::ArgAction::SetTrue)]
    pub calibrate: bool,
    /// Initial control-region margin (0.05-0.4).
    #[arg(long = "margin", value_name = "FRACTION")]
    pub margin: Option<f64>,
    /// Initial pinch threshold (0.02-0.2).
    #[arg(long = "click-threshold", value_name = "DISTANCE")]
    pub click_threshold: Option<f64>,
    /// Initial smoothing weight (0.1-0.9).
    #[arg(long = "smoothing", value_name = "ALPHA")]
    pub smoothing: Option<f64>,
    /// Serve Prometheus metrics on this address.
    #[arg(long = "metrics-addr", value_name = "ADDR")]
    pub metrics_addr: Option<SocketAddr>,
    /// Enable debug logging.
    #[arg(long = "verbose", action = clap::ArgAction::SetTrue)]
    pub verbose: bool,
}

impl TryFrom<ControlCliArgs> for ControlConfig {
    type Error = anyhow::Error;

    fn try_from(args: ControlCliArgs) -> Result<Self> {
        let source = SourceKind::from_uri(&args.source)?;

        if !args.replay_fps.is_finite() || args.replay_fps <= 0.0 {
            bail!("--replay-fps must be a positive number");
        }

        let defaults = Parameters::default();
        let margin = checked("--margin", args.margin, MARGIN_RANGE)?.unwrap_or(defaults.margin);
        let click_threshold = checked("--click-threshold", args.click_threshold, CLICK_THRESHOLD_RANGE)?
            .unwrap_or(defaults.click_threshold);
        let smoothing_alpha = checked("--smoothing", args.smoothing, SMOOTHING_ALPHA_RANGE)?
            .unwrap_or(defaults.smoothing_alpha);

        Ok(Self {
            source_uri: args.source,
            source,
            replay: ReplayOptions {
                fps: args.replay_fps,
                looping: args.looping,
            },
            screen: args.screen,
            dry_run: args.dry_run,
            cursor_enabled: !args.no_cursor,
            calibrate_on_start: args.calibrate,
            parameters: Parameters {
                margin,
                click_threshold,
                smoothing_alpha,
            },
            telemetry: TelemetryOptions {
                metrics_addr: args.metrics_addr,
                verbose: args.verbose,
            },
        })
    }
}

fn checked(flag: &str, value: Option<f64>, range: (f64, f64)) -> Result<Option<f64>> {
    match value {
        Some(v) if !in_range(v, range) => Err(anyhow!(
            "{flag} must be between {} and {}, got {v}",
            range.0,
            range.1
        )),
        other => Ok(other),
    }
}
