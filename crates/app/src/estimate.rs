//! Offline calibration: derive the three parameters from recordings of each
//! wizard phase, using the same statistics as a live session.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use landmark_ingest::read_recording;
use serde::Serialize;
use tracing::{info, warn};
use tracking_core::{HandLandmark, HandLandmarks, calibration::stats, gesture::pinch_distance};

use crate::telemetry::{self, TelemetryOptions};

/// CLI arguments accepted by the `estimate` subcommand.
#[derive(Debug, Args)]
pub struct EstimateArgs {
    /// Recording of the hand sweeping from far left to far right.
    #[arg(long = "range", value_name = "FILE")]
    pub range: Option<PathBuf>,
    /// Recording of a natural, held pinch.
    #[arg(long = "pinch", value_name = "FILE")]
    pub pinch: Option<PathBuf>,
    /// Recording of the hand held steady.
    #[arg(long = "stability", value_name = "FILE")]
    pub stability: Option<PathBuf>,
    /// Print the result as JSON.
    #[arg(long = "json", action = clap::ArgAction::SetTrue)]
    pub json: bool,
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct Estimate {
    pub margin: Option<f64>,
    pub click_threshold: Option<f64>,
    pub smoothing_alpha: Option<f64>,
}

type Probe = fn(&HandLandmarks) -> Option<f64>;
type Statistic = fn(&[f64]) -> Option<f64>;

pub fn run(args: EstimateArgs) -> Result<()> {
    let _telemetry_guard = telemetry::enter_runtime(&TelemetryOptions::default());
    let estimate = estimate(&args)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&estimate)?);
        return Ok(());
    }
    print_value("margin", args.range.is_some(), estimate.margin.map(|v| format!("{v:.2}")));
    print_value(
        "click threshold",
        args.pinch.is_some(),
        estimate.click_threshold.map(|v| format!("{v:.3}")),
    );
    print_value(
        "smoothing",
        args.stability.is_some(),
        estimate.smoothing_alpha.map(|v| format!("{v:.2}")),
    );
    Ok(())
}

fn print_value(label: &str, requested: bool, value: Option<String>) {
    match (requested, value) {
        (_, Some(value)) => println!("{label}: {value}"),
        (true, None) => println!("{label}: not enough data"),
        (false, None) => {}
    }
}

pub(crate) fn estimate(args: &EstimateArgs) -> Result<Estimate> {
    if args.range.is_none() && args.pinch.is_none() && args.stability.is_none() {
        bail!("Provide at least one of --range, --pinch or --stability");
    }

    Ok(Estimate {
        margin: phase(args.range.as_deref(), index_tip_x, stats::margin_from_range)?,
        click_threshold: phase(args.pinch.as_deref(), pinch, stats::threshold_from_pinch)?,
        smoothing_alpha: phase(args.stability.as_deref(), index_tip_x, stats::alpha_from_stability)?,
    })
}

fn phase(path: Option<&Path>, probe: Probe, statistic: Statistic) -> Result<Option<f64>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let records = read_recording(path)
        .with_context(|| format!("Failed to read recording {}", path.display()))?;
    let samples: Vec<f64> = records
        .iter()
        .filter_map(|record| record.landmarks.as_ref())
        .filter_map(probe)
        .collect();
    info!(
        path = %path.display(),
        records = records.len(),
        samples = samples.len(),
        "Loaded calibration samples"
    );

    let value = statistic(&samples);
    if value.is_none() {
        warn!("{}: not enough hand samples", path.display());
    }
    Ok(value)
}

fn index_tip_x(hand: &HandLandmarks) -> Option<f64> {
    hand.point(HandLandmark::IndexTip).ok().map(|point| point.x)
}

fn pinch(hand: &HandLandmarks) -> Option<f64> {
    pinch_distance(hand).ok()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;
    use tracking_core::{Landmark, landmarks::LANDMARK_COUNT};

    use super::*;

    fn hand_json(index_x: f64, pinch: f64) -> String {
        let mut hand = HandLandmarks::new(vec![Landmark::new(0.5, 0.5); LANDMARK_COUNT]);
        hand.set(HandLandmark::IndexTip, Landmark::new(index_x, 0.5));
        hand.set(HandLandmark::ThumbTip, Landmark::new(index_x, 0.5 + pinch));
        let record = serde_json::json!({ "landmarks": hand });
        record.to_string()
    }

    fn recording(lines: &[String]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        for line in lines {
            writeln!(file, "{line}").expect("write");
        }
        file.flush().expect("flush");
        file
    }

    fn args() -> EstimateArgs {
        EstimateArgs {
            range: None,
            pinch: None,
            stability: None,
            json: false,
        }
    }

    #[test]
    fn test_requires_a_recording() {
        assert!(estimate(&args()).is_err());
    }

    #[test]
    fn test_range_and_pinch_scenarios() {
        let range = recording(&[
            hand_json(0.2, 0.1),
            r#"{"landmarks":null}"#.to_string(),
            hand_json(0.3, 0.1),
            hand_json(0.8, 0.1),
            hand_json(0.25, 0.1),
        ]);
        let pinch = recording(&[hand_json(0.5, 0.03), hand_json(0.5, 0.04), hand_json(0.5, 0.05)]);

        let result = estimate(&EstimateArgs {
            range: Some(range.path().to_path_buf()),
            pinch: Some(pinch.path().to_path_buf()),
            ..args()
        })
        .expect("estimate");

        assert!((result.margin.expect("margin") - 0.2).abs() < 1e-9);
        assert!((result.click_threshold.expect("threshold") - 0.052).abs() < 1e-9);
        assert_eq!(result.smoothing_alpha, None);
    }

    #[test]
    fn test_stability_needs_enough_samples() {
        let steady: Vec<String> = (0..11).map(|_| hand_json(0.5, 0.1)).collect();
        let file = recording(&steady);
        let result = estimate(&EstimateArgs {
            stability: Some(file.path().to_path_buf()),
            ..args()
        })
        .expect("estimate");
        assert_eq!(result.smoothing_alpha, Some(0.8));

        let short = recording(&steady[..10]);
        let result = estimate(&EstimateArgs {
            stability: Some(short.path().to_path_buf()),
            ..args()
        })
        .expect("estimate");
        assert_eq!(result.smoothing_alpha, None);
    }

    #[test]
    fn test_missing_recording_fails() {
        let result = estimate(&EstimateArgs {
            pinch: Some(PathBuf::from("/nonexistent/pinch.jsonl")),
            ..args()
        });
        assert!(result.is_err());
    }
}
