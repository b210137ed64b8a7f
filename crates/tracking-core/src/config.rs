//! Defaults, valid parameter ranges, and timing constants shared by the
//! control loop and the calibration wizard.

use std::{fmt, str::FromStr, time::Duration};

/// Fraction of the frame edge excluded from the control region at startup.
pub const DEFAULT_MARGIN: f64 = 0.15;
/// Pinch distance threshold at startup.
pub const DEFAULT_CLICK_THRESHOLD: f64 = 0.05;
/// Smoothing weight at startup.
pub const DEFAULT_SMOOTHING_ALPHA: f64 = 0.5;

/// Inclusive range accepted for `margin`.
pub const MARGIN_RANGE: (f64, f64) = (0.05, 0.4);
/// Inclusive range accepted for `click_threshold`.
pub const CLICK_THRESHOLD_RANGE: (f64, f64) = (0.02, 0.2);
/// Inclusive range accepted for a user-set `smoothing_alpha`.
pub const SMOOTHING_ALPHA_RANGE: (f64, f64) = (0.1, 0.9);
/// Narrower range the stability phase can produce.
pub const CALIBRATED_ALPHA_RANGE: (f64, f64) = (0.2, 0.8);

/// Pinch statistic multiplier applied to the mean sampled distance.
pub const PINCH_THRESHOLD_SCALE: f64 = 1.3;
/// Standard deviations mapped onto `CALIBRATED_ALPHA_RANGE` (steady, shaky).
pub const STABILITY_SIGMA_SPAN: (f64, f64) = (0.002, 0.01);
/// The stability phase needs strictly more samples than this.
pub const STABILITY_MIN_SAMPLES: usize = 10;
/// Longest error text surfaced in the calibration status message.
pub const ERROR_MESSAGE_LIMIT: usize = 20;

/// Minimal pause between control cycles so the loop never saturates a core.
pub const CONTROL_LOOP_YIELD: Duration = Duration::from_millis(1);

/// Clamp `value` into an inclusive `(lo, hi)` range.
pub fn clamp_to(value: f64, (lo, hi): (f64, f64)) -> f64 {
    value.clamp(lo, hi)
}

/// Whether `value` lies inside an inclusive `(lo, hi)` range.
pub fn in_range(value: f64, (lo, hi): (f64, f64)) -> bool {
    (lo..=hi).contains(&value)
}

/// Settle, sample, and hold durations used by every calibration phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CalibrationTiming {
    /// Pause after an instruction is shown, before sampling starts.
    pub settle: Duration,
    /// Interval between two landmark reads inside a sampling window.
    pub sample_interval: Duration,
    /// Sampling window of the range phase.
    pub range_window: Duration,
    /// Sampling window of the pinch phase.
    pub pinch_window: Duration,
    /// Sampling window of the stability phase.
    pub stability_window: Duration,
    /// How long result, completion, and error messages stay visible.
    pub result_hold: Duration,
}

impl Default for CalibrationTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(2),
            sample_interval: Duration::from_millis(50),
            range_window: Duration::from_secs(5),
            pinch_window: Duration::from_secs(4),
            stability_window: Duration::from_secs(3),
            result_hold: Duration::from_secs(2),
        }
    }
}

/// Absolute pixel extent of the screen the cursor moves on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for ScreenSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for ScreenSize {
    type Err = String;

    /// Parse `WIDTHxHEIGHT`, e.g. `1920x1080`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
        let width = w
            .trim()
            .parse::<u32>()
            .map_err(|err| format!("invalid width {w:?}: {err}"))?;
        let height = h
            .trim()
            .parse::<u32>()
            .map_err(|err| format!("invalid height {h:?}: {err}"))?;
        if width == 0 || height == 0 {
            return Err("screen dimensions must be positive".to_string());
        }
        Ok(Self { width, height })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screen_size_parse() {
        assert_eq!("1920x1080".parse::<ScreenSize>(), Ok(ScreenSize::new(1920, 1080)));
        assert_eq!("800X600".parse::<ScreenSize>(), Ok(ScreenSize::new(800, 600)));
        assert!("1920".parse::<ScreenSize>().is_err());
        assert!("0x600".parse::<ScreenSize>().is_err());
        assert!("axb".parse::<ScreenSize>().is_err());
    }

    #[test]
    fn test_default_timing_matches_phase_windows() {
        let timing = CalibrationTiming::default();
        assert_eq!(timing.settle, Duration::from_secs(2));
        assert_eq!(timing.sample_interval, Duration::from_millis(50));
        assert_eq!(timing.range_window, Duration::from_secs(5));
        assert_eq!(timing.pinch_window, Duration::from_secs(4));
        assert_eq!(timing.stability_window, Duration::from_secs(3));
    }

    #[test]
    fn test_defaults_lie_in_their_ranges() {
        assert!(in_range(DEFAULT_MARGIN, MARGIN_RANGE));
        assert!(in_range(DEFAULT_CLICK_THRESHOLD, CLICK_THRESHOLD_RANGE));
        assert!(in_range(DEFAULT_SMOOTHING_ALPHA, SMOOTHING_ALPHA_RANGE));
        assert_eq!(clamp_to(0.5, MARGIN_RANGE), 0.4);
        assert_eq!(clamp_to(0.0, CLICK_THRESHOLD_RANGE), 0.02);
    }
}
