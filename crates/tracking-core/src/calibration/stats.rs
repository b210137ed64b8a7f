//! Statistics that turn sampled readings into clamped parameter values.

use crate::config::{
    CALIBRATED_ALPHA_RANGE, CLICK_THRESHOLD_RANGE, MARGIN_RANGE, PINCH_THRESHOLD_SCALE,
    STABILITY_MIN_SAMPLES, STABILITY_SIGMA_SPAN, clamp_to,
};

/// Symmetric margin from the horizontal extremes the hand reached:
/// `clamp((min_x + (1 - max_x)) / 2)`. `None` without samples.
pub fn margin_from_range(xs: &[f64]) -> Option<f64> {
    let min_x = xs.iter().copied().reduce(f64::min)?;
    let max_x = xs.iter().copied().reduce(f64::max)?;
    let margin = (min_x + (1.0 - max_x)) / 2.0;
    Some(clamp_to(margin, MARGIN_RANGE))
}

/// Pinch threshold slightly above the user's natural pinch:
/// `clamp(1.3 * mean)`. `None` without samples.
pub fn threshold_from_pinch(distances: &[f64]) -> Option<f64> {
    let avg = mean(distances)?;
    Some(clamp_to(avg * PINCH_THRESHOLD_SCALE, CLICK_THRESHOLD_RANGE))
}

/// Smoothing weight from hand steadiness. Needs more than
/// `STABILITY_MIN_SAMPLES` readings.
pub fn alpha_from_stability(xs: &[f64]) -> Option<f64> {
    if xs.len() <= STABILITY_MIN_SAMPLES {
        return None;
    }
    std_dev(xs).map(alpha_for_sigma)
}

/// Linear map of a standard deviation onto the calibrated alpha range,
/// inverted: steadier hands get less smoothing.
pub fn alpha_for_sigma(sigma: f64) -> f64 {
    let (steady, shaky) = STABILITY_SIGMA_SPAN;
    let (lo, hi) = CALIBRATED_ALPHA_RANGE;
    clamp_to(interp(sigma, (steady, shaky), (hi, lo)), CALIBRATED_ALPHA_RANGE)
}

/// Piecewise-linear interpolation that holds the end values outside
/// `[x0, x1]`.
pub fn interp(x: f64, (x0, x1): (f64, f64), (y0, y1): (f64, f64)) -> f64 {
    if x <= x0 {
        y0
    } else if x >= x1 {
        y1
    } else {
        y0 + (x - x0) * (y1 - y0) / (x1 - x0)
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divides by `n`).
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let avg = mean(values)?;
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}
