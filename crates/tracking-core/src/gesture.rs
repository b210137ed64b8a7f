//! Pinch classification, finger geometry, and exponential cursor smoothing.
//!
//! Everything here is a pure computation except [`GestureEngine::smooth`],
//! which carries the previous smoothed position from one cycle to the next.

use crate::landmarks::{Finger, HandLandmark, HandLandmarks, LandmarkError};

/// Normalized distance between the index fingertip and the thumb tip.
pub fn pinch_distance(landmarks: &HandLandmarks) -> Result<f64, LandmarkError> {
    landmarks.distance(HandLandmark::IndexTip, HandLandmark::ThumbTip)
}

/// Whether the index and thumb tips are closer than `threshold`.
pub fn classify_pinch(landmarks: &HandLandmarks, threshold: f64) -> Result<bool, LandmarkError> {
    Ok(pinch_distance(landmarks)? < threshold)
}

/// A finger counts as extended when its tip is farther from the wrist than
/// its DIP joint.
pub fn is_finger_extended(landmarks: &HandLandmarks, finger: Finger) -> Result<bool, LandmarkError> {
    let tip = landmarks.distance(finger.tip(), HandLandmark::Wrist)?;
    let dip = landmarks.distance(finger.dip(), HandLandmark::Wrist)?;
    Ok(tip > dip)
}

/// A finger counts as folded when its tip is closer to the wrist than its
/// PIP joint. Distances to the wrist survive hand rotation, unlike raw `y`.
pub fn is_finger_folded(landmarks: &HandLandmarks, finger: Finger) -> Result<bool, LandmarkError> {
    let tip = landmarks.distance(finger.tip(), HandLandmark::Wrist)?;
    let pip = landmarks.distance(finger.pip(), HandLandmark::Wrist)?;
    Ok(tip < pip)
}

/// Map a normalized coordinate from `[margin, 1 - margin]` onto `[0, extent]`.
///
/// Values outside the source interval extrapolate linearly; callers clamp
/// the final pixel position. A degenerate interval (`margin >= 0.5`) maps
/// everything to the centre.
pub fn map_to_screen(value: f64, margin: f64, extent: f64) -> f64 {
    let lo = margin;
    let hi = 1.0 - margin;
    let span = hi - lo;
    if span <= f64::EPSILON {
        return extent * 0.5;
    }
    (value - lo) / span * extent
}

/// Holds the previous smoothed cursor position.
///
/// The position starts at the origin, so the first observation after
/// startup pulls the cursor partway toward `(0, 0)`. There is no reset.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GestureEngine {
    prev_x: f64,
    prev_y: f64,
}

impl GestureEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exponential moving average per axis:
    /// `new = alpha * target + (1 - alpha) * previous`.
    pub fn smooth(&mut self, target_x: f64, target_y: f64, alpha: f64) -> (f64, f64) {
        let x = alpha * target_x + (1.0 - alpha) * self.prev_x;
        let y = alpha * target_y + (1.0 - alpha) * self.prev_y;
        self.prev_x = x;
        self.prev_y = y;
        (x, y)
    }

    /// Last smoothed position.
    pub fn previous(&self) -> (f64, f64) {
        (self.prev_x, self.prev_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{LANDMARK_COUNT, Landmark};

    fn open_hand() -> HandLandmarks {
        let mut hand = HandLandmarks::new(vec![Landmark::new(0.5, 0.5); LANDMARK_COUNT]);
        hand.set(HandLandmark::Wrist, Landmark::new(0.5, 0.9));
        hand.set(HandLandmark::ThumbTip, Landmark::new(0.3, 0.5));
        hand.set(HandLandmark::IndexPip, Landmark::new(0.5, 0.6));
        hand.set(HandLandmark::IndexDip, Landmark::new(0.5, 0.5));
        hand.set(HandLandmark::IndexTip, Landmark::new(0.5, 0.4));
        hand
    }

    #[test]
    fn test_pinch_detection() {
        let mut hand = open_hand();
        assert!(!classify_pinch(&hand, 0.05).expect("complete hand"));

        hand.set(HandLandmark::ThumbTip, Landmark::new(0.52, 0.4));
        assert!((pinch_distance(&hand).expect("complete hand") - 0.02).abs() < 1e-9);
        assert!(classify_pinch(&hand, 0.05).expect("complete hand"));
        assert!(!classify_pinch(&hand, 0.02).expect("complete hand"));
    }

    #[test]
    fn test_pinch_on_partial_hand_fails() {
        let partial = HandLandmarks::new(vec![Landmark::default(); 5]);
        assert!(classify_pinch(&partial, 0.05).is_err());
    }

    #[test]
    fn test_extension_and_fold() {
        let mut hand = open_hand();
        assert!(is_finger_extended(&hand, Finger::Index).expect("complete hand"));
        assert!(!is_finger_folded(&hand, Finger::Index).expect("complete hand"));

        // Curl the tip back toward the palm, below the PIP joint.
        hand.set(HandLandmark::IndexTip, Landmark::new(0.5, 0.7));
        assert!(!is_finger_extended(&hand, Finger::Index).expect("complete hand"));
        assert!(is_finger_folded(&hand, Finger::Index).expect("complete hand"));
    }

    #[test]
    fn test_map_to_screen() {
        assert!((map_to_screen(0.15, 0.15, 1920.0) - 0.0).abs() < 1e-9);
        assert!((map_to_screen(0.85, 0.15, 1920.0) - 1920.0).abs() < 1e-9);
        assert!((map_to_screen(0.5, 0.15, 1920.0) - 960.0).abs() < 1e-9);
        // Outside the control region values extrapolate.
        assert!(map_to_screen(0.0, 0.15, 1920.0) < 0.0);
        assert!(map_to_screen(1.0, 0.15, 1920.0) > 1920.0);
        assert_eq!(map_to_screen(0.3, 0.5, 1000.0), 500.0);
    }

    #[test]
    fn test_first_smooth_pulls_from_origin() {
        let mut engine = GestureEngine::new();
        let (x, y) = engine.smooth(1000.0, 500.0, 0.5);
        assert_eq!((x, y), (500.0, 250.0));
        assert_eq!(engine.previous(), (500.0, 250.0));
    }

    #[test]
    fn test_smoothing_is_convex_combination() {
        let mut engine = GestureEngine::new();
        engine.smooth(400.0, 300.0, 1.0);
        let targets = [(10.0, 900.0), (1800.0, 20.0), (960.0, 540.0), (0.0, 0.0)];
        for alpha in [0.1, 0.25, 0.5, 0.8, 0.9] {
            for &(tx, ty) in &targets {
                let (px, py) = engine.previous();
                let (x, y) = engine.smooth(tx, ty, alpha);
                assert!(x >= px.min(tx) - 1e-9 && x <= px.max(tx) + 1e-9);
                assert!(y >= py.min(ty) - 1e-9 && y <= py.max(ty) + 1e-9);
                // Both axes move by the same fraction of the way.
                if (tx - px).abs() > 1e-9 && (ty - py).abs() > 1e-9 {
                    let fx = (x - px) / (tx - px);
                    let fy = (y - py) / (ty - py);
                    assert!((fx - alpha).abs() < 1e-9 && (fy - alpha).abs() < 1e-9);
                }
            }
        }
    }
}
