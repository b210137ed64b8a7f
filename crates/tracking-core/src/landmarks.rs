//! Normalized hand keypoints as reported by a 21-point landmark detector.
//!
//! Coordinates are fractions of the camera frame: `x` grows to the right,
//! `y` grows downward, both nominally in `[0, 1]`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Joint definitions ──────────────────────────────────────

/// The 21 keypoints of one hand, in detector output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandLandmark {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexDip,
    IndexTip,
    MiddleMcp,
    MiddlePip,
    MiddleDip,
    MiddleTip,
    RingMcp,
    RingPip,
    RingDip,
    RingTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// Number of keypoints in a complete landmark set.
pub const LANDMARK_COUNT: usize = 21;

impl HandLandmark {
    /// Position of the joint in the detector's output (0-20).
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wrist => "wrist",
            Self::ThumbCmc => "thumb-cmc",
            Self::ThumbMcp => "thumb-mcp",
            Self::ThumbIp => "thumb-ip",
            Self::ThumbTip => "thumb-tip",
            Self::IndexMcp => "index-mcp",
            Self::IndexPip => "index-pip",
            Self::IndexDip => "index-dip",
            Self::IndexTip => "index-tip",
            Self::MiddleMcp => "middle-mcp",
            Self::MiddlePip => "middle-pip",
            Self::MiddleDip => "middle-dip",
            Self::MiddleTip => "middle-tip",
            Self::RingMcp => "ring-mcp",
            Self::RingPip => "ring-pip",
            Self::RingDip => "ring-dip",
            Self::RingTip => "ring-tip",
            Self::PinkyMcp => "pinky-mcp",
            Self::PinkyPip => "pinky-pip",
            Self::PinkyDip => "pinky-dip",
            Self::PinkyTip => "pinky-tip",
        }
    }
}

/// Fingers with a tip and two reference joints for extension tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub fn tip(self) -> HandLandmark {
        match self {
            Self::Thumb => HandLandmark::ThumbTip,
            Self::Index => HandLandmark::IndexTip,
            Self::Middle => HandLandmark::MiddleTip,
            Self::Ring => HandLandmark::RingTip,
            Self::Pinky => HandLandmark::PinkyTip,
        }
    }

    /// Joint just below the tip. The thumb has no DIP; its IP joint stands in.
    pub fn dip(self) -> HandLandmark {
        match self {
            Self::Thumb => HandLandmark::ThumbIp,
            Self::Index => HandLandmark::IndexDip,
            Self::Middle => HandLandmark::MiddleDip,
            Self::Ring => HandLandmark::RingDip,
            Self::Pinky => HandLandmark::PinkyDip,
        }
    }

    /// Middle joint of the finger. The thumb's MCP stands in for a PIP.
    pub fn pip(self) -> HandLandmark {
        match self {
            Self::Thumb => HandLandmark::ThumbMcp,
            Self::Index => HandLandmark::IndexPip,
            Self::Middle => HandLandmark::MiddlePip,
            Self::Ring => HandLandmark::RingPip,
            Self::Pinky => HandLandmark::PinkyPip,
        }
    }
}

// ── Points ─────────────────────────────────────────────────

/// One normalized 2-D keypoint. Extra fields from the detector (e.g. `z`)
/// are ignored on deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance in normalized frame units.
    pub fn distance(&self, other: &Landmark) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LandmarkError {
    #[error("landmark {joint} missing from a set of {len} points")]
    Missing { joint: &'static str, len: usize },
}

/// Ordered keypoints of a single detected hand.
///
/// The set is not required to be complete; lookups of joints past the end
/// fail with [`LandmarkError::Missing`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandLandmarks {
    points: Vec<Landmark>,
}

impl HandLandmarks {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    /// Look up one joint.
    pub fn point(&self, joint: HandLandmark) -> Result<Landmark, LandmarkError> {
        self.points
            .get(joint.index())
            .copied()
            .ok_or(LandmarkError::Missing {
                joint: joint.as_str(),
                len: self.points.len(),
            })
    }

    /// Distance between two joints.
    pub fn distance(&self, a: HandLandmark, b: HandLandmark) -> Result<f64, LandmarkError> {
        Ok(self.point(a)?.distance(&self.point(b)?))
    }

    /// Whether every one of the 21 keypoints is present.
    pub fn is_complete(&self) -> bool {
        self.points.len() >= LANDMARK_COUNT
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Landmark] {
        &self.points
    }

    /// Replace one joint, growing the set with origin points if needed.
    pub fn set(&mut self, joint: HandLandmark, point: Landmark) {
        let idx = joint.index();
        if self.points.len() <= idx {
            self.points.resize(idx + 1, Landmark::default());
        }
        self.points[idx] = point;
    }
}

impl From<Vec<Landmark>> for HandLandmarks {
    fn from(points: Vec<Landmark>) -> Self {
        Self::new(points)
    }
}
