use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracking_core::{HandLandmarks, Observation};

/// One detector result as it appears on the wire and in recordings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkRecord {
    /// Capture time in milliseconds. Replay uses the deltas for pacing.
    #[serde(default)]
    pub timestamp_ms: Option<i64>,
    /// `null` when the detector found no hand.
    #[serde(default)]
    pub landmarks: Option<HandLandmarks>,
}

impl LandmarkRecord {
    /// Fill in the wall-clock receive time when the detector sent none.
    pub fn stamped(mut self) -> Self {
        self.timestamp_ms
            .get_or_insert_with(|| Utc::now().timestamp_millis());
        self
    }

    /// Parse one JSON-lines entry. Blank lines yield `None`.
    pub fn parse_line(line: &str) -> Result<Option<Self>, serde_json::Error> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(trimmed).map(Some)
    }

    pub fn into_observation(self) -> Observation {
        Observation {
            landmarks: self.landmarks,
            frame: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to open landmark source {uri:?}")]
    Open {
        uri: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed record at {}:{line}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
