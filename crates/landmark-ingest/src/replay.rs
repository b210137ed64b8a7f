//! JSON-lines recording replay.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    sync::atomic::AtomicBool,
    time::Duration,
};

use crossbeam_channel::Sender;
use tracing::{debug, info};
use tracking_core::sampling::{WaitOutcome, wait_while_live};

use crate::{
    feed::{FeedItem, LandmarkFeed},
    types::{IngestError, LandmarkRecord},
};

/// Pacing used when replaying a recording.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReplayOptions {
    /// Rate for records without timestamps and for blank lines.
    pub fps: f64,
    /// Start over at end of file.
    pub looping: bool,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            fps: 30.0,
            looping: false,
        }
    }
}

/// Replay a recording on a background thread.
///
/// The file is opened before this returns, so a missing recording fails
/// here rather than inside the reader. Records carrying timestamps are
/// released at their recorded pace; the rest at `options.fps`.
pub fn spawn_file_reader(
    path: impl AsRef<Path>,
    options: ReplayOptions,
) -> Result<LandmarkFeed, IngestError> {
    let path = path.as_ref().to_path_buf();
    let file = open_recording(&path)?;
    info!(path = %path.display(), fps = options.fps, looping = options.looping, "Replaying landmark recording");

    LandmarkFeed::spawn("landmark-replay", move |tx, running| {
        if let Err(err) = replay_loop(&path, file, options, &tx, &running) {
            let _ = tx.send(Err(err));
        }
    })
}

/// Load every non-blank record of a recording.
pub fn read_recording(path: impl AsRef<Path>) -> Result<Vec<LandmarkRecord>, IngestError> {
    let path = path.as_ref();
    let reader = BufReader::new(open_recording(path)?);
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        if let Some(record) = parse(path, idx, &line?)? {
            records.push(record);
        }
    }
    Ok(records)
}

fn open_recording(path: &Path) -> Result<File, IngestError> {
    File::open(path).map_err(|source| IngestError::Open {
        uri: path.display().to_string(),
        source,
    })
}

fn parse(path: &Path, idx: usize, line: &str) -> Result<Option<LandmarkRecord>, IngestError> {
    LandmarkRecord::parse_line(line).map_err(|source| IngestError::Parse {
        path: PathBuf::from(path),
        line: idx + 1,
        source,
    })
}

fn frame_interval(fps: f64) -> Duration {
    if fps.is_finite() && fps > 0.0 {
        Duration::from_secs_f64(1.0 / fps)
    } else {
        Duration::ZERO
    }
}

fn replay_loop(
    path: &Path,
    first: File,
    options: ReplayOptions,
    tx: &Sender<FeedItem>,
    running: &AtomicBool,
) -> Result<(), IngestError> {
    let fallback = frame_interval(options.fps);
    let mut pending = Some(first);

    loop {
        let file = match pending.take() {
            Some(file) => file,
            None => open_recording(path)?,
        };
        let mut produced = 0usize;
        let mut previous_ts: Option<i64> = None;

        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let record = parse(path, idx, &line?)?;
            let ts = record.as_ref().and_then(|record| record.timestamp_ms);
            let delay = match (previous_ts, ts) {
                (Some(prev), Some(ts)) => Duration::from_millis(ts.saturating_sub(prev).max(0) as u64),
                (None, Some(_)) => Duration::ZERO,
                (_, None) => fallback,
            };
            if ts.is_some() {
                previous_ts = ts;
            }

            if wait_while_live(delay, running) == WaitOutcome::Cancelled {
                return Ok(());
            }
            if tx.send(Ok(record)).is_err() {
                return Ok(());
            }
            produced += 1;
        }

        if !options.looping || produced == 0 {
            break;
        }
        debug!(path = %path.display(), records = produced, "Recording looped");
    }

    info!(path = %path.display(), "Recording finished");
    Ok(())
}
