use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, bounded, never};
use tracing::{debug, warn};
use tracking_core::{Observation, ObservationSource, SourceError};

use crate::types::{IngestError, LandmarkRecord};

/// Items a reader thread hands to its feed. `Ok(None)` is an empty read.
pub(crate) type FeedItem = Result<Option<LandmarkRecord>, IngestError>;

/// Small buffer so a slow control loop backpressures the reader.
const FEED_CAPACITY: usize = 2;

/// How long `next_observation` waits before reporting an empty read.
pub const FEED_POLL: Duration = Duration::from_millis(100);

/// Background reader thread plus the receiving end of its channel.
pub struct LandmarkFeed {
    name: String,
    rx: Receiver<FeedItem>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl LandmarkFeed {
    /// Spawn `body` on a named reader thread. The closure gets the sender
    /// and the running flag it must poll.
    pub(crate) fn spawn<F>(name: &str, body: F) -> Result<Self, IngestError>
    where
        F: FnOnce(crossbeam_channel::Sender<FeedItem>, Arc<AtomicBool>) + Send + 'static,
    {
        let (tx, rx) = bounded(FEED_CAPACITY);
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let dispatch = tracing::dispatcher::get_default(|current| current.clone());
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || tracing::dispatcher::with_default(&dispatch, || body(tx, flag)))?;

        Ok(Self {
            name: name.to_string(),
            rx,
            running,
            handle: Some(handle),
            local_addr: None,
        })
    }

    pub(crate) fn with_local_addr(mut self, addr: SocketAddr) -> Self {
        self.local_addr = Some(addr);
        self
    }

    /// Bound address of a network feed.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the reader thread is still producing.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
            && self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the reader and wait for it to exit.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        // Dropping the receiver unblocks a reader stuck on a full channel.
        self.rx = never();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!(feed = %self.name, "landmark reader thread panicked");
            } else {
                debug!(feed = %self.name, "landmark reader joined");
            }
        }
    }
}

impl ObservationSource for LandmarkFeed {
    fn next_observation(&mut self) -> Result<Option<Observation>, SourceError> {
        if self.handle.is_none() {
            return Err(SourceError::Closed);
        }
        match self.rx.recv_timeout(FEED_POLL) {
            Ok(Ok(Some(record))) => Ok(Some(record.into_observation())),
            Ok(Ok(None)) | Err(RecvTimeoutError::Timeout) => Ok(None),
            Ok(Err(err)) => Err(SourceError::Failed {
                reason: format!("{}: {err}", self.name),
            }),
            Err(RecvTimeoutError::Disconnected) => Err(SourceError::Closed),
        }
    }

    fn close(&mut self) {
        self.shutdown();
    }
}

impl Drop for LandmarkFeed {
    fn drop(&mut self) {
        self.shutdown();
    }
}
