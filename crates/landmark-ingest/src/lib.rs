//! Landmark sources for the control loop: recorded JSON-lines replay and a
//! live UDP feed from an external detector.
//!
//! Each source runs on its own reader thread and hands records over a
//! small bounded channel. The returned [`LandmarkFeed`] implements
//! [`tracking_core::ObservationSource`].

mod feed;
mod replay;
mod types;
mod udp;

pub use feed::{FEED_POLL, LandmarkFeed};
pub use replay::{ReplayOptions, read_recording, spawn_file_reader};
pub use types::{IngestError, LandmarkRecord};
pub use udp::{MAX_DATAGRAM, spawn_udp_reader};
