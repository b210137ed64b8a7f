//! Live landmark feed from an external detector process, one JSON record
//! per UDP datagram.

use std::{
    io::ErrorKind,
    net::UdpSocket,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use crossbeam_channel::Sender;
use tracing::{info, warn};

use crate::{
    feed::{FeedItem, LandmarkFeed},
    types::{IngestError, LandmarkRecord},
};

/// Largest datagram accepted.
pub const MAX_DATAGRAM: usize = 64 * 1024;

/// Socket read timeout, bounds how long a stop request waits.
const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Bind `addr` (`host:port`) and forward every datagram on a background
/// thread. Binding happens before this returns.
pub fn spawn_udp_reader(addr: &str) -> Result<LandmarkFeed, IngestError> {
    let socket = UdpSocket::bind(addr).map_err(|source| IngestError::Open {
        uri: format!("udp://{addr}"),
        source,
    })?;
    socket.set_read_timeout(Some(RECV_TIMEOUT))?;
    let local = socket.local_addr()?;
    info!(%local, "Listening for landmark datagrams");

    let feed = LandmarkFeed::spawn("landmark-udp", move |tx, running| {
        if let Err(err) = receive_loop(&socket, &tx, &running) {
            let _ = tx.send(Err(err));
        }
    })?;
    Ok(feed.with_local_addr(local))
}

fn receive_loop(
    socket: &UdpSocket,
    tx: &Sender<FeedItem>,
    running: &AtomicBool,
) -> Result<(), IngestError> {
    let mut buf = vec![0u8; MAX_DATAGRAM];

    while running.load(Ordering::Relaxed) {
        let (len, peer) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        let text = String::from_utf8_lossy(&buf[..len]);
        let record = match LandmarkRecord::parse_line(&text) {
            Ok(Some(record)) => record.stamped(),
            Ok(None) => continue,
            Err(err) => {
                warn!(%peer, "Dropping malformed landmark datagram: {err}");
                continue;
            }
        };
        if tx.send(Ok(Some(record))).is_err() {
            break;
        }
    }

    Ok(())
}
