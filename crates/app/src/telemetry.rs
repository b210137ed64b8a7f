//! Telemetry helpers for tracing subscribers and Prometheus metrics.

use std::{
    io,
    net::SocketAddr,
    sync::{Once, OnceLock},
    thread,
    time::Duration,
};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, prelude::*};

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static PROM_UPKEEP_THREAD: OnceLock<thread::JoinHandle<()>> = OnceLock::new();

/// Logging and metrics knobs taken from the command line.
#[derive(Clone, Debug, Default)]
pub struct TelemetryOptions {
    /// Serve the Prometheus scrape endpoint on this address.
    pub metrics_addr: Option<SocketAddr>,
    /// Default the log filter to `debug` instead of `info`.
    pub verbose: bool,
}

/// Guard returned when a telemetry subscriber has been installed for the current thread.
pub(crate) struct TelemetryGuard {
    _default_guard: tracing::subscriber::DefaultGuard,
}

/// Install the metrics recorder once per process.
///
/// With a listen address the exporter serves `/metrics` itself and no handle
/// is returned. Otherwise the recorder stays in-process and its handle can
/// render the current snapshot.
pub(crate) fn init_metrics_recorder(
    listen: Option<SocketAddr>,
) -> Option<&'static PrometheusHandle> {
    if let Some(addr) = listen {
        static LISTENER: Once = Once::new();
        LISTENER.call_once(|| {
            match PrometheusBuilder::new().with_http_listener(addr).install() {
                Ok(()) => info!("Prometheus metrics available at http://{addr}/metrics"),
                Err(err) => warn!("Failed to start metrics listener on {addr}: {err}"),
            }
        });
        return PROM_HANDLE.get();
    }

    Some(PROM_HANDLE.get_or_init(|| {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        if let Err(err) = metrics::set_global_recorder(recorder) {
            warn!("Metrics recorder already installed: {err}");
        }

        let upkeep_handle = handle.clone();
        match spawn_thread("prometheus-upkeep", move || {
            loop {
                thread::sleep(Duration::from_secs(5));
                upkeep_handle.run_upkeep();
            }
        }) {
            Ok(thread) => {
                let _ = PROM_UPKEEP_THREAD.set(thread);
            }
            Err(err) => warn!("Failed to spawn prometheus upkeep thread: {err}"),
        }

        handle
    }))
}

/// Install the tracing subscriber for the current thread.
///
/// `RUST_LOG` wins over the verbosity flag when set.
pub(crate) fn enter_runtime(opts: &TelemetryOptions) -> TelemetryGuard {
    let default_level = if opts.verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let default_guard = tracing::subscriber::set_default(
        tracing_subscriber::registry().with(
            fmt::layer()
                .with_target(false)
                .with_timer(fmt::time::uptime())
                .with_filter(env_filter),
        ),
    );

    TelemetryGuard {
        _default_guard: default_guard,
    }
}

/// Spawn a thread that inherits the current tracing dispatcher.
pub(crate) fn spawn_thread<F, T>(name: impl Into<String>, f: F) -> io::Result<thread::JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let dispatch = tracing::dispatcher::get_default(|current| current.clone());
    thread::Builder::new()
        .name(name.into())
        .spawn(move || tracing::dispatcher::with_default(&dispatch, f))
}
