//! Pipeline supervisor tying together the landmark source, the control loop,
//! the dashboard and the watchdog.
//!
//! The shared store and the calibration wizard outlive individual pipeline
//! runs, so a restart keeps the tuned parameters and the cursor toggle.

use std::{
    sync::{
        Arc, Once,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use landmark_ingest::{spawn_file_reader, spawn_udp_reader};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::{debug, error, info, warn};
use tracking_core::{
    CalibrationWizard, ControlLoop, GestureEngine, ObservationSource, ScreenSize, SharedState,
    SourceError,
};

use crate::{
    control::{
        ControlConfig, SourceKind,
        dashboard::{Dashboard, DashboardCommand, spawn_dashboard, spawn_stdin_reader},
        watchdog::{HealthComponent, PipelineHealth, WatchdogState, spawn_watchdog},
    },
    cursor, telemetry,
};

/// Pause before a restart attempt.
const RESTART_BACKOFF: Duration = Duration::from_secs(1);

/// Long-lived pieces shared by every pipeline run.
struct Session {
    state: Arc<SharedState>,
    wizard: CalibrationWizard,
    /// Smoothed cursor position; only a process restart resets it.
    engine: GestureEngine,
    screen: ScreenSize,
    commands: Receiver<DashboardCommand>,
    metrics: Option<&'static PrometheusHandle>,
}

/// Run the control pipeline, automatically restarting on recoverable faults.
pub fn run(config: ControlConfig) -> Result<()> {
    static CTRL_HANDLER: Once = Once::new();

    let _telemetry_guard = telemetry::enter_runtime(&config.telemetry);
    let metrics = telemetry::init_metrics_recorder(config.telemetry.metrics_addr);

    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_shutdown = shutdown.clone();
    CTRL_HANDLER.call_once(move || {
        if let Err(err) = ctrlc::set_handler({
            let handler_shutdown = handler_shutdown.clone();
            move || {
                handler_shutdown.store(true, Ordering::SeqCst);
            }
        }) {
            warn!("Failed to install Ctrl+C handler: {err}");
        }
    });

    let screen = cursor::resolve_screen(config.screen).context("Failed to determine screen size")?;
    let state = Arc::new(SharedState::with_parameters(config.parameters));
    state.set_cursor_enabled(config.cursor_enabled);
    let mut session = Session {
        wizard: CalibrationWizard::new(state.clone()),
        state,
        engine: GestureEngine::new(),
        screen,
        commands: spawn_stdin_reader().context("Failed to start console input")?,
        metrics,
    };

    let mut calibrate_pending = config.calibrate_on_start;
    let mut attempt: u32 = 0;
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        // Startup faults on the first run are fatal; later ones are retried.
        let outcome = run_pipeline_once(&config, &mut session, shutdown.clone(), &mut calibrate_pending);
        match outcome {
            Ok(PipelineOutcome::Graceful) => break,
            Ok(PipelineOutcome::Restart(reason)) => {
                attempt = attempt.saturating_add(1);
                warn!("Pipeline restart requested (reason: {reason}), attempt #{attempt}");
                thread::sleep(RESTART_BACKOFF);
            }
            Err(err) if attempt == 0 => return Err(err),
            Err(err) => {
                error!("Control pipeline error: {err:?}");
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                attempt = attempt.saturating_add(1);
                thread::sleep(RESTART_BACKOFF);
            }
        }
    }

    info!("Shutting down");
    Ok(())
}

/// Result of a single pipeline run attempt.
#[derive(Debug, PartialEq, Eq)]
enum PipelineOutcome {
    Graceful,
    Restart(&'static str),
}

/// Open the configured landmark source. Files are opened and sockets bound
/// before this returns.
fn open_source(config: &ControlConfig) -> Result<Box<dyn ObservationSource>> {
    let source: Box<dyn ObservationSource> = match &config.source {
        SourceKind::Replay(path) => Box::new(
            spawn_file_reader(path, config.replay)
                .with_context(|| format!("Failed to open recording {}", path.display()))?,
        ),
        SourceKind::Udp(addr) => Box::new(
            spawn_udp_reader(addr)
                .with_context(|| format!("Failed to bind landmark socket {addr}"))?,
        ),
    };
    Ok(source)
}

/// Execute the pipeline once, returning whether to exit or restart.
fn run_pipeline_once(
    config: &ControlConfig,
    session: &mut Session,
    shutdown: Arc<AtomicBool>,
    calibrate_pending: &mut bool,
) -> Result<PipelineOutcome> {
    if shutdown.load(Ordering::SeqCst) {
        return Ok(PipelineOutcome::Graceful);
    }

    let _pipeline_span = tracing::info_span!(
        "control.pipeline",
        source = %config.source_uri,
        screen = %session.screen,
        dry_run = config.dry_run
    )
    .entered();

    let source = open_source(config)?;
    let cursor = cursor::open(config.dry_run).context("Failed to open cursor backend")?;
    debug!("Landmark source: {} ({:?})", config.source_uri, config.source);

    let health = Arc::new(PipelineHealth::new());
    let pipeline_running = Arc::new(AtomicBool::new(true));
    let watchdog_state = Arc::new(WatchdogState::new());

    let watchdog_handle = spawn_watchdog(
        health.clone(),
        pipeline_running.clone(),
        shutdown.clone(),
        watchdog_state.clone(),
    )
    .context("Failed to spawn watchdog thread")?;

    let mut dashboard = Dashboard::new(
        session.state.clone(),
        session.wizard.clone(),
        pipeline_running.clone(),
        session.metrics,
    );
    if std::mem::take(calibrate_pending) {
        dashboard.start_calibration();
    }
    let dashboard_handle = match spawn_dashboard(
        dashboard,
        session.commands.clone(),
        health.clone(),
        pipeline_running.clone(),
        shutdown.clone(),
    ) {
        Ok(handle) => handle,
        Err(err) => {
            pipeline_running.store(false, Ordering::SeqCst);
            let _ = watchdog_handle.join();
            return Err(err).context("Failed to spawn dashboard thread");
        }
    };

    info!(
        "Running control loop on a {} screen; type `help` for commands, Ctrl+C to stop",
        session.screen
    );

    let mut control = ControlLoop::with_engine(
        source,
        cursor,
        session.state.clone(),
        session.screen,
        session.engine,
    );
    let result = control.run(&pipeline_running, |_| {
        health.beat(HealthComponent::Control);
        if shutdown.load(Ordering::Relaxed) {
            pipeline_running.store(false, Ordering::SeqCst);
        }
    });
    session.engine = control.engine();

    debug!("Stopping control pipeline");
    pipeline_running.store(false, Ordering::SeqCst);
    let _ = dashboard_handle.join();
    let _ = watchdog_handle.join();

    if watchdog_state.is_triggered() {
        let reason = watchdog_state
            .reason()
            .map(|component| component.label())
            .unwrap_or("watchdog");
        return Ok(PipelineOutcome::Restart(reason));
    }

    match result {
        Ok(()) => Ok(PipelineOutcome::Graceful),
        Err(SourceError::Closed) => Ok(PipelineOutcome::Graceful),
        Err(err) => {
            error!("Landmark source error: {err}");
            Ok(PipelineOutcome::Restart("source failure"))
        }
    }
}
