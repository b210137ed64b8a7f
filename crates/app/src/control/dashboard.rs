//! Console dashboard: the UI refresh tick plus line commands from stdin.
//!
//! The refresh tick only reads the shared store. It logs changes of the
//! gesture, hand presence, cursor toggle and calibration status, and a
//! periodic status line. Commands are the only path by which the console
//! writes: they toggle cursor control, set the smoothing weight, or start a
//! calibration session.

use std::{
    io::{self, BufRead},
    str::FromStr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, bounded, never};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::{debug, info, warn};
use tracking_core::{
    CalibrationReport, CalibrationWizard, SharedState, Telemetry,
    config::{SMOOTHING_ALPHA_RANGE, clamp_to},
};

use crate::{
    control::watchdog::{HealthComponent, PipelineHealth},
    telemetry,
};

/// UI refresh period.
pub(crate) const REFRESH_INTERVAL: Duration = Duration::from_millis(30);
/// Period of the status line.
const STATUS_INTERVAL: Duration = Duration::from_secs(5);

const HELP: &str = "commands: calibrate (c), toggle (t), smoothing <0.1-0.9> (s), status, metrics, quit (q)";

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum DashboardCommand {
    Calibrate,
    Toggle,
    Smoothing(f64),
    Status,
    Metrics,
    Help,
    Quit,
}

impl FromStr for DashboardCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = words.next().ok_or_else(|| "empty command".to_string())?;
        let parsed = match command.to_ascii_lowercase().as_str() {
            "calibrate" | "c" => DashboardCommand::Calibrate,
            "toggle" | "t" => DashboardCommand::Toggle,
            "status" => DashboardCommand::Status,
            "metrics" | "m" => DashboardCommand::Metrics,
            "help" | "h" | "?" => DashboardCommand::Help,
            "quit" | "q" | "exit" => DashboardCommand::Quit,
            "smoothing" | "s" => {
                let value = words
                    .next()
                    .ok_or_else(|| "smoothing needs a value".to_string())?;
                let alpha = value
                    .parse::<f64>()
                    .map_err(|err| format!("invalid smoothing value {value:?}: {err}"))?;
                if !alpha.is_finite() {
                    return Err(format!("invalid smoothing value {value:?}"));
                }
                DashboardCommand::Smoothing(alpha)
            }
            other => return Err(format!("unknown command {other:?}")),
        };
        if words.next().is_some() {
            return Err(format!("unexpected arguments after {command:?}"));
        }
        Ok(parsed)
    }
}

/// What the refresh loop should do after a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Quit,
}

pub(crate) struct Dashboard {
    state: Arc<SharedState>,
    wizard: CalibrationWizard,
    /// Liveness flag handed to calibration sessions.
    live: Arc<AtomicBool>,
    metrics: Option<&'static PrometheusHandle>,
    session: Option<JoinHandle<CalibrationReport>>,
    last: Option<Telemetry>,
    last_status: Instant,
}

impl Dashboard {
    pub(crate) fn new(
        state: Arc<SharedState>,
        wizard: CalibrationWizard,
        live: Arc<AtomicBool>,
        metrics: Option<&'static PrometheusHandle>,
    ) -> Self {
        Self {
            state,
            wizard,
            live,
            metrics,
            session: None,
            last: None,
            last_status: Instant::now(),
        }
    }

    pub(crate) fn apply(&mut self, command: DashboardCommand) -> Flow {
        match command {
            DashboardCommand::Calibrate => self.start_calibration(),
            DashboardCommand::Toggle => {
                let enabled = self.state.toggle_cursor();
                info!("Cursor control {}", if enabled { "enabled" } else { "disabled" });
            }
            DashboardCommand::Smoothing(alpha) => {
                let alpha = clamp_to(alpha, SMOOTHING_ALPHA_RANGE);
                self.state.set_smoothing_alpha(alpha);
                info!("Smoothing set to {alpha:.2}");
            }
            DashboardCommand::Status => self.log_status(),
            DashboardCommand::Metrics => match self.metrics {
                Some(handle) => println!("{}", handle.render()),
                None => info!("Metrics are served by the HTTP exporter"),
            },
            DashboardCommand::Help => info!("{HELP}"),
            DashboardCommand::Quit => {
                info!("Quit requested");
                return Flow::Quit;
            }
        }
        Flow::Continue
    }

    /// Start a session unless one is already running.
    pub(crate) fn start_calibration(&mut self) {
        match self.wizard.start(self.live.clone()) {
            Some(handle) => {
                info!("Calibration session starting");
                self.session = Some(handle);
            }
            None => info!("Calibration already in progress"),
        }
    }

    /// One UI refresh: log what changed since the last tick.
    pub(crate) fn refresh(&mut self, now: Instant) {
        let current = self.state.telemetry();
        let previous = self.last.take();

        let changed = |field: fn(&Telemetry) -> bool| match previous.as_ref() {
            Some(previous) => field(previous) != field(&current),
            None => field(&current),
        };
        if changed(|t| t.hand_detected) {
            info!("Hand {}", if current.hand_detected { "detected" } else { "lost" });
        }
        if changed(|t| !t.cursor_enabled) {
            info!(
                "Cursor control {}",
                if current.cursor_enabled { "ON" } else { "OFF" }
            );
        }
        if previous.as_ref().map(|t| t.gesture) != Some(current.gesture) {
            debug!("Gesture: {}", current.gesture);
        }
        let message_changed = previous
            .as_ref()
            .is_none_or(|t| t.calibration_message != current.calibration_message);
        if message_changed && !current.calibration_message.is_empty() {
            info!("Calibration: {}", current.calibration_message);
        }

        if now.duration_since(self.last_status) >= STATUS_INTERVAL {
            self.last_status = now;
            self.log_status_line(&current);
        }
        self.last = Some(current);
        self.reap_session();
    }

    fn log_status(&self) {
        self.log_status_line(&self.state.telemetry());
    }

    fn log_status_line(&self, telemetry: &Telemetry) {
        let params = self.state.parameters();
        info!(
            "FPS {:.1} | gesture {} | cursor {} | margin {:.2} | threshold {:.3} | smoothing {:.2}{}",
            telemetry.fps,
            telemetry.gesture,
            if telemetry.cursor_enabled { "ON" } else { "OFF" },
            params.margin,
            params.click_threshold,
            params.smoothing_alpha,
            if telemetry.calibrating { " | calibrating" } else { "" },
        );
    }

    /// Collect the report of a finished session.
    fn reap_session(&mut self) {
        if !self.session.as_ref().is_some_and(JoinHandle::is_finished) {
            return;
        }
        if let Some(handle) = self.session.take() {
            match handle.join() {
                Ok(report) => info!(
                    outcome = ?report.outcome,
                    margin = ?report.margin,
                    click_threshold = ?report.click_threshold,
                    smoothing = ?report.smoothing_alpha,
                    "Calibration report"
                ),
                Err(_) => warn!("Calibration thread panicked"),
            }
        }
    }

    /// Wait for an active session to observe the cleared liveness flag.
    fn finish(&mut self) {
        if let Some(handle) = self.session.take() {
            let _ = handle.join();
        }
    }
}

/// Read dashboard commands from stdin on a detached thread.
///
/// The thread blocks on stdin for the life of the process, so it is created
/// once and its receiver is shared by every pipeline run.
pub(crate) fn spawn_stdin_reader() -> io::Result<Receiver<DashboardCommand>> {
    let (tx, rx) = bounded(8);
    telemetry::spawn_thread("dashboard-stdin", move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<DashboardCommand>() {
                Ok(command) => {
                    if tx.send(command).is_err() {
                        break;
                    }
                }
                Err(err) => warn!("{err}; {HELP}"),
            }
        }
        debug!("stdin closed; dashboard commands disabled");
    })?;
    Ok(rx)
}

/// Run the refresh tick on its own thread until `running` is cleared.
///
/// A quit command sets `shutdown`.
pub(crate) fn spawn_dashboard(
    mut dashboard: Dashboard,
    commands: Receiver<DashboardCommand>,
    health: Arc<PipelineHealth>,
    running: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
) -> io::Result<JoinHandle<()>> {
    telemetry::spawn_thread("dashboard", move || {
        let mut commands = commands;
        while running.load(Ordering::Relaxed) {
            health.beat(HealthComponent::Dashboard);
            match commands.recv_timeout(REFRESH_INTERVAL) {
                Ok(command) => {
                    if dashboard.apply(command) == Flow::Quit {
                        shutdown.store(true, Ordering::SeqCst);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => commands = never(),
            }
            dashboard.refresh(Instant::now());
        }
        dashboard.finish();
    })
}

#[cfg(test)]
mod tests {
    use tracking_core::{CalibrationTiming, GestureLabel};

    use super::*;

    fn dashboard() -> (Dashboard, Arc<SharedState>, Arc<AtomicBool>) {
        let state = Arc::new(SharedState::new());
        let timing = CalibrationTiming {
            settle: Duration::from_secs(30),
            ..CalibrationTiming::default()
        };
        let wizard = CalibrationWizard::with_timing(state.clone(), timing);
        let live = Arc::new(AtomicBool::new(true));
        let dashboard = Dashboard::new(state.clone(), wizard, live.clone(), None);
        (dashboard, state, live)
    }

    fn parse(line: &str) -> Result<DashboardCommand, String> {
        line.parse()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse("c"), Ok(DashboardCommand::Calibrate));
        assert_eq!(parse("Calibrate"), Ok(DashboardCommand::Calibrate));
        assert_eq!(parse("t"), Ok(DashboardCommand::Toggle));
        assert_eq!(parse("smoothing 0.3"), Ok(DashboardCommand::Smoothing(0.3)));
        assert_eq!(parse("s 2"), Ok(DashboardCommand::Smoothing(2.0)));
        assert_eq!(parse("status"), Ok(DashboardCommand::Status));
        assert_eq!(parse("q"), Ok(DashboardCommand::Quit));
        assert!("s".parse::<DashboardCommand>().is_err());
        assert!("s abc".parse::<DashboardCommand>().is_err());
        assert!("s NaN".parse::<DashboardCommand>().is_err());
        assert!("toggle now".parse::<DashboardCommand>().is_err());
        assert!("jump".parse::<DashboardCommand>().is_err());
        assert!("".parse::<DashboardCommand>().is_err());
    }

    #[test]
    fn test_smoothing_is_clamped_to_slider_range() {
        let (mut dashboard, state, _) = dashboard();
        dashboard.apply(DashboardCommand::Smoothing(0.95));
        assert_eq!(state.smoothing_alpha(), 0.9);
        dashboard.apply(DashboardCommand::Smoothing(0.01));
        assert_eq!(state.smoothing_alpha(), 0.1);
        dashboard.apply(DashboardCommand::Smoothing(0.35));
        assert_eq!(state.smoothing_alpha(), 0.35);
    }

    #[test]
    fn test_toggle_and_quit() {
        let (mut dashboard, state, _) = dashboard();
        assert_eq!(dashboard.apply(DashboardCommand::Toggle), Flow::Continue);
        assert!(!state.cursor_enabled());
        assert_eq!(dashboard.apply(DashboardCommand::Quit), Flow::Quit);
    }

    #[test]
    fn test_calibrate_is_single_flight() {
        let (mut dashboard, state, live) = dashboard();
        dashboard.apply(DashboardCommand::Calibrate);
        assert!(state.is_calibrating());
        assert!(dashboard.session.is_some());

        dashboard.apply(DashboardCommand::Calibrate);
        assert!(dashboard.wizard.is_running());

        live.store(false, Ordering::SeqCst);
        dashboard.finish();
        assert!(!state.is_calibrating());
        assert!(!dashboard.wizard.is_running());
    }

    #[test]
    fn test_refresh_tracks_last_telemetry() {
        let (mut dashboard, state, _) = dashboard();
        state.set_gesture(GestureLabel::Pinch);
        dashboard.refresh(Instant::now());
        assert_eq!(
            dashboard.last.as_ref().map(|t| t.gesture),
            Some(GestureLabel::Pinch)
        );
    }
}
