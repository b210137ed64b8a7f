//! Watchdog responsible for detecting stalled pipeline threads and
//! triggering restarts.
//!
//! The control loop and the dashboard each beat once per iteration. When
//! either stops beating the pipeline shuts down and the supervisor restarts
//! it.

use std::{
    io,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use tracing::error;

use crate::telemetry;

/// Sleep interval between watchdog health checks.
pub(crate) const WATCHDOG_POLL_INTERVAL_MS: u64 = 500;
/// Time without a heartbeat before a component is considered stalled.
pub(crate) const WATCHDOG_STALE_THRESHOLD_MS: u64 = 1_500;
/// Grace period at startup allowing components to warm up before monitoring.
pub(crate) const WATCHDOG_STARTUP_GRACE_MS: u64 = 5_000;

/// Threads monitored by the watchdog.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum HealthComponent {
    Control,
    Dashboard,
}

impl HealthComponent {
    pub(crate) fn label(self) -> &'static str {
        match self {
            HealthComponent::Control => "control",
            HealthComponent::Dashboard => "dashboard",
        }
    }
}

pub(crate) struct PipelineHealth {
    control: AtomicU64,
    dashboard: AtomicU64,
}

impl PipelineHealth {
    pub(crate) fn new() -> Self {
        Self::starting_at(current_millis())
    }

    fn starting_at(now: u64) -> Self {
        let grace_deadline = now.saturating_add(WATCHDOG_STARTUP_GRACE_MS);
        Self {
            control: AtomicU64::new(grace_deadline),
            dashboard: AtomicU64::new(grace_deadline),
        }
    }

    pub(crate) fn beat(&self, component: HealthComponent) {
        self.beat_at(component, current_millis());
    }

    fn beat_at(&self, component: HealthComponent, now: u64) {
        match component {
            HealthComponent::Control => self.control.store(now, Ordering::Relaxed),
            HealthComponent::Dashboard => self.dashboard.store(now, Ordering::Relaxed),
        }
    }

    /// First component without a recent heartbeat.
    pub(crate) fn stale_component(&self, now: u64) -> Option<HealthComponent> {
        [
            (HealthComponent::Control, &self.control),
            (HealthComponent::Dashboard, &self.dashboard),
        ]
        .into_iter()
        .find(|(_, last)| {
            now.saturating_sub(last.load(Ordering::Relaxed)) > WATCHDOG_STALE_THRESHOLD_MS
        })
        .map(|(component, _)| component)
    }
}

/// Shared state exposing watchdog triggers to the pipeline supervisor.
pub(crate) struct WatchdogState {
    triggered: AtomicBool,
    reason: Mutex<Option<HealthComponent>>,
}

impl WatchdogState {
    pub(crate) fn new() -> Self {
        Self {
            triggered: AtomicBool::new(false),
            reason: Mutex::new(None),
        }
    }

    pub(crate) fn arm(&self, component: HealthComponent) {
        if let Ok(mut guard) = self.reason.lock() {
            *guard = Some(component);
        }
        self.triggered.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    pub(crate) fn reason(&self) -> Option<HealthComponent> {
        match self.reason.lock() {
            Ok(guard) => *guard,
            Err(_) => None,
        }
    }
}

/// Spawn the watchdog thread that polls component health and requests restarts.
pub(crate) fn spawn_watchdog(
    health: Arc<PipelineHealth>,
    running: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    state: Arc<WatchdogState>,
) -> io::Result<thread::JoinHandle<()>> {
    telemetry::spawn_thread("control-watchdog", move || {
        while running.load(Ordering::Relaxed) && !shutdown.load(Ordering::Relaxed) {
            thread::sleep(Duration::from_millis(WATCHDOG_POLL_INTERVAL_MS));
            let now = current_millis();
            if let Some(component) = health.stale_component(now) {
                error!(
                    "Watchdog detected stalled {} thread; requesting pipeline restart",
                    component.label()
                );
                state.arm(component);
                running.store(false, Ordering::SeqCst);
                break;
            }
        }
    })
}

fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
