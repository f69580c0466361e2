// ── Per-device poller ──
//
// Each UPS gets one `DevicePoller`. It owns the device's `StatusSnapshot`
// (published through a `watch` channel) and refreshes it by asking the
// shared `ConnectionSupervisor` for variables. It never touches the
// session state itself; at most it asks the supervisor to start.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::PollerConfig;
use crate::error::CoreError;
use crate::model::{DeviceInfo, StatusSnapshot};
use crate::session::UpsVars;
use crate::supervisor::ConnectionSupervisor;

/// Polls one UPS through the shared supervisor.
///
/// Cheaply cloneable; clones share the same snapshot.
#[derive(Clone)]
pub struct DevicePoller {
    inner: Arc<PollerInner>,
}

struct PollerInner {
    name: String,
    display_name: String,
    info: DeviceInfo,
    config: PollerConfig,
    supervisor: ConnectionSupervisor,
    snapshot: watch::Sender<StatusSnapshot>,
}

impl DevicePoller {
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        info: DeviceInfo,
        config: PollerConfig,
        supervisor: ConnectionSupervisor,
    ) -> Self {
        let (snapshot, _) = watch::channel(StatusSnapshot::default());
        Self {
            inner: Arc::new(PollerInner {
                name: name.into(),
                display_name: display_name.into(),
                info,
                config,
                supervisor,
                snapshot,
            }),
        }
    }

    /// upsd device name (the key used in `LIST VAR`).
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn display_name(&self) -> &str {
        &self.inner.display_name
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.inner.info
    }

    pub fn config(&self) -> &PollerConfig {
        &self.inner.config
    }

    // ── Snapshot access ──────────────────────────────────────────────

    /// Current snapshot (cloned).
    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot updates.
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.inner.snapshot.subscribe()
    }

    /// Snapshot updates as a `Stream`, starting with the current value.
    pub fn stream(&self) -> WatchStream<StatusSnapshot> {
        WatchStream::new(self.subscribe())
    }

    /// Log the device identity. Stand-in for an "identify" request from
    /// the consumer; upsd has no generic beeper command to send.
    pub fn identify(&self) {
        info!(
            ups = %self.inner.name,
            name = %self.inner.display_name,
            manufacturer = %self.inner.info.manufacturer,
            model = %self.inner.info.model,
            serial = %self.inner.info.serial,
            "identify requested"
        );
    }

    // ── Refresh ──────────────────────────────────────────────────────

    /// Refresh if the session is ready; otherwise ask the supervisor to
    /// reconnect, wait a bounded time, and refresh only if that worked.
    /// Never fails: problems end up in the snapshot's `fault` flag.
    pub async fn check_and_refresh(&self) {
        let supervisor = &self.inner.supervisor;
        if supervisor.is_ready() {
            self.refresh().await;
            return;
        }

        debug!(ups = %self.inner.name, "session not ready, requesting reconnect");
        supervisor.start();
        if supervisor.wait_ready(self.inner.config.reconnect_wait).await {
            self.refresh().await;
        } else {
            error!(
                ups = %self.inner.name,
                peer = %supervisor.peer(),
                wait_ms = self.inner.config.reconnect_wait.as_millis(),
                "reconnect to upsd failed"
            );
            self.mark_fault();
        }
    }

    /// Fetch variables once and recompute the snapshot. On failure only
    /// `fault` changes; the previous readings are kept.
    pub async fn refresh(&self) {
        match self.inner.supervisor.fetch_vars(&self.inner.name).await {
            Ok(vars) => {
                self.apply(&vars);
                debug!(ups = %self.inner.name, "snapshot refreshed");
            }
            Err(CoreError::NotConnected) => {
                debug!(ups = %self.inner.name, "refresh skipped, not connected");
                self.mark_fault();
            }
            Err(e) => {
                warn!(ups = %self.inner.name, error = %e, "refresh failed");
                self.mark_fault();
            }
        }
    }

    /// Recompute the snapshot from variables fetched elsewhere (the
    /// discovery fetch) and clear `fault`.
    pub fn apply(&self, vars: &UpsVars) {
        let threshold = self.inner.config.low_battery_threshold;
        let now = Utc::now();
        self.inner.snapshot.send_modify(|snapshot| {
            snapshot.apply_vars(vars, threshold, now);
        });
    }

    fn mark_fault(&self) {
        self.inner.snapshot.send_if_modified(|snapshot| {
            let changed = !snapshot.fault;
            snapshot.fault = true;
            changed
        });
    }

    // ── Polling loop ─────────────────────────────────────────────────

    /// Run `check_and_refresh` every `interval` until cancelled. Returns
    /// immediately when the interval is zero (polling disabled).
    pub async fn run(&self, cancel: CancellationToken) {
        let period = self.inner.config.interval;
        if period.is_zero() {
            debug!(ups = %self.inner.name, "polling disabled");
            return;
        }

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await; // first tick is immediate

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = interval.tick() => {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        () = self.check_and_refresh() => {}
                    }
                }
            }
        }

        debug!(ups = %self.inner.name, "polling stopped");
    }
}

impl std::fmt::Debug for DevicePoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevicePoller")
            .field("name", &self.inner.name)
            .field("display_name", &self.inner.display_name)
            .finish_non_exhaustive()
    }
}
