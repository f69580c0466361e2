// ── Monitor facade ──
//
// Wires a supervisor to one poller per discovered UPS. Discovery happens
// once at start; devices added to upsd later are not picked up. A
// non-empty `MonitorConfig::devices` restricts which UPSes get pollers.

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::MonitorConfig;
use crate::error::CoreError;
use crate::model::{DeviceInfo, StatusSnapshot, display_name};
use crate::poller::DevicePoller;
use crate::session::{Connector, NutConnector};
use crate::supervisor::{ConnectionSupervisor, SessionEvent};

/// Every UPS behind one upsd, polled through a shared session.
pub struct Monitor {
    supervisor: ConnectionSupervisor,
    pollers: Vec<DevicePoller>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Monitor {
    /// Connect to upsd over TCP, discover devices and start polling.
    pub async fn start(config: &MonitorConfig) -> Result<Self, CoreError> {
        Self::start_with(NutConnector::new(config), config).await
    }

    /// Like [`start`](Self::start) with a caller-supplied connector.
    pub async fn start_with<C: Connector>(
        connector: C,
        config: &MonitorConfig,
    ) -> Result<Self, CoreError> {
        let supervisor = ConnectionSupervisor::spawn(connector);
        match Self::discover(&supervisor, config).await {
            Ok(pollers) => {
                let cancel = CancellationToken::new();
                let mut tasks = Vec::new();
                if !config.poll_interval.is_zero() {
                    for poller in &pollers {
                        let poller = poller.clone();
                        let cancel = cancel.child_token();
                        tasks.push(tokio::spawn(async move { poller.run(cancel).await }));
                    }
                }

                Ok(Self {
                    supervisor,
                    pollers,
                    cancel,
                    tasks: Mutex::new(tasks),
                })
            }
            Err(e) => {
                supervisor.shutdown().await;
                Err(e)
            }
        }
    }

    async fn discover(
        supervisor: &ConnectionSupervisor,
        config: &MonitorConfig,
    ) -> Result<Vec<DevicePoller>, CoreError> {
        let mut events = supervisor.subscribe_events();
        supervisor.start();

        let Some(devices) = supervisor.wait_for_devices(config.enumeration_delay).await else {
            let mut reason = None;
            while let Ok(event) = events.try_recv() {
                if let SessionEvent::Error(message) = event {
                    reason = Some(message);
                }
            }
            return Err(match reason {
                Some(reason) if !supervisor.is_ready() => CoreError::ConnectionFailed {
                    peer: supervisor.peer().to_owned(),
                    reason,
                },
                Some(reason) => CoreError::EnumerationFailed { reason },
                None => CoreError::Timeout {
                    timeout_secs: config.enumeration_delay.as_secs(),
                },
            });
        };

        for name in &config.devices {
            if !devices.contains_key(name) {
                return Err(CoreError::DeviceNotFound { name: name.clone() });
            }
        }

        let poller_config = config.poller_config();
        let mut pollers = Vec::with_capacity(devices.len());
        for (name, description) in devices.iter() {
            if !config.devices.is_empty() && !config.devices.contains(name) {
                continue;
            }

            let vars = match supervisor.fetch_vars(name).await {
                Ok(vars) => vars,
                Err(e) => {
                    warn!(ups = %name, error = %e, "skipping UPS, initial fetch failed");
                    continue;
                }
            };

            let label = display_name(name, description.as_deref());
            info!(ups = %name, name = %label, "discovered UPS");
            let poller = DevicePoller::new(
                name.clone(),
                label,
                DeviceInfo::from_vars(&vars),
                poller_config,
                supervisor.clone(),
            );
            poller.apply(&vars);
            pollers.push(poller);
        }

        Ok(pollers)
    }

    pub fn supervisor(&self) -> &ConnectionSupervisor {
        &self.supervisor
    }

    pub fn pollers(&self) -> &[DevicePoller] {
        &self.pollers
    }

    /// Look up a poller by upsd device name.
    pub fn poller(&self, name: &str) -> Result<&DevicePoller, CoreError> {
        self.pollers
            .iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| CoreError::DeviceNotFound {
                name: name.to_owned(),
            })
    }

    /// Current snapshot of every monitored UPS, in device-name order.
    pub fn snapshots(&self) -> Vec<(String, StatusSnapshot)> {
        self.pollers
            .iter()
            .map(|p| (p.name().to_owned(), p.snapshot()))
            .collect()
    }

    /// Stop every polling loop, then the supervisor.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let tasks = std::mem::take(&mut *self.tasks.lock().await);
        for task in tasks {
            let _ = task.await;
        }
        self.supervisor.shutdown().await;
    }
}
