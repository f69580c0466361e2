#![allow(clippy::unwrap_used)]

// Session lifecycle and polling behaviour against an in-memory upsd.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use nutwatch_api::Error;
use nutwatch_core::{
    ChargingState, ConnectionSupervisor, Connector, CoreError, DeviceInfo, DeviceList,
    DevicePoller, Monitor, MonitorConfig, PollerConfig, Session, SessionEvent, SessionState,
    UpsVars,
};
use pretty_assertions::assert_eq;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

// ── Fake upsd ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    /// `ERR` reply; the stream stays usable.
    Protocol,
    /// Socket dropped mid-request.
    ConnectionLost,
}

struct FakeUpsd {
    reachable: bool,
    hang: bool,
    connect_delay: Duration,
    devices: DeviceList,
    vars: HashMap<String, UpsVars>,
    fetch_failure: Option<Failure>,
}

#[derive(Default)]
struct Counters {
    connects: AtomicUsize,
    lists: AtomicUsize,
    fetches: AtomicUsize,
    logouts: AtomicUsize,
}

#[derive(Clone)]
struct FakeConnector {
    server: Arc<Mutex<FakeUpsd>>,
    counters: Arc<Counters>,
}

struct FakeSession {
    server: Arc<Mutex<FakeUpsd>>,
    counters: Arc<Counters>,
}

fn ups_vars(pairs: &[(&str, &str)]) -> UpsVars {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

impl FakeConnector {
    fn new() -> Self {
        let mut devices = DeviceList::new();
        devices.insert("ups1".into(), Some("office rack".into()));
        devices.insert("ups2".into(), None);

        let mut vars = HashMap::new();
        vars.insert(
            "ups1".to_owned(),
            ups_vars(&[
                ("battery.charge", "100"),
                ("input.voltage", "230.4"),
                ("ups.load", "17"),
                ("ups.status", "OL CHRG"),
                ("device.mfr", "APC"),
                ("device.model", "Back-UPS ES 700"),
            ]),
        );
        vars.insert(
            "ups2".to_owned(),
            ups_vars(&[
                ("battery.charge", "35"),
                ("ups.load", "0"),
                ("ups.status", "OB DISCHRG"),
            ]),
        );

        Self {
            server: Arc::new(Mutex::new(FakeUpsd {
                reachable: true,
                hang: false,
                connect_delay: Duration::ZERO,
                devices,
                vars,
                fetch_failure: None,
            })),
            counters: Arc::new(Counters::default()),
        }
    }

    fn with(&self, f: impl FnOnce(&mut FakeUpsd)) {
        f(&mut self.server.lock().unwrap());
    }

    fn connects(&self) -> usize {
        self.counters.connects.load(Ordering::SeqCst)
    }

    fn lists(&self) -> usize {
        self.counters.lists.load(Ordering::SeqCst)
    }

    fn fetches(&self) -> usize {
        self.counters.fetches.load(Ordering::SeqCst)
    }
}

impl Connector for FakeConnector {
    type Session = FakeSession;

    async fn connect(&self) -> Result<FakeSession, Error> {
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        let (reachable, hang, delay) = {
            let server = self.server.lock().unwrap();
            (server.reachable, server.hang, server.connect_delay)
        };

        if hang {
            std::future::pending::<()>().await;
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if !reachable {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        Ok(FakeSession {
            server: Arc::clone(&self.server),
            counters: Arc::clone(&self.counters),
        })
    }

    fn peer(&self) -> String {
        "fake:3493".into()
    }
}

impl Session for FakeSession {
    async fn list_ups(&mut self) -> Result<DeviceList, Error> {
        self.counters.lists.fetch_add(1, Ordering::SeqCst);
        Ok(self.server.lock().unwrap().devices.clone())
    }

    async fn list_vars(&mut self, ups: &str) -> Result<UpsVars, Error> {
        self.counters.fetches.fetch_add(1, Ordering::SeqCst);
        let server = self.server.lock().unwrap();
        match server.fetch_failure {
            Some(Failure::Protocol) => {
                return Err(Error::Protocol {
                    code: "DATA-STALE".into(),
                    message: None,
                });
            }
            Some(Failure::ConnectionLost) => return Err(Error::ConnectionClosed),
            None => {}
        }
        server.vars.get(ups).cloned().ok_or_else(|| Error::Protocol {
            code: "UNKNOWN-UPS".into(),
            message: None,
        })
    }

    async fn logout(&mut self) -> Result<(), Error> {
        self.counters.logouts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

const RECONNECT_WAIT: Duration = Duration::from_secs(2);

fn poller(supervisor: &ConnectionSupervisor, name: &str, interval: Duration) -> DevicePoller {
    DevicePoller::new(
        name,
        name,
        DeviceInfo::from_vars(&UpsVars::new()),
        PollerConfig {
            low_battery_threshold: 40,
            interval,
            reconnect_wait: RECONNECT_WAIT,
        },
        supervisor.clone(),
    )
}

async fn ready_supervisor(fake: &FakeConnector) -> ConnectionSupervisor {
    let supervisor = ConnectionSupervisor::spawn(fake.clone());
    supervisor.start();
    assert!(supervisor.wait_ready(Duration::from_secs(1)).await);
    supervisor
}

fn drain(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

// ── Supervisor ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn requests_fail_fast_when_not_ready() {
    let fake = FakeConnector::new();
    let supervisor = ConnectionSupervisor::spawn(fake.clone());

    assert_eq!(supervisor.state(), SessionState::Disconnected);
    assert!(matches!(
        supervisor.fetch_vars("ups1").await,
        Err(CoreError::NotConnected)
    ));
    assert!(matches!(
        supervisor.list_devices().await,
        Err(CoreError::NotConnected)
    ));
    assert_eq!(fake.connects(), 0);

    supervisor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn first_ready_enumerates_devices() {
    let fake = FakeConnector::new();
    let supervisor = ConnectionSupervisor::spawn(fake.clone());
    let mut events = supervisor.subscribe_events();

    supervisor.start();
    let devices = supervisor
        .wait_for_devices(Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(devices.len(), 2);
    assert_eq!(devices["ups1"].as_deref(), Some("office rack"));
    assert_eq!(fake.lists(), 1);
    assert_eq!(
        drain(&mut events),
        vec![
            SessionEvent::Connecting,
            SessionEvent::Ready { reconnect: false }
        ]
    );

    supervisor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failed_connect_emits_error_then_closed() {
    let fake = FakeConnector::new();
    fake.with(|s| s.reachable = false);
    let supervisor = ConnectionSupervisor::spawn(fake.clone());
    let mut events = supervisor.subscribe_events();

    supervisor.start();
    assert!(!supervisor.wait_ready(Duration::from_secs(1)).await);

    let events = drain(&mut events);
    assert_eq!(events.len(), 3);
    assert_eq!(events[0], SessionEvent::Connecting);
    assert!(matches!(&events[1], SessionEvent::Error(m) if m.contains("refused")));
    assert_eq!(events[2], SessionEvent::Closed);
    assert_eq!(supervisor.state(), SessionState::Disconnected);
    assert!(supervisor.devices().is_none());

    supervisor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn start_requests_coalesce() {
    let fake = FakeConnector::new();
    fake.with(|s| s.connect_delay = Duration::from_millis(500));
    let supervisor = ConnectionSupervisor::spawn(fake.clone());

    supervisor.start();
    tokio::task::yield_now().await;
    for _ in 0..5 {
        supervisor.start();
    }
    assert!(supervisor.wait_ready(Duration::from_secs(2)).await);

    // Starting while ready is a no-op.
    supervisor.start();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(fake.connects(), 1);
    supervisor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_logs_out() {
    let fake = FakeConnector::new();
    let supervisor = ready_supervisor(&fake).await;

    supervisor.shutdown().await;

    assert_eq!(fake.counters.logouts.load(Ordering::SeqCst), 1);
    assert!(matches!(
        supervisor.list_devices().await,
        Err(CoreError::Shutdown)
    ));
}

#[tokio::test(start_paused = true)]
async fn oneshot_connects_runs_and_stops() {
    let fake = FakeConnector::new();
    let devices = ConnectionSupervisor::oneshot(fake.clone(), Duration::from_secs(1), |s| async move {
        s.list_devices().await
    })
    .await
    .unwrap();
    assert_eq!(devices.keys().collect::<Vec<_>>(), vec!["ups1", "ups2"]);

    fake.with(|s| s.reachable = false);
    let err = ConnectionSupervisor::oneshot(fake.clone(), Duration::from_secs(1), |s| async move {
        s.list_devices().await
    })
    .await
    .unwrap_err();
    assert!(matches!(err, CoreError::ConnectionFailed { ref peer, .. } if peer == "fake:3493"));
}

// ── Poller: check and refresh ───────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn ready_session_refreshes_without_reconnect() {
    let fake = FakeConnector::new();
    let supervisor = ready_supervisor(&fake).await;
    let ups = poller(&supervisor, "ups1", Duration::ZERO);

    ups.check_and_refresh().await;

    assert_eq!(fake.connects(), 1);
    let snap = ups.snapshot();
    assert!(!snap.fault);
    assert_eq!(snap.battery_level, Some(100.0));
    assert_eq!(snap.input_voltage, Some(230.4));
    assert_eq!(snap.charging, ChargingState::Charging);
    assert!(snap.active);
    assert!(snap.updated_at.is_some());

    supervisor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn disconnected_session_connects_once_then_refreshes() {
    let fake = FakeConnector::new();
    let supervisor = ConnectionSupervisor::spawn(fake.clone());
    let ups = poller(&supervisor, "ups2", Duration::ZERO);

    ups.check_and_refresh().await;

    assert_eq!(fake.connects(), 1);
    let snap = ups.snapshot();
    assert!(!snap.fault);
    assert!(snap.low_battery);
    assert!(snap.on_battery);
    assert!(!snap.active);
    assert_eq!(snap.charging, ChargingState::Discharging);

    supervisor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn unreachable_server_marks_fault_and_keeps_readings() {
    let fake = FakeConnector::new();
    let supervisor = ready_supervisor(&fake).await;
    let ups = poller(&supervisor, "ups1", Duration::ZERO);
    ups.refresh().await;
    let good = ups.snapshot();

    // Socket drops mid-fetch: the session is torn down.
    fake.with(|s| s.fetch_failure = Some(Failure::ConnectionLost));
    ups.refresh().await;
    assert!(ups.snapshot().fault);
    assert_eq!(supervisor.state(), SessionState::Disconnected);

    // Server stays down: one reconnect attempt, then fault.
    fake.with(|s| s.reachable = false);
    ups.check_and_refresh().await;

    assert_eq!(fake.connects(), 2);
    let snap = ups.snapshot();
    assert!(snap.fault);
    assert_eq!(snap.battery_level, good.battery_level);
    assert_eq!(snap.input_voltage, good.input_voltage);
    assert_eq!(snap.status, good.status);
    assert_eq!(snap.updated_at, good.updated_at);

    supervisor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn protocol_error_keeps_session_ready() {
    let fake = FakeConnector::new();
    let supervisor = ready_supervisor(&fake).await;
    let ups = poller(&supervisor, "ups1", Duration::ZERO);
    ups.refresh().await;

    fake.with(|s| s.fetch_failure = Some(Failure::Protocol));
    ups.check_and_refresh().await;

    let snap = ups.snapshot();
    assert!(snap.fault);
    assert_eq!(snap.battery_level, Some(100.0));
    assert_eq!(supervisor.state(), SessionState::Ready);
    assert_eq!(fake.connects(), 1);

    // Recovers on the next good fetch.
    fake.with(|s| s.fetch_failure = None);
    ups.check_and_refresh().await;
    assert!(!ups.snapshot().fault);

    supervisor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn hanging_connect_is_bounded() {
    let fake = FakeConnector::new();
    fake.with(|s| s.hang = true);
    let supervisor = ConnectionSupervisor::spawn(fake.clone());
    let ups = poller(&supervisor, "ups1", Duration::ZERO);

    let started = tokio::time::Instant::now();
    tokio::time::timeout(Duration::from_secs(30), ups.check_and_refresh())
        .await
        .unwrap();

    assert!(started.elapsed() >= RECONNECT_WAIT);
    assert!(started.elapsed() < Duration::from_secs(30));
    assert!(ups.snapshot().fault);
    assert_eq!(supervisor.state(), SessionState::Connecting);

    supervisor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn devices_are_enumerated_once_across_reconnects() {
    let fake = FakeConnector::new();
    let supervisor = ConnectionSupervisor::spawn(fake.clone());
    let mut events = supervisor.subscribe_events();
    supervisor.start();
    supervisor
        .wait_for_devices(Duration::from_secs(1))
        .await
        .unwrap();

    let ups = poller(&supervisor, "ups1", Duration::ZERO);
    fake.with(|s| s.fetch_failure = Some(Failure::ConnectionLost));
    ups.refresh().await;
    fake.with(|s| {
        s.fetch_failure = None;
        s.devices.insert("ups3".into(), None);
    });
    ups.check_and_refresh().await;

    assert!(!ups.snapshot().fault);
    assert_eq!(fake.connects(), 2);
    assert_eq!(fake.lists(), 1);
    assert_eq!(supervisor.devices().unwrap().len(), 2);

    let events = drain(&mut events);
    assert_eq!(events.last(), Some(&SessionEvent::Ready { reconnect: true }));
    assert!(events.contains(&SessionEvent::Closed));

    supervisor.shutdown().await;
}

// ── Poller: polling loop ────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn zero_interval_never_polls() {
    let fake = FakeConnector::new();
    let supervisor = ready_supervisor(&fake).await;
    let ups = poller(&supervisor, "ups1", Duration::ZERO);

    let cancel = CancellationToken::new();
    // Returns straight away rather than idling.
    tokio::time::timeout(Duration::from_millis(1), ups.run(cancel))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(3600)).await;

    assert_eq!(fake.fetches(), 0);
    assert_eq!(ups.snapshot().updated_at, None);

    supervisor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn interval_polls_on_schedule_until_cancelled() {
    let fake = FakeConnector::new();
    let supervisor = ready_supervisor(&fake).await;
    let ups = poller(&supervisor, "ups1", Duration::from_secs(10));

    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let ups = ups.clone();
        let cancel = cancel.clone();
        async move { ups.run(cancel).await }
    });

    tokio::time::sleep(Duration::from_secs(35)).await;
    assert_eq!(fake.fetches(), 3);
    assert!(!ups.snapshot().fault);

    cancel.cancel();
    task.await.unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(fake.fetches(), 3);

    supervisor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn polling_reconnects_after_outage() {
    let fake = FakeConnector::new();
    fake.with(|s| s.reachable = false);
    let supervisor = ConnectionSupervisor::spawn(fake.clone());
    let ups = poller(&supervisor, "ups1", Duration::from_secs(10));
    let mut updates = ups.subscribe();

    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let ups = ups.clone();
        let cancel = cancel.clone();
        async move { ups.run(cancel).await }
    });

    tokio::time::sleep(Duration::from_secs(15)).await;
    assert!(ups.snapshot().fault);

    fake.with(|s| s.reachable = true);
    updates
        .wait_for(|snap| !snap.fault && snap.battery_level.is_some())
        .await
        .unwrap();

    cancel.cancel();
    task.await.unwrap();
    supervisor.shutdown().await;
}

// ── Monitor ─────────────────────────────────────────────────────────

fn monitor_config() -> MonitorConfig {
    MonitorConfig {
        enumeration_delay: Duration::from_secs(1),
        ..MonitorConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn monitor_discovers_and_names_devices() {
    let fake = FakeConnector::new();
    fake.with(|s| {
        s.devices.insert("ghost".into(), None);
    });

    let monitor = Monitor::start_with(fake.clone(), &monitor_config())
        .await
        .unwrap();

    let names: Vec<_> = monitor.pollers().iter().map(DevicePoller::name).collect();
    assert_eq!(names, vec!["ups1", "ups2"]);

    let ups1 = monitor.poller("ups1").unwrap();
    assert_eq!(ups1.display_name(), "Office Rack");
    assert_eq!(ups1.info().manufacturer, "APC");
    assert_eq!(ups1.info().serial, "No Serial#");
    assert_eq!(ups1.snapshot().battery_level, Some(100.0));
    assert_eq!(monitor.poller("ups2").unwrap().display_name(), "Ups2");

    assert!(matches!(
        monitor.poller("ghost"),
        Err(CoreError::DeviceNotFound { .. })
    ));

    monitor.shutdown().await;
    assert_eq!(fake.counters.logouts.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn monitor_start_fails_when_unreachable() {
    let fake = FakeConnector::new();
    fake.with(|s| s.reachable = false);

    let err = Monitor::start_with(fake, &monitor_config()).await.err().unwrap();

    assert!(matches!(err, CoreError::ConnectionFailed { .. }));
}

#[tokio::test(start_paused = true)]
async fn discovery_fetches_each_device_once() {
    let fake = FakeConnector::new();

    let monitor = Monitor::start_with(fake.clone(), &monitor_config())
        .await
        .unwrap();

    assert_eq!(fake.fetches(), 2);
    let ups2 = monitor.poller("ups2").unwrap().snapshot();
    assert_eq!(ups2.charging, ChargingState::Discharging);
    assert!(ups2.updated_at.is_some());
    assert!(!ups2.fault);

    monitor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn selected_devices_are_the_only_ones_polled() {
    let fake = FakeConnector::new();
    let config = MonitorConfig {
        poll_interval: Duration::from_secs(10),
        devices: vec!["ups2".into()],
        ..monitor_config()
    };

    let monitor = Monitor::start_with(fake.clone(), &config).await.unwrap();
    let names: Vec<_> = monitor.pollers().iter().map(DevicePoller::name).collect();
    assert_eq!(names, vec!["ups2"]);
    assert_eq!(fake.fetches(), 1);

    tokio::time::sleep(Duration::from_secs(25)).await;
    assert_eq!(fake.fetches(), 3);

    monitor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn unknown_selected_device_fails_start() {
    let fake = FakeConnector::new();
    let config = MonitorConfig {
        devices: vec!["ups9".into()],
        ..monitor_config()
    };

    let err = Monitor::start_with(fake.clone(), &config).await.err().unwrap();

    assert!(matches!(err, CoreError::DeviceNotFound { ref name } if name == "ups9"));
    assert_eq!(fake.fetches(), 0);
}
