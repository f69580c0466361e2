// ── Connection supervisor ──
//
// Owns the single upsd session. One actor task holds the socket and is the
// only writer of the session state; pollers talk to it through a cloneable
// handle that reads state from a `watch` channel and routes requests over
// an `mpsc` channel with `oneshot` replies.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use serde::Serialize;
use strum::Display;
use tokio::sync::{Mutex, Notify, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::model::DeviceList;
use crate::session::{Connector, Session, UpsVars};

const REQUEST_CHANNEL_SIZE: usize = 64;
const EVENT_CHANNEL_SIZE: usize = 64;

// ── SessionState ─────────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Ready,
}

impl SessionState {
    /// Transition table. An `Error` on its own never demotes the session;
    /// the supervisor follows it with `Closed` when the socket is unusable.
    pub fn apply(self, event: &SessionEvent) -> Self {
        match event {
            SessionEvent::Connecting => Self::Connecting,
            SessionEvent::Ready { .. } => Self::Ready,
            SessionEvent::Closed => Self::Disconnected,
            SessionEvent::Error(_) => self,
        }
    }
}

/// Lifecycle notifications broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A connect attempt started.
    Connecting,
    /// Session established. `reconnect` is false only for the first one.
    Ready { reconnect: bool },
    /// Session gone.
    Closed,
    /// The collaborator reported a failure.
    Error(String),
}

// ── Requests ─────────────────────────────────────────────────────────

enum Request {
    ListDevices {
        reply: oneshot::Sender<Result<DeviceList, CoreError>>,
    },
    FetchVars {
        ups: String,
        reply: oneshot::Sender<Result<UpsVars, CoreError>>,
    },
}

// ── ConnectionSupervisor ─────────────────────────────────────────────

/// Handle to the connection actor.
///
/// Cheaply cloneable via `Arc<SupervisorInner>`; every poller holds one.
#[derive(Clone)]
pub struct ConnectionSupervisor {
    inner: Arc<SupervisorInner>,
}

struct SupervisorInner {
    peer: String,
    state: watch::Receiver<SessionState>,
    devices: watch::Receiver<Option<Arc<DeviceList>>>,
    events: broadcast::Sender<SessionEvent>,
    requests: mpsc::Sender<Request>,
    start: Arc<Notify>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionSupervisor {
    /// Spawn the connection actor. Does NOT connect -- call
    /// [`start()`](Self::start) to open the session.
    pub fn spawn<C: Connector>(connector: C) -> Self {
        let peer = connector.peer();
        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);
        let (devices_tx, devices_rx) = watch::channel(None);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (request_tx, request_rx) = mpsc::channel(REQUEST_CHANNEL_SIZE);
        let start = Arc::new(Notify::new());
        let cancel = CancellationToken::new();

        let actor = ConnectionActor {
            connector,
            session: None,
            was_ready: false,
            state: state_tx,
            devices: devices_tx,
            events: events.clone(),
        };
        let task = tokio::spawn(actor.run(request_rx, Arc::clone(&start), cancel.clone()));

        Self {
            inner: Arc::new(SupervisorInner {
                peer,
                state: state_rx,
                devices: devices_rx,
                events,
                requests: request_tx,
                start,
                cancel,
                task: Mutex::new(Some(task)),
            }),
        }
    }

    /// Spawn, connect, run `f`, and shut down again.
    ///
    /// Lightweight mode for single CLI invocations.
    pub async fn oneshot<C, F, Fut, T>(connector: C, wait: Duration, f: F) -> Result<T, CoreError>
    where
        C: Connector,
        F: FnOnce(ConnectionSupervisor) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let supervisor = Self::spawn(connector);
        let result = match supervisor.connect(wait).await {
            Ok(()) => f(supervisor.clone()).await,
            Err(e) => Err(e),
        };
        supervisor.shutdown().await;
        result
    }

    /// `host:port` of the upsd this supervisor talks to.
    pub fn peer(&self) -> &str {
        &self.inner.peer
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Request a connect attempt. No-op while ready; calls made while an
    /// attempt is pending are folded into that attempt.
    pub fn start(&self) {
        if self.is_ready() {
            return;
        }
        self.inner.start.notify_one();
    }

    /// Start and wait up to `wait` for the session, reporting why it
    /// failed if it never became ready.
    pub async fn connect(&self, wait: Duration) -> Result<(), CoreError> {
        let mut events = self.subscribe_events();
        self.start();
        if self.wait_ready(wait).await {
            return Ok(());
        }

        let mut reason = None;
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::Error(message) = event {
                reason = Some(message);
            }
        }
        Err(match reason {
            Some(reason) => CoreError::ConnectionFailed {
                peer: self.inner.peer.clone(),
                reason,
            },
            None => CoreError::Timeout {
                timeout_secs: wait.as_secs(),
            },
        })
    }

    /// Stop the actor, logging out of upsd if a session is open.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some(handle) = self.inner.task.lock().await.take() {
            let _ = handle.await;
        }
    }

    // ── State observation ────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    /// Subscribe to session state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.clone()
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Wait up to `timeout` for the session to become ready.
    pub async fn wait_ready(&self, timeout: Duration) -> bool {
        let mut state = self.inner.state.clone();
        matches!(
            tokio::time::timeout(timeout, state.wait_for(|s| *s == SessionState::Ready)).await,
            Ok(Ok(_))
        )
    }

    /// The device list, once the first enumeration has succeeded.
    pub fn devices(&self) -> Option<Arc<DeviceList>> {
        self.inner.devices.borrow().clone()
    }

    /// Wait up to `timeout` for the first enumeration.
    pub async fn wait_for_devices(&self, timeout: Duration) -> Option<Arc<DeviceList>> {
        let mut devices = self.inner.devices.clone();
        match tokio::time::timeout(timeout, devices.wait_for(Option::is_some)).await {
            Ok(Ok(list)) => list.clone(),
            _ => None,
        }
    }

    // ── Session operations ───────────────────────────────────────────

    /// GetUPSList. Fails with `NotConnected` unless the session is ready.
    pub async fn list_devices(&self) -> Result<DeviceList, CoreError> {
        self.request(|reply| Request::ListDevices { reply }).await
    }

    /// GetUPSVars for one device. Fails with `NotConnected` unless the
    /// session is ready; collaborator errors surface as `FetchFailed`.
    pub async fn fetch_vars(&self, ups: &str) -> Result<UpsVars, CoreError> {
        let ups = ups.to_owned();
        self.request(|reply| Request::FetchVars { ups, reply }).await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, CoreError>>) -> Request,
    ) -> Result<T, CoreError> {
        if !self.is_ready() {
            return Err(CoreError::NotConnected);
        }

        let (reply, response) = oneshot::channel();
        self.inner
            .requests
            .send(build(reply))
            .await
            .map_err(|_| CoreError::Shutdown)?;
        response.await.map_err(|_| CoreError::Shutdown)?
    }
}

// ── Connection actor ─────────────────────────────────────────────────

struct ConnectionActor<C: Connector> {
    connector: C,
    session: Option<C::Session>,
    /// Set after the first Ready; later ones are reconnects.
    was_ready: bool,
    state: watch::Sender<SessionState>,
    devices: watch::Sender<Option<Arc<DeviceList>>>,
    events: broadcast::Sender<SessionEvent>,
}

impl<C: Connector> ConnectionActor<C> {
    async fn run(
        mut self,
        mut requests: mpsc::Receiver<Request>,
        start: Arc<Notify>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = start.notified() => {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        () = self.connect() => {}
                    }
                    // Starts requested while connecting were served by this attempt.
                    let _ = start.notified().now_or_never();
                }
                request = requests.recv() => {
                    let Some(request) = request else { break };
                    self.handle(request).await;
                }
            }
        }

        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.logout().await {
                debug!(error = %e, "logout failed (non-fatal)");
            }
        }
        debug!("connection actor stopped");
    }

    async fn connect(&mut self) {
        if self.session.is_some() {
            debug!("start requested while ready, ignoring");
            return;
        }

        self.emit(SessionEvent::Connecting);
        match self.connector.connect().await {
            Ok(session) => {
                self.session = Some(session);
                let reconnect = self.was_ready;
                self.was_ready = true;
                self.emit(SessionEvent::Ready { reconnect });

                if self.devices.borrow().is_none() {
                    if let Err(e) = self.enumerate().await {
                        warn!(error = %e, "device enumeration failed");
                    }
                }
            }
            Err(e) => {
                self.emit(SessionEvent::Error(e.to_string()));
                self.emit(SessionEvent::Closed);
            }
        }
    }

    async fn handle(&mut self, request: Request) {
        match request {
            Request::ListDevices { reply } => {
                let _ = reply.send(self.enumerate().await);
            }
            Request::FetchVars { ups, reply } => {
                let _ = reply.send(self.fetch_vars(&ups).await);
            }
        }
    }

    /// List devices, storing the result if this is the first success.
    async fn enumerate(&mut self) -> Result<DeviceList, CoreError> {
        let Some(session) = self.session.as_mut() else {
            return Err(CoreError::NotConnected);
        };

        match session.list_ups().await {
            Ok(list) => {
                if self.devices.borrow().is_none() {
                    info!(count = list.len(), "enumerated UPS devices");
                    let _ = self.devices.send(Some(Arc::new(list.clone())));
                }
                Ok(list)
            }
            Err(e) => {
                self.collaborator_failed(&e);
                Err(CoreError::EnumerationFailed {
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn fetch_vars(&mut self, ups: &str) -> Result<UpsVars, CoreError> {
        let Some(session) = self.session.as_mut() else {
            return Err(CoreError::NotConnected);
        };

        session.list_vars(ups).await.map_err(|e| {
            self.collaborator_failed(&e);
            CoreError::FetchFailed {
                ups: ups.to_owned(),
                reason: e.to_string(),
            }
        })
    }

    /// Report a collaborator error and drop the session if its stream can
    /// no longer be trusted. `ERR` replies leave the session ready.
    fn collaborator_failed(&mut self, err: &nutwatch_api::Error) {
        self.emit(SessionEvent::Error(err.to_string()));
        if err.is_connection_lost() {
            self.session = None;
            self.emit(SessionEvent::Closed);
        }
    }

    /// Apply an event to the state machine and broadcast it.
    fn emit(&self, event: SessionEvent) {
        match &event {
            SessionEvent::Connecting => debug!("connecting to upsd"),
            SessionEvent::Ready { reconnect: false } => info!("upsd session ready"),
            SessionEvent::Ready { reconnect: true } => {
                info!("upsd session ready, reconnected after disconnection");
            }
            SessionEvent::Closed => debug!("upsd session closed"),
            SessionEvent::Error(message) => warn!(error = %message, "upsd error"),
        }

        self.state.send_if_modified(|state| {
            let next = state.apply(&event);
            let changed = next != *state;
            *state = next;
            changed
        });
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_follow_events() {
        let s = SessionState::Disconnected;
        let s = s.apply(&SessionEvent::Connecting);
        assert_eq!(s, SessionState::Connecting);
        let s = s.apply(&SessionEvent::Ready { reconnect: false });
        assert_eq!(s, SessionState::Ready);
        let s = s.apply(&SessionEvent::Closed);
        assert_eq!(s, SessionState::Disconnected);
    }

    #[test]
    fn error_alone_keeps_state() {
        for state in [
            SessionState::Disconnected,
            SessionState::Connecting,
            SessionState::Ready,
        ] {
            assert_eq!(state.apply(&SessionEvent::Error("boom".into())), state);
        }
    }

    #[test]
    fn ready_is_reentrant() {
        let s = SessionState::Ready.apply(&SessionEvent::Ready { reconnect: true });
        assert_eq!(s, SessionState::Ready);
    }

    #[test]
    fn state_display() {
        assert_eq!(SessionState::Connecting.to_string(), "connecting");
        assert_eq!(SessionState::default(), SessionState::Disconnected);
    }
}
