//! Connection lifecycle and polling layer between `nutwatch-api` and the CLI.
//!
//! - **[`ConnectionSupervisor`]**: owns the single upsd session in an actor
//!   task. Publishes [`SessionState`] over a `watch` channel and lifecycle
//!   [`SessionEvent`]s over a `broadcast` channel; serves device listing and
//!   variable fetches through an `mpsc` request queue so the socket is never
//!   used concurrently.
//!
//! - **[`DevicePoller`]**: one per UPS. Refreshes a [`StatusSnapshot`] on a
//!   timer, asking the supervisor to reconnect (with a bounded wait) when the
//!   session is down. Failures only ever set the snapshot's `fault` flag.
//!
//! - **[`Monitor`]**: facade that discovers devices once and spawns a poller
//!   per UPS.
//!
//! The [`Connector`] / [`Session`] traits are the seam to the wire client;
//! [`NutConnector`] is the TCP implementation.

pub mod config;
pub mod error;
pub mod model;
pub mod monitor;
pub mod poller;
pub mod session;
pub mod supervisor;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{Credentials, MonitorConfig, PollerConfig};
pub use error::CoreError;
pub use model::{ChargingState, DeviceInfo, DeviceList, StatusSnapshot, display_name, title_case};
pub use monitor::Monitor;
pub use poller::DevicePoller;
pub use session::{Connector, NutConnector, Session, UpsVars};
pub use supervisor::{ConnectionSupervisor, SessionEvent, SessionState};
