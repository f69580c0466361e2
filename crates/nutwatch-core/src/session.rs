// ── Collaborator seam ──
//
// The supervisor only needs three things from a NUT client: open a
// session, list devices, list a device's variables. `Connector` and
// `Session` capture exactly that so tests can swap in a fake upsd.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use nutwatch_api::{Error, NutClient};

use crate::config::{Credentials, MonitorConfig};
use crate::model::DeviceList;

/// Raw variables for one UPS, as reported by upsd.
pub type UpsVars = HashMap<String, String>;

/// One live conversation with upsd.
pub trait Session: Send + 'static {
    /// GetUPSList.
    fn list_ups(&mut self) -> impl Future<Output = Result<DeviceList, Error>> + Send;

    /// GetUPSVars.
    fn list_vars(&mut self, ups: &str) -> impl Future<Output = Result<UpsVars, Error>> + Send;

    /// Best-effort goodbye before the session is dropped.
    fn logout(&mut self) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Factory for [`Session`]s. Called once per (re)connect attempt.
pub trait Connector: Send + Sync + 'static {
    type Session: Session;

    fn connect(&self) -> impl Future<Output = Result<Self::Session, Error>> + Send;

    /// `host:port` (or similar) for diagnostics.
    fn peer(&self) -> String;
}

// ── upsd over TCP ────────────────────────────────────────────────────

/// Production [`Connector`]: a `NutClient` per connect, logged in when
/// credentials are configured.
#[derive(Debug, Clone)]
pub struct NutConnector {
    host: String,
    port: u16,
    timeout: Duration,
    credentials: Option<Credentials>,
}

impl NutConnector {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            timeout: config.timeout,
            credentials: config.credentials.clone(),
        }
    }
}

impl Connector for NutConnector {
    type Session = NutClient;

    async fn connect(&self) -> Result<NutClient, Error> {
        let mut client = NutClient::connect(&self.host, self.port, self.timeout).await?;
        if let Some(ref creds) = self.credentials {
            client.authenticate(&creds.username, &creds.password).await?;
        }
        Ok(client)
    }

    fn peer(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Session for NutClient {
    async fn list_ups(&mut self) -> Result<DeviceList, Error> {
        NutClient::list_ups(self).await
    }

    async fn list_vars(&mut self, ups: &str) -> Result<UpsVars, Error> {
        NutClient::list_vars(self, ups).await
    }

    async fn logout(&mut self) -> Result<(), Error> {
        NutClient::logout(self).await
    }
}
