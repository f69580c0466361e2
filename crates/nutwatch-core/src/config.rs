// ── Runtime monitor configuration ──
//
// These types describe *where* upsd lives and *how often* to poll it.
// They never touch disk: the CLI (via nutwatch-config) builds a
// `MonitorConfig` and hands it in.

use std::time::Duration;

use secrecy::SecretString;

/// Optional upsd login, sent right after the TCP connect.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// Configuration for monitoring every UPS behind a single upsd.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// upsd host name or address (defaults to "localhost").
    pub host: String,
    /// upsd TCP port (defaults to 3493).
    pub port: u16,
    /// Deadline for the TCP connect and each request.
    pub timeout: Duration,
    /// How long to wait for the initial device list after starting.
    pub enumeration_delay: Duration,
    /// Battery charge (percent) below which a UPS reports low battery.
    pub low_battery_threshold: i64,
    /// Polling interval. Zero disables automatic polling.
    pub poll_interval: Duration,
    /// upsd login, if the server requires one.
    pub credentials: Option<Credentials>,
    /// Only monitor these UPS names. Empty means every device upsd lists.
    pub devices: Vec<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: nutwatch_api::DEFAULT_PORT,
            timeout: Duration::from_secs(10),
            enumeration_delay: Duration::from_secs(1),
            low_battery_threshold: 40,
            poll_interval: Duration::ZERO,
            credentials: None,
            devices: Vec::new(),
        }
    }
}

impl MonitorConfig {
    /// `host:port` for logs and diagnostics.
    pub fn peer(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Upper bound on how long a poll tick waits for a reconnect.
    pub fn reconnect_wait(&self) -> Duration {
        self.enumeration_delay.saturating_add(Duration::from_secs(1))
    }

    /// Per-device settings derived from this configuration.
    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            low_battery_threshold: self.low_battery_threshold,
            interval: self.poll_interval,
            reconnect_wait: self.reconnect_wait(),
        }
    }
}

/// Settings for a single [`DevicePoller`](crate::DevicePoller).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub low_battery_threshold: i64,
    /// Zero disables the polling loop.
    pub interval: Duration,
    pub reconnect_wait: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        MonitorConfig::default().poller_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_upsd_conventions() {
        let config = MonitorConfig::default();
        assert_eq!(config.peer(), "localhost:3493");
        assert_eq!(config.low_battery_threshold, 40);
        assert!(config.poll_interval.is_zero());
    }

    #[test]
    fn reconnect_wait_adds_one_second() {
        let config = MonitorConfig {
            enumeration_delay: Duration::from_secs(3),
            ..MonitorConfig::default()
        };
        assert_eq!(config.reconnect_wait(), Duration::from_secs(4));
        assert_eq!(config.poller_config().reconnect_wait, Duration::from_secs(4));
    }

    #[test]
    fn reconnect_wait_saturates_on_huge_delay() {
        let config = MonitorConfig {
            enumeration_delay: Duration::from_secs(u64::MAX),
            ..MonitorConfig::default()
        };
        assert_eq!(config.poller_config().reconnect_wait, Duration::MAX);
    }
}
