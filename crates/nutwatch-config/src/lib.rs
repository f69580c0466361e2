//! Configuration for nutwatch.
//!
//! A flat TOML file plus `NUTWATCH_*` environment overrides, credential
//! resolution (env var, keyring, plaintext), and translation to
//! `nutwatch_core::MonitorConfig`. The CLI layers its flag overrides on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use nutwatch_core::{Credentials, MonitorConfig};

const KEYRING_SERVICE: &str = "nutwatch";

/// Upper bound for every duration setting (one day, in seconds).
const MAX_DELAY_SECS: u64 = 86_400;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no password configured for user '{username}' on {host}")]
    NoPassword { username: String, host: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config ─────────────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// upsd host name or address.
    #[serde(default = "default_host")]
    pub host: String,

    /// upsd TCP port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds to wait for the initial device list.
    #[serde(default = "default_search_time_delay")]
    pub search_time_delay: u64,

    /// Battery percentage below which a UPS reports low battery.
    #[serde(default = "default_low_batt_threshold")]
    pub low_batt_threshold: i64,

    /// Polling interval in seconds; 0 disables polling.
    #[serde(default)]
    pub polling: u64,

    /// Connect/request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// upsd user, if the server requires a login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password (plaintext -- prefer keyring or env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Environment variable name containing the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            search_time_delay: default_search_time_delay(),
            low_batt_threshold: default_low_batt_threshold(),
            polling: 0,
            timeout: default_timeout(),
            username: None,
            password: None,
            password_env: None,
        }
    }
}

fn default_host() -> String {
    "localhost".into()
}
fn default_port() -> u16 {
    nutwatch_core::MonitorConfig::default().port
}
fn default_search_time_delay() -> u64 {
    1
}
fn default_low_batt_threshold() -> i64 {
    40
}
fn default_timeout() -> u64 {
    10
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "nutwatch", "nutwatch").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("nutwatch");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the config from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Defaults, then the TOML file at `path` (if present), then `NUTWATCH_*`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("NUTWATCH_"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, falling back to defaults if it cannot be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve upsd credentials. `None` when no username is configured.
pub fn resolve_credentials(cfg: &Config) -> Result<Option<Credentials>, ConfigError> {
    let Some(ref username) = cfg.username else {
        return Ok(None);
    };

    let password = resolve_password(cfg).ok_or_else(|| ConfigError::NoPassword {
        username: username.clone(),
        host: cfg.host.clone(),
    })?;

    Ok(Some(Credentials {
        username: username.clone(),
        password,
    }))
}

/// Password lookup: `password_env` variable, then keyring, then plaintext.
pub fn resolve_password(cfg: &Config) -> Option<SecretString> {
    // 1. Configured env var
    if let Some(ref env_name) = cfg.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &cfg.host) {
        if let Ok(secret) = entry.get_password() {
            return Some(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    cfg.password.clone().map(SecretString::from)
}

/// Store the upsd password for `host` in the system keyring.
pub fn store_password(host: &str, password: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, host)?;
    entry.set_password(password)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Validate and convert to the core's runtime configuration.
pub fn to_monitor_config(cfg: &Config) -> Result<MonitorConfig, ConfigError> {
    if cfg.host.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: "must not be empty".into(),
        });
    }
    if cfg.port == 0 {
        return Err(ConfigError::Validation {
            field: "port".into(),
            reason: "must be between 1 and 65535".into(),
        });
    }
    if cfg.timeout == 0 {
        return Err(ConfigError::Validation {
            field: "timeout".into(),
            reason: "must be at least 1 second".into(),
        });
    }
    for (field, secs) in [
        ("search_time_delay", cfg.search_time_delay),
        ("polling", cfg.polling),
        ("timeout", cfg.timeout),
    ] {
        if secs > MAX_DELAY_SECS {
            return Err(ConfigError::Validation {
                field: field.into(),
                reason: format!("at most {MAX_DELAY_SECS} seconds, got {secs}"),
            });
        }
    }
    if !(0..=100).contains(&cfg.low_batt_threshold) {
        return Err(ConfigError::Validation {
            field: "low_batt_threshold".into(),
            reason: format!("expected a percentage, got {}", cfg.low_batt_threshold),
        });
    }

    Ok(MonitorConfig {
        host: cfg.host.clone(),
        port: cfg.port,
        timeout: Duration::from_secs(cfg.timeout),
        enumeration_delay: Duration::from_secs(cfg.search_time_delay),
        low_battery_threshold: cfg.low_batt_threshold,
        poll_interval: Duration::from_secs(cfg.polling),
        credentials: resolve_credentials(cfg)?,
        devices: Vec::new(),
    })
}
