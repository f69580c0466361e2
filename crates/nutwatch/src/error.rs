//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a stable exit code.

use miette::Diagnostic;
use thiserror::Error;

use nutwatch_config::ConfigError;
use nutwatch_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to upsd at {peer}")]
    #[diagnostic(
        code(nutwatch::connection_failed),
        help(
            "Check that upsd is running and listening on {peer}.\n\
             Reason: {reason}\n\
             Try: nutwatch --host <address> list"
        )
    )]
    ConnectionFailed { peer: String, reason: String },

    #[error("Not connected to upsd")]
    #[diagnostic(
        code(nutwatch::not_connected),
        help("The session dropped before the request was sent. Retry the command.")
    )]
    NotConnected,

    #[error("Timed out after {seconds}s waiting for upsd")]
    #[diagnostic(
        code(nutwatch::timeout),
        help("Increase the timeout with --timeout or check upsd responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── Authentication ───────────────────────────────────────────────

    #[error("No password configured for user '{username}' on {host}")]
    #[diagnostic(
        code(nutwatch::no_password),
        help(
            "Store one with: nutwatch config set-password\n\
             Or set password_env in the config file."
        )
    )]
    NoPassword { username: String, host: String },

    // ── Devices ──────────────────────────────────────────────────────

    #[error("UPS '{name}' not found")]
    #[diagnostic(
        code(nutwatch::ups_not_found),
        help("Run: nutwatch list to see available UPS names")
    )]
    UpsNotFound { name: String },

    #[error("upsd request failed: {message}")]
    #[diagnostic(code(nutwatch::upsd))]
    Upsd { message: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(nutwatch::validation))]
    Validation { field: String, reason: String },

    #[error("Configuration file already exists")]
    #[diagnostic(
        code(nutwatch::config_exists),
        help("Use --force to overwrite {path}")
    )]
    ConfigExists { path: String },

    #[error("{message}")]
    #[diagnostic(
        code(nutwatch::config),
        help("Check the config file at: {path}")
    )]
    Config { message: String, path: String },

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(nutwatch::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    #[diagnostic(code(nutwatch::yaml))]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to render TOML: {0}")]
    #[diagnostic(code(nutwatch::toml))]
    Toml(#[from] toml::ser::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::NotConnected => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NoPassword { .. } => exit_code::AUTH,
            Self::UpsNotFound { .. } => exit_code::NOT_FOUND,
            Self::ConfigExists { .. } => exit_code::CONFLICT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { peer, reason } => Self::ConnectionFailed { peer, reason },
            CoreError::NotConnected => Self::NotConnected,
            CoreError::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },
            CoreError::DeviceNotFound { name } => Self::UpsNotFound { name },
            CoreError::FetchFailed { ref ups, ref reason } if reason.contains("UNKNOWN-UPS") => {
                Self::UpsNotFound { name: ups.clone() }
            }
            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
            other @ (CoreError::Shutdown
            | CoreError::FetchFailed { .. }
            | CoreError::EnumerationFailed { .. }) => Self::Upsd {
                message: other.to_string(),
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoPassword { username, host } => Self::NoPassword { username, host },
            ConfigError::Io(e) => Self::Io(e),
            other => Self::Config {
                message: other.to_string(),
                path: nutwatch_config::config_path().display().to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_exit_codes() {
        let cases = [
            (
                CoreError::ConnectionFailed {
                    peer: "nas:3493".into(),
                    reason: "refused".into(),
                },
                exit_code::CONNECTION,
            ),
            (CoreError::Timeout { timeout_secs: 3 }, exit_code::TIMEOUT),
            (
                CoreError::DeviceNotFound { name: "ups9".into() },
                exit_code::NOT_FOUND,
            ),
            (
                CoreError::FetchFailed {
                    ups: "ups9".into(),
                    reason: "upsd error UNKNOWN-UPS".into(),
                },
                exit_code::NOT_FOUND,
            ),
            (
                CoreError::FetchFailed {
                    ups: "ups1".into(),
                    reason: "upsd error DATA-STALE".into(),
                },
                exit_code::GENERAL,
            ),
        ];

        for (core, code) in cases {
            let label = core.to_string();
            assert_eq!(CliError::from(core).exit_code(), code, "{label}");
        }
    }

    #[test]
    fn config_validation_is_a_usage_error() {
        let err = CliError::from(ConfigError::Validation {
            field: "port".into(),
            reason: "must be between 1 and 65535".into(),
        });
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }
}
