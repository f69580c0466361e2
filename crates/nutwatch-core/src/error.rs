// ── Core error types ──
//
// User-facing errors from nutwatch-core. Consumers never see raw socket
// errors or upsd reply codes directly; the supervisor folds collaborator
// failures into these variants with the original message as `reason`.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Session errors ───────────────────────────────────────────────
    #[error("Not connected to upsd")]
    NotConnected,

    #[error("Cannot connect to upsd at {peer}: {reason}")]
    ConnectionFailed { peer: String, reason: String },

    #[error("Timed out after {timeout_secs}s waiting for upsd")]
    Timeout { timeout_secs: u64 },

    #[error("Connection supervisor has shut down")]
    Shutdown,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Failed to fetch variables for {ups}: {reason}")]
    FetchFailed { ups: String, reason: String },

    #[error("Failed to list UPS devices: {reason}")]
    EnumerationFailed { reason: String },

    #[error("UPS not found: {name}")]
    DeviceNotFound { name: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Returns `true` if retrying after a reconnect might succeed.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::ConnectionFailed { .. } | Self::Timeout { .. }
        )
    }
}
