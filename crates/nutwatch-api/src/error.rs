use thiserror::Error;

/// Top-level error type for the `nutwatch-api` crate.
///
/// Covers every failure mode of a upsd conversation: socket I/O,
/// deadlines, `ERR` replies, and framing surprises.
/// `nutwatch-core` maps these into session-level diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// Socket error (connection refused, reset, DNS failure, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connect or request exceeded the configured deadline.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Server closed the stream in the middle of a response.
    #[error("Connection closed by server")]
    ConnectionClosed,

    // ── Protocol ────────────────────────────────────────────────────
    /// `ERR <code> [message]` reply from upsd.
    #[error("upsd error {code}{}", message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Protocol {
        code: String,
        message: Option<String>,
    },

    /// A line arrived that does not fit the expected response shape.
    #[error("Unexpected response: expected {expected}, got '{got}'")]
    UnexpectedResponse { expected: String, got: String },
}

impl Error {
    /// Returns `true` if the byte stream can no longer be trusted and the
    /// connection must be dropped.
    ///
    /// `ERR` replies are complete, well-framed responses, so the session
    /// stays usable after them.
    pub fn is_connection_lost(&self) -> bool {
        !matches!(self, Self::Protocol { .. })
    }

    /// Extract the upsd error code (e.g. `UNKNOWN-UPS`), if available.
    pub fn protocol_code(&self) -> Option<&str> {
        match self {
            Self::Protocol { code, .. } => Some(code),
            _ => None,
        }
    }
}
