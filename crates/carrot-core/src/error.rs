// ── Core error types ──
//
// User-facing errors from carrot-core. Consumers never see HTTP status
// codes or JSON parse failures directly; the `From<carrot_api::Error>`
// impl translates transport-layer errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach the Carrot cloud: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Carrot cloud request timed out")]
    Timeout,

    // ── Cache lifecycle ──────────────────────────────────────────────
    #[error("Light cache stopped before it produced any state")]
    CacheStopped,

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` for failures the next scheduled tick may not repeat.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. } | Self::Timeout)
            || matches!(self, Self::Api { status, .. } if status.is_none_or(|s| s >= 500))
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<carrot_api::Error> for CoreError {
    fn from(err: carrot_api::Error) -> Self {
        match err {
            carrot_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            carrot_api::Error::SessionExpired => CoreError::AuthenticationFailed {
                message: "Session expired -- re-authentication required".into(),
            },
            carrot_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            carrot_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            carrot_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                reason: format!("TLS error: {msg}"),
            },
            carrot_api::Error::Api { message, status } => CoreError::Api { message, status },
            carrot_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
