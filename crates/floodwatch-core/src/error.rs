// ── Core error types ──
//
// Consumers of floodwatch-core never see raw HTTP statuses or JSON parse
// failures. `From<floodwatch_api::Error>` translates transport errors into
// domain variants. Malformed channel events have their own type because
// they are logged and dropped, never returned.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach backend at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Backend request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Event channel unavailable: {reason}")]
    ChannelUnavailable { reason: String },

    // ── Snapshot errors ──────────────────────────────────────────────
    #[error("Snapshot load failed: {message}")]
    SnapshotFailed {
        message: String,
        /// Whether a retry has a reasonable chance of succeeding.
        retryable: bool,
    },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("Engine is not attached to an event channel")]
    NotAttached,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// `true` if the same call may succeed later without user action.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } | Self::ChannelUnavailable { .. } => {
                true
            }
            Self::SnapshotFailed { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<floodwatch_api::Error> for CoreError {
    fn from(err: floodwatch_api::Error) -> Self {
        use floodwatch_api::Error as Api;

        let retryable = err.is_transient();
        match err {
            Api::Authentication { message } | Api::Http { status: 401, message } => {
                CoreError::AuthenticationFailed { message }
            }
            Api::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            Api::Transport(ref e) if e.is_connect() => CoreError::ConnectionFailed {
                url: e
                    .url()
                    .map_or_else(|| "<unknown>".into(), ToString::to_string),
                reason: e.to_string(),
            },
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("invalid URL: {e}"),
            },
            Api::Tls(message) => CoreError::Config {
                message: format!("TLS setup failed: {message}"),
            },
            Api::ChannelConnect(reason) => CoreError::ChannelUnavailable { reason },
            Api::ChannelClosed { code, reason } => CoreError::ChannelUnavailable {
                reason: format!("closed ({code}): {reason}"),
            },
            Api::ChannelShutdown => CoreError::ChannelUnavailable {
                reason: "channel manager shut down".into(),
            },
            other => CoreError::SnapshotFailed {
                message: other.to_string(),
                retryable,
            },
        }
    }
}

// ── Event decoding errors ────────────────────────────────────────────

/// Why a channel event could not be turned into a state change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("unknown event `{0}`")]
    UnknownEvent(String),

    #[error("`{event}` payload is not a JSON object")]
    NotAnObject { event: String },

    #[error("`{event}` payload is missing `{field}`")]
    MissingField { event: String, field: &'static str },

    #[error("`{event}` payload has an invalid `{field}`: {reason}")]
    InvalidField {
        event: String,
        field: &'static str,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_status_is_auth_failure() {
        let err = CoreError::from(floodwatch_api::Error::Http {
            status: 401,
            message: "expired".into(),
        });
        assert!(matches!(err, CoreError::AuthenticationFailed { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn gateway_errors_are_retryable_snapshot_failures() {
        let err = CoreError::from(floodwatch_api::Error::Http {
            status: 503,
            message: "maintenance".into(),
        });
        assert!(matches!(err, CoreError::SnapshotFailed { retryable: true, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn bad_payload_is_not_retryable() {
        let err = CoreError::from(floodwatch_api::Error::Deserialization {
            message: "expected array".into(),
            body: "<html>".into(),
        });
        assert!(matches!(err, CoreError::SnapshotFailed { retryable: false, .. }));
    }
}
