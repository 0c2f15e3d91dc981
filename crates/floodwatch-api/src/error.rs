use thiserror::Error;

/// Top-level error type for the `floodwatch-api` crate.
///
/// Covers every failure mode of the two API surfaces: the request/response
/// snapshot endpoints and the event channel. `floodwatch-core` maps these
/// into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The backend rejected the bearer credential (HTTP 401, or a 401
    /// during the channel handshake).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Non-success HTTP status from a snapshot endpoint.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    // ── Channel ─────────────────────────────────────────────────────
    /// Event channel connection failed.
    #[error("Channel connection failed: {0}")]
    ChannelConnect(String),

    /// Event channel closed unexpectedly.
    #[error("Channel closed (code {code}): {reason}")]
    ChannelClosed { code: u16, reason: String },

    /// The channel was shut down and can no longer deliver events.
    #[error("Channel has been shut down")]
    ChannelShutdown,

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the credential was rejected and a fresh one
    /// from the session provider might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        match self {
            Self::Authentication { .. } => true,
            Self::Http { status, .. } => *status == 401,
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::ChannelConnect(_) | Self::ChannelClosed { .. } => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
