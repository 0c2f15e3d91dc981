//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use floodwatch_config::ConfigError;
use floodwatch_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to backend at {url}")]
    #[diagnostic(
        code(floodwatch::connection_failed),
        help(
            "Check that the backend is running and reachable.\n\
             URL: {url}\n\
             Self-signed certificate? Try --insecure (-k)."
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Event stream unavailable: {reason}")]
    #[diagnostic(
        code(floodwatch::stream_unavailable),
        help("Check --stream-url or the profile's stream_url.")
    )]
    StreamUnavailable { reason: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(floodwatch::auth_failed),
        help(
            "Verify your token.\n\
             Store a new one with: floodwatch config set-token --profile <name>"
        )
    )]
    AuthFailed { message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(floodwatch::no_credentials),
        help(
            "Pass --token, set FLOODWATCH_TOKEN, or store one with:\n\
             floodwatch config set-token --profile {profile}"
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(floodwatch::not_found),
        help("Run: floodwatch {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("Snapshot load failed: {message}")]
    #[diagnostic(code(floodwatch::snapshot_failed))]
    Snapshot { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(floodwatch::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(floodwatch::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No backend configured")]
    #[diagnostic(
        code(floodwatch::no_config),
        help(
            "Pass --api-url and --token, or add a profile to the config file.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(floodwatch::config))]
    Config(Box<figment::Error>),

    #[error("Keyring error: {0}")]
    #[diagnostic(code(floodwatch::keyring))]
    Keyring(String),

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(floodwatch::timeout),
        help("Increase timeout with --timeout or check backend responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::StreamUnavailable { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NoConfig { .. } | Self::ProfileNotFound { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::ChannelUnavailable { reason } => CliError::StreamUnavailable { reason },

            CoreError::SnapshotFailed { message, .. } => CliError::Snapshot { message },

            CoreError::DeviceNotFound { identifier } => CliError::NotFound {
                resource_type: "device".into(),
                identifier,
                list_command: "devices".into(),
            },

            CoreError::NotAttached => CliError::StreamUnavailable {
                reason: "not attached".into(),
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Figment(inner) => CliError::Config(inner),
            ConfigError::Io(e) => CliError::Io(e),
            ConfigError::Serialization(e) => CliError::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        let auth: CliError = CoreError::AuthenticationFailed {
            message: "expired".into(),
        }
        .into();
        assert_eq!(auth.exit_code(), exit_code::AUTH);

        let missing: CliError = CoreError::DeviceNotFound {
            identifier: "AWLR-09".into(),
        }
        .into();
        assert_eq!(missing.exit_code(), exit_code::NOT_FOUND);

        let creds: CliError = ConfigError::NoCredentials {
            profile: "default".into(),
        }
        .into();
        assert_eq!(creds.exit_code(), exit_code::AUTH);

        let snapshot: CliError = CoreError::SnapshotFailed {
            message: "502".into(),
            retryable: true,
        }
        .into();
        assert_eq!(snapshot.exit_code(), exit_code::GENERAL);
        assert_ne!(exit_code::SUCCESS, snapshot.exit_code());
    }
}
