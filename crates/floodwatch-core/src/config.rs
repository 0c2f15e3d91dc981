// ── Runtime sync configuration ──
//
// Describes *where* to sync from and how to behave once attached. Carries
// the credential but never touches disk; the CLI builds one from its
// profiles and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use floodwatch_api::{ReconnectConfig, TlsMode, TransportConfig};

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store.
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-signed backends on a LAN).
    DangerAcceptInvalid,
}

/// Configuration for one sync engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the REST API (e.g. `https://backend.example/api`).
    pub api_url: Url,
    /// Event-stream endpoint. `http(s)` is mapped to `ws(s)`.
    pub stream_url: Url,
    /// Bearer credential, used for both the REST calls and the channel
    /// handshake.
    pub credential: SecretString,
    pub tls: TlsVerification,
    /// Request timeout for snapshot calls.
    pub timeout: Duration,
    /// Backoff policy for channels created from this config.
    pub reconnect: ReconnectConfig,
    /// Reload the snapshot after the channel reconnects, to recover
    /// events missed while it was down.
    pub resync_on_reconnect: bool,
    /// How often to reload the snapshot (seconds). 0 = never.
    pub refresh_interval_secs: u64,
}

impl SyncConfig {
    /// Defaults for everything but the endpoints and the credential.
    pub fn new(api_url: Url, stream_url: Url, credential: SecretString) -> Self {
        Self {
            api_url,
            stream_url,
            credential,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            reconnect: ReconnectConfig::default(),
            resync_on_reconnect: true,
            refresh_interval_secs: 0,
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: match &self.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
                TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
            },
            timeout: self.timeout,
        }
    }
}
