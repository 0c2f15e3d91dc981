// ── Channel registry ──
//
// One live channel per (endpoint, credential) pair, shared by every
// consumer holding the same manager. The manager is an explicit object:
// create it once at startup and pass it (usually as `Arc<ChannelManager>`)
// to whatever needs a channel.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, PoisonError};

use secrecy::{ExposeSecret, SecretString};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{Channel, ReconnectConfig};
use crate::error::Error;

/// Registry key. The credential is reduced to a digest so the map never
/// holds a second copy of the secret.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ChannelKey {
    endpoint: String,
    credential_digest: u64,
}

impl ChannelKey {
    fn new(endpoint: &Url, credential: &SecretString) -> Self {
        let mut hasher = DefaultHasher::new();
        credential.expose_secret().hash(&mut hasher);
        Self {
            endpoint: endpoint.as_str().to_owned(),
            credential_digest: hasher.finish(),
        }
    }
}

/// Hands out shared [`Channel`]s.
///
/// Lifecycle:
/// - [`acquire`](Self::acquire) returns the open channel for a pair, or
///   starts a new one. A channel that has failed or been shut down is
///   replaced on the next acquire.
/// - Consumers only ever remove their own handlers; they never close a
///   channel.
/// - [`close_idle`](Self::close_idle) tears down channels with no
///   handlers left; [`shutdown`](Self::shutdown) tears down everything.
pub struct ChannelManager {
    channels: Mutex<HashMap<ChannelKey, Channel>>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
}

impl ChannelManager {
    pub fn new(reconnect: ReconnectConfig) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            reconnect,
            cancel: CancellationToken::new(),
        }
    }

    /// Return the shared channel for (`endpoint`, `credential`), connecting
    /// a new one if none is live.
    ///
    /// `http`/`https` endpoints are mapped to `ws`/`wss`. Never blocks: the
    /// handshake runs on a background task.
    pub fn acquire(&self, endpoint: &Url, credential: &SecretString) -> Result<Channel, Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::ChannelShutdown);
        }

        let endpoint = websocket_url(endpoint)?;
        let key = ChannelKey::new(&endpoint, credential);

        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = channels.get(&key) {
            if !existing.is_closed() {
                tracing::debug!(endpoint = %endpoint, "reusing shared channel");
                return Ok(existing.clone());
            }
            tracing::info!(endpoint = %endpoint, "replacing closed channel");
        }

        let channel = Channel::connect(
            endpoint,
            credential.clone(),
            self.reconnect.clone(),
            self.cancel.child_token(),
        );
        channels.insert(key, channel.clone());
        Ok(channel)
    }

    /// Number of channels currently tracked.
    pub fn len(&self) -> usize {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shut down and forget every channel with no registered handlers,
    /// plus any that already closed. Returns how many were removed.
    pub fn close_idle(&self) -> usize {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let before = channels.len();
        channels.retain(|_, channel| {
            let idle = channel.handler_count() == 0 || channel.is_closed();
            if idle {
                channel.shutdown();
            }
            !idle
        });
        before - channels.len()
    }

    /// Shut down every channel. Further `acquire` calls fail.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        for channel in channels.values() {
            channel.shutdown();
        }
        channels.clear();
    }
}

impl Default for ChannelManager {
    fn default() -> Self {
        Self::new(ReconnectConfig::default())
    }
}

impl Drop for ChannelManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Normalize an endpoint to a WebSocket URL.
pub(crate) fn websocket_url(endpoint: &Url) -> Result<Url, Error> {
    let scheme = match endpoint.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => {
            return Err(Error::ChannelConnect(format!(
                "unsupported channel scheme '{other}'"
            )));
        }
    };
    let mut url = endpoint.clone();
    if url.scheme() != scheme {
        url.set_scheme(scheme)
            .map_err(|()| Error::ChannelConnect(format!("cannot use scheme {scheme} for {endpoint}")))?;
    }
    Ok(url)
}
