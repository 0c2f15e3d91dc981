//! Shared, authenticated event channel with auto-reconnect.
//!
//! A [`Channel`] owns one WebSocket connection to the backend's event
//! endpoint. Consumers attach named handlers with [`Channel::on`] and detach
//! them with [`Channel::off`] / [`Channel::off_all`]; the channel survives
//! transport loss by reconnecting with exponential backoff + jitter and keeps
//! delivering to whatever handlers are still registered.
//!
//! Channels are normally obtained from a [`ChannelManager`], which hands
//! out one channel per (endpoint, credential) pair.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use floodwatch_api::channel::{ChannelManager, ReconnectConfig};
//!
//! let manager = ChannelManager::new(ReconnectConfig::default());
//! let channel = manager.acquire(&endpoint, &token)?;
//!
//! channel.on("new-sensor-data", "dashboard", Arc::new(|event| {
//!     println!("{}: {}", event.name, event.data);
//! }));
//!
//! // ... later, on teardown
//! channel.off_all(&"dashboard".into());
//! ```

mod handlers;
mod manager;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

pub use handlers::{EventHandler, HandlerId};
pub use manager::ChannelManager;

use handlers::HandlerRegistry;

// ── Synthetic event names ────────────────────────────────────────────

/// Delivered after every successful (re)connect.
pub const EVENT_CONNECT: &str = "connect";
/// Delivered when an established connection drops.
pub const EVENT_DISCONNECT: &str = "disconnect";
/// Delivered when a connect attempt fails. `data` carries
/// `{ "message": <reason>, "attempt": <n>, "fatal": <bool> }`.
pub const EVENT_CONNECT_ERROR: &str = "connect_error";

// ── ChannelEvent ─────────────────────────────────────────────────────

/// A named event received from the channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelEvent {
    /// Event name, e.g. `"new-sensor-data"`, `"flood-alert"`.
    pub name: String,

    /// Raw JSON payload. Interpretation belongs to the consumer.
    pub data: serde_json::Value,

    /// When this process received the frame.
    pub received_at: DateTime<Utc>,
}

impl ChannelEvent {
    pub fn new(name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            data,
            received_at: Utc::now(),
        }
    }
}

// ── ChannelState ─────────────────────────────────────────────────────

/// Transport state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    /// Gave up: credential rejected or retry limit reached.
    Failed { reason: String },
    /// Shut down on request.
    Closed,
}

impl ChannelState {
    /// `true` once the channel will never deliver transport events again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::Closed)
    }
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for channel reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum consecutive failed attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── Channel ──────────────────────────────────────────────────────────

/// Handle to a shared event channel.
///
/// Cheaply cloneable; every clone refers to the same connection and the
/// same handler registry.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    endpoint: Url,
    handlers: HandlerRegistry,
    state: watch::Sender<ChannelState>,
    outgoing: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("endpoint", &self.inner.endpoint.as_str())
            .field("state", &*self.inner.state.borrow())
            .field("handlers", &self.inner.handlers.len())
            .finish()
    }
}

impl Channel {
    /// Spawn the connection loop for `endpoint` and return immediately.
    ///
    /// The handshake happens asynchronously; watch [`state`](Self::state)
    /// or register an [`EVENT_CONNECT_ERROR`] handler to observe failures.
    /// Must be called from within a tokio runtime.
    pub fn connect(
        endpoint: Url,
        credential: SecretString,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let channel = Self::build(endpoint, outgoing_tx, cancel, ChannelState::Connecting);

        let task_channel = channel.clone();
        tokio::spawn(async move {
            channel_loop(task_channel, credential, reconnect, outgoing_rx).await;
        });

        channel
    }

    /// A channel with no transport behind it.
    ///
    /// Handlers can be registered and events injected with
    /// [`dispatch`](Self::dispatch); used for replaying recorded events
    /// and in tests.
    pub fn offline(endpoint: Url) -> Self {
        let (outgoing_tx, _) = mpsc::unbounded_channel();
        Self::build(endpoint, outgoing_tx, CancellationToken::new(), ChannelState::Closed)
    }

    fn build(
        endpoint: Url,
        outgoing: mpsc::UnboundedSender<String>,
        cancel: CancellationToken,
        initial: ChannelState,
    ) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            inner: Arc::new(ChannelInner {
                endpoint,
                handlers: HandlerRegistry::default(),
                state,
                outgoing,
                cancel,
            }),
        }
    }

    /// The endpoint this channel is connected to.
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    // ── Handler registration ─────────────────────────────────────────

    /// Register `handler` for `event` under identity `id`.
    ///
    /// Idempotent per (event, id): registering again replaces the previous
    /// handler, so each event is still delivered once. Returns `true` if
    /// the registration is new.
    pub fn on(&self, event: &str, id: impl Into<HandlerId>, handler: EventHandler) -> bool {
        let id = id.into();
        let is_new = self.inner.handlers.insert(event, id.clone(), handler);
        tracing::trace!(event, handler = %id, is_new, "handler registered");
        is_new
    }

    /// Remove the handler registered for `event` under `id`.
    pub fn off(&self, event: &str, id: &HandlerId) -> bool {
        self.inner.handlers.remove(event, id)
    }

    /// Remove every handler registered under `id`. Returns the count removed.
    pub fn off_all(&self, id: &HandlerId) -> usize {
        let removed = self.inner.handlers.remove_all(id);
        tracing::debug!(handler = %id, removed, "handlers removed");
        removed
    }

    /// Total handler registrations across all event names.
    pub fn handler_count(&self) -> usize {
        self.inner.handlers.len()
    }

    /// Handler registrations for a single event name.
    pub fn handler_count_for(&self, event: &str) -> usize {
        self.inner.handlers.count_for(event)
    }

    /// Deliver `event` to the handlers registered for its name, as if it
    /// had arrived from the transport. Returns the number of handlers run.
    pub fn dispatch(&self, event: &ChannelEvent) -> usize {
        self.inner.handlers.dispatch(event)
    }

    // ── Outbound ─────────────────────────────────────────────────────

    /// Queue a named event for the backend. Frames queued while
    /// disconnected are sent after the next successful handshake.
    pub fn emit(&self, event: &str, data: serde_json::Value) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::ChannelShutdown);
        }
        let frame = serde_json::json!({ "event": event, "data": data }).to_string();
        self.inner
            .outgoing
            .send(frame)
            .map_err(|_| Error::ChannelShutdown)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Subscribe to transport state changes.
    pub fn state(&self) -> watch::Receiver<ChannelState> {
        self.inner.state.subscribe()
    }

    /// Current transport state.
    pub fn current_state(&self) -> ChannelState {
        self.inner.state.borrow().clone()
    }

    /// `true` if the connection loop has stopped for good.
    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled() || self.inner.state.borrow().is_terminal()
    }

    /// Signal the connection loop to shut down. Registered handlers are
    /// kept but will receive no further transport events.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.set_state(ChannelState::Closed);
    }

    fn set_state(&self, state: ChannelState) {
        // `send_replace` updates even with zero receivers.
        self.inner.state.send_replace(state);
    }

    fn emit_local(&self, name: &str, data: serde_json::Value) {
        self.dispatch(&ChannelEvent::new(name, data));
    }
}

// ── Background reconnection loop ─────────────────────────────────────

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why a connect attempt failed.
enum ConnectFailure {
    /// Credential rejected during the handshake; retrying cannot help.
    Rejected(String),
    Transient(Error),
}

/// Main loop: connect → pump → on error, backoff → reconnect.
async fn channel_loop(
    channel: Channel,
    credential: SecretString,
    reconnect: ReconnectConfig,
    mut outgoing: mpsc::UnboundedReceiver<String>,
) {
    let cancel = channel.inner.cancel.clone();
    let mut attempt: u32 = 0;

    loop {
        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = open(&channel.inner.endpoint, &credential) => result,
        };

        match opened {
            Ok(stream) => {
                attempt = 0;
                channel.set_state(ChannelState::Connected);
                channel.emit_local(EVENT_CONNECT, serde_json::Value::Null);

                let result = pump(&channel, stream, &mut outgoing, &cancel).await;
                if cancel.is_cancelled() {
                    break;
                }

                let reason = match result {
                    Ok(()) => "stream ended".to_owned(),
                    Err(e) => e.to_string(),
                };
                tracing::info!(%reason, "channel disconnected, reconnecting");
                channel.emit_local(EVENT_DISCONNECT, serde_json::json!({ "reason": reason }));
                channel.set_state(ChannelState::Reconnecting { attempt: 0 });
            }
            Err(ConnectFailure::Rejected(reason)) => {
                tracing::error!(%reason, "channel handshake rejected, giving up");
                channel.emit_local(
                    EVENT_CONNECT_ERROR,
                    serde_json::json!({ "message": reason, "attempt": attempt, "fatal": true }),
                );
                channel.set_state(ChannelState::Failed { reason });
                break;
            }
            Err(ConnectFailure::Transient(e)) => {
                tracing::warn!(error = %e, attempt, "channel connect failed");

                let exhausted = reconnect.max_retries.is_some_and(|max| attempt >= max);
                channel.emit_local(
                    EVENT_CONNECT_ERROR,
                    serde_json::json!({
                        "message": e.to_string(),
                        "attempt": attempt,
                        "fatal": exhausted,
                    }),
                );

                if exhausted {
                    tracing::error!(
                        max_retries = reconnect.max_retries,
                        "channel reconnection limit reached, giving up"
                    );
                    channel.set_state(ChannelState::Failed {
                        reason: e.to_string(),
                    });
                    break;
                }

                let delay = calculate_backoff(attempt, &reconnect);
                tracing::info!(
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    attempt,
                    "waiting before reconnect"
                );

                attempt += 1;
                channel.set_state(ChannelState::Reconnecting { attempt });

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    tracing::debug!(endpoint = %channel.inner.endpoint, "channel loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Perform the WebSocket handshake, carrying the credential as a bearer
/// `Authorization` header on the upgrade request.
async fn open(url: &Url, credential: &SecretString) -> Result<WsStream, ConnectFailure> {
    tracing::info!(url = %url, "connecting to event channel");

    let uri: tungstenite::http::Uri = url.as_str().parse().map_err(
        |e: tungstenite::http::uri::InvalidUri| {
            ConnectFailure::Transient(Error::ChannelConnect(e.to_string()))
        },
    )?;

    let request = ClientRequestBuilder::new(uri).with_header(
        "Authorization",
        format!("Bearer {}", credential.expose_secret()),
    );

    match tokio_tungstenite::connect_async(request).await {
        Ok((stream, _response)) => {
            tracing::info!("event channel connected");
            Ok(stream)
        }
        Err(tungstenite::Error::Http(response))
            if matches!(response.status().as_u16(), 401 | 403) =>
        {
            Err(ConnectFailure::Rejected(format!(
                "handshake rejected with HTTP {}",
                response.status()
            )))
        }
        Err(e) => Err(ConnectFailure::Transient(Error::ChannelConnect(e.to_string()))),
    }
}

/// Read frames until the connection drops, forwarding queued outbound
/// frames as they arrive.
async fn pump(
    channel: &Channel,
    stream: WsStream,
    outgoing: &mut mpsc::UnboundedReceiver<String>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(tungstenite::Message::Close(None)).await;
                return Ok(());
            }
            Some(frame) = outgoing.recv() => {
                write
                    .send(tungstenite::Message::Text(frame.into()))
                    .await
                    .map_err(|e| Error::ChannelConnect(e.to_string()))?;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        if let Some(event) = parse_frame(&text) {
                            channel.dispatch(&event);
                        }
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite queues the pong reply automatically
                        tracing::trace!("channel ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        return match frame {
                            Some(cf) => Err(Error::ChannelClosed {
                                code: cf.code.into(),
                                reason: cf.reason.to_string(),
                            }),
                            None => Ok(()),
                        };
                    }
                    Some(Err(e)) => {
                        return Err(Error::ChannelConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("channel stream ended");
                        return Ok(());
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

// ── Frame parsing ────────────────────────────────────────────────────

/// Object-shaped frame: `{ "event": "...", "data": {...} }`.
#[derive(Debug, Deserialize)]
struct ObjectFrame {
    #[serde(alias = "type")]
    event: String,
    #[serde(default, alias = "payload")]
    data: serde_json::Value,
}

/// Parse a text frame into a [`ChannelEvent`].
///
/// Accepts the object shape and the array shape `["name", {...}]`.
/// Anything else is logged and skipped.
fn parse_frame(text: &str) -> Option<ChannelEvent> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "failed to parse channel frame");
            return None;
        }
    };

    if let serde_json::Value::Array(mut parts) = value {
        if parts.is_empty() {
            tracing::debug!("empty array frame");
            return None;
        }
        let data = if parts.len() > 1 {
            parts.swap_remove(1)
        } else {
            serde_json::Value::Null
        };
        return match parts.first().and_then(serde_json::Value::as_str) {
            Some(name) => Some(ChannelEvent::new(name, data)),
            None => {
                tracing::debug!("array frame without an event name");
                None
            }
        };
    }

    match serde_json::from_value::<ObjectFrame>(value) {
        Ok(frame) => Some(ChannelEvent::new(frame.event, frame.data)),
        Err(e) => {
            tracing::debug!(error = %e, "frame has no event name");
            None
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 +- 0.25)`
pub(crate) fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────
