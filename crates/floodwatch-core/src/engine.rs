// ── Sync engine ──
//
// One consumer's view of the backend: a store, the snapshot loader that
// seeds it, and a registration on a shared event channel that keeps it
// current. Attaching subscribes first and loads second, so nothing the
// stream sends during the load is lost.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use floodwatch_api::channel::{EVENT_CONNECT, EVENT_CONNECT_ERROR, EVENT_DISCONNECT};
use floodwatch_api::{ApiClient, Channel, ChannelManager, ChannelState, EventHandler, HandlerId};

use crate::config::SyncConfig;
use crate::error::CoreError;
use crate::event::names;
use crate::snapshot::SnapshotLoader;
use crate::store::DeviceStore;
use crate::stream::{DeviceFilter, DeviceStream};

// ── LoadState ────────────────────────────────────────────────────────

/// Snapshot loading state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Ready {
        loaded_at: chrono::DateTime<Utc>,
    },
    /// The last load failed. With `has_cached_state` the views still show
    /// the previous snapshot plus stream updates.
    Failed {
        message: String,
        has_cached_state: bool,
    },
}

// ── SyncEngine ───────────────────────────────────────────────────────

/// Cheaply cloneable via `Arc<EngineInner>`.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: SyncConfig,
    consumer: HandlerId,
    store: Arc<DeviceStore>,
    loader: SnapshotLoader,
    channels: Arc<ChannelManager>,
    load_state: watch::Sender<LoadState>,
    /// Serializes snapshot loads.
    load_lock: Mutex<()>,
    attachment: Mutex<Option<Attachment>>,
}

struct Attachment {
    channel: Channel,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl SyncEngine {
    /// Create an engine for `consumer`. Does NOT connect: call
    /// [`attach()`](Self::attach) to subscribe and load.
    ///
    /// `consumer` identifies this engine's handlers on shared channels;
    /// attaching twice with the same id never doubles delivery.
    pub fn new(
        config: SyncConfig,
        channels: Arc<ChannelManager>,
        consumer: impl Into<HandlerId>,
    ) -> Result<Self, CoreError> {
        let client = ApiClient::new(config.api_url.clone(), &config.credential, &config.transport())?;
        Ok(Self::with_loader(config, channels, consumer, SnapshotLoader::new(client)))
    }

    pub fn with_loader(
        config: SyncConfig,
        channels: Arc<ChannelManager>,
        consumer: impl Into<HandlerId>,
        loader: SnapshotLoader,
    ) -> Self {
        let (load_state, _) = watch::channel(LoadState::Idle);
        Self {
            inner: Arc::new(EngineInner {
                config,
                consumer: consumer.into(),
                store: Arc::new(DeviceStore::new()),
                loader,
                channels,
                load_state,
                load_lock: Mutex::new(()),
                attachment: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn consumer(&self) -> &HandlerId {
        &self.inner.consumer
    }

    pub fn store(&self) -> &Arc<DeviceStore> {
        &self.inner.store
    }

    pub fn subscribe(&self, filter: DeviceFilter) -> DeviceStream {
        self.inner.store.subscribe_filtered(filter)
    }

    pub fn load_state(&self) -> watch::Receiver<LoadState> {
        self.inner.load_state.subscribe()
    }

    pub fn current_load_state(&self) -> LoadState {
        self.inner.load_state.borrow().clone()
    }

    /// The channel this engine is attached to, if any.
    pub async fn channel(&self) -> Option<Channel> {
        self.inner
            .attachment
            .lock()
            .await
            .as_ref()
            .map(|a| a.channel.clone())
    }

    pub async fn is_attached(&self) -> bool {
        self.inner.attachment.lock().await.is_some()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Subscribe to the shared channel, then load the snapshot.
    ///
    /// Safe to call again: handlers are registered idempotently and
    /// background tasks are started once per attachment. A failed load is
    /// an error only when there is no cached state to show; otherwise it
    /// is reported through [`load_state`](Self::load_state).
    pub async fn attach(&self) -> Result<(), CoreError> {
        {
            let mut slot = self.inner.attachment.lock().await;
            let reusable = slot
                .as_ref()
                .filter(|a| !a.channel.is_closed())
                .map(|a| a.channel.clone());
            if let Some(channel) = reusable {
                self.register(&channel);
            } else {
                if let Some(stale) = slot.take() {
                    stale.cancel.cancel();
                }
                let channel = self
                    .inner
                    .channels
                    .acquire(&self.inner.config.stream_url, &self.inner.config.credential)?;
                self.register(&channel);
                *slot = Some(self.spawn_tasks(channel));
            }
        }

        match self.reload().await {
            Ok(()) => Ok(()),
            Err(e) if !self.inner.store.has_snapshot() => Err(e),
            Err(e) => {
                warn!(error = %e, "snapshot load failed; serving cached state");
                Ok(())
            }
        }
    }

    /// Remove this consumer's handlers and stop background tasks. The
    /// shared channel stays open for other consumers.
    pub async fn detach(&self) {
        let Some(attachment) = self.inner.attachment.lock().await.take() else {
            return;
        };
        let removed = attachment.channel.off_all(&self.inner.consumer);
        attachment.cancel.cancel();
        for handle in attachment.tasks {
            let _ = handle.await;
        }
        debug!(consumer = %self.inner.consumer, removed, "detached");
    }

    /// Load a fresh snapshot and merge it into the store.
    ///
    /// On failure the store is left untouched and the load state records
    /// whether cached state is still available.
    pub async fn reload(&self) -> Result<(), CoreError> {
        let _serial = self.inner.load_lock.lock().await;
        let store = &self.inner.store;
        self.inner.load_state.send_replace(LoadState::Loading);

        let mark = store.begin_snapshot();
        match self.inner.loader.load().await {
            Ok(snapshot) => {
                let loaded_at = snapshot.fetched_at;
                let devices = snapshot.devices.len();
                store.apply_snapshot(snapshot, mark);
                self.inner.load_state.send_replace(LoadState::Ready { loaded_at });
                info!(devices, "snapshot loaded");
                Ok(())
            }
            Err(e) => {
                let has_cached_state = store.has_snapshot();
                warn!(error = %e, has_cached_state, "snapshot load failed");
                self.inner.load_state.send_replace(LoadState::Failed {
                    message: e.to_string(),
                    has_cached_state,
                });
                Err(e)
            }
        }
    }

    // ── Internals ────────────────────────────────────────────────────

    fn register(&self, channel: &Channel) {
        let store = Arc::clone(&self.inner.store);
        let handler: EventHandler = Arc::new(move |event| {
            store.handle_channel_event(event);
        });

        let transport = [EVENT_CONNECT, EVENT_DISCONNECT, EVENT_CONNECT_ERROR];
        let mut added = 0usize;
        for name in names::ALL.iter().chain(transport.iter()) {
            if channel.on(name, self.inner.consumer.clone(), Arc::clone(&handler)) {
                added += 1;
            }
        }

        self.inner.store.sync_health(&channel.current_state());
        debug!(consumer = %self.inner.consumer, added, "handlers registered");
    }

    fn spawn_tasks(&self, channel: Channel) -> Attachment {
        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();

        if self.inner.config.resync_on_reconnect {
            tasks.push(tokio::spawn(resync_task(
                self.clone(),
                channel.state(),
                cancel.clone(),
            )));
        }

        let interval_secs = self.inner.config.refresh_interval_secs;
        if interval_secs > 0 {
            tasks.push(tokio::spawn(refresh_task(
                self.clone(),
                interval_secs,
                cancel.clone(),
            )));
        }

        Attachment {
            channel,
            cancel,
            tasks,
        }
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Reload the snapshot each time the channel comes back after a drop.
async fn resync_task(
    engine: SyncEngine,
    mut state: watch::Receiver<ChannelState>,
    cancel: CancellationToken,
) {
    let mut seen_connected = matches!(*state.borrow(), ChannelState::Connected);
    let mut dropped = false;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = state.borrow_and_update().clone();
                match current {
                    ChannelState::Connected => {
                        if dropped {
                            info!("channel reconnected; resyncing snapshot");
                            if let Err(e) = engine.reload().await {
                                warn!(error = %e, "resync after reconnect failed");
                            }
                        }
                        seen_connected = true;
                        dropped = false;
                    }
                    ChannelState::Connecting | ChannelState::Reconnecting { .. } => {
                        dropped |= seen_connected;
                    }
                    ChannelState::Failed { reason } => {
                        warn!(%reason, "event channel failed; views will not update");
                        break;
                    }
                    ChannelState::Closed => break,
                }
            }
        }
    }
}

async fn refresh_task(engine: SyncEngine, interval_secs: u64, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = engine.reload().await {
                    warn!(error = %e, "periodic refresh failed");
                }
            }
        }
    }
}
