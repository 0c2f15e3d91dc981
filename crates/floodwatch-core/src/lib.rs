//! Realtime device-state sync for floodwatch sensor stations.
//!
//! - **[`SyncEngine`]**: one consumer's attachment. Registers handlers on a
//!   shared [`Channel`](floodwatch_api::Channel) from an injected
//!   [`ChannelManager`](floodwatch_api::ChannelManager), loads the
//!   snapshot, and keeps the store current; optional resync after
//!   reconnects and periodic refresh.
//!
//! - **[`DeviceStore`]**: per-device maps (record, connectivity, latest
//!   sample, rainfall and water quality status, alert records) with
//!   `watch`-based view notification. Stream events and snapshots are
//!   merged by timestamp so neither regresses the other.
//!
//! - **[`lifecycle`]**: the alert state machine. At most one record per
//!   (device, type); re-triggers replace, resolutions deactivate, and a
//!   non-critical water quality update clears a critical water quality
//!   alert.
//!
//! - **[`DeviceStream`]**: subscription handle with `current()` /
//!   `latest()` / `changed()` and a `Stream` adapter, narrowed by a
//!   [`DeviceFilter`].

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod model;
pub mod snapshot;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{SyncConfig, TlsVerification};
pub use engine::{LoadState, SyncEngine};
pub use error::{CoreError, EventError};
pub use event::DeviceEvent;
pub use snapshot::{DeviceSnapshot, SnapshotLoader};
pub use store::{DeviceStore, SnapshotMark, StreamHealth};
pub use stream::{DeviceFilter, DeviceStream};

pub use floodwatch_api::{Channel, ChannelManager, ChannelState, HandlerId, ReconnectConfig};

pub use model::{
    AlertRecord, AlertSeverity, AlertType, ConnectivityState, Device, DeviceId, DeviceThresholds,
    DeviceView, FleetSummary, FloodLevel, RainfallCategory, RainfallStatus, SensorSample,
    WaterQualityCategory, WaterQualityStatus,
};
