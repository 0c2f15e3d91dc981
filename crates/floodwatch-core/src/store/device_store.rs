// ── Device state store ──
//
// Per-device maps for records, connectivity, readings and alerts, plus the
// derived views consumers render from. Reads are lock-free; every write
// goes through one short critical section so each event or snapshot is
// applied as a unit and the views are rebuilt once per change.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::watch;

use super::collection::EntityCollection;
use crate::model::{
    AlertRecord, AlertType, ConnectivityState, Device, DeviceId, DeviceView, FleetSummary,
    RainfallStatus, SensorSample, WaterQualityStatus,
};
use crate::stream::{DeviceFilter, DeviceStream};

// ── StreamHealth ─────────────────────────────────────────────────────

/// Event-stream health as seen by the store, fed by the channel's
/// synthetic connect/disconnect/error events.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamHealth {
    /// No transport event seen yet.
    #[default]
    Pending,
    Live,
    /// Connection dropped; the channel is reconnecting.
    Interrupted,
    /// A connect attempt failed. Views keep serving the last known state.
    Degraded { message: String, fatal: bool },
}

impl StreamHealth {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }
}

/// Stream generation observed when a snapshot load began. Entries written
/// by the stream after this point were not seen by that snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SnapshotMark(pub(crate) u64);

// ── Keys ─────────────────────────────────────────────────────────────

/// Alert records are keyed `"{device}|{type}"`. Device ids may contain
/// `|`, so never parse a device back out of a key; read the record's
/// `device_id` instead.
pub(crate) fn alert_key(device: &DeviceId, alert_type: AlertType) -> String {
    format!("{device}|{alert_type}")
}

/// Kinds of stream write that snapshot merging cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Touch {
    Any,
    Metadata,
    Connectivity,
    Alert(AlertType),
}

/// Name/location from status events, held for devices the store has not
/// listed yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct MetadataPatch {
    pub(crate) name: Option<String>,
    pub(crate) location: Option<String>,
}

impl MetadataPatch {
    /// Later fields override earlier ones; absent fields keep what was there.
    pub(crate) fn merge(&mut self, newer: Self) {
        if newer.name.is_some() {
            self.name = newer.name;
        }
        if newer.location.is_some() {
            self.location = newer.location;
        }
    }

    pub(crate) fn apply_to(&self, device: &mut Device) {
        if let Some(ref name) = self.name {
            device.name.clone_from(name);
        }
        if let Some(ref location) = self.location {
            device.location = Some(location.clone());
        }
    }
}

// ── DeviceStore ──────────────────────────────────────────────────────

pub struct DeviceStore {
    pub(crate) devices: EntityCollection<Device>,
    pub(crate) connectivity: EntityCollection<ConnectivityState>,
    pub(crate) samples: EntityCollection<SensorSample>,
    pub(crate) rainfall: EntityCollection<RainfallStatus>,
    pub(crate) water_quality: EntityCollection<WaterQualityStatus>,
    pub(crate) alerts: EntityCollection<AlertRecord>,
    /// Metadata patches waiting for their device to be listed.
    pub(crate) pending_metadata: EntityCollection<MetadataPatch>,

    /// (device, kind) -> stream generation of the last write.
    touched: DashMap<(DeviceId, Touch), u64>,
    generation: AtomicU64,
    write_lock: Mutex<()>,

    views: watch::Sender<Arc<Vec<Arc<DeviceView>>>>,
    pub(crate) health: watch::Sender<StreamHealth>,
    pub(crate) last_snapshot_at: watch::Sender<Option<DateTime<Utc>>>,
    pub(crate) last_event_at: watch::Sender<Option<DateTime<Utc>>>,
}

impl DeviceStore {
    pub fn new() -> Self {
        let (views, _) = watch::channel(Arc::new(Vec::new()));
        let (health, _) = watch::channel(StreamHealth::default());
        let (last_snapshot_at, _) = watch::channel(None);
        let (last_event_at, _) = watch::channel(None);

        Self {
            devices: EntityCollection::new(),
            connectivity: EntityCollection::new(),
            samples: EntityCollection::new(),
            rainfall: EntityCollection::new(),
            water_quality: EntityCollection::new(),
            alerts: EntityCollection::new(),
            pending_metadata: EntityCollection::new(),
            touched: DashMap::new(),
            generation: AtomicU64::new(0),
            write_lock: Mutex::new(()),
            views,
            health,
            last_snapshot_at,
            last_event_at,
        }
    }

    // ── Views ────────────────────────────────────────────────────────

    /// Current view of every listed device, sorted by id.
    pub fn views(&self) -> Arc<Vec<Arc<DeviceView>>> {
        self.views.borrow().clone()
    }

    pub fn view(&self, id: &DeviceId) -> Option<Arc<DeviceView>> {
        self.views.borrow().iter().find(|v| v.device.id == *id).cloned()
    }

    /// Subscribe to view changes. Fires once per applied event or snapshot.
    pub fn subscribe(&self) -> DeviceStream {
        DeviceStream::new(self.views.subscribe(), DeviceFilter::All)
    }

    /// Subscribe to the devices matching `filter`.
    pub fn subscribe_filtered(&self, filter: DeviceFilter) -> DeviceStream {
        DeviceStream::new(self.views.subscribe(), filter)
    }

    pub fn summary(&self) -> FleetSummary {
        FleetSummary::from_views(self.views.borrow().iter())
    }

    /// Active alerts across listed online devices.
    pub fn visible_alert_count(&self) -> usize {
        self.views
            .borrow()
            .iter()
            .map(|v| v.visible_alerts().len())
            .sum()
    }

    // ── Per-device lookups ───────────────────────────────────────────
    //
    // These read raw state, including state for ids not (yet) listed.

    pub fn device(&self, id: &DeviceId) -> Option<Arc<Device>> {
        self.devices.get(id.as_str())
    }

    pub fn sample(&self, id: &DeviceId) -> Option<Arc<SensorSample>> {
        self.samples.get(id.as_str())
    }

    pub fn rainfall(&self, id: &DeviceId) -> Option<Arc<RainfallStatus>> {
        self.rainfall.get(id.as_str())
    }

    pub fn water_quality(&self, id: &DeviceId) -> Option<Arc<WaterQualityStatus>> {
        self.water_quality.get(id.as_str())
    }

    pub fn connectivity(&self, id: &DeviceId) -> Option<Arc<ConnectivityState>> {
        self.connectivity.get(id.as_str())
    }

    /// The record for (device, type), active or not.
    pub fn alert(&self, id: &DeviceId, alert_type: AlertType) -> Option<Arc<AlertRecord>> {
        self.alerts.get(&alert_key(id, alert_type))
    }

    /// Active records for a device, offline or not.
    pub fn active_alerts(&self, id: &DeviceId) -> Vec<Arc<AlertRecord>> {
        AlertType::ALL
            .iter()
            .filter_map(|t| self.alert(id, *t))
            .filter(|r| r.is_active)
            .collect()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    // ── Status ───────────────────────────────────────────────────────

    pub fn health(&self) -> watch::Receiver<StreamHealth> {
        self.health.subscribe()
    }

    pub fn current_health(&self) -> StreamHealth {
        self.health.borrow().clone()
    }

    pub fn last_snapshot_at(&self) -> Option<DateTime<Utc>> {
        *self.last_snapshot_at.borrow()
    }

    pub fn last_event_at(&self) -> Option<DateTime<Utc>> {
        *self.last_event_at.borrow()
    }

    /// `true` once any snapshot has been applied.
    pub fn has_snapshot(&self) -> bool {
        self.last_snapshot_at().is_some()
    }

    // ── Write plumbing (crate-internal) ──────────────────────────────

    pub(crate) fn write(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Note the start of a snapshot load.
    pub fn begin_snapshot(&self) -> SnapshotMark {
        SnapshotMark(self.generation.load(Ordering::SeqCst))
    }

    /// Record a stream write for (device, kind).
    pub(crate) fn touch(&self, device: &DeviceId, kind: Touch) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.touched.insert((device.clone(), kind), generation);
        if kind != Touch::Any {
            self.touched.insert((device.clone(), Touch::Any), generation);
        }
    }

    /// Whether the stream wrote (device, kind) after `mark`.
    pub(crate) fn touched_since(&self, device: &DeviceId, kind: Touch, mark: SnapshotMark) -> bool {
        self.touched
            .get(&(device.clone(), kind))
            .is_some_and(|g| *g > mark.0)
    }

    /// Drop touch records that can no longer matter: devices not in
    /// `listed` with no write after `mark`.
    pub(crate) fn prune_touches(&self, listed: &HashSet<String>, mark: SnapshotMark) {
        self.touched
            .retain(|(device, _), generation| listed.contains(device.as_str()) || *generation > mark.0);
    }

    /// Rebuild and publish the views. Call with the write lock held.
    pub(crate) fn publish(&self) {
        let mut devices = self.devices.values();
        devices.sort_by(|a, b| a.id.cmp(&b.id));

        let views: Vec<Arc<DeviceView>> = devices
            .into_iter()
            .map(|device| {
                let key = device.id.as_str();
                Arc::new(DeviceView {
                    connectivity: self
                        .connectivity
                        .get(key)
                        .map(|c| (*c).clone())
                        .unwrap_or_default(),
                    sample: self.samples.get(key),
                    rainfall: self.rainfall.get(key),
                    water_quality: self.water_quality.get(key),
                    active_alerts: self.active_alerts(&device.id),
                    device,
                })
            })
            .collect();

        // `send_modify` updates unconditionally, even with zero receivers.
        self.views.send_modify(|v| *v = Arc::new(views));
    }
}

impl Default for DeviceStore {
    fn default() -> Self {
        Self::new()
    }
}
