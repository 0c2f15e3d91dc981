// ── Stream event application ──
//
// Applies decoded channel events to the store. Each event is applied under
// the write lock and followed by exactly one view rebuild. Nothing in here
// can fail: decoding already rejected malformed payloads.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, trace, warn};

use floodwatch_api::{ChannelEvent, ChannelState};
use floodwatch_api::channel::{EVENT_CONNECT, EVENT_CONNECT_ERROR, EVENT_DISCONNECT};

use super::device_store::{DeviceStore, MetadataPatch, StreamHealth, Touch, alert_key};
use crate::event::{AlertResolution, DeviceEvent, StatusPatch};
use crate::lifecycle::{self, AlertInput, Transition};
use crate::model::{
    AlertRecord, AlertType, Device, DeviceId, RainfallStatus, SensorSample, WaterQualityStatus,
};

impl DeviceStore {
    /// Entry point for channel handlers.
    ///
    /// Transport events update [`StreamHealth`]; everything else is decoded
    /// and applied. Malformed or unknown events are logged and dropped.
    /// Returns `true` if state changed.
    pub fn handle_channel_event(&self, event: &ChannelEvent) -> bool {
        match event.name.as_str() {
            EVENT_CONNECT => self.set_health(StreamHealth::Live),
            EVENT_DISCONNECT => self.set_health(StreamHealth::Interrupted),
            EVENT_CONNECT_ERROR => {
                let message = event
                    .data
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("connection failed")
                    .to_owned();
                let fatal = event
                    .data
                    .get("fatal")
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(false);
                self.set_health(StreamHealth::Degraded { message, fatal })
            }
            _ => match DeviceEvent::decode(event) {
                Ok(decoded) => self.apply(decoded),
                Err(e) => {
                    warn!(event = %event.name, error = %e, "dropping malformed event");
                    false
                }
            },
        }
    }

    /// Seed health from a channel that may have connected before this
    /// store started listening.
    pub(crate) fn sync_health(&self, state: &ChannelState) -> bool {
        match state {
            ChannelState::Connected => self.set_health(StreamHealth::Live),
            ChannelState::Reconnecting { .. } => self.set_health(StreamHealth::Interrupted),
            ChannelState::Failed { reason } => self.set_health(StreamHealth::Degraded {
                message: reason.clone(),
                fatal: true,
            }),
            ChannelState::Connecting | ChannelState::Closed => false,
        }
    }

    fn set_health(&self, health: StreamHealth) -> bool {
        self.health.send_if_modified(|current| {
            if *current == health {
                false
            } else {
                debug!(?health, "stream health changed");
                *current = health;
                true
            }
        })
    }

    /// Apply one decoded event. Returns `true` if state changed.
    pub fn apply(&self, event: DeviceEvent) -> bool {
        let _guard = self.write();
        let device_id = event.device_id().clone();
        trace!(device_id = %device_id, ?event, "applying event");

        let changed = match event {
            DeviceEvent::Sample(sample) => self.apply_sample(sample),
            DeviceEvent::Rainfall(status) => self.apply_rainfall(status),
            DeviceEvent::WaterQuality(status) => self.apply_water_quality(status),
            DeviceEvent::Alert(signal) => {
                let key = alert_key(&signal.device_id, signal.alert_type);
                self.step_alert(
                    &key,
                    signal.alert_type,
                    &signal.device_id,
                    AlertInput::Signal(&signal),
                )
            }
            DeviceEvent::AlertResolved(resolution) => self.apply_resolution(&resolution),
            DeviceEvent::Status(patch) => self.apply_status(patch),
            DeviceEvent::DeviceUpdated(listed) => {
                self.touch(&listed.device.id, Touch::Metadata);
                self.pending_metadata.remove(listed.device.id.as_str());
                self.devices.upsert(listed.device.id.to_string(), listed.device);
                true
            }
        };

        self.touch(&device_id, Touch::Any);
        self.last_event_at.send_replace(Some(Utc::now()));
        if changed {
            self.publish();
        }
        changed
    }

    // ── Readings ─────────────────────────────────────────────────────

    fn apply_sample(&self, sample: SensorSample) -> bool {
        let key = sample.device_id.to_string();
        if let Some(current) = self.samples.get(&key) {
            if current.timestamp > sample.timestamp {
                debug!(device_id = %key, "ignoring sample older than the stored one");
                return false;
            }
        }

        // Replacement, not merge: fields absent here are absent from now on.
        if let Some(rainfall) = sample.rainfall_status() {
            self.store_rainfall(rainfall);
        }
        if let Some(quality) = sample.water_quality_status() {
            self.store_water_quality(quality);
        }
        self.samples.upsert(key, sample);
        true
    }

    fn apply_rainfall(&self, status: RainfallStatus) -> bool {
        self.store_rainfall(status)
    }

    /// A water quality update also drives the implicit clear of an active
    /// critical water quality alert.
    fn apply_water_quality(&self, status: WaterQualityStatus) -> bool {
        let device_id = status.device_id.clone();
        let input = AlertInput::QualityUpdate {
            category: status.category,
            at: status.observed_at,
        };
        if !self.store_water_quality(status) {
            return false;
        }
        let key = alert_key(&device_id, AlertType::CriticalWaterQuality);
        self.step_alert(&key, AlertType::CriticalWaterQuality, &device_id, input);
        true
    }

    fn store_rainfall(&self, status: RainfallStatus) -> bool {
        let key = status.device_id.to_string();
        if self
            .rainfall
            .get(&key)
            .is_some_and(|current| current.observed_at > status.observed_at)
        {
            return false;
        }
        self.rainfall.upsert(key, status);
        true
    }

    fn store_water_quality(&self, status: WaterQualityStatus) -> bool {
        let key = status.device_id.to_string();
        if self
            .water_quality
            .get(&key)
            .is_some_and(|current| current.observed_at > status.observed_at)
        {
            return false;
        }
        self.water_quality.upsert(key, status);
        true
    }

    // ── Alerts ───────────────────────────────────────────────────────

    fn step_alert(
        &self,
        key: &str,
        alert_type: AlertType,
        device_id: &DeviceId,
        input: AlertInput<'_>,
    ) -> bool {
        let current = self.alerts.get(key);
        let next = lifecycle::step(current.as_deref(), input);
        let Some(record) = next.record else {
            return false;
        };

        match next.transition {
            Transition::Activated => {
                debug!(device_id = %device_id, %alert_type, "alert activated");
            }
            Transition::Resolved => {
                debug!(device_id = %device_id, %alert_type, "alert resolved");
            }
            Transition::Refreshed | Transition::Ignored => {}
        }
        self.alerts.upsert(key, record);
        self.touch(device_id, Touch::Alert(alert_type));
        true
    }

    fn apply_resolution(&self, resolution: &AlertResolution) -> bool {
        let device_id = &resolution.device_id;
        let alert_type = resolution.alert_type.or_else(|| {
            let wanted = resolution.alert_id.as_deref()?;
            self.active_alerts(device_id)
                .into_iter()
                .find(|r| r.id.as_deref() == Some(wanted))
                .map(|r| r.alert_type)
        });

        let Some(alert_type) = alert_type else {
            debug!(
                device_id = %device_id,
                alert_id = ?resolution.alert_id,
                "resolution matched no active alert"
            );
            return false;
        };
        let key = alert_key(device_id, alert_type);
        self.step_alert(&key, alert_type, device_id, AlertInput::Resolve { at: resolution.at })
    }

    // ── Connectivity and metadata ────────────────────────────────────

    /// Partial patch: only fields present in the event change.
    fn apply_status(&self, patch: StatusPatch) -> bool {
        let key = patch.device_id.to_string();
        let mut changed = false;

        if patch.is_offline.is_some() || patch.last_seen_at.is_some() {
            let current = self.connectivity.get(&key).map(|c| (*c).clone());
            let mut next = current.clone().unwrap_or_default();
            if let Some(offline) = patch.is_offline {
                next.is_offline = offline;
            }
            if let Some(seen) = patch.last_seen_at {
                // last_seen only moves forward.
                next.last_seen_at = Some(next.last_seen_at.map_or(seen, |cur| cur.max(seen)));
            }
            if current.as_ref() != Some(&next) {
                self.connectivity.upsert(key.clone(), next);
                changed = true;
            }
            self.touch(&patch.device_id, Touch::Connectivity);
        }

        if patch.name.is_some() || patch.location.is_some() {
            let meta = MetadataPatch {
                name: patch.name,
                location: patch.location,
            };
            if let Some(device) = self.devices.get(&key) {
                let mut next: Device = (*device).clone();
                meta.apply_to(&mut next);
                if next != *device {
                    self.devices.upsert(key, next);
                    changed = true;
                }
            } else {
                // Not listed yet: keep the patch for the snapshot to merge.
                let mut pending = self
                    .pending_metadata
                    .get(&key)
                    .map(|p| (*p).clone())
                    .unwrap_or_default();
                pending.merge(meta);
                self.pending_metadata.upsert(key, pending);
            }
            self.touch(&patch.device_id, Touch::Metadata);
        }

        changed
    }
}

/// Resolve `record` through the lifecycle rules. Used by snapshot merging
/// for active records the backend no longer lists.
pub(crate) fn resolve_missing(
    record: &Arc<AlertRecord>,
    at: DateTime<Utc>,
) -> Option<AlertRecord> {
    lifecycle::step(Some(record.as_ref()), AlertInput::Resolve { at }).record
}
