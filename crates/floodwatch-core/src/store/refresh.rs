// ── Snapshot application ──
//
// Merges a full snapshot (devices + active alerts) into the store. The
// snapshot is authoritative except where the stream has something newer:
// entries the stream wrote while the load was in flight, or whose
// timestamps are later than the snapshot's, are kept.

use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::hash_map::Entry;

use tracing::debug;

use super::device_store::{DeviceStore, SnapshotMark, Touch, alert_key};
use super::reconcile::resolve_missing;
use crate::convert::ListedDevice;
use crate::model::{AlertRecord, ConnectivityState, Device, DeviceId};
use crate::snapshot::DeviceSnapshot;

/// Should snapshot connectivity replace what the store holds?
///
/// Timestamps decide when both sides have one. Without a usable
/// comparison, a stream write made during the load wins.
fn connectivity_wins(
    current: Option<&ConnectivityState>,
    incoming: &ConnectivityState,
    written_during_load: bool,
) -> bool {
    let Some(current) = current else {
        return true;
    };
    match (current.last_seen_at, incoming.last_seen_at) {
        (Some(cur), Some(snap)) if snap != cur => snap > cur,
        _ => !written_during_load,
    }
}

/// Should a snapshot device record replace the stored one?
fn metadata_wins(current: Option<&Device>, incoming: &Device, written_during_load: bool) -> bool {
    let Some(current) = current else {
        return true;
    };
    match (current.updated_at, incoming.updated_at) {
        (Some(cur), Some(snap)) if snap != cur => snap > cur,
        _ => !written_during_load,
    }
}

/// Should a snapshot alert row replace the stored record?
fn alert_row_wins(current: Option<&AlertRecord>, row: &AlertRecord, written_during_load: bool) -> bool {
    let Some(current) = current else {
        return true;
    };
    let last = current.last_transition_at();
    row.triggered_at > last || (row.triggered_at == last && !written_during_load)
}

/// Keep the most recently triggered active row per (device, type).
fn latest_active_rows(rows: Vec<AlertRecord>) -> HashMap<String, AlertRecord> {
    let mut latest: HashMap<String, AlertRecord> = HashMap::new();
    for row in rows.into_iter().filter(|r| r.is_active) {
        match latest.entry(alert_key(&row.device_id, row.alert_type)) {
            Entry::Occupied(mut slot) => {
                if row.triggered_at > slot.get().triggered_at {
                    slot.insert(row);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(row);
            }
        }
    }
    latest
}

impl DeviceStore {
    /// Apply a snapshot whose load began at `mark`.
    ///
    /// The device set is replaced: unlisted devices leave the views.
    /// Active alerts are seeded per (device, type); records the backend no
    /// longer lists as active are resolved unless the stream touched them
    /// during the load.
    pub fn apply_snapshot(&self, snapshot: DeviceSnapshot, mark: SnapshotMark) {
        let _guard = self.write();
        let DeviceSnapshot {
            devices,
            alerts,
            fetched_at,
        } = snapshot;

        let listed: HashSet<String> = devices.iter().map(|l| l.device.id.to_string()).collect();
        let mut kept_from_stream = 0usize;

        // ── Devices and connectivity ──
        for ListedDevice {
            mut device,
            connectivity,
        } in devices
        {
            let id = device.id.clone();
            let key = id.to_string();

            let during_load = self.touched_since(&id, Touch::Metadata, mark);
            // A patch that arrived before the device was known: newer than
            // this snapshot only if it was written while the load ran.
            let pending = self.pending_metadata.remove(&key);
            if let Some(pending) = pending.filter(|_| during_load) {
                pending.apply_to(&mut device);
            }
            if metadata_wins(self.devices.get(&key).as_deref(), &device, during_load) {
                self.devices.upsert(key.clone(), device);
            } else {
                kept_from_stream += 1;
            }

            if let Some(incoming) = connectivity {
                let during_load = self.touched_since(&id, Touch::Connectivity, mark);
                let current = self.connectivity.get(&key);
                if connectivity_wins(current.as_deref(), &incoming, during_load) {
                    self.connectivity.upsert(key, incoming);
                } else {
                    debug!(device_id = %id, "keeping newer stream connectivity over snapshot");
                    kept_from_stream += 1;
                }
            }
        }

        for key in self.devices.keys() {
            if !listed.contains(&key) {
                self.devices.remove(&key);
            }
        }

        // ── Alerts ──
        let latest = latest_active_rows(alerts);
        let mut seeded = 0usize;
        for (key, row) in &latest {
            let during_load = self.touched_since(&row.device_id, Touch::Alert(row.alert_type), mark);
            if alert_row_wins(self.alerts.get(key).as_deref(), row, during_load) {
                self.alerts.upsert(key.clone(), row.clone());
                seeded += 1;
            } else {
                kept_from_stream += 1;
            }
        }

        let mut resolved = 0usize;
        for record in self.alerts.values() {
            let key = alert_key(&record.device_id, record.alert_type);
            if !record.is_active
                || latest.contains_key(&key)
                || record.triggered_at > fetched_at
                || self.touched_since(&record.device_id, Touch::Alert(record.alert_type), mark)
            {
                continue;
            }
            if let Some(next) = resolve_missing(&record, fetched_at) {
                self.alerts.upsert(key, next);
                resolved += 1;
            }
        }

        // ── Derived state for devices that are gone ──
        let stale = |device: &str| {
            !listed.contains(device) && !self.touched_since(&DeviceId::from(device), Touch::Any, mark)
        };
        let pruned = self.connectivity.retain_keys(|k| !stale(k))
            + self.samples.retain_keys(|k| !stale(k))
            + self.rainfall.retain_keys(|k| !stale(k))
            + self.water_quality.retain_keys(|k| !stale(k))
            + self.alerts.retain(|_, record| !stale(record.device_id.as_str()));
        self.pending_metadata.retain_keys(|k| !stale(k));
        self.prune_touches(&listed, mark);

        self.last_snapshot_at.send_replace(Some(fetched_at));
        self.publish();

        debug!(
            devices = listed.len(),
            alerts_seeded = seeded,
            alerts_resolved = resolved,
            kept_from_stream,
            pruned,
            "snapshot applied"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::*;
    use crate::model::{AlertSeverity, AlertType};

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 20, 12, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn conn(offline: bool, seen: Option<i64>) -> ConnectivityState {
        ConnectivityState {
            is_offline: offline,
            last_seen_at: seen.map(at),
        }
    }

    fn row(device: &str, minutes: i64, message: &str) -> AlertRecord {
        AlertRecord {
            id: None,
            device_id: DeviceId::from(device),
            alert_type: AlertType::Flood,
            severity: AlertSeverity::Critical,
            message: message.into(),
            is_active: true,
            triggered_at: at(minutes),
            resolved_at: None,
        }
    }

    #[test]
    fn newer_timestamp_wins_either_way() {
        let stream = conn(true, Some(10));
        assert!(!connectivity_wins(Some(&stream), &conn(false, Some(5)), false));
        assert!(connectivity_wins(Some(&stream), &conn(false, Some(15)), true));
    }

    #[test]
    fn without_timestamps_a_write_during_load_wins() {
        let stream = conn(true, None);
        assert!(!connectivity_wins(Some(&stream), &conn(false, None), true));
        assert!(connectivity_wins(Some(&stream), &conn(false, None), false));
        assert!(connectivity_wins(None, &conn(false, None), true));
    }

    #[test]
    fn duplicate_rows_keep_latest_trigger() {
        let rows = vec![row("A", 0, "old"), row("A", 9, "new"), row("A", 3, "middle")];
        let latest = latest_active_rows(rows);
        assert_eq!(latest.len(), 1);
        assert_eq!(latest.values().next().unwrap().message, "new");
    }

    #[test]
    fn inactive_rows_are_ignored() {
        let mut inactive = row("A", 0, "x");
        inactive.is_active = false;
        assert!(latest_active_rows(vec![inactive]).is_empty());
    }

    #[test]
    fn older_row_does_not_undo_a_stream_resolution() {
        let mut resolved = row("A", 0, "x");
        resolved.is_active = false;
        resolved.resolved_at = Some(at(20));
        assert!(!alert_row_wins(Some(&resolved), &row("A", 0, "x"), false));
        assert!(alert_row_wins(Some(&resolved), &row("A", 25, "again"), true));
    }
}
