// ── Read-side projections ──
//
// What a dashboard renders for one device, and the fleet-wide roll-up.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use super::alert::{AlertRecord, AlertType, ConnectivityState};
use super::device::{Device, FloodLevel};
use super::reading::{RainfallStatus, SensorSample, WaterQualityStatus};

/// Consolidated state of one listed device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceView {
    pub device: Arc<Device>,
    pub connectivity: ConnectivityState,
    pub sample: Option<Arc<SensorSample>>,
    pub rainfall: Option<Arc<RainfallStatus>>,
    pub water_quality: Option<Arc<WaterQualityStatus>>,
    /// Active alert records, kept even while the device is offline.
    pub active_alerts: Vec<Arc<AlertRecord>>,
}

impl DeviceView {
    pub fn is_offline(&self) -> bool {
        self.connectivity.is_offline
    }

    /// Alerts a consumer should show. An offline device shows none; its
    /// records come back as soon as it is online again.
    pub fn visible_alerts(&self) -> &[Arc<AlertRecord>] {
        if self.is_offline() {
            &[]
        } else {
            &self.active_alerts
        }
    }

    pub fn has_alert(&self, alert_type: AlertType) -> bool {
        self.visible_alerts()
            .iter()
            .any(|a| a.alert_type == alert_type)
    }

    /// Latest water level: the reported level, or the depth computed from
    /// a raw range reading when only that was sent.
    pub fn water_level(&self) -> Option<f64> {
        let sample = self.sample.as_ref()?;
        sample.water_level.or_else(|| {
            sample
                .distance
                .and_then(|d| self.device.thresholds.water_depth(d))
        })
    }

    /// Flood band for the latest water level, if there is one.
    pub fn flood_level(&self) -> Option<FloodLevel> {
        self.water_level()
            .map(|level| self.device.thresholds.classify(level))
    }
}

/// Aggregate counts across the listed devices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FleetSummary {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
    /// Visible active alerts (offline devices contribute zero).
    pub active_alerts: usize,
    pub alerts_by_type: BTreeMap<AlertType, usize>,
    pub flood_levels: BTreeMap<FloodLevel, usize>,
}

impl FleetSummary {
    pub fn from_views<'a>(views: impl IntoIterator<Item = &'a Arc<DeviceView>>) -> Self {
        let mut summary = Self::default();
        for view in views {
            summary.total += 1;
            if view.is_offline() {
                summary.offline += 1;
            } else {
                summary.online += 1;
            }
            for alert in view.visible_alerts() {
                summary.active_alerts += 1;
                *summary.alerts_by_type.entry(alert.alert_type).or_default() += 1;
            }
            if let Some(level) = view.flood_level() {
                *summary.flood_levels.entry(level).or_default() += 1;
            }
        }
        summary
    }
}
