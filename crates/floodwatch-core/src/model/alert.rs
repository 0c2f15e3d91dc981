// ── Alerts and connectivity ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::device::DeviceId;

/// Kind of alert the backend can raise for a device.
///
/// At most one record per (device, type) is tracked.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum AlertType {
    #[strum(to_string = "flood", serialize = "flood-alert", serialize = "banjir")]
    Flood,
    #[strum(to_string = "rapid_rise", serialize = "rapid-rise", serialize = "rapid-rise-alert")]
    RapidRise,
    #[strum(
        to_string = "critical_water_quality",
        serialize = "critical-water-quality",
        serialize = "water_quality",
        serialize = "water-quality"
    )]
    CriticalWaterQuality,
}

impl AlertType {
    pub const ALL: [Self; 3] = [Self::Flood, Self::RapidRise, Self::CriticalWaterQuality];

    /// Severity assumed when the backend does not send one.
    pub fn default_severity(self) -> AlertSeverity {
        match self {
            Self::Flood | Self::CriticalWaterQuality => AlertSeverity::Critical,
            Self::RapidRise => AlertSeverity::Warning,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum AlertSeverity {
    #[strum(to_string = "info", serialize = "low", serialize = "normal")]
    Info,
    #[strum(
        to_string = "warning",
        serialize = "medium",
        serialize = "waspada",
        serialize = "siaga"
    )]
    Warning,
    #[strum(
        to_string = "critical",
        serialize = "high",
        serialize = "awas",
        serialize = "bahaya"
    )]
    Critical,
}

/// Current record for one (device, alert type) pair.
///
/// An inactive record is history: it stays so the UI can say "resolved at",
/// but it never counts as an alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// Backend id, when the alert came from the REST snapshot or the
    /// event carried one.
    pub id: Option<String>,
    pub device_id: DeviceId,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub is_active: bool,
    pub triggered_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl AlertRecord {
    /// Time of the last lifecycle transition.
    pub fn last_transition_at(&self) -> DateTime<Utc> {
        match self.resolved_at {
            Some(resolved) if !self.is_active => resolved.max(self.triggered_at),
            _ => self.triggered_at,
        }
    }
}

/// Online/offline state of a device, patched only by status events and
/// replaced by snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityState {
    pub is_offline: bool,
    pub last_seen_at: Option<DateTime<Utc>>,
}
