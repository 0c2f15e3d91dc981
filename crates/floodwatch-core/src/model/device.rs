// ── Device identity and configuration ──

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── DeviceId ────────────────────────────────────────────────────────

/// Backend identifier of a sensor station (e.g. `"AWLR-01"`).
///
/// Numeric ids from the wire are normalized to their decimal string form,
/// so `42` and `"42"` name the same device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

// ── Thresholds ──────────────────────────────────────────────────────

/// Per-device configuration that drives classification.
///
/// All levels are in centimetres of water. A missing level simply means
/// that band is never reached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceThresholds {
    /// Mounting height of the level sensor above the channel bed.
    pub sensor_height_cm: Option<f64>,
    pub waspada_cm: Option<f64>,
    pub siaga_cm: Option<f64>,
    pub awas_cm: Option<f64>,
    /// Rise rate (cm/min) above which the backend raises a rapid-rise alert.
    pub rapid_rise_cm_per_min: Option<f64>,
}

/// Flood warning band, ordered from calm to most severe.
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
#[strum(ascii_case_insensitive)]
pub enum FloodLevel {
    Normal,
    Waspada,
    Siaga,
    Awas,
}

impl DeviceThresholds {
    /// Water depth for an ultrasonic range reading: sensor height minus the
    /// measured distance to the surface, floored at zero.
    pub fn water_depth(&self, distance_cm: f64) -> Option<f64> {
        self.sensor_height_cm.map(|h| (h - distance_cm).max(0.0))
    }

    /// Classify a water level against the configured bands.
    pub fn classify(&self, water_level_cm: f64) -> FloodLevel {
        let reached = |limit: Option<f64>| limit.is_some_and(|l| water_level_cm >= l);
        if reached(self.awas_cm) {
            FloodLevel::Awas
        } else if reached(self.siaga_cm) {
            FloodLevel::Siaga
        } else if reached(self.waspada_cm) {
            FloodLevel::Waspada
        } else {
            FloodLevel::Normal
        }
    }
}

// ── Device ──────────────────────────────────────────────────────────

/// A sensor station as listed by the backend.
///
/// Connectivity lives in [`ConnectivityState`](super::ConnectivityState),
/// not here: metadata updates replace this record wholesale while
/// connectivity is only ever patched by status events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub location: Option<String>,
    pub thresholds: DeviceThresholds,
    /// When the backend last changed this record, if it says.
    pub updated_at: Option<DateTime<Utc>>,
    /// Remaining backend fields, untouched.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Device {
    /// Minimal record for a device known only by id.
    pub fn bare(id: impl Into<DeviceId>) -> Self {
        let id = id.into();
        Self {
            name: id.to_string(),
            id,
            location: None,
            thresholds: DeviceThresholds::default(),
            updated_at: None,
            extra: serde_json::Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_walks_bands_upward() {
        let t = DeviceThresholds {
            waspada_cm: Some(100.0),
            siaga_cm: Some(150.0),
            awas_cm: Some(200.0),
            ..DeviceThresholds::default()
        };
        assert_eq!(t.classify(40.0), FloodLevel::Normal);
        assert_eq!(t.classify(100.0), FloodLevel::Waspada);
        assert_eq!(t.classify(199.9), FloodLevel::Siaga);
        assert_eq!(t.classify(250.0), FloodLevel::Awas);
    }

    #[test]
    fn missing_bands_are_never_reached() {
        let t = DeviceThresholds {
            awas_cm: Some(200.0),
            ..DeviceThresholds::default()
        };
        assert_eq!(t.classify(180.0), FloodLevel::Normal);
        assert_eq!(t.classify(200.0), FloodLevel::Awas);
    }

    #[test]
    fn depth_needs_sensor_height() {
        let mut t = DeviceThresholds::default();
        assert_eq!(t.water_depth(80.0), None);
        t.sensor_height_cm = Some(300.0);
        assert_eq!(t.water_depth(80.0), Some(220.0));
        assert_eq!(t.water_depth(320.0), Some(0.0));
    }

    #[test]
    fn device_id_trims_whitespace() {
        assert_eq!(DeviceId::from("  AWLR-01 "), DeviceId::from("AWLR-01"));
    }
}
