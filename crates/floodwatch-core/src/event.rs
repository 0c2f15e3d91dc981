// ── Channel event decoding ──
//
// Turns raw `ChannelEvent`s into typed `DeviceEvent`s. Decoding is the only
// place a payload can be rejected; once decoded, applying an event cannot
// fail. Field aliases follow the backend's mixed snake/camel spellings.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use floodwatch_api::{ApiDevice, ChannelEvent};

use crate::convert::{
    ListedDevice, coerce_bool, field, field_bool, field_f64, field_string, field_timestamp,
};
use crate::error::EventError;
use crate::model::{
    AlertSeverity, AlertType, DeviceId, RainfallCategory, RainfallStatus, SensorSample,
    WaterQualityCategory, WaterQualityStatus,
};

/// Event names the backend pushes on the channel.
pub mod names {
    pub const SENSOR_DATA: &str = "new-sensor-data";
    pub const RAINFALL_UPDATE: &str = "rainfall-update";
    pub const WATER_QUALITY_UPDATE: &str = "water-quality-update";
    pub const FLOOD_ALERT: &str = "flood-alert";
    pub const RAPID_RISE_ALERT: &str = "rapid-rise-alert";
    pub const CRITICAL_WATER_QUALITY_ALERT: &str = "critical-water-quality-alert";
    /// Generic trigger carrying its type in the payload.
    pub const ALERT_TRIGGERED: &str = "alert-triggered";
    pub const ALERT_RESOLVED: &str = "alert-resolved";
    pub const DEVICE_STATUS_UPDATE: &str = "device-status-update";
    pub const DEVICE_UPDATED: &str = "device-updated";

    pub const ALL: [&str; 10] = [
        SENSOR_DATA,
        RAINFALL_UPDATE,
        WATER_QUALITY_UPDATE,
        FLOOD_ALERT,
        RAPID_RISE_ALERT,
        CRITICAL_WATER_QUALITY_ALERT,
        ALERT_TRIGGERED,
        ALERT_RESOLVED,
        DEVICE_STATUS_UPDATE,
        DEVICE_UPDATED,
    ];
}

const DEVICE_ID: &[&str] = &["device_id", "deviceId"];
const DEVICE_ID_OR_ID: &[&str] = &["device_id", "deviceId", "id"];
const ALERT_TYPE: &[&str] = &["alert_type", "alertType", "type"];

// ── Typed events ────────────────────────────────────────────────────

/// A trigger or same-type deactivation for one (device, type) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertSignal {
    pub device_id: DeviceId,
    pub alert_type: AlertType,
    pub is_active: bool,
    pub id: Option<String>,
    pub severity: Option<AlertSeverity>,
    pub message: Option<String>,
    pub at: DateTime<Utc>,
}

/// An explicit resolution. Names the alert by type, by backend id, or both.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertResolution {
    pub device_id: DeviceId,
    pub alert_type: Option<AlertType>,
    pub alert_id: Option<String>,
    pub at: DateTime<Utc>,
}

/// Partial connectivity update; `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusPatch {
    pub device_id: DeviceId,
    pub is_offline: Option<bool>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub name: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    Sample(SensorSample),
    Rainfall(RainfallStatus),
    WaterQuality(WaterQualityStatus),
    Alert(AlertSignal),
    AlertResolved(AlertResolution),
    Status(StatusPatch),
    DeviceUpdated(ListedDevice),
}

impl DeviceEvent {
    /// Decode a channel event. Unknown names and malformed payloads are
    /// errors; callers log and drop them.
    pub fn decode(event: &ChannelEvent) -> Result<Self, EventError> {
        let name = event.name.as_str();
        let received_at = event.received_at;

        if name == names::DEVICE_UPDATED {
            return decode_device(name, &event.data).map(Self::DeviceUpdated);
        }

        let obj = event.data.as_object().ok_or_else(|| EventError::NotAnObject {
            event: name.to_owned(),
        })?;
        let decoder = Decoder { name, obj };

        match name {
            names::SENSOR_DATA => decoder.sample(received_at).map(Self::Sample),
            names::RAINFALL_UPDATE => decoder.rainfall(received_at).map(Self::Rainfall),
            names::WATER_QUALITY_UPDATE => {
                decoder.water_quality(received_at).map(Self::WaterQuality)
            }
            names::FLOOD_ALERT => decoder.alert(Some(AlertType::Flood), received_at),
            names::RAPID_RISE_ALERT => decoder.alert(Some(AlertType::RapidRise), received_at),
            names::CRITICAL_WATER_QUALITY_ALERT => {
                decoder.alert(Some(AlertType::CriticalWaterQuality), received_at)
            }
            names::ALERT_TRIGGERED => decoder.alert(None, received_at),
            names::ALERT_RESOLVED => decoder.resolution(received_at).map(Self::AlertResolved),
            names::DEVICE_STATUS_UPDATE => decoder.status().map(Self::Status),
            other => Err(EventError::UnknownEvent(other.to_owned())),
        }
    }

    pub fn device_id(&self) -> &DeviceId {
        match self {
            Self::Sample(s) => &s.device_id,
            Self::Rainfall(r) => &r.device_id,
            Self::WaterQuality(w) => &w.device_id,
            Self::Alert(a) => &a.device_id,
            Self::AlertResolved(r) => &r.device_id,
            Self::Status(p) => &p.device_id,
            Self::DeviceUpdated(d) => &d.device.id,
        }
    }
}

// ── Decoder ─────────────────────────────────────────────────────────

struct Decoder<'a> {
    name: &'a str,
    obj: &'a Map<String, Value>,
}

impl Decoder<'_> {
    fn device_id(&self, names: &[&str]) -> Result<DeviceId, EventError> {
        field_string(self.obj, names)
            .map(DeviceId::from)
            .ok_or_else(|| self.missing("device_id"))
    }

    fn missing(&self, field: &'static str) -> EventError {
        EventError::MissingField {
            event: self.name.to_owned(),
            field,
        }
    }

    fn invalid(&self, field: &'static str, reason: String) -> EventError {
        EventError::InvalidField {
            event: self.name.to_owned(),
            field,
            reason,
        }
    }

    /// Parse an enum label if present. A present but unreadable label is
    /// treated as absent so derivation can still apply.
    fn label<T: FromStr>(&self, names: &[&str]) -> Option<T> {
        field_string(self.obj, names).and_then(|s| s.parse().ok())
    }

    fn sample(&self, received_at: DateTime<Utc>) -> Result<SensorSample, EventError> {
        let device_id = self.device_id(DEVICE_ID)?;
        let timestamp = field_timestamp(
            self.obj,
            &["timestamp", "recorded_at", "recordedAt", "created_at", "time"],
        )
        .unwrap_or(received_at);

        let mut sample = SensorSample::new(device_id, timestamp);
        sample.water_level = field_f64(self.obj, &["water_level", "waterLevel", "level"]);
        sample.distance = field_f64(self.obj, &["distance", "jarak"]);
        sample.temperature = field_f64(self.obj, &["temperature", "temp", "suhu"]);
        sample.ph = field_f64(self.obj, &["ph", "pH"]);
        sample.turbidity = field_f64(self.obj, &["turbidity", "kekeruhan"]);
        sample.tds = field_f64(self.obj, &["tds", "TDS"]);
        sample.rainfall = field_f64(
            self.obj,
            &["rainfall", "rainfall_intensity", "rain_intensity", "curah_hujan"],
        );
        sample.rainfall_category = self.label(&["rainfall_category", "rainfallCategory"]);
        sample.water_quality_category =
            self.label(&["water_quality_category", "waterQualityCategory", "quality_category"]);
        Ok(sample)
    }

    fn rainfall(&self, received_at: DateTime<Utc>) -> Result<RainfallStatus, EventError> {
        let device_id = self.device_id(DEVICE_ID)?;
        let intensity = field_f64(
            self.obj,
            &["intensity", "intensity_mm_per_hour", "rainfall", "value"],
        );
        let raw_value = field_f64(self.obj, &["raw_value", "rawValue", "raw"]).or(intensity);
        let category = self
            .label(&["category", "rainfall_category", "status"])
            .or_else(|| intensity.map(RainfallCategory::from_intensity))
            .ok_or_else(|| self.missing("category"))?;

        Ok(RainfallStatus {
            device_id,
            category,
            intensity_mm_per_hour: intensity,
            raw_value,
            observed_at: field_timestamp(self.obj, &["timestamp", "updated_at", "time"])
                .unwrap_or(received_at),
        })
    }

    fn water_quality(&self, received_at: DateTime<Utc>) -> Result<WaterQualityStatus, EventError> {
        let device_id = self.device_id(DEVICE_ID)?;
        let ph = field_f64(self.obj, &["ph", "pH"]);
        let turbidity = field_f64(self.obj, &["turbidity", "kekeruhan"]);
        let tds = field_f64(self.obj, &["tds", "TDS"]);
        let category = self
            .label(&["category", "water_quality_category", "quality", "status"])
            .or_else(|| WaterQualityCategory::assess(ph, turbidity, tds))
            .ok_or_else(|| self.missing("category"))?;

        Ok(WaterQualityStatus {
            device_id,
            category,
            ph,
            turbidity,
            tds,
            temperature: field_f64(self.obj, &["temperature", "temp", "suhu"]),
            observed_at: field_timestamp(self.obj, &["timestamp", "updated_at", "time"])
                .unwrap_or(received_at),
        })
    }

    fn alert_type(&self) -> Result<Option<AlertType>, EventError> {
        match field_string(self.obj, ALERT_TYPE) {
            None => Ok(None),
            Some(raw) => AlertType::from_str(&raw)
                .map(Some)
                .map_err(|_| self.invalid("alert_type", format!("unknown alert type `{raw}`"))),
        }
    }

    fn alert(
        &self,
        fixed: Option<AlertType>,
        received_at: DateTime<Utc>,
    ) -> Result<DeviceEvent, EventError> {
        let device_id = self.device_id(DEVICE_ID)?;
        let alert_type = match fixed {
            Some(t) => t,
            None => self.alert_type()?.ok_or_else(|| self.missing("alert_type"))?,
        };

        // A present but unreadable flag must not silently become a trigger.
        let is_active = match field(self.obj, &["is_active", "isActive", "active"]) {
            None => true,
            Some(raw) => coerce_bool(raw)
                .ok_or_else(|| self.invalid("is_active", format!("not a boolean: {raw}")))?,
        };

        Ok(DeviceEvent::Alert(AlertSignal {
            device_id,
            alert_type,
            is_active,
            id: field_string(self.obj, &["id", "alert_id", "alertId"]),
            severity: self.label(&["severity", "level"]),
            message: field_string(self.obj, &["message", "msg", "description"]),
            at: field_timestamp(
                self.obj,
                &["triggered_at", "triggeredAt", "timestamp", "created_at"],
            )
            .unwrap_or(received_at),
        }))
    }

    fn resolution(&self, received_at: DateTime<Utc>) -> Result<AlertResolution, EventError> {
        let device_id = self.device_id(DEVICE_ID)?;
        let alert_type = self.alert_type()?;
        let alert_id = field_string(self.obj, &["alert_id", "alertId", "id"]);
        if alert_type.is_none() && alert_id.is_none() {
            return Err(self.missing("alert_type"));
        }

        Ok(AlertResolution {
            device_id,
            alert_type,
            alert_id,
            at: field_timestamp(self.obj, &["resolved_at", "resolvedAt", "timestamp"])
                .unwrap_or(received_at),
        })
    }

    fn status(&self) -> Result<StatusPatch, EventError> {
        let device_id = self.device_id(DEVICE_ID_OR_ID)?;
        let is_offline = field_bool(self.obj, &["is_offline", "isOffline"]).or_else(|| {
            field_string(self.obj, &["status"]).and_then(|s| {
                match s.to_ascii_lowercase().as_str() {
                    "offline" => Some(true),
                    "online" => Some(false),
                    _ => None,
                }
            })
        });

        Ok(StatusPatch {
            device_id,
            is_offline,
            last_seen_at: field_timestamp(self.obj, &["last_seen_at", "lastSeenAt", "last_seen"]),
            name: field_string(self.obj, &["name", "device_name"]),
            location: field_string(self.obj, &["location"]),
        })
    }
}

fn decode_device(name: &str, data: &Value) -> Result<ListedDevice, EventError> {
    if !data.is_object() {
        return Err(EventError::NotAnObject {
            event: name.to_owned(),
        });
    }
    let api: ApiDevice =
        serde_json::from_value(data.clone()).map_err(|e| EventError::InvalidField {
            event: name.to_owned(),
            field: "device",
            reason: e.to_string(),
        })?;
    Ok(ListedDevice::from(api))
}
