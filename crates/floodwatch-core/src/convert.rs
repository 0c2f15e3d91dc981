// ── Wire-to-domain conversions ──
//
// The backend is loose about types: numbers arrive as strings, booleans as
// 0/1, timestamps as RFC 3339, naive "YYYY-MM-DD HH:MM:SS" or epoch values.
// Everything here coerces leniently. A value that cannot be read is treated
// as absent, never as an error.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use floodwatch_api::{ApiAlert, ApiDevice};

use crate::error::EventError;
use crate::model::{
    AlertRecord, AlertType, ConnectivityState, Device, DeviceId, DeviceThresholds,
};

// ── Scalar coercion ────────────────────────────────────────────────

/// Read a finite number from a JSON number or numeric string.
pub fn coerce_f64(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Read a boolean from `true`/`false`, `0`/`1`, or their string forms.
pub fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Read a non-empty string, accepting numbers as their decimal form.
pub fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a timestamp. Naive forms are taken as UTC; bare numbers are epoch
/// seconds, or epoch milliseconds when too large to be seconds.
pub fn coerce_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => n.as_f64().and_then(epoch_to_datetime),
        _ => None,
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    raw.parse::<f64>().ok().and_then(epoch_to_datetime)
}

#[allow(clippy::cast_possible_truncation)]
fn epoch_to_datetime(epoch: f64) -> Option<DateTime<Utc>> {
    if !epoch.is_finite() || epoch < 0.0 {
        return None;
    }
    // Anything past year 5138 in seconds is really milliseconds.
    let millis = if epoch > 1e11 { epoch } else { epoch * 1000.0 };
    DateTime::from_timestamp_millis(millis as i64)
}

// ── Field lookup ───────────────────────────────────────────────────

/// First non-null value among `names`.
pub(crate) fn field<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| obj.get(*name))
        .find(|v| !v.is_null())
}

pub(crate) fn field_f64(obj: &Map<String, Value>, names: &[&str]) -> Option<f64> {
    field(obj, names).and_then(coerce_f64)
}

pub(crate) fn field_string(obj: &Map<String, Value>, names: &[&str]) -> Option<String> {
    field(obj, names).and_then(coerce_string)
}

pub(crate) fn field_timestamp(obj: &Map<String, Value>, names: &[&str]) -> Option<DateTime<Utc>> {
    field(obj, names).and_then(coerce_timestamp)
}

pub(crate) fn field_bool(obj: &Map<String, Value>, names: &[&str]) -> Option<bool> {
    field(obj, names).and_then(coerce_bool)
}

fn opt_f64(value: Option<&Value>) -> Option<f64> {
    value.and_then(coerce_f64)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

// ── Devices ────────────────────────────────────────────────────────

/// A listed device split into its record and its connectivity.
#[derive(Debug, Clone, PartialEq)]
pub struct ListedDevice {
    pub device: Device,
    /// `None` when the row said nothing about connectivity.
    pub connectivity: Option<ConnectivityState>,
}

impl From<ApiDevice> for ListedDevice {
    fn from(api: ApiDevice) -> Self {
        let id = DeviceId::from(api.id);
        let thresholds = DeviceThresholds {
            sensor_height_cm: opt_f64(api.sensor_height.as_ref()),
            waspada_cm: opt_f64(api.threshold_waspada.as_ref()),
            siaga_cm: opt_f64(api.threshold_siaga.as_ref()),
            awas_cm: opt_f64(api.threshold_awas.as_ref()),
            rapid_rise_cm_per_min: opt_f64(api.rapid_rise_threshold.as_ref()),
        };

        let is_offline = api.is_offline.as_ref().and_then(coerce_bool);
        let last_seen_at = api.last_seen_at.as_ref().and_then(coerce_timestamp);
        let connectivity = (is_offline.is_some() || last_seen_at.is_some()).then(|| {
            ConnectivityState {
                is_offline: is_offline.unwrap_or(false),
                last_seen_at,
            }
        });

        let device = Device {
            name: non_empty(api.name).unwrap_or_else(|| id.to_string()),
            location: non_empty(api.location),
            thresholds,
            updated_at: api.updated_at.as_ref().and_then(coerce_timestamp),
            extra: api.extra,
            id,
        };

        Self {
            device,
            connectivity,
        }
    }
}

// ── Alerts ─────────────────────────────────────────────────────────

/// Convert an alert row. Rows with an unknown alert type are rejected;
/// a missing trigger time falls back to `fetched_at`.
pub fn alert_from_api(api: ApiAlert, fetched_at: DateTime<Utc>) -> Result<AlertRecord, EventError> {
    let alert_type =
        AlertType::from_str(api.alert_type.trim()).map_err(|_| EventError::InvalidField {
            event: "alert row".into(),
            field: "alert_type",
            reason: format!("unknown alert type `{}`", api.alert_type),
        })?;

    let severity = api
        .severity
        .as_deref()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or_else(|| alert_type.default_severity());
    let is_active = api.is_active.as_ref().and_then(coerce_bool).unwrap_or(true);
    let resolved_at = api.resolved_at.as_ref().and_then(coerce_timestamp);

    Ok(AlertRecord {
        id: non_empty(api.id),
        device_id: DeviceId::from(api.device_id),
        severity,
        message: non_empty(api.message).unwrap_or_else(|| default_message(alert_type)),
        is_active,
        triggered_at: api
            .triggered_at
            .as_ref()
            .and_then(coerce_timestamp)
            .unwrap_or(fetched_at),
        resolved_at: if is_active { None } else { resolved_at },
        alert_type,
    })
}

pub(crate) fn default_message(alert_type: AlertType) -> String {
    match alert_type {
        AlertType::Flood => "Flood level exceeded".into(),
        AlertType::RapidRise => "Water level rising rapidly".into(),
        AlertType::CriticalWaterQuality => "Critical water quality".into(),
    }
}
