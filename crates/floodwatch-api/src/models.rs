// Wire models for the snapshot endpoints.
//
// These mirror the backend's JSON loosely: numeric, boolean and timestamp
// fields are kept as raw `serde_json::Value` so that `floodwatch-core` can
// coerce them leniently (a string "12.5" is a number, "n/a" is absent, an
// epoch number is a timestamp). Only a missing id rejects a row. Field aliases
// cover both the snake_case and camelCase spellings the backend emits.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Deserialize an identifier that may arrive as a string or a number.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) if !s.trim().is_empty() => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a non-empty string or number identifier, got {other}"
        ))),
    }
}

/// A device row from `GET /devices`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiDevice {
    #[serde(alias = "device_id", alias = "deviceId", deserialize_with = "string_or_number")]
    pub id: String,

    #[serde(default, alias = "device_name", deserialize_with = "optional_string_or_number")]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub location: Option<String>,

    #[serde(default, alias = "isOffline")]
    pub is_offline: Option<Value>,

    #[serde(default, alias = "lastSeenAt", alias = "last_seen")]
    pub last_seen_at: Option<Value>,

    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<Value>,

    /// Mounting height of the ultrasonic sensor above the channel bed (cm).
    #[serde(default, alias = "sensorHeight", alias = "height")]
    pub sensor_height: Option<Value>,

    #[serde(default, alias = "thresholdWaspada", alias = "waspada_threshold")]
    pub threshold_waspada: Option<Value>,

    #[serde(default, alias = "thresholdSiaga", alias = "siaga_threshold")]
    pub threshold_siaga: Option<Value>,

    #[serde(default, alias = "thresholdAwas", alias = "awas_threshold")]
    pub threshold_awas: Option<Value>,

    #[serde(default, alias = "rapidRiseThreshold")]
    pub rapid_rise_threshold: Option<Value>,

    /// Everything else the backend sends, kept for display.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// An alert row from `GET /alerts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiAlert {
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub id: Option<String>,

    #[serde(alias = "deviceId", deserialize_with = "string_or_number")]
    pub device_id: String,

    #[serde(alias = "alertType", alias = "type")]
    pub alert_type: String,

    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub severity: Option<String>,

    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub message: Option<String>,

    #[serde(default, alias = "isActive")]
    pub is_active: Option<Value>,

    #[serde(default, alias = "triggeredAt", alias = "created_at")]
    pub triggered_at: Option<Value>,

    #[serde(default, alias = "resolvedAt")]
    pub resolved_at: Option<Value>,
}

/// Like [`string_or_number`], but anything unreadable is `None`.
fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// List endpoints answer with either a bare array or `{ "data": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ListEnvelope {
    Bare(Vec<Value>),
    Wrapped { data: Vec<Value> },
}

impl ListEnvelope {
    pub(crate) fn into_rows(self) -> Vec<Value> {
        match self {
            Self::Bare(rows) | Self::Wrapped { data: rows } => rows,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn device_accepts_numeric_id_and_camel_case() {
        let device: ApiDevice = serde_json::from_value(json!({
            "deviceId": 42,
            "name": "Pos Kali Ciliwung",
            "isOffline": "false",
            "lastSeenAt": "2026-01-05T10:00:00Z",
            "firmware": "1.4.2"
        }))
        .unwrap();

        assert_eq!(device.id, "42");
        assert_eq!(device.name.as_deref(), Some("Pos Kali Ciliwung"));
        assert_eq!(device.is_offline, Some(json!("false")));
        assert_eq!(device.extra["firmware"], "1.4.2");
    }

    #[test]
    fn epoch_timestamps_and_odd_types_do_not_reject_the_row() {
        let device: ApiDevice = serde_json::from_value(json!({
            "id": "A",
            "name": ["not", "a", "name"],
            "last_seen_at": 1_767_225_600,
            "updated_at": 1_767_225_600_000_i64
        }))
        .unwrap();
        assert_eq!(device.id, "A");
        assert_eq!(device.name, None);
        assert_eq!(device.last_seen_at, Some(json!(1_767_225_600)));

        let alert: ApiAlert = serde_json::from_value(json!({
            "device_id": "A",
            "alert_type": "flood",
            "severity": { "level": 3 },
            "triggered_at": 1_767_225_600
        }))
        .unwrap();
        assert_eq!(alert.severity, None);
        assert_eq!(alert.triggered_at, Some(json!(1_767_225_600)));
    }

    #[test]
    fn device_without_id_is_rejected() {
        let result = serde_json::from_value::<ApiDevice>(json!({ "name": "orphan" }));
        assert!(result.is_err());
    }

    #[test]
    fn alert_accepts_type_alias() {
        let alert: ApiAlert = serde_json::from_value(json!({
            "id": 7,
            "device_id": "dev-1",
            "type": "flood",
            "is_active": true,
            "triggered_at": "2026-01-05T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(alert.id.as_deref(), Some("7"));
        assert_eq!(alert.alert_type, "flood");
        assert_eq!(alert.is_active, Some(json!(true)));
    }

    #[test]
    fn envelope_accepts_bare_and_wrapped() {
        let bare: ListEnvelope = serde_json::from_value(json!([{ "a": 1 }])).unwrap();
        assert_eq!(bare.into_rows().len(), 1);

        let wrapped: ListEnvelope =
            serde_json::from_value(json!({ "data": [{ "a": 1 }, { "b": 2 }] })).unwrap();
        assert_eq!(wrapped.into_rows().len(), 2);
    }
}
