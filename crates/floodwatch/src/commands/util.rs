//! Shared helpers for command handlers.

use floodwatch_core::{DeviceFilter, DeviceId};

use crate::cli::{DeviceFilterArgs, StatusArg};

/// Combine the selection flags into one filter. No flags selects all.
pub fn device_filter(args: &DeviceFilterArgs) -> DeviceFilter {
    let mut parts = Vec::new();
    if !args.ids.is_empty() {
        parts.push(DeviceFilter::ids(args.ids.iter().map(DeviceId::new)));
    }
    match args.status {
        Some(StatusArg::Online) => parts.push(DeviceFilter::Online),
        Some(StatusArg::Offline) => parts.push(DeviceFilter::Offline),
        None => {}
    }
    if args.alerting {
        parts.push(DeviceFilter::Alerting);
    }
    if let Some(alert_type) = args.alert_type {
        parts.push(DeviceFilter::WithAlert(alert_type));
    }
    if let Some(level) = args.min_level {
        parts.push(DeviceFilter::AtLeast(level));
    }

    match parts.len() {
        0 => DeviceFilter::All,
        1 => parts.remove(0),
        _ => DeviceFilter::Custom(Box::new(move |view| parts.iter().all(|f| f.matches(view)))),
    }
}

/// `-` for a missing value, otherwise one decimal place.
pub fn fmt_measure(value: Option<f64>) -> String {
    value.map_or_else(|| "-".into(), |v| format!("{v:.1}"))
}

/// Local-time rendering for timestamps, `-` when absent.
pub fn fmt_time(at: Option<chrono::DateTime<chrono::Utc>>) -> String {
    at.map_or_else(
        || "-".into(),
        |t| {
            t.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        },
    )
}
