// ── Domain model ──
//
// Canonical types for sensor stations, their readings and their alerts.
// Wire shapes live in `floodwatch-api`; `crate::convert` maps them here.

pub mod alert;
pub mod device;
pub mod reading;
pub mod view;

pub use alert::{AlertRecord, AlertSeverity, AlertType, ConnectivityState};
pub use device::{Device, DeviceId, DeviceThresholds, FloodLevel};
pub use reading::{
    RainfallCategory, RainfallStatus, SensorSample, WaterQualityCategory, WaterQualityStatus,
};
pub use view::{DeviceView, FleetSummary};
