// ── Filter predicates for device views ──
//
// Narrow a subscription to the devices a consumer cares about without
// touching the store.

use std::collections::BTreeSet;

use crate::model::{AlertType, DeviceId, DeviceView, FloodLevel};

/// Which devices a subscriber wants to see.
pub enum DeviceFilter {
    All,
    /// An explicit set of device ids.
    Ids(BTreeSet<DeviceId>),
    Online,
    Offline,
    /// Devices with at least one visible active alert.
    Alerting,
    /// Devices with a visible active alert of this type.
    WithAlert(AlertType),
    /// Devices whose latest water level is at or above this band.
    AtLeast(FloodLevel),
    Custom(Box<dyn Fn(&DeviceView) -> bool + Send + Sync>),
}

impl DeviceFilter {
    pub fn ids<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<DeviceId>,
    {
        Self::Ids(ids.into_iter().map(Into::into).collect())
    }

    pub fn matches(&self, view: &DeviceView) -> bool {
        match self {
            Self::All => true,
            Self::Ids(ids) => ids.contains(&view.device.id),
            Self::Online => !view.is_offline(),
            Self::Offline => view.is_offline(),
            Self::Alerting => !view.visible_alerts().is_empty(),
            Self::WithAlert(t) => view.has_alert(*t),
            Self::AtLeast(level) => view.flood_level().is_some_and(|l| l >= *level),
            Self::Custom(f) => f(view),
        }
    }
}

impl std::fmt::Debug for DeviceFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::Ids(ids) => f.debug_tuple("Ids").field(ids).finish(),
            Self::Online => f.write_str("Online"),
            Self::Offline => f.write_str("Offline"),
            Self::Alerting => f.write_str("Alerting"),
            Self::WithAlert(t) => f.debug_tuple("WithAlert").field(t).finish(),
            Self::AtLeast(l) => f.debug_tuple("AtLeast").field(l).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
