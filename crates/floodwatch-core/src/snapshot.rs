// ── Snapshot loader ──
//
// Point-in-time fetch of the device list and the active alerts. Loading
// never touches the store: the engine applies a snapshot only after both
// requests have succeeded, so a failed load leaves cached state intact.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use floodwatch_api::ApiClient;

use crate::convert::{ListedDevice, alert_from_api};
use crate::error::CoreError;
use crate::model::AlertRecord;

/// Everything one load returned.
#[derive(Debug, Clone)]
pub struct DeviceSnapshot {
    pub devices: Vec<ListedDevice>,
    /// Active alert rows as listed; duplicates are resolved on apply.
    pub alerts: Vec<AlertRecord>,
    pub fetched_at: DateTime<Utc>,
}

/// Fetches snapshots over the REST endpoints. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SnapshotLoader {
    client: ApiClient,
}

impl SnapshotLoader {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Fetch the full device list.
    pub async fn load_devices(&self) -> Result<Vec<ListedDevice>, CoreError> {
        let rows = self.client.list_devices().await?;
        debug!(count = rows.len(), "devices loaded");
        Ok(rows.into_iter().map(ListedDevice::from).collect())
    }

    /// Fetch active alerts. Rows that cannot be read are skipped; rows the
    /// backend marks inactive despite the filter are dropped.
    pub async fn load_active_alerts(&self) -> Result<Vec<AlertRecord>, CoreError> {
        let fetched_at = Utc::now();
        let rows = self.client.list_alerts(true).await?;
        let total = rows.len();

        let alerts: Vec<AlertRecord> = rows
            .into_iter()
            .filter_map(|row| match alert_from_api(row, fetched_at) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "skipping alert row");
                    None
                }
            })
            .filter(|record| record.is_active)
            .collect();

        debug!(count = alerts.len(), total, "active alerts loaded");
        Ok(alerts)
    }

    /// Fetch devices and alerts concurrently. Fails if either fails.
    pub async fn load(&self) -> Result<DeviceSnapshot, CoreError> {
        let (devices, alerts) = tokio::try_join!(self.load_devices(), self.load_active_alerts())?;
        Ok(DeviceSnapshot {
            devices,
            alerts,
            fetched_at: Utc::now(),
        })
    }
}
