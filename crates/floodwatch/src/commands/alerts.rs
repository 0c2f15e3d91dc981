//! Alert command handlers.

use std::sync::Arc;

use tabled::Tabled;

use floodwatch_core::{AlertRecord, DeviceId, SyncEngine};

use crate::cli::{AlertsArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct AlertRow {
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Type")]
    alert_type: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Since")]
    since: String,
}

impl AlertRow {
    fn new(a: &Arc<AlertRecord>, color: bool) -> Self {
        Self {
            device: a.device_id.to_string(),
            alert_type: a.alert_type.to_string(),
            severity: output::severity_label(a.severity, color),
            message: a.message.clone(),
            since: util::fmt_time(Some(a.triggered_at)),
        }
    }
}

/// Active alerts across the listed devices. Offline devices contribute
/// nothing unless `--include-offline` is given.
pub fn list(engine: &SyncEngine, args: &AlertsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let device = args.device.as_deref().map(DeviceId::new);
    let views = engine.store().views();

    let mut alerts: Vec<Arc<AlertRecord>> = views
        .iter()
        .filter(|v| device.as_ref().is_none_or(|id| v.device.id == *id))
        .flat_map(|v| {
            if args.include_offline {
                v.active_alerts.as_slice()
            } else {
                v.visible_alerts()
            }
        })
        .filter(|a| args.alert_type.is_none_or(|t| a.alert_type == t))
        .cloned()
        .collect();
    alerts.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));

    let color = output::should_color(&global.color);
    let out = output::render_list(
        &global.output,
        &alerts,
        |a| AlertRow::new(a, color),
        |a| format!("{}:{}", a.device_id, a.alert_type),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
