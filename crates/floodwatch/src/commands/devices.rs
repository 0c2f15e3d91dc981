//! Device command handlers.

use std::sync::Arc;

use tabled::Tabled;

use floodwatch_core::{DeviceId, DeviceView, FleetSummary, SyncEngine};

use crate::cli::{DevicesArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Location")]
    location: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Last Seen")]
    last_seen: String,
    #[tabled(rename = "Alerts")]
    alerts: String,
}

impl DeviceRow {
    fn new(v: &Arc<DeviceView>, color: bool) -> Self {
        let alerts: Vec<String> = v
            .visible_alerts()
            .iter()
            .map(|a| a.alert_type.to_string())
            .collect();
        Self {
            id: v.device.id.to_string(),
            name: v.device.name.clone(),
            location: v.device.location.clone().unwrap_or_default(),
            status: output::status_label(v.is_offline(), color),
            last_seen: util::fmt_time(v.connectivity.last_seen_at),
            alerts: if alerts.is_empty() {
                "-".into()
            } else {
                alerts.join(", ")
            },
        }
    }
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Count")]
    count: usize,
}

fn summary_rows(s: &FleetSummary) -> Vec<SummaryRow> {
    let mut rows = vec![
        SummaryRow {
            metric: "devices".into(),
            count: s.total,
        },
        SummaryRow {
            metric: "online".into(),
            count: s.online,
        },
        SummaryRow {
            metric: "offline".into(),
            count: s.offline,
        },
        SummaryRow {
            metric: "active alerts".into(),
            count: s.active_alerts,
        },
    ];
    rows.extend(s.alerts_by_type.iter().map(|(t, n)| SummaryRow {
        metric: format!("  {t}"),
        count: *n,
    }));
    rows
}

// ── Detail ──────────────────────────────────────────────────────────

fn detail(v: &Arc<DeviceView>, color: bool) -> String {
    let mut lines = vec![
        format!("ID:        {}", v.device.id),
        format!("Name:      {}", v.device.name),
        format!(
            "Location:  {}",
            v.device.location.as_deref().unwrap_or("-")
        ),
        format!("Status:    {}", output::status_label(v.is_offline(), color)),
        format!("Last seen: {}", util::fmt_time(v.connectivity.last_seen_at)),
    ];

    if let Some(ref sample) = v.sample {
        lines.push(format!("Sampled:   {}", util::fmt_time(Some(sample.timestamp))));
        lines.push(format!("Level:     {} cm", util::fmt_measure(v.water_level())));
        lines.push(format!(
            "Band:      {}",
            output::level_label(v.flood_level(), color)
        ));
        lines.push(format!("Temp:      {}", util::fmt_measure(sample.temperature)));
    }
    if let Some(ref rain) = v.rainfall {
        lines.push(format!(
            "Rainfall:  {} ({} mm/h)",
            rain.category,
            util::fmt_measure(rain.intensity_mm_per_hour)
        ));
    }
    if let Some(ref quality) = v.water_quality {
        lines.push(format!(
            "Quality:   {} (pH {}, {} NTU, {} ppm)",
            quality.category,
            util::fmt_measure(quality.ph),
            util::fmt_measure(quality.turbidity),
            util::fmt_measure(quality.tds)
        ));
    }

    if v.active_alerts.is_empty() {
        lines.push("Alerts:    none".into());
    } else {
        lines.push("Alerts:".into());
        for alert in &v.active_alerts {
            lines.push(format!(
                "  {} [{}] {} (since {})",
                alert.alert_type,
                output::severity_label(alert.severity, color),
                alert.message,
                util::fmt_time(Some(alert.triggered_at))
            ));
        }
        if v.is_offline() {
            lines.push("  (hidden while the device is offline)".into());
        }
    }
    lines.join("\n")
}

// ── Handlers ────────────────────────────────────────────────────────

pub fn list(engine: &SyncEngine, args: &DevicesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let filter = util::device_filter(&args.filter);
    let views: Vec<Arc<DeviceView>> = engine
        .store()
        .views()
        .iter()
        .filter(|v| filter.matches(v))
        .cloned()
        .collect();

    let color = output::should_color(&global.color);
    let out = output::render_list(
        &global.output,
        &views,
        |v| DeviceRow::new(v, color),
        |v| v.device.id.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub fn show(engine: &SyncEngine, id: &str, global: &GlobalOpts) -> Result<(), CliError> {
    let view = engine
        .store()
        .view(&DeviceId::new(id))
        .ok_or_else(|| CliError::NotFound {
            resource_type: "device".into(),
            identifier: id.into(),
            list_command: "devices".into(),
        })?;

    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &view,
        |v| detail(v, color),
        |v| v.device.id.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub fn summary(engine: &SyncEngine, global: &GlobalOpts) -> Result<(), CliError> {
    let summary = engine.store().summary();
    let out = output::render_single(
        &global.output,
        &summary,
        |s| output::render_table(&summary_rows(s)),
        |s| format!("{} {} {} {}", s.total, s.online, s.offline, s.active_alerts),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
