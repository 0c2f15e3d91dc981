//! Live mode: attach to the event stream and print a line per change.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Local;
use owo_colors::OwoColorize;
use tracing::{debug, info, warn};

use floodwatch_core::{DeviceId, DeviceView, FleetSummary, StreamHealth, SyncEngine};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::util;

/// One-line rendering of a device's state, without a timestamp. Two views
/// with the same line are treated as unchanged.
fn state_line(v: &DeviceView, color: bool) -> String {
    let mut line = format!(
        "{} {}",
        v.device.id,
        output::status_label(v.is_offline(), color)
    );
    if let Some(level) = v.water_level() {
        line.push_str(&format!(
            " level={level:.1}cm [{}]",
            output::level_label(v.flood_level(), color)
        ));
    }
    if let Some(ref rain) = v.rainfall {
        line.push_str(&format!(" rain={}", rain.category));
    }
    if let Some(ref quality) = v.water_quality {
        line.push_str(&format!(" quality={}", quality.category));
    }
    let alerts: Vec<String> = v
        .visible_alerts()
        .iter()
        .map(|a| format!("{}({})", a.alert_type, output::severity_label(a.severity, color)))
        .collect();
    if !alerts.is_empty() {
        line.push_str(&format!(" alerts={}", alerts.join(",")));
    }
    line
}

fn summary_line(s: &FleetSummary) -> String {
    format!(
        "devices={} online={} offline={} alerts={}",
        s.total, s.online, s.offline, s.active_alerts
    )
}

fn health_line(health: &StreamHealth, color: bool) -> String {
    let text = match health {
        StreamHealth::Pending => "stream: connecting".to_string(),
        StreamHealth::Live => "stream: live".to_string(),
        StreamHealth::Interrupted => "stream: interrupted, reconnecting".to_string(),
        StreamHealth::Degraded { message, fatal } => {
            if *fatal {
                format!("stream: failed ({message})")
            } else {
                format!("stream: degraded ({message})")
            }
        }
    };
    if color && !health.is_live() {
        text.yellow().to_string()
    } else {
        text
    }
}

/// Lines for every device whose rendering changed since `seen`, plus
/// removals. Updates `seen` in place.
fn diff_lines(
    views: &[Arc<DeviceView>],
    seen: &mut HashMap<DeviceId, String>,
    color: bool,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut present = HashMap::with_capacity(views.len());
    for view in views {
        let line = state_line(view, color);
        if seen.get(&view.device.id) != Some(&line) {
            lines.push(line.clone());
        }
        present.insert(view.device.id.clone(), line);
    }
    let mut removed: Vec<&DeviceId> = seen.keys().filter(|id| !present.contains_key(*id)).collect();
    removed.sort();
    lines.extend(removed.into_iter().map(|id| format!("{id} removed")));
    *seen = present;
    lines
}

fn stamp(line: &str) -> String {
    format!("{} {line}", Local::now().format("%H:%M:%S"))
}

pub async fn handle(
    engine: &SyncEngine,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let structured = matches!(
        global.output,
        OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Yaml
    );

    let mut stream = engine.subscribe(util::device_filter(&args.filter));
    let mut health = engine.store().health();

    engine.attach().await?;
    info!(devices = engine.store().device_count(), "watching");

    let mut seen: HashMap<DeviceId, String> = HashMap::new();
    emit(engine, &stream.latest(), &mut seen, &args, global, structured, color)?;

    loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupted");
                break;
            }
            changed = health.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = health.borrow_and_update().clone();
                if !global.quiet {
                    eprintln!("{}", stamp(&health_line(&current, color)));
                }
                if matches!(current, StreamHealth::Degraded { fatal: true, .. }) {
                    warn!("event stream gave up; showing last known state");
                }
            }
            snapshot = stream.changed() => {
                let Some(views) = snapshot else { break };
                emit(engine, &views, &mut seen, &args, global, structured, color)?;
            }
        }
    }

    engine.detach().await;
    Ok(())
}

fn emit(
    engine: &SyncEngine,
    views: &[Arc<DeviceView>],
    seen: &mut HashMap<DeviceId, String>,
    args: &WatchArgs,
    global: &GlobalOpts,
    structured: bool,
    color: bool,
) -> Result<(), CliError> {
    if structured {
        // JSON lines: one compact document per changed device.
        let before = seen.clone();
        diff_lines(views, seen, false);
        for view in views {
            if before.get(&view.device.id) != seen.get(&view.device.id) {
                let out = output::render_single(
                    &OutputFormat::JsonCompact,
                    view,
                    |_| String::new(),
                    |_| String::new(),
                )?;
                output::print_output(&out, global.quiet);
            }
        }
        return Ok(());
    }

    for line in diff_lines(views, seen, color) {
        output::print_output(&stamp(&line), global.quiet);
    }
    if args.summary {
        output::print_output(
            &stamp(&summary_line(&engine.store().summary())),
            global.quiet,
        );
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use floodwatch_core::{ConnectivityState, Device};

    use super::*;

    fn view(id: &str, offline: bool) -> Arc<DeviceView> {
        Arc::new(DeviceView {
            device: Arc::new(Device::bare(id)),
            connectivity: ConnectivityState {
                is_offline: offline,
                last_seen_at: None,
            },
            sample: None,
            rainfall: None,
            water_quality: None,
            active_alerts: Vec::new(),
        })
    }

    #[test]
    fn only_changed_devices_are_printed() {
        let mut seen = HashMap::new();
        let first = diff_lines(&[view("a", false), view("b", false)], &mut seen, false);
        assert_eq!(first, vec!["a online", "b online"]);

        let second = diff_lines(&[view("a", false), view("b", true)], &mut seen, false);
        assert_eq!(second, vec!["b offline"]);
    }

    #[test]
    fn removed_devices_are_reported() {
        let mut seen = HashMap::new();
        diff_lines(&[view("a", false), view("b", false)], &mut seen, false);
        let lines = diff_lines(&[view("b", false)], &mut seen, false);
        assert_eq!(lines, vec!["a removed"]);
    }

    #[test]
    fn degraded_health_names_the_cause() {
        let line = health_line(
            &StreamHealth::Degraded {
                message: "connection refused".into(),
                fatal: false,
            },
            false,
        );
        assert_eq!(line, "stream: degraded (connection refused)");
    }
}
