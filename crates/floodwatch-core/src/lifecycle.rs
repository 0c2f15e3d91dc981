// ── Alert lifecycle ──
//
// Pure transition function for one (device, alert type) record. The store
// owns the records; this module only decides what the next record is.
//
//   INACTIVE --trigger--> ACTIVE
//   ACTIVE   --trigger--> ACTIVE     (message/severity/time replaced)
//   ACTIVE   --resolve--> INACTIVE   (explicit, is_active=false, or a
//                                     non-critical water quality update)
//
// Offline devices are not a transition: their records stay as they are and
// the read side hides them.

use chrono::{DateTime, Utc};

use crate::convert::default_message;
use crate::event::AlertSignal;
use crate::model::{AlertRecord, AlertType, WaterQualityCategory};

/// Something that may move an alert record.
#[derive(Debug, Clone, Copy)]
pub enum AlertInput<'a> {
    /// Trigger or same-type deactivation carried by an alert event.
    Signal(&'a AlertSignal),
    /// Explicit resolution.
    Resolve { at: DateTime<Utc> },
    /// A water quality update; only meaningful for
    /// [`AlertType::CriticalWaterQuality`].
    QualityUpdate {
        category: WaterQualityCategory,
        at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// A new active record replaced nothing or an inactive one.
    Activated,
    /// An already active record was re-triggered.
    Refreshed,
    Resolved,
    /// No change.
    Ignored,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub transition: Transition,
    /// Record to store, `None` for [`Transition::Ignored`].
    pub record: Option<AlertRecord>,
}

impl Step {
    fn ignored() -> Self {
        Self {
            transition: Transition::Ignored,
            record: None,
        }
    }
}

/// Compute the next record for `current` given `input`.
///
/// Only a [`AlertInput::Signal`] with `is_active = true` can create a
/// record; everything else acts on an existing active record or is ignored.
pub fn step(current: Option<&AlertRecord>, input: AlertInput<'_>) -> Step {
    let active = current.filter(|r| r.is_active);

    match input {
        AlertInput::Signal(signal) if signal.is_active => Step {
            transition: if active.is_some() {
                Transition::Refreshed
            } else {
                Transition::Activated
            },
            record: Some(triggered(active, signal)),
        },
        AlertInput::Signal(signal) => {
            active.map_or_else(Step::ignored, |record| resolved(record, signal.at))
        }
        AlertInput::Resolve { at } => {
            active.map_or_else(Step::ignored, |record| resolved(record, at))
        }
        AlertInput::QualityUpdate { category, at } => match active {
            Some(record)
                if record.alert_type == AlertType::CriticalWaterQuality
                    && !category.is_critical() =>
            {
                resolved(record, at)
            }
            _ => Step::ignored(),
        },
    }
}

fn triggered(active: Option<&AlertRecord>, signal: &AlertSignal) -> AlertRecord {
    let message = signal
        .message
        .clone()
        .or_else(|| active.map(|r| r.message.clone()))
        .unwrap_or_else(|| default_message(signal.alert_type));
    let severity = signal
        .severity
        .or_else(|| active.map(|r| r.severity))
        .unwrap_or_else(|| signal.alert_type.default_severity());

    AlertRecord {
        id: signal
            .id
            .clone()
            .or_else(|| active.and_then(|r| r.id.clone())),
        device_id: signal.device_id.clone(),
        alert_type: signal.alert_type,
        severity,
        message,
        is_active: true,
        triggered_at: signal.at,
        resolved_at: None,
    }
}

fn resolved(record: &AlertRecord, at: DateTime<Utc>) -> Step {
    Step {
        transition: Transition::Resolved,
        record: Some(AlertRecord {
            is_active: false,
            resolved_at: Some(at),
            ..record.clone()
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{AlertSeverity, DeviceId};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 14, 6, 0, 0).unwrap()
    }

    fn signal(alert_type: AlertType, is_active: bool, minutes: i64) -> AlertSignal {
        AlertSignal {
            device_id: DeviceId::from("AWLR-01"),
            alert_type,
            is_active,
            id: None,
            severity: None,
            message: Some(format!("reading at +{minutes}m")),
            at: t0() + Duration::minutes(minutes),
        }
    }

    /// Feed inputs through `step`, storing records the way the store does.
    fn run(inputs: &[AlertInput<'_>]) -> (Option<AlertRecord>, Vec<Transition>) {
        let mut current: Option<AlertRecord> = None;
        let mut transitions = Vec::new();
        for input in inputs {
            let next = step(current.as_ref(), *input);
            transitions.push(next.transition);
            if let Some(record) = next.record {
                current = Some(record);
            }
        }
        (current, transitions)
    }

    #[test]
    fn trigger_activates_with_defaults() {
        let mut s = signal(AlertType::Flood, true, 0);
        s.message = None;
        let next = step(None, AlertInput::Signal(&s));

        assert_eq!(next.transition, Transition::Activated);
        let record = next.record.unwrap();
        assert!(record.is_active);
        assert_eq!(record.severity, AlertSeverity::Critical);
        assert_eq!(record.triggered_at, t0());
        assert!(!record.message.is_empty());
    }

    #[test]
    fn retrigger_replaces_instead_of_adding() {
        let a = signal(AlertType::Flood, true, 0);
        let b = signal(AlertType::Flood, true, 5);
        let c = signal(AlertType::Flood, true, 10);
        let (record, transitions) = run(&[
            AlertInput::Signal(&a),
            AlertInput::Signal(&b),
            AlertInput::Signal(&c),
        ]);

        assert_eq!(
            transitions,
            vec![Transition::Activated, Transition::Refreshed, Transition::Refreshed]
        );
        let record = record.unwrap();
        assert!(record.is_active);
        assert_eq!(record.message, "reading at +10m");
        assert_eq!(record.triggered_at, t0() + Duration::minutes(10));
    }

    #[test]
    fn any_interleaving_keeps_one_record_per_key() {
        // Single slot per key: whatever the sequence, the result is one
        // record whose activity matches the last effective input.
        let on = signal(AlertType::RapidRise, true, 1);
        let off = signal(AlertType::RapidRise, false, 2);
        let sequences: Vec<Vec<AlertInput<'_>>> = vec![
            vec![AlertInput::Signal(&on), AlertInput::Signal(&on)],
            vec![AlertInput::Signal(&on), AlertInput::Signal(&off), AlertInput::Signal(&on)],
            vec![AlertInput::Signal(&off), AlertInput::Signal(&on), AlertInput::Resolve { at: t0() }],
            vec![AlertInput::Resolve { at: t0() }, AlertInput::Resolve { at: t0() }],
        ];
        let expected_active = [Some(true), Some(true), Some(false), None];

        for (inputs, expected) in sequences.iter().zip(expected_active) {
            let (record, _) = run(inputs);
            assert_eq!(record.map(|r| r.is_active), expected, "inputs: {inputs:?}");
        }
    }

    #[test]
    fn explicit_inactive_flag_resolves() {
        let on = signal(AlertType::Flood, true, 0);
        let off = signal(AlertType::Flood, false, 3);
        let (record, transitions) = run(&[AlertInput::Signal(&on), AlertInput::Signal(&off)]);

        assert_eq!(transitions[1], Transition::Resolved);
        let record = record.unwrap();
        assert!(!record.is_active);
        assert_eq!(record.resolved_at, Some(t0() + Duration::minutes(3)));
        // The history keeps the trigger's message.
        assert_eq!(record.message, "reading at +0m");
    }

    #[test]
    fn deactivation_without_active_record_creates_nothing() {
        let off = signal(AlertType::Flood, false, 0);
        let next = step(None, AlertInput::Signal(&off));
        assert_eq!(next, Step::ignored());
    }

    #[test]
    fn good_water_quality_clears_critical_alert_implicitly() {
        let on = signal(AlertType::CriticalWaterQuality, true, 0);
        let (record, transitions) = run(&[
            AlertInput::Signal(&on),
            AlertInput::QualityUpdate {
                category: WaterQualityCategory::Baik,
                at: t0() + Duration::minutes(20),
            },
        ]);

        assert_eq!(transitions[1], Transition::Resolved);
        let record = record.unwrap();
        assert!(!record.is_active);
        assert_eq!(record.resolved_at, Some(t0() + Duration::minutes(20)));
    }

    #[test]
    fn poor_water_quality_keeps_critical_alert() {
        let on = signal(AlertType::CriticalWaterQuality, true, 0);
        let (record, transitions) = run(&[
            AlertInput::Signal(&on),
            AlertInput::QualityUpdate {
                category: WaterQualityCategory::Buruk,
                at: t0(),
            },
            AlertInput::QualityUpdate {
                category: WaterQualityCategory::SangatBuruk,
                at: t0(),
            },
        ]);
        assert_eq!(&transitions[1..], &[Transition::Ignored, Transition::Ignored]);
        assert!(record.unwrap().is_active);
    }

    #[test]
    fn water_quality_update_never_touches_other_types() {
        let on = signal(AlertType::Flood, true, 0);
        let (record, _) = run(&[
            AlertInput::Signal(&on),
            AlertInput::QualityUpdate {
                category: WaterQualityCategory::Baik,
                at: t0(),
            },
        ]);
        assert!(record.unwrap().is_active);
    }

    #[test]
    fn retrigger_after_resolve_starts_fresh() {
        let on = signal(AlertType::Flood, true, 0);
        let again = signal(AlertType::Flood, true, 30);
        let (record, transitions) = run(&[
            AlertInput::Signal(&on),
            AlertInput::Resolve { at: t0() + Duration::minutes(10) },
            AlertInput::Signal(&again),
        ]);

        assert_eq!(transitions[2], Transition::Activated);
        let record = record.unwrap();
        assert!(record.is_active);
        assert_eq!(record.resolved_at, None);
    }
}
