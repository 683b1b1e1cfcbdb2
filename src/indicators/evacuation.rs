//! Evacuation timeline over the ancestors of a world-state.
//!
//! The walk goes from the baseline to the current world-state. The first
//! world-state in which a vehicle carries an `evacuate` command starts the
//! evacuation; the first one (from there on) in which every patient is
//! `evacuated` ends it.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::config::PropertyIds;
use crate::model::{
    kpi, parse_number, EntityProperty, IndicatorData, IndicatorOutput, IndicatorReport,
    IndicatorValue, Kpi, KpiCategory, KpiMetric, Scan, SkipReason, SkippedRecord, TimeInterval,
    TimeIntervals, WorldStateDescription,
};
use crate::process::{progress, Indicator, Services, WorldStateContext};

const EVACUATE: &str = "evacuate";
const EVACUATED: &str = "evacuated";
const COMMAND_TYPE: &str = "Command-Type";
const UNAVAILABLE: f64 = -1.0;

/// Vehicles whose availability is `-1` in `records`.
pub fn unavailable_vehicles(records: &[EntityProperty], availability: u64) -> Scan<HashSet<u64>> {
    let mut scan = Scan::new(HashSet::new());
    for ep in records.iter().filter(|ep| ep.entity_type_property_id == availability) {
        let raw = match ep.required_value() {
            Ok(raw) => raw,
            Err(reason) => {
                scan.skip(ep.entity_id, reason);
                continue;
            }
        };
        match parse_number(raw) {
            Some(v) if v == UNAVAILABLE => {
                scan.value.insert(ep.entity_id);
            }
            Some(_) => {}
            None => scan.skip(ep.entity_id, SkipReason::NotNumeric(raw.to_string())),
        }
    }
    scan
}

fn is_evacuate_command(raw: &str) -> Result<bool, SkipReason> {
    let command: Value =
        serde_json::from_str(raw).map_err(|_| SkipReason::BadCommand(raw.to_string()))?;
    match command.get(COMMAND_TYPE) {
        None => Ok(false),
        Some(Value::String(kind)) => Ok(kind.eq_ignore_ascii_case(EVACUATE)),
        Some(_) => Err(SkipReason::BadCommand(raw.to_string())),
    }
}

/// Finds the lineage steps at which the evacuation started and completed.
#[derive(Debug, Default)]
pub struct EvacuationTracker {
    started: Option<usize>,
    completed: Option<usize>,
    scan: Scan<()>,
}

impl EvacuationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds all records of the world-state at lineage position `step`.
    pub fn observe(&mut self, step: usize, records: &[EntityProperty], properties: &PropertyIds) {
        if self.is_complete() {
            return;
        }
        let unavailable = unavailable_vehicles(records, properties.vehicle_availability);
        self.scan.skipped.extend(unavailable.skipped);
        let excluded = unavailable.value;
        debug!(step, unavailable = excluded.len(), "Excluding unavailable vehicles");

        if self.started.is_none() && self.evacuation_ordered(records, properties, &excluded) {
            info!(step, "Evacuation started");
            self.started = Some(step);
        }
        if self.started.is_some() && self.all_evacuated(records, properties, &excluded) {
            info!(step, "Evacuation completed");
            self.completed = Some(step);
        }
    }

    fn evacuation_ordered(
        &mut self,
        records: &[EntityProperty],
        properties: &PropertyIds,
        excluded: &HashSet<u64>,
    ) -> bool {
        let commands = records.iter().filter(|ep| {
            ep.entity_type_property_id == properties.vehicle_resource_command
                && !excluded.contains(&ep.entity_id)
        });
        for ep in commands {
            let raw = match ep.raw_value() {
                Ok(Some(raw)) if !raw.is_empty() => raw,
                Ok(_) => continue,
                Err(reason) => {
                    self.scan.skip(ep.entity_id, reason);
                    continue;
                }
            };
            match is_evacuate_command(raw) {
                Ok(true) => return true,
                Ok(false) => {}
                Err(reason) => self.scan.skip(ep.entity_id, reason),
            }
        }
        false
    }

    fn all_evacuated(
        &mut self,
        records: &[EntityProperty],
        properties: &PropertyIds,
        excluded: &HashSet<u64>,
    ) -> bool {
        let mut remaining = 0;
        let states = records.iter().filter(|ep| {
            ep.entity_type_property_id == properties.patient_treatment_state
                && !excluded.contains(&ep.entity_id)
        });
        for ep in states {
            match ep.text_value() {
                Ok(Some(state)) if state.eq_ignore_ascii_case(EVACUATED) => {}
                Ok(_) => remaining += 1,
                Err(reason) => self.scan.skip(ep.entity_id, reason),
            }
        }
        debug!(remaining, "Patients still to evacuate");
        remaining == 0
    }

    pub fn started(&self) -> Option<usize> {
        self.started
    }

    pub fn completed(&self) -> Option<usize> {
        self.completed
    }

    pub fn is_complete(&self) -> bool {
        self.completed.is_some()
    }

    pub fn into_skipped(self) -> Vec<SkippedRecord> {
        self.scan.skipped
    }
}

/// Minutes from `from` to `to`.
pub fn minutes_between(from: &DateTime<FixedOffset>, to: &DateTime<FixedOffset>) -> f64 {
    (*to - *from).num_milliseconds() as f64 / 60_000.0
}

/// Simulated times of the evacuation timeline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EvacuationTimes {
    /// Start of the exercise (baseline).
    pub exercise_start: DateTime<FixedOffset>,
    pub ordered: Option<DateTime<FixedOffset>>,
    pub completed: Option<DateTime<FixedOffset>>,
    /// Current world-state.
    pub now: DateTime<FixedOffset>,
}

/// Indicator values and, once completed, the `delay` KPI.
pub fn evacuation_indicators(
    times: &EvacuationTimes,
    description: &WorldStateDescription,
    parents: &[u64],
) -> (Vec<IndicatorValue>, Option<Kpi>) {
    let number = |id: &str, name: &str, desc: &str, minutes: f64| {
        IndicatorValue::number(id, name, desc, description, parents.to_vec(), minutes)
    };

    let mut values = Vec::new();
    let mut intervals = Vec::new();
    let mut delay = None;

    if let Some(ordered) = times.ordered {
        values.push(number(
            "TimeToEvacuation",
            "Time to Evacuation",
            "Minutes from start till evacuation is ordered",
            minutes_between(&times.exercise_start, &ordered),
        ));
        let end = times.completed.unwrap_or(times.now);
        intervals.push(TimeInterval {
            start_time: ordered.to_rfc3339(),
            end_time: end.to_rfc3339(),
        });
        if let Some(completed) = times.completed {
            let minutes = minutes_between(&times.exercise_start, &completed);
            values.push(number(
                "LastPatientEvacuated",
                "Last Patient Evacuated",
                "Minutes from start till last patient is evacuated",
                minutes,
            ));
            delay = Some(kpi(
                "delay",
                KpiCategory::new("Evacuation completed").with_metric(
                    "Evacuation",
                    KpiMetric::new("Evacuation time", minutes, "Minutes"),
                ),
            ));
        }
    }

    values.insert(
        0,
        IndicatorValue {
            id: "Evacuation".to_string(),
            name: "Evacuation time".to_string(),
            description: "Evacuation start and end".to_string(),
            worldstate_description: description.clone(),
            worldstates: parents.to_vec(),
            data: IndicatorData::TimeIntervals(TimeIntervals {
                intervals,
                color: "#00cc00".to_string(),
                linewidth: 2,
            }),
            total_count: None,
        },
    );
    (values, delay)
}

/// `Evacuation`: when the evacuation was ordered and when it completed.
pub struct Evacuation;

#[async_trait]
impl Indicator for Evacuation {
    fn identifier(&self) -> &str {
        "Evacuation"
    }

    fn title(&self) -> &str {
        "Evacuation time"
    }

    fn abstract_text(&self) -> &str {
        "Evacuation start and end"
    }

    async fn calculate(&self, ctx: &WorldStateContext, services: &Services) -> Result<IndicatorReport> {
        progress(20, "Start collecting input data");
        let parents = services.icmm.lineage(ctx.icmm.id).await?;
        let exercise_start = match parents.first() {
            Some(&base) => services.icmm.simulated_time(base).await?,
            None => services.icmm.simulated_time(ctx.icmm.id).await?,
        };
        let now = services.icmm.simulated_time(ctx.icmm.id).await?;

        let mut tracker = EvacuationTracker::new();
        for (step, &worldstate) in parents.iter().enumerate() {
            let ooi_ref = services.ooi_ref_of(worldstate).await?;
            let records = services.ooi(&ooi_ref).all_entity_properties(ooi_ref.id).await?;
            tracker.observe(step, &records, &services.properties);
            if tracker.is_complete() {
                break;
            }
        }

        progress(30, "Calculate indicator value");
        let time_at = |step: Option<usize>| step.and_then(|s| parents.get(s).copied());
        let ordered = match time_at(tracker.started()) {
            Some(ws) => Some(services.icmm.simulated_time(ws).await?),
            None => None,
        };
        let completed = match time_at(tracker.completed()) {
            Some(ws) => Some(services.icmm.simulated_time(ws).await?),
            None => None,
        };
        let times = EvacuationTimes {
            exercise_start,
            ordered,
            completed,
            now,
        };
        progress(
            40,
            &format!(
                "Calculated 'Evacuation' indicator: start exercise {}, start evacuation {}, end evacuation {}, now {}",
                exercise_start.to_rfc3339(),
                ordered.map(|t| t.to_rfc3339()).unwrap_or_else(|| "not yet".into()),
                completed.map(|t| t.to_rfc3339()).unwrap_or_else(|| "not yet".into()),
                now.to_rfc3339()
            ),
        );

        let (values, kpi) = evacuation_indicators(&times, &ctx.description, &parents);
        Ok(IndicatorReport {
            indicator: IndicatorOutput::Many(values),
            kpi,
            skipped: tracker.into_skipped(),
        })
    }
}
