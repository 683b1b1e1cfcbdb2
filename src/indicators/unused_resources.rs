use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::PropertyIds;
use crate::model::{
    kpi, parse_number, EntityProperty, IndicatorOutput, IndicatorReport, IndicatorValue,
    KpiCategory, KpiMetric, SkipReason, SkippedRecord, Scan,
};
use crate::process::{progress, Indicator, Services, WorldStateContext};

const IDLE: &str = "idle";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceState {
    Unavailable,
    Unused,
    Used,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub unavailable: u64,
    pub unused: u64,
    pub used: u64,
}

/// Usage of every vehicle seen along a lineage.
#[derive(Debug, Default)]
pub struct ResourceLedger {
    resources: BTreeMap<u64, ResourceState>,
    scan: Scan<()>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds all records of one world-state, oldest world-state first.
    pub fn observe(&mut self, records: &[EntityProperty], properties: &PropertyIds) {
        let scan = &mut self.scan;
        for ep in records {
            if ep.entity_type_property_id == properties.vehicle_availability {
                if self.resources.contains_key(&ep.entity_id) {
                    continue;
                }
                let raw = match ep.required_value() {
                    Ok(raw) => raw,
                    Err(reason) => {
                        scan.skip(ep.entity_id, reason);
                        continue;
                    }
                };
                match parse_number(raw) {
                    Some(v) if v == -1.0 => {
                        self.resources.insert(ep.entity_id, ResourceState::Unavailable);
                    }
                    Some(_) => {
                        self.resources.insert(ep.entity_id, ResourceState::Unused);
                    }
                    None => scan.skip(ep.entity_id, SkipReason::NotNumeric(raw.to_string())),
                }
            } else if ep.entity_type_property_id == properties.vehicle_display_state {
                let state = match ep.raw_value() {
                    Ok(state) => state.unwrap_or_default(),
                    Err(reason) => {
                        scan.skip(ep.entity_id, reason);
                        continue;
                    }
                };
                debug!(entity_id = ep.entity_id, state, "Resource display state");
                if !state.is_empty() && !state.eq_ignore_ascii_case(IDLE) {
                    self.resources.insert(ep.entity_id, ResourceState::Used);
                }
            }
        }
    }

    pub fn state(&self, vehicle: u64) -> Option<ResourceState> {
        self.resources.get(&vehicle).copied()
    }

    pub fn counts(&self) -> ResourceCounts {
        let mut counts = ResourceCounts::default();
        for state in self.resources.values() {
            match state {
                ResourceState::Unavailable => counts.unavailable += 1,
                ResourceState::Unused => counts.unused += 1,
                ResourceState::Used => counts.used += 1,
            }
        }
        counts
    }

    pub fn into_skipped(self) -> Vec<SkippedRecord> {
        self.scan.skipped
    }
}

/// `UnusedResources`: available vehicles that were never put to work.
pub struct UnusedResources;

#[async_trait]
impl Indicator for UnusedResources {
    fn identifier(&self) -> &str {
        "UnusedResources"
    }

    fn title(&self) -> &str {
        "Number of resources not used"
    }

    fn abstract_text(&self) -> &str {
        "Number of available resources that was not uned yet"
    }

    async fn calculate(&self, ctx: &WorldStateContext, services: &Services) -> Result<IndicatorReport> {
        progress(20, "Start collecting input data");
        let parents = services.icmm.lineage(ctx.icmm.id).await?;

        let mut ledger = ResourceLedger::new();
        for &worldstate in &parents {
            let ooi_ref = services.ooi_ref_of(worldstate).await?;
            let records = services.ooi(&ooi_ref).all_entity_properties(ooi_ref.id).await?;
            ledger.observe(&records, &services.properties);
            info!(worldstate, resources = ledger.resources.len(), "Resources so far");
        }

        progress(30, "Calculate indicator value");
        let counts = ledger.counts();
        progress(
            40,
            &format!(
                "Calculated 'UnusedResources' indicator: Unavailable: {}, Unused: {}, Used: {}",
                counts.unavailable, counts.unused, counts.used
            ),
        );

        let value = IndicatorValue::number(
            self.identifier(),
            self.title(),
            self.abstract_text(),
            &ctx.description,
            parents,
            counts.unused,
        )
        .with_total_count(counts.unused + counts.used);
        let kpi = kpi(
            "Resources",
            KpiCategory::new(self.title()).with_metric(
                self.identifier(),
                KpiMetric::new(self.title(), counts.unused, "Resources"),
            ),
        );

        Ok(IndicatorReport {
            indicator: IndicatorOutput::Many(vec![value]),
            kpi: Some(kpi),
            skipped: ledger.into_skipped(),
        })
    }
}
