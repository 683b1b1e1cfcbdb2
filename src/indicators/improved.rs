use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tracing::info;

use super::{baseline_ooi_ref, unexposed_patients};
use crate::config::PropertyIds;
use crate::model::{
    kpi, EntityProperty, IndicatorOutput, IndicatorReport, IndicatorValue, KpiCategory, KpiMetric,
    Scan, SkipReason,
};
use crate::ooi::OoiRef;
use crate::process::{progress, Indicator, Services, WorldStateContext};

/// Health loss beyond which a patient counts as seriously deteriorated.
const DETERIORATION_MARGIN: f64 = 50.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HealthDelta {
    pub improved: u64,
    pub deteriorated: u64,
    /// Non-excluded records at the current world-state.
    pub total: u64,
}

/// Compares patient life between the baseline and the current world-state.
///
/// Patients without a readable baseline value are skipped.
pub fn compare_health(
    baseline: &[EntityProperty],
    current: &[EntityProperty],
    excluded: &HashSet<u64>,
) -> Scan<HealthDelta> {
    let mut scan = Scan::new(HealthDelta::default());

    let mut before = HashMap::new();
    for ep in baseline {
        if excluded.contains(&ep.entity_id) {
            continue;
        }
        match ep.numeric_value() {
            Ok(life) => {
                before.insert(ep.entity_id, life);
            }
            Err(reason) => scan.skip(ep.entity_id, reason),
        }
    }

    for ep in current {
        if excluded.contains(&ep.entity_id) {
            continue;
        }
        scan.value.total += 1;
        let life = match ep.numeric_value() {
            Ok(life) => life,
            Err(reason) => {
                scan.skip(ep.entity_id, reason);
                continue;
            }
        };
        let Some(&base) = before.get(&ep.entity_id) else {
            scan.skip(ep.entity_id, SkipReason::NotInBaseline);
            continue;
        };
        if life >= base {
            scan.value.improved += 1;
        }
        if life < base - DETERIORATION_MARGIN {
            scan.value.deteriorated += 1;
        }
    }
    scan
}

struct Comparison {
    baseline: OoiRef,
    delta: Scan<HealthDelta>,
}

async fn compare_with_baseline(
    ctx: &WorldStateContext,
    services: &Services,
    exclude_unexposed: bool,
) -> Result<Comparison> {
    progress(20, "Start collecting input data");
    let current = ctx.ooi_ref()?;
    let baseline = baseline_ooi_ref(services, ctx.icmm.id).await?;
    progress(21, &format!("Base WorldState: {}", baseline));

    let excluded = if exclude_unexposed {
        unexposed_patients(services, &baseline).await?
    } else {
        HashSet::new()
    };

    let life = services.properties.patient_life;
    let before = services.ooi(&baseline).entity_properties(baseline.id, life).await?;
    let now = services.ooi(current).entity_properties(current.id, life).await?;

    progress(30, "Calculate indicator value");
    let delta = compare_health(&before, &now, &excluded);
    info!(
        improved = delta.value.improved,
        deteriorated = delta.value.deteriorated,
        total = delta.value.total,
        "Compared patient health with baseline"
    );
    Ok(Comparison { baseline, delta })
}

/// `Improved`: patients at least as healthy as at the beginning.
pub struct Improved;

#[async_trait]
impl Indicator for Improved {
    fn identifier(&self) -> &str {
        "Improved"
    }

    fn title(&self) -> &str {
        "Improved patients"
    }

    fn abstract_text(&self) -> &str {
        "Number of patients with actual health better or equal as at the beginning"
    }

    async fn calculate(&self, ctx: &WorldStateContext, services: &Services) -> Result<IndicatorReport> {
        let Comparison { baseline, delta } = compare_with_baseline(ctx, services, true).await?;
        let worldstates = vec![baseline.id, ctx.ooi_ref()?.id];
        let HealthDelta {
            improved,
            deteriorated,
            total,
        } = delta.value;

        let values = vec![
            IndicatorValue::number(
                self.identifier(),
                self.title(),
                self.abstract_text(),
                &ctx.description,
                worldstates.clone(),
                improved,
            )
            .with_total_count(total),
            IndicatorValue::number(
                "SeriouslyDeteriorated",
                "Seriously deteriorated patients",
                "Number of patients with (actual health) less than (health at the beginning - 50)",
                &ctx.description,
                worldstates,
                deteriorated,
            )
            .with_total_count(total),
        ];
        let kpi = kpi(
            "casualties",
            KpiCategory::new("Casualties")
                .with_metric(self.identifier(), KpiMetric::new(self.title(), improved, "People"))
                .with_metric(
                    "SeriouslyDeteriorated",
                    KpiMetric::new("Seriously deteriorated patients", deteriorated, "People"),
                ),
        );

        Ok(IndicatorReport {
            indicator: IndicatorOutput::Many(values),
            kpi: Some(kpi),
            skipped: delta.skipped,
        })
    }
}

/// `seriouslyDeterioratedIndicator`: deteriorated count over all patients.
pub struct SeriouslyDeteriorated;

#[async_trait]
impl Indicator for SeriouslyDeteriorated {
    fn identifier(&self) -> &str {
        "seriouslyDeterioratedIndicator"
    }

    fn title(&self) -> &str {
        "Seriously deteriorated patients"
    }

    fn abstract_text(&self) -> &str {
        "Number of patients with (actual health) less than (health at the beginning - 50)"
    }

    async fn calculate(&self, ctx: &WorldStateContext, services: &Services) -> Result<IndicatorReport> {
        let Comparison { baseline, delta } = compare_with_baseline(ctx, services, false).await?;
        let deteriorated = delta.value.deteriorated;

        let value = IndicatorValue::number(
            self.identifier(),
            self.title(),
            self.abstract_text(),
            &ctx.description,
            vec![baseline.id, ctx.ooi_ref()?.id],
            deteriorated,
        );
        let kpi = kpi(
            "casualties",
            KpiCategory::new("Casualties").with_metric(
                self.identifier(),
                KpiMetric::new(self.title(), deteriorated, "People"),
            ),
        );

        Ok(IndicatorReport {
            indicator: IndicatorOutput::Single(value),
            kpi: Some(kpi),
            skipped: delta.skipped,
        })
    }
}

/// `improvedIndicator`: improved count over all patients, mirrored into OOI.
pub struct LegacyImproved;

#[async_trait]
impl Indicator for LegacyImproved {
    fn identifier(&self) -> &str {
        "improvedIndicator"
    }

    fn title(&self) -> &str {
        "Improved patients"
    }

    fn abstract_text(&self) -> &str {
        "Number of patients with actual health better or equal as at the beginning"
    }

    fn mirror_property(&self, properties: &PropertyIds) -> Option<u64> {
        Some(properties.improved_indicator)
    }

    async fn calculate(&self, ctx: &WorldStateContext, services: &Services) -> Result<IndicatorReport> {
        let Comparison { baseline, delta } = compare_with_baseline(ctx, services, false).await?;

        let value = IndicatorValue::number(
            self.identifier(),
            "improved",
            "Number of patients with actual life status better or equal then base life status",
            &ctx.description,
            vec![baseline.id, ctx.ooi_ref()?.id],
            delta.value.improved,
        );
        Ok(IndicatorReport {
            indicator: IndicatorOutput::Single(value),
            kpi: None,
            skipped: delta.skipped,
        })
    }
}
