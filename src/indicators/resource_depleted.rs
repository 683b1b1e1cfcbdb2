use anyhow::Result;
use async_trait::async_trait;

use crate::model::{
    kpi, EntityProperty, IndicatorOutput, IndicatorReport, IndicatorValue, KpiCategory, KpiMetric,
    Scan,
};
use crate::process::{progress, Indicator, Services, WorldStateContext};

/// Vehicles at or below this response capacity are depleted.
pub const DEPLETED_THRESHOLD: f64 = 20.0;

/// Depleted vehicle count.
pub fn count_depleted(records: &[EntityProperty]) -> Scan<u64> {
    let mut scan = Scan::new(0);
    for ep in records {
        match ep.numeric_value() {
            Ok(capacity) if capacity <= DEPLETED_THRESHOLD => scan.value += 1,
            Ok(_) => {}
            Err(reason) => scan.skip(ep.entity_id, reason),
        }
    }
    scan
}

pub struct ResourceDepleted;

#[async_trait]
impl Indicator for ResourceDepleted {
    fn identifier(&self) -> &str {
        "ResourceDepleted"
    }

    fn title(&self) -> &str {
        "Number of depleted resources"
    }

    fn abstract_text(&self) -> &str {
        "Number of vehicles with response capacity 20% or lower"
    }

    async fn calculate(&self, ctx: &WorldStateContext, services: &Services) -> Result<IndicatorReport> {
        progress(20, "Start collecting input data");
        let ooi_ref = ctx.ooi_ref()?;
        let records = services
            .ooi(ooi_ref)
            .entity_properties(ooi_ref.id, services.properties.vehicle_capacity)
            .await?;

        progress(30, "Calculate indicator value");
        let depleted = count_depleted(&records);
        progress(40, &format!("Calculated ResourceDepleted: {}", depleted.value));

        let value = IndicatorValue::number(
            self.identifier(),
            self.title(),
            self.abstract_text(),
            &ctx.description,
            vec![ctx.icmm.id],
            depleted.value,
        )
        .with_total_count(records.len() as u64);
        let kpi = kpi(
            "resources",
            KpiCategory::new("Resources").with_metric(
                self.identifier(),
                KpiMetric::new(self.title(), depleted.value, "Vehicles"),
            ),
        );

        Ok(IndicatorReport {
            indicator: IndicatorOutput::Single(value),
            kpi: Some(kpi),
            skipped: depleted.skipped,
        })
    }
}
