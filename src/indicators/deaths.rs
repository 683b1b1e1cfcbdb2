use anyhow::Result;
use async_trait::async_trait;

use crate::config::PropertyIds;
use crate::model::{
    kpi, EntityProperty, IndicatorOutput, IndicatorReport, IndicatorValue, KpiCategory, KpiMetric,
    Scan,
};
use crate::process::{progress, Indicator, Services, WorldStateContext};

/// Patients with life below this value count as dead.
pub const DEATH_THRESHOLD: f64 = 20.0;

/// Number of records whose numeric value is below [`DEATH_THRESHOLD`].
pub fn count_deaths(records: &[EntityProperty]) -> Scan<u64> {
    let mut scan = Scan::new(0);
    for ep in records {
        match ep.numeric_value() {
            Ok(life) if life < DEATH_THRESHOLD => scan.value += 1,
            Ok(_) => {}
            Err(reason) => scan.skip(ep.entity_id, reason),
        }
    }
    scan
}

async fn fetch_deaths(ctx: &WorldStateContext, services: &Services) -> Result<Scan<u64>> {
    progress(20, "Start collecting input data");
    let ooi_ref = ctx.ooi_ref()?;
    let records = services
        .ooi(ooi_ref)
        .entity_properties(ooi_ref.id, services.properties.patient_life)
        .await?;
    progress(30, "Calculate indicator value");
    let deaths = count_deaths(&records);
    progress(40, &format!("Calculated Deaths: {}", deaths.value));
    Ok(deaths)
}

/// `Deaths`: number of fatalities.
pub struct Deaths;

#[async_trait]
impl Indicator for Deaths {
    fn identifier(&self) -> &str {
        "Deaths"
    }

    fn title(&self) -> &str {
        "Number of fatalities"
    }

    fn abstract_text(&self) -> &str {
        "Number of patients with health less than 20."
    }

    async fn calculate(&self, ctx: &WorldStateContext, services: &Services) -> Result<IndicatorReport> {
        let deaths = fetch_deaths(ctx, services).await?;

        let value = IndicatorValue::number(
            self.identifier(),
            self.title(),
            "Number of patients with health less than 20.",
            &ctx.description,
            vec![ctx.icmm.id],
            deaths.value,
        );
        let kpi = kpi(
            "casualties",
            KpiCategory::new("Casualties").with_metric(
                self.identifier(),
                KpiMetric::new(self.title(), deaths.value, "People"),
            ),
        );

        Ok(IndicatorReport {
            indicator: IndicatorOutput::Single(value),
            kpi: Some(kpi),
            skipped: deaths.skipped,
        })
    }
}

/// `deathsIndicator`: the fatality count mirrored into an OOI property.
pub struct LegacyDeaths;

#[async_trait]
impl Indicator for LegacyDeaths {
    fn identifier(&self) -> &str {
        "deathsIndicator"
    }

    fn title(&self) -> &str {
        "Number of fatalities"
    }

    fn abstract_text(&self) -> &str {
        "Number of patients with health less than 20"
    }

    fn mirror_property(&self, properties: &PropertyIds) -> Option<u64> {
        Some(properties.deaths_indicator)
    }

    async fn calculate(&self, ctx: &WorldStateContext, services: &Services) -> Result<IndicatorReport> {
        let deaths = fetch_deaths(ctx, services).await?;
        let ooi_id = ctx.ooi_ref()?.id;

        let value = IndicatorValue::number(
            self.identifier(),
            "Deaths",
            "Number of patients with life status less then 20",
            &ctx.description,
            vec![ooi_id],
            deaths.value,
        );
        Ok(IndicatorReport {
            indicator: IndicatorOutput::Single(value),
            kpi: None,
            skipped: deaths.skipped,
        })
    }
}
