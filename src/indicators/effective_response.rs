use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;

use super::unexposed_patients;
use crate::model::{
    kpi, EntityProperty, IndicatorOutput, IndicatorReport, IndicatorValue, KpiCategory, KpiMetric,
    Scan,
};
use crate::process::{progress, Indicator, Services, WorldStateContext};

/// Treatment state of a patient nobody has attended to yet.
const UNTREATED: &str = "None";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResponseTally {
    /// Records whose treatment state is still untreated.
    pub matched: u64,
    /// Every record of a non-excluded patient, readable or not.
    pub total: u64,
}

/// Tallies treatment-state records, ignoring `excluded` patients.
pub fn tally_treatment(records: &[EntityProperty], excluded: &HashSet<u64>) -> Scan<ResponseTally> {
    let mut scan = Scan::new(ResponseTally::default());
    for ep in records {
        if excluded.contains(&ep.entity_id) {
            continue;
        }
        scan.value.total += 1;
        match ep.text_value() {
            Ok(Some(state)) if state == UNTREATED => scan.value.matched += 1,
            Ok(_) => {}
            Err(reason) => scan.skip(ep.entity_id, reason),
        }
    }
    scan
}

/// `100 * part / total`, truncated. Zero when `total` is zero.
pub fn percentage(part: u64, total: u64) -> u64 {
    if total == 0 {
        0
    } else {
        100 * part / total
    }
}

/// `EffectiveResponse`: share of patients already reached by the response.
pub struct EffectiveResponse;

#[async_trait]
impl Indicator for EffectiveResponse {
    fn identifier(&self) -> &str {
        "EffectiveResponse"
    }

    fn title(&self) -> &str {
        "Effective Response"
    }

    fn abstract_text(&self) -> &str {
        "Percent of patients already treated"
    }

    async fn calculate(&self, ctx: &WorldStateContext, services: &Services) -> Result<IndicatorReport> {
        progress(20, "Start collecting input data");
        let ooi_ref = ctx.ooi_ref()?;
        let excluded = unexposed_patients(services, ooi_ref).await?;
        let records = services
            .ooi(ooi_ref)
            .entity_properties(ooi_ref.id, services.properties.patient_treatment_state)
            .await?;

        progress(30, "Calculate indicator value");
        let tally = tally_treatment(&records, &excluded);
        let effective = percentage(tally.value.matched, tally.value.total);
        progress(40, &format!("Calculated EffectiveResponse: {}%", effective));

        let worldstates = vec![ctx.icmm.id];
        let values = vec![
            IndicatorValue::number(
                self.identifier(),
                self.title(),
                self.abstract_text(),
                &ctx.description,
                worldstates.clone(),
                effective,
            )
            .with_total_count(tally.value.total),
            IndicatorValue::number(
                "IneffectiveResponse",
                "Ineffective response",
                "Percent of patients not already treated",
                &ctx.description,
                worldstates,
                100 - effective,
            )
            .with_total_count(tally.value.total),
        ];
        let kpi = kpi(
            "Resources",
            KpiCategory::new(self.title())
                .with_metric(self.identifier(), KpiMetric::new(self.title(), effective, "%"))
                .with_metric(
                    "IneffectiveResponse",
                    KpiMetric::new("Ineffective response", 100 - effective, "%"),
                ),
        );

        Ok(IndicatorReport {
            indicator: IndicatorOutput::Many(values),
            kpi: Some(kpi),
            skipped: tally.skipped,
        })
    }
}
