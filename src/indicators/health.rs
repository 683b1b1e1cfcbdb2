//! Life-status histograms.
//!
//! A scale is an ordered list of buckets whose last entry is a catch-all,
//! so every readable value lands in exactly one bucket.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;

use super::unexposed_patients;
use crate::config::PropertyIds;
use crate::model::{
    EntityProperty, HistogramBucket, IndicatorData, IndicatorOutput, IndicatorReport,
    IndicatorValue, Scan,
};
use crate::process::{progress, Indicator, Services, WorldStateContext};

/// Lower bound of a bucket.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Bound {
    Above(f64),
    AtLeast(f64),
    Any,
}

impl Bound {
    fn admits(&self, value: f64) -> bool {
        match *self {
            Bound::Above(limit) => value > limit,
            Bound::AtLeast(limit) => value >= limit,
            Bound::Any => true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bucket {
    pub key: &'static str,
    pub bound: Bound,
    pub desc: &'static str,
    pub css_class: &'static str,
}

/// `PatientHealth`: tested green first, red catches the rest.
pub const PATIENT_HEALTH_SCALE: &[Bucket] = &[
    Bucket {
        key: "green",
        bound: Bound::Above(70.0),
        desc: "live status better than 70",
        css_class: "indicator-lifeIndicator-green",
    },
    Bucket {
        key: "yellow",
        bound: Bound::Above(30.0),
        desc: "life status between 30 and 70",
        css_class: "indicator-lifeIndicator-yellow",
    },
    Bucket {
        key: "red",
        bound: Bound::Any,
        desc: "life status up to 30",
        css_class: "indicator-lifeIndicator-red",
    },
];

/// `lifeIndicator`: four categories, dead catches the rest.
pub const LIFE_STATUS_SCALE: &[Bucket] = &[
    Bucket {
        key: "green",
        bound: Bound::AtLeast(85.0),
        desc: "live status 85 or better",
        css_class: "indicator-lifeIndicator-green",
    },
    Bucket {
        key: "yellow",
        bound: Bound::AtLeast(50.0),
        desc: "life status 50..85",
        css_class: "indicator-lifeIndicator-yellow",
    },
    Bucket {
        key: "red",
        bound: Bound::AtLeast(10.0),
        desc: "life status 10..50",
        css_class: "indicator-lifeIndicator-red",
    },
    Bucket {
        key: "dead",
        bound: Bound::Any,
        desc: "life status below 10",
        css_class: "indicator-lifeIndicator-black",
    },
];

/// Counts per bucket of `scale`, in scale order.
pub fn bucket_counts(
    records: &[EntityProperty],
    scale: &[Bucket],
    excluded: &HashSet<u64>,
) -> Scan<Vec<u64>> {
    let mut scan = Scan::new(vec![0; scale.len()]);
    for ep in records {
        if excluded.contains(&ep.entity_id) {
            continue;
        }
        match ep.numeric_value() {
            Ok(life) => {
                if let Some(i) = scale.iter().position(|b| b.bound.admits(life)) {
                    scan.value[i] += 1;
                }
            }
            Err(reason) => scan.skip(ep.entity_id, reason),
        }
    }
    scan
}

/// Histogram buckets, worst category first.
pub fn histogram(scale: &[Bucket], counts: &[u64]) -> Vec<HistogramBucket> {
    scale
        .iter()
        .zip(counts)
        .rev()
        .map(|(bucket, &value)| HistogramBucket {
            key: bucket.key.to_string(),
            value,
            desc: bucket.desc.to_string(),
            css_class: bucket.css_class.to_string(),
        })
        .collect()
}

async fn life_records(ctx: &WorldStateContext, services: &Services) -> Result<Vec<EntityProperty>> {
    let ooi_ref = ctx.ooi_ref()?;
    services
        .ooi(ooi_ref)
        .entity_properties(ooi_ref.id, services.properties.patient_life)
        .await
}

fn histogram_value(
    id: &str,
    name: &str,
    description: &str,
    ctx: &WorldStateContext,
    worldstate: u64,
    buckets: Vec<HistogramBucket>,
) -> IndicatorValue {
    IndicatorValue {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        worldstate_description: ctx.description.clone(),
        worldstates: vec![worldstate],
        data: IndicatorData::Histogram(buckets),
        total_count: None,
    }
}

/// `PatientHealth`: exposed patients by health group.
pub struct PatientHealth;

#[async_trait]
impl Indicator for PatientHealth {
    fn identifier(&self) -> &str {
        "PatientHealth"
    }

    fn title(&self) -> &str {
        "Patients health status summary"
    }

    fn abstract_text(&self) -> &str {
        "Number of patients with health categorized in 3 groups"
    }

    async fn calculate(&self, ctx: &WorldStateContext, services: &Services) -> Result<IndicatorReport> {
        progress(20, "Start collecting input data");
        let ooi_ref = ctx.ooi_ref()?;
        let excluded = unexposed_patients(services, ooi_ref).await?;
        let records = life_records(ctx, services).await?;

        progress(30, "Calculate indicator value");
        let counts = bucket_counts(&records, PATIENT_HEALTH_SCALE, &excluded);
        progress(40, &format!("Calculated PatientHealth: {:?}", counts.value));

        let value = histogram_value(
            self.identifier(),
            self.title(),
            self.abstract_text(),
            ctx,
            ooi_ref.id,
            histogram(PATIENT_HEALTH_SCALE, &counts.value),
        );
        Ok(IndicatorReport {
            indicator: IndicatorOutput::Single(value),
            kpi: None,
            skipped: counts.skipped,
        })
    }
}

/// `lifeIndicator`: life status summary mirrored into an OOI property.
pub struct LifeStatus;

#[async_trait]
impl Indicator for LifeStatus {
    fn identifier(&self) -> &str {
        "lifeIndicator"
    }

    fn title(&self) -> &str {
        "Patients health status summary"
    }

    fn abstract_text(&self) -> &str {
        "Number of patients with health categorized in 4 groups"
    }

    fn mirror_property(&self, properties: &PropertyIds) -> Option<u64> {
        Some(properties.life_indicator)
    }

    async fn calculate(&self, ctx: &WorldStateContext, services: &Services) -> Result<IndicatorReport> {
        progress(20, "Start collecting input data");
        let records = life_records(ctx, services).await?;

        progress(30, "Calculate indicator value");
        let counts = bucket_counts(&records, LIFE_STATUS_SCALE, &HashSet::new());
        progress(40, &format!("Calculated lifeIndicator: {:?}", counts.value));

        let value = histogram_value(
            self.identifier(),
            "health status summary",
            "Life status categoized and summed up per category",
            ctx,
            ctx.ooi_ref()?.id,
            histogram(LIFE_STATUS_SCALE, &counts.value),
        );
        Ok(IndicatorReport {
            indicator: IndicatorOutput::Single(value),
            kpi: None,
            skipped: counts.skipped,
        })
    }
}
