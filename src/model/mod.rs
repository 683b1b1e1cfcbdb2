//! Wire types shared by all indicators: OOI records, indicator values and
//! the KPI view written back to ICMM.

mod entity;

pub use entity::{
    false_flagged, parse_number, EntityProperty, EntityTypeProperty, Scan, SkipReason,
    SkippedRecord, NUMERIC_PROPERTY, TEXT_PROPERTY,
};

use serde::Serialize;
use std::collections::BTreeMap;

pub const CATEGORY_ICON: &str = "flower_16.png";
pub const METRIC_ICON: &str = "flower_dead_16.png";

/// Where an indicator value was computed from.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct WorldStateDescription {
    #[serde(rename = "ICMMname")]
    pub icmm_name: Option<String>,
    #[serde(rename = "ICMMdescription")]
    pub icmm_description: Option<String>,
    #[serde(rename = "ICMMworldstateURL")]
    pub icmm_worldstate_url: String,
    #[serde(rename = "OOIworldstateURL", skip_serializing_if = "Option::is_none")]
    pub ooi_worldstate_url: Option<String>,
}

/// A number as it appears in indicator and KPI payloads.
#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Quantity {
    Integer(i64),
    Real(f64),
}

impl From<u64> for Quantity {
    fn from(v: u64) -> Self {
        Quantity::Integer(v as i64)
    }
}

impl From<i64> for Quantity {
    fn from(v: i64) -> Self {
        Quantity::Integer(v)
    }
}

impl From<f64> for Quantity {
    fn from(v: f64) -> Self {
        Quantity::Real(v)
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistogramBucket {
    pub key: String,
    pub value: u64,
    pub desc: String,
    pub css_class: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeInterval {
    pub start_time: String,
    pub end_time: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct TimeIntervals {
    pub intervals: Vec<TimeInterval>,
    pub color: String,
    pub linewidth: u32,
}

/// Payload of an indicator value; serialized as the `type`/`data` pair.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum IndicatorData {
    Number(Quantity),
    Histogram(Vec<HistogramBucket>),
    TimeIntervals(TimeIntervals),
}

/// One computed indicator, as stored in ICMM.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct IndicatorValue {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "worldstateDescription")]
    pub worldstate_description: WorldStateDescription,
    pub worldstates: Vec<u64>,
    #[serde(flatten)]
    pub data: IndicatorData,
    #[serde(rename = "totalCount", skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
}

impl IndicatorValue {
    pub fn number(
        id: &str,
        name: &str,
        description: &str,
        worldstate_description: &WorldStateDescription,
        worldstates: Vec<u64>,
        value: impl Into<Quantity>,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            worldstate_description: worldstate_description.clone(),
            worldstates,
            data: IndicatorData::Number(value.into()),
            total_count: None,
        }
    }

    pub fn with_total_count(mut self, total: u64) -> Self {
        self.total_count = Some(total);
        self
    }
}

/// `indicator` output: a single object or a list of values.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum IndicatorOutput {
    Single(IndicatorValue),
    Many(Vec<IndicatorValue>),
}

impl IndicatorOutput {
    pub fn values(&self) -> &[IndicatorValue] {
        match self {
            IndicatorOutput::Single(v) => std::slice::from_ref(v),
            IndicatorOutput::Many(vs) => vs,
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KpiMetric {
    pub display_name: String,
    pub icon_resource: String,
    pub value: Quantity,
    pub unit: String,
}

impl KpiMetric {
    pub fn new(display_name: &str, value: impl Into<Quantity>, unit: &str) -> Self {
        Self {
            display_name: display_name.to_string(),
            icon_resource: METRIC_ICON.to_string(),
            value: value.into(),
            unit: unit.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KpiCategory {
    pub display_name: String,
    pub icon_resource: String,
    #[serde(flatten)]
    pub metrics: BTreeMap<String, KpiMetric>,
}

impl KpiCategory {
    pub fn new(display_name: &str) -> Self {
        Self {
            display_name: display_name.to_string(),
            icon_resource: CATEGORY_ICON.to_string(),
            metrics: BTreeMap::new(),
        }
    }

    pub fn with_metric(mut self, id: &str, metric: KpiMetric) -> Self {
        self.metrics.insert(id.to_string(), metric);
        self
    }
}

/// Dashboard view: category id -> category.
pub type Kpi = BTreeMap<String, KpiCategory>;

pub fn kpi(category_id: &str, category: KpiCategory) -> Kpi {
    let mut kpi = Kpi::new();
    kpi.insert(category_id.to_string(), category);
    kpi
}

/// Everything an indicator calculation produces.
#[derive(Clone, Debug, PartialEq)]
pub struct IndicatorReport {
    pub indicator: IndicatorOutput,
    pub kpi: Option<Kpi>,
    pub skipped: Vec<SkippedRecord>,
}
