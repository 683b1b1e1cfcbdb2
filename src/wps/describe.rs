use serde::Serialize;

use super::kvp::WORLDSTATE_INPUT;
use crate::config::PropertyIds;
use crate::process::{Indicator, IndicatorRegistry};

pub const PROCESS_VERSION: &str = "1.0";

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ProcessSummary {
    pub identifier: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub version: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LiteralDescription {
    pub identifier: String,
    pub title: String,
    #[serde(rename = "dataType")]
    pub data_type: String,
}

impl LiteralDescription {
    fn string(identifier: &str, title: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            title: title.to_string(),
            data_type: "string".to_string(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ProcessDescription {
    #[serde(flatten)]
    pub summary: ProcessSummary,
    #[serde(rename = "storeSupported")]
    pub store_supported: bool,
    #[serde(rename = "statusSupported")]
    pub status_supported: bool,
    pub inputs: Vec<LiteralDescription>,
    pub outputs: Vec<LiteralDescription>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Capabilities {
    pub service: String,
    pub version: String,
    pub title: String,
    pub operations: Vec<String>,
    pub processes: Vec<ProcessSummary>,
}

pub fn summary(indicator: &dyn Indicator) -> ProcessSummary {
    ProcessSummary {
        identifier: indicator.identifier().to_string(),
        title: indicator.title().to_string(),
        abstract_text: indicator.abstract_text().to_string(),
        version: PROCESS_VERSION.to_string(),
    }
}

pub fn describe(indicator: &dyn Indicator, properties: &PropertyIds) -> ProcessDescription {
    let mut outputs = vec![
        LiteralDescription::string("ICMMindicatorValueURL", "URL to access indicator value from ICMM"),
        LiteralDescription::string("ICMMkpiValueURL", "URL to access KPI value from ICMM"),
        LiteralDescription::string("indicator", "indicator value"),
        LiteralDescription::string("kpi", "kpi value"),
    ];
    if indicator.mirror_property(properties).is_some() {
        outputs.push(LiteralDescription::string(
            "OOIindicatorURL",
            "URL to access indicator value from OOI",
        ));
        outputs.push(LiteralDescription::string(
            "ICMMindicatorRefURL",
            "URL to access indicator reference from ICMM",
        ));
    }
    ProcessDescription {
        summary: summary(indicator),
        store_supported: false,
        status_supported: false,
        inputs: vec![LiteralDescription::string(WORLDSTATE_INPUT, "ICMM WorldState id")],
        outputs,
    }
}

pub fn capabilities(registry: &IndicatorRegistry) -> Capabilities {
    Capabilities {
        service: "WPS".to_string(),
        version: "1.0.0".to_string(),
        title: "CRISMA indicators".to_string(),
        operations: vec![
            "GetCapabilities".to_string(),
            "DescribeProcess".to_string(),
            "Execute".to_string(),
        ],
        processes: registry.iter().map(|i| summary(i.as_ref())).collect(),
    }
}
