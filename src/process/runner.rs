use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use tracing::{info, Instrument};
use uuid::Uuid;

use super::{progress, Indicator, Services, WorldStateContext};
use crate::config::IndicatorsConfig;
use crate::icmm::{IcmmClient, IcmmRef};
use crate::model::{IndicatorOutput, Kpi, SkippedRecord, WorldStateDescription};
use crate::ooi::OoiRef;

/// Literal outputs of one process execution.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExecutionOutputs {
    #[serde(rename = "executionId")]
    pub execution_id: String,
    pub identifier: String,
    /// False when a stored value was reported instead of recalculating.
    pub recalculated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indicator: Option<IndicatorOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kpi: Option<Kpi>,
    #[serde(rename = "ICMMindicatorValueURL", skip_serializing_if = "Option::is_none")]
    pub icmm_indicator_value_url: Option<String>,
    #[serde(rename = "ICMMkpiValueURL", skip_serializing_if = "Option::is_none")]
    pub icmm_kpi_value_url: Option<String>,
    #[serde(rename = "OOIindicatorURL", skip_serializing_if = "Option::is_none")]
    pub ooi_indicator_url: Option<String>,
    #[serde(rename = "ICMMindicatorRefURL", skip_serializing_if = "Option::is_none")]
    pub icmm_indicator_ref_url: Option<String>,
    #[serde(rename = "skippedRecords")]
    pub skipped: Vec<SkippedRecord>,
}

impl ExecutionOutputs {
    fn new(execution_id: &Uuid, identifier: &str) -> Self {
        Self {
            execution_id: execution_id.to_string(),
            identifier: identifier.to_string(),
            recalculated: false,
            indicator: None,
            kpi: None,
            icmm_indicator_value_url: None,
            icmm_kpi_value_url: None,
            ooi_indicator_url: None,
            icmm_indicator_ref_url: None,
            skipped: Vec::new(),
        }
    }

    /// A single output by its process output identifier.
    pub fn output(&self, id: &str) -> Option<serde_json::Value> {
        let text = |v: &Option<String>| v.clone().map(serde_json::Value::String);
        match id {
            "indicator" => self.indicator.as_ref().and_then(|v| serde_json::to_value(v).ok()),
            "kpi" => self.kpi.as_ref().and_then(|v| serde_json::to_value(v).ok()),
            "ICMMindicatorValueURL" => text(&self.icmm_indicator_value_url),
            "ICMMkpiValueURL" => text(&self.icmm_kpi_value_url),
            "OOIindicatorURL" => text(&self.ooi_indicator_url),
            "ICMMindicatorRefURL" => text(&self.icmm_indicator_ref_url),
            _ => None,
        }
    }
}

/// Runs indicator processes against ICMM/OOI.
#[derive(Clone)]
pub struct ProcessRunner {
    http_client: Client,
    config: IndicatorsConfig,
}

impl ProcessRunner {
    pub fn new(http_client: Client, config: IndicatorsConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }

    pub fn config(&self) -> &IndicatorsConfig {
        &self.config
    }

    /// Turns an ICMM world-state URL into a request context.
    pub async fn resolve(
        &self,
        icmm_url: &str,
        uses_ooi: bool,
    ) -> Result<(WorldStateContext, Services)> {
        let icmm_ref = IcmmRef::parse(icmm_url)?;
        info!(icmm = %icmm_ref, "Resolved ICMM worldstate");

        let icmm = IcmmClient::for_ref(self.http_client.clone(), &icmm_ref, self.config.icmm.clone());
        let services = Services {
            http_client: self.http_client.clone(),
            icmm,
            properties: self.config.ooi.properties.clone(),
        };

        let (name, description) = services.icmm.name_description(icmm_ref.id).await?;
        let mut worldstate_description = WorldStateDescription {
            icmm_name: name,
            icmm_description: description,
            icmm_worldstate_url: icmm_url.to_string(),
            ooi_worldstate_url: None,
        };

        let ooi = if uses_ooi {
            let ooi_ref: OoiRef = services.ooi_ref_of(icmm_ref.id).await?;
            info!(ooi = %ooi_ref, "Resolved OOI worldstate");
            worldstate_description.ooi_worldstate_url = Some(ooi_ref.to_string());
            Some(ooi_ref)
        } else {
            None
        };

        let ctx = WorldStateContext {
            icmm: icmm_ref,
            ooi,
            description: worldstate_description,
        };
        Ok((ctx, services))
    }

    /// Resolve, calculate and publish one indicator for an ICMM world-state.
    pub async fn execute(&self, indicator: &dyn Indicator, icmm_url: &str) -> Result<ExecutionOutputs> {
        let execution_id = Uuid::now_v7();
        let span = tracing::info_span!(
            "execute",
            execution_id = %execution_id,
            process = indicator.identifier()
        );
        self.execute_inner(indicator, icmm_url, execution_id)
            .instrument(span)
            .await
    }

    async fn execute_inner(
        &self,
        indicator: &dyn Indicator,
        icmm_url: &str,
        execution_id: Uuid,
    ) -> Result<ExecutionOutputs> {
        progress(1, "Check ICMM WorldState status");
        info!(icmm_url, "Executing indicator");

        let (ctx, services) = self.resolve(icmm_url, indicator.uses_ooi()).await?;
        let mut outputs = ExecutionOutputs::new(&execution_id, indicator.identifier());

        progress(10, "Check if indicator value already exists");
        let mirror = indicator.mirror_property(&services.properties);
        let existing = match (mirror, ctx.ooi.as_ref()) {
            (Some(property), Some(ooi_ref)) => {
                services.ooi(ooi_ref).indicator_ref(ooi_ref.id, property).await?
            }
            _ => services.icmm.indicator_url(ctx.icmm.id, indicator.identifier()).await?,
        };
        if let Some(ref url) = existing {
            info!(url = %url, "Indicator value already exists");
        }

        if !self.config.server.recalculate {
            if let Some(url) = existing {
                info!("Recalculation disabled, reporting stored value");
                match (mirror, ctx.ooi.as_ref()) {
                    (Some(_), Some(_)) => {
                        outputs.icmm_indicator_ref_url = Some(
                            services
                                .icmm
                                .publish_reference(ctx.icmm.id, indicator.identifier(), indicator.title(), &url)
                                .await?,
                        );
                        outputs.ooi_indicator_url = Some(url);
                    }
                    _ => outputs.icmm_indicator_value_url = Some(url),
                }
                return Ok(outputs);
            }
        }

        let report = indicator
            .calculate(&ctx, &services)
            .await
            .context("calculateIndicator")?;
        outputs.recalculated = true;
        outputs.skipped = report.skipped.clone();
        if !report.skipped.is_empty() {
            info!(count = report.skipped.len(), "Records skipped during calculation");
        }

        progress(90, "Store indicator value");
        let stored = match &report.indicator {
            IndicatorOutput::Single(value) => vec![(
                indicator.identifier().to_string(),
                indicator.title().to_string(),
                serde_json::to_value(value)?,
            )],
            IndicatorOutput::Many(values) => values
                .iter()
                .map(|v| Ok((v.id.clone(), v.name.clone(), serde_json::to_value(v)?)))
                .collect::<Result<Vec<_>>>()?,
        };
        for (id, name, value) in &stored {
            // Only the last URL is reported for multi-valued indicators
            let url = services.icmm.publish_indicator(ctx.icmm.id, id, name, value).await?;
            outputs.icmm_indicator_value_url = Some(url);
        }

        if let Some(ref kpi) = report.kpi {
            let value = serde_json::to_value(kpi)?;
            let url = services
                .icmm
                .publish_kpi(ctx.icmm.id, indicator.identifier(), indicator.title(), &value)
                .await?;
            outputs.icmm_kpi_value_url = Some(url);
        }

        if let (Some(property), Some(ooi_ref)) = (mirror, ctx.ooi.as_ref()) {
            if let Some((_, _, value)) = stored.first() {
                let ooi_url = services
                    .ooi(ooi_ref)
                    .store_indicator_value(
                        ooi_ref.id,
                        self.config.ooi.indicator_entity_id,
                        property,
                        value,
                        existing.as_deref(),
                    )
                    .await?;
                progress(90, "Store indicator reference in ICMM");
                outputs.icmm_indicator_ref_url = Some(
                    services
                        .icmm
                        .publish_reference(ctx.icmm.id, indicator.identifier(), indicator.title(), &ooi_url)
                        .await?,
                );
                outputs.ooi_indicator_url = Some(ooi_url);
            }
        }

        outputs.indicator = Some(report.indicator);
        outputs.kpi = report.kpi;
        info!("Indicator execution finished");
        Ok(outputs)
    }
}
