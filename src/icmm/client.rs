use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use reqwest::Client;
use serde_json::json;
use std::collections::HashSet;
use tracing::{debug, info};

use super::{DataItem, IcmmRef, WorldStateRecord};
use crate::config::IcmmConfig;
use crate::error::IndicatorError;
use crate::http::check_response_status;

const SERVICE: &str = "ICMM";

/// HTTP client for one ICMM endpoint/domain.
#[derive(Clone)]
pub struct IcmmClient {
    http_client: Client,
    endpoint: String,
    domain: String,
    config: IcmmConfig,
}

impl IcmmClient {
    pub fn new(http_client: Client, endpoint: String, domain: String, config: IcmmConfig) -> Self {
        Self {
            http_client,
            endpoint,
            domain,
            config,
        }
    }

    /// Client for the endpoint a world-state reference lives on.
    pub fn for_ref(http_client: Client, reference: &IcmmRef, config: IcmmConfig) -> Self {
        Self::new(
            http_client,
            reference.endpoint.clone(),
            reference.domain.clone(),
            config,
        )
    }

    pub fn config(&self) -> &IcmmConfig {
        &self.config
    }

    fn class_url(&self, class: &str) -> String {
        format!("{}/{}.{}", self.endpoint, self.domain, class)
    }

    pub fn worldstate_url(&self, id: u64) -> String {
        format!("{}/{}", self.class_url("worldstates"), id)
    }

    pub fn dataitem_url(&self, id: u64) -> String {
        format!("{}/{}", self.class_url("dataitems"), id)
    }

    /// Fetch a world-state with its categories, parent and data items expanded.
    pub async fn worldstate(&self, id: u64) -> Result<WorldStateRecord> {
        self.get_worldstate(id, &[("level", "3"), ("omitNullValues", "true"), ("deduplicate", "false")])
            .await
    }

    async fn get_worldstate(&self, id: u64, query: &[(&str, &str)]) -> Result<WorldStateRecord> {
        let url = self.worldstate_url(id);
        let response = self
            .http_client
            .get(&url)
            .query(query)
            .header("content-type", "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to send ICMM worldstate request for {}", url))?;

        check_response_status(SERVICE, &response)?;
        response
            .json::<WorldStateRecord>()
            .await
            .with_context(|| format!("Failed to parse ICMM worldstate {}", url))
    }

    /// Name and description of a world-state.
    pub async fn name_description(&self, id: u64) -> Result<(Option<String>, Option<String>)> {
        let ws = self
            .get_worldstate(id, &[("level", "1"), ("fields", "name,description"), ("omitNullValues", "true")])
            .await?;
        Ok((ws.name, ws.description))
    }

    /// URL of the OOI world-state cross-referenced by this ICMM world-state.
    pub async fn ooi_ref(&self, id: u64) -> Result<Option<String>> {
        let ws = self.worldstate(id).await?;
        Ok(ws
            .data_reference(&self.config.ooi_ref_name)
            .map(|s| s.trim().to_string()))
    }

    /// World-state ids from the baseline ancestor down to `id`, inclusive.
    pub async fn lineage(&self, id: u64) -> Result<Vec<u64>> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut current = id;

        loop {
            if !visited.insert(current) {
                return Err(IndicatorError::WorldStateCycle { worldstate: current }.into());
            }
            if chain.len() >= self.config.max_parent_depth {
                return Err(IndicatorError::BaselineNotFound { worldstate: id }.into());
            }
            let ws = self.worldstate(current).await?;
            chain.push(current);
            if ws.has_category(&self.config.baseline_category) {
                break;
            }
            match ws.parent_id() {
                Some(parent) => {
                    debug!(worldstate = current, parent, "Following parent worldstate");
                    current = parent;
                }
                None => return Err(IndicatorError::BaselineNotFound { worldstate: id }.into()),
            }
        }

        chain.reverse();
        info!(worldstate = id, lineage = ?chain, "Resolved worldstate lineage");
        Ok(chain)
    }

    /// The baseline ancestor of `id` (possibly `id` itself).
    pub async fn base_worldstate(&self, id: u64) -> Result<u64> {
        let chain = self.lineage(id).await?;
        chain
            .first()
            .copied()
            .ok_or_else(|| IndicatorError::BaselineNotFound { worldstate: id }.into())
    }

    /// Simulated time of a world-state.
    pub async fn simulated_time(&self, id: u64) -> Result<DateTime<FixedOffset>> {
        let ws = self
            .get_worldstate(
                id,
                &[
                    ("level", "1"),
                    ("fields", "simulatedTime"),
                    ("omitNullValues", "true"),
                    ("deduplicate", "true"),
                ],
            )
            .await?;
        let raw = ws.simulated_time.unwrap_or_default();
        parse_simulated_time(&raw).ok_or_else(|| {
            IndicatorError::InvalidSimulatedTime {
                worldstate: id,
                value: raw.clone(),
            }
            .into()
        })
    }

    /// URL of an already published value of indicator `identifier`, if any.
    pub async fn indicator_url(&self, worldstate: u64, identifier: &str) -> Result<Option<String>> {
        let ws = self.worldstate(worldstate).await?;
        Ok(ws
            .icc_item(identifier, &self.config.indicator_category)
            .and_then(DataItem::id)
            .map(|id| self.dataitem_url(id)))
    }

    pub async fn publish_indicator(
        &self,
        worldstate: u64,
        id: &str,
        name: &str,
        value: &serde_json::Value,
    ) -> Result<String> {
        self.publish(worldstate, &self.config.indicator_category, id, name, "application/json", value.to_string())
            .await
    }

    pub async fn publish_kpi(
        &self,
        worldstate: u64,
        id: &str,
        name: &str,
        value: &serde_json::Value,
    ) -> Result<String> {
        self.publish(worldstate, &self.config.kpi_category, id, name, "application/json", value.to_string())
            .await
    }

    /// Publish a data item that only points at a value stored elsewhere.
    pub async fn publish_reference(
        &self,
        worldstate: u64,
        id: &str,
        name: &str,
        url: &str,
    ) -> Result<String> {
        self.publish(worldstate, &self.config.reference_category, id, name, "text/plain", url.to_string())
            .await
    }

    /// Create or replace the `iccdata` item `name`/`category` of a world-state.
    /// Returns the data item URL.
    async fn publish(
        &self,
        worldstate: u64,
        category: &str,
        name: &str,
        description: &str,
        content_type: &str,
        payload: String,
    ) -> Result<String> {
        let ws = self.worldstate(worldstate).await?;
        let existing = ws.icc_item(name, category).and_then(DataItem::id);

        let item_ref = match existing {
            Some(id) => format!("/{}.dataitems/{}", self.domain, id),
            None => format!("/{}.dataitems/-1", self.domain),
        };
        let body = json!({
            "$self": item_ref,
            "name": name,
            "description": description,
            "categories": [{"key": category}],
            "actualaccessinfocontenttype": content_type,
            "actualaccessinfo": payload,
            "worldstate": {"$ref": format!("/{}.worldstates/{}", self.domain, worldstate)},
        });

        if let Some(id) = existing {
            let url = self.dataitem_url(id);
            let response = self
                .http_client
                .put(&url)
                .json(&body)
                .send()
                .await
                .with_context(|| format!("Failed to send ICMM update for {}", url))?;
            check_response_status(SERVICE, &response)?;
            info!(worldstate, name, category, url = %url, "Updated ICMM data item");
            return Ok(url);
        }

        let url = self.class_url("dataitems");
        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to send ICMM create for {}", url))?;
        check_response_status(SERVICE, &response)?;
        let created = response
            .json::<DataItem>()
            .await
            .context("Failed to parse created ICMM data item")?;
        let id = created
            .id()
            .context("ICMM did not return an id for the created data item")?;
        let item_url = self.dataitem_url(id);
        info!(worldstate, name, category, url = %item_url, "Created ICMM data item");
        Ok(item_url)
    }
}

/// Parses ICMM `simulatedTime`. Minute-precision values
/// (`2014-11-27T10:00`) are completed to full seconds in UTC; values
/// without an offset are taken as UTC.
pub fn parse_simulated_time(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    let completed;
    let value = if raw.len() == 16 {
        completed = format!("{}:00.0Z", raw);
        completed.as_str()
    } else {
        raw
    };

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts);
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive).into())
}
