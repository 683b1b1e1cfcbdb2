use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::json;
use tracing::info;

use super::OoiRef;
use crate::http::check_response_status;
use crate::model::EntityProperty;

const SERVICE: &str = "OOI";

/// HTTP client for one OOI-WSR endpoint.
#[derive(Clone)]
pub struct OoiClient {
    http_client: Client,
    endpoint: String,
}

impl OoiClient {
    pub fn new(http_client: Client, endpoint: String) -> Self {
        Self {
            http_client,
            endpoint,
        }
    }

    pub fn for_ref(http_client: Client, reference: &OoiRef) -> Self {
        Self::new(http_client, reference.endpoint.clone())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn entity_property_url(&self, id: u64) -> String {
        format!("{}/EntityProperty/{}", self.endpoint, id)
    }

    /// Records of one entity type property at a world-state.
    pub async fn entity_properties(
        &self,
        worldstate: u64,
        property: u64,
    ) -> Result<Vec<EntityProperty>> {
        self.fetch(worldstate, Some(property)).await
    }

    /// Every record of a world-state, whatever the property.
    pub async fn all_entity_properties(&self, worldstate: u64) -> Result<Vec<EntityProperty>> {
        self.fetch(worldstate, None).await
    }

    async fn fetch(&self, worldstate: u64, property: Option<u64>) -> Result<Vec<EntityProperty>> {
        let url = format!("{}/EntityProperty", self.endpoint);
        let mut query = vec![("wsid", worldstate.to_string())];
        if let Some(property) = property {
            query.push(("etpid", property.to_string()));
        }

        let response = self
            .http_client
            .get(&url)
            .query(&query)
            .send()
            .await
            .with_context(|| format!("Failed to send OOI EntityProperty request to {}", url))?;

        check_response_status(SERVICE, &response)?;
        let records = response
            .json::<Vec<EntityProperty>>()
            .await
            .context("Failed to parse OOI EntityProperty response")?;
        info!(worldstate, property = ?property, count = records.len(), "Fetched entity properties");
        Ok(records)
    }

    /// URL of an indicator value already stored as property `property`.
    pub async fn indicator_ref(&self, worldstate: u64, property: u64) -> Result<Option<String>> {
        let records = self.entity_properties(worldstate, property).await?;
        Ok(records
            .iter()
            .find_map(|ep| ep.entity_property_id)
            .map(|id| self.entity_property_url(id)))
    }

    /// Persists an indicator value on `entity` as property `property`.
    ///
    /// Replaces the record at `existing` when given; otherwise a new record
    /// is created. Returns the record URL.
    pub async fn store_indicator_value(
        &self,
        worldstate: u64,
        entity: u64,
        property: u64,
        value: &serde_json::Value,
        existing: Option<&str>,
    ) -> Result<String> {
        let body = json!({
            "entityId": entity,
            "entityTypePropertyId": property,
            "worldStateId": worldstate,
            "entityPropertyValue": value.to_string(),
        });

        if let Some(url) = existing {
            let response = self
                .http_client
                .put(url)
                .json(&body)
                .send()
                .await
                .with_context(|| format!("Failed to send OOI update to {}", url))?;
            check_response_status(SERVICE, &response)?;
            info!(worldstate, property, url = %url, "Updated OOI indicator value");
            return Ok(url.to_string());
        }

        let url = format!("{}/EntityProperty", self.endpoint);
        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to send OOI create to {}", url))?;
        check_response_status(SERVICE, &response)?;
        let created = response
            .json::<EntityProperty>()
            .await
            .context("Failed to parse created OOI EntityProperty")?;
        let id = created
            .entity_property_id
            .context("OOI did not return an entityPropertyId")?;
        let record_url = self.entity_property_url(id);
        info!(worldstate, property, url = %record_url, "Created OOI indicator value");
        Ok(record_url)
    }
}
