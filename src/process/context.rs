use reqwest::Client;

use crate::config::PropertyIds;
use crate::error::IndicatorError;
use crate::icmm::{IcmmClient, IcmmRef};
use crate::model::WorldStateDescription;
use crate::ooi::{OoiClient, OoiRef};

/// Immutable per-request state: which world-state an indicator is computed for.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldStateContext {
    pub icmm: IcmmRef,
    pub ooi: Option<OoiRef>,
    pub description: WorldStateDescription,
}

impl WorldStateContext {
    /// The cross-referenced OOI world-state.
    pub fn ooi_ref(&self) -> Result<&OoiRef, IndicatorError> {
        self.ooi.as_ref().ok_or(IndicatorError::MissingOoiRef {
            worldstate: self.icmm.id,
        })
    }
}

/// Remote services available to a calculation.
#[derive(Clone)]
pub struct Services {
    pub http_client: Client,
    pub icmm: IcmmClient,
    pub properties: PropertyIds,
}

impl Services {
    /// Client for the OOI endpoint of `reference`.
    pub fn ooi(&self, reference: &OoiRef) -> OoiClient {
        OoiClient::for_ref(self.http_client.clone(), reference)
    }

    /// Resolves the OOI world-state cross-referenced by ICMM world-state `worldstate`.
    pub async fn ooi_ref_of(&self, worldstate: u64) -> anyhow::Result<OoiRef> {
        let url = self
            .icmm
            .ooi_ref(worldstate)
            .await?
            .ok_or(IndicatorError::MissingOoiRef { worldstate })?;
        Ok(OoiRef::parse(&url)?)
    }
}
