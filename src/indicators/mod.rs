//! Indicator processes. Each module pairs a pure aggregation over
//! [`EntityProperty`](crate::model::EntityProperty) records with the
//! [`Indicator`](crate::process::Indicator) that fetches its input.

mod deaths;
mod effective_response;
mod evacuation;
mod health;
mod improved;
mod resource_depleted;
mod unused_resources;

pub use deaths::{count_deaths, Deaths, LegacyDeaths, DEATH_THRESHOLD};
pub use effective_response::{percentage, tally_treatment, EffectiveResponse, ResponseTally};
pub use evacuation::{
    evacuation_indicators, minutes_between, unavailable_vehicles, Evacuation, EvacuationTimes,
    EvacuationTracker,
};
pub use health::{
    bucket_counts, histogram, Bound, Bucket, LifeStatus, PatientHealth, LIFE_STATUS_SCALE,
    PATIENT_HEALTH_SCALE,
};
pub use improved::{compare_health, HealthDelta, Improved, LegacyImproved, SeriouslyDeteriorated};
pub use resource_depleted::{count_depleted, ResourceDepleted, DEPLETED_THRESHOLD};
pub use unused_resources::{ResourceCounts, ResourceLedger, ResourceState, UnusedResources};

use anyhow::Result;
use std::collections::HashSet;
use tracing::info;

use crate::model::false_flagged;
use crate::ooi::OoiRef;
use crate::process::Services;

/// Patients that are not part of the exercise at `worldstate`.
pub(crate) async fn unexposed_patients(services: &Services, worldstate: &OoiRef) -> Result<HashSet<u64>> {
    info!(
        worldstate = worldstate.id,
        "Request list of patient IDs to be taken into account"
    );
    let records = services
        .ooi(worldstate)
        .entity_properties(worldstate.id, services.properties.patient_exposed)
        .await?;
    Ok(false_flagged(&records))
}

/// The OOI world-state of the baseline ancestor of ICMM world-state `worldstate`.
pub(crate) async fn baseline_ooi_ref(services: &Services, worldstate: u64) -> Result<OoiRef> {
    let base = services.icmm.base_worldstate(worldstate).await?;
    let ooi_ref = services.ooi_ref_of(base).await?;
    info!(baseline = base, ooi = %ooi_ref, "Resolved baseline worldstate");
    Ok(ooi_ref)
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::config::{IcmmConfig, PropertyIds};
    use crate::icmm::{IcmmClient, IcmmRef};
    use crate::model::{EntityProperty, EntityTypeProperty, WorldStateDescription};
    use crate::ooi::OoiRef;
    use crate::process::{Services, WorldStateContext};

    pub fn numeric(entity_id: u64, value: &str) -> EntityProperty {
        typed(entity_id, 1, Some(value))
    }

    pub fn text(entity_id: u64, value: Option<&str>) -> EntityProperty {
        typed(entity_id, 2, value)
    }

    pub fn typed(entity_id: u64, declared: i64, value: Option<&str>) -> EntityProperty {
        EntityProperty {
            entity_property_id: None,
            entity_id,
            entity_type_property_id: 0,
            entity_property_value: value.map(serde_json::Value::from),
            entity_type_property: Some(EntityTypeProperty {
                entity_type_property_type: declared,
            }),
        }
    }

    /// A record whose value is some JSON other than a string.
    pub fn json_valued(entity_id: u64, declared: i64, value: serde_json::Value) -> EntityProperty {
        let mut ep = typed(entity_id, declared, None);
        ep.entity_property_value = Some(value);
        ep
    }

    pub fn with_property(mut ep: EntityProperty, property: u64) -> EntityProperty {
        ep.entity_type_property_id = property;
        ep
    }

    /// World-state 2 on ICMM `<base>/icmm_api`, OOI world-state 5 on `<base>/ooi`.
    pub fn context(base: &str) -> WorldStateContext {
        WorldStateContext {
            icmm: IcmmRef {
                endpoint: format!("{}/icmm_api", base),
                domain: "CRISMA".into(),
                id: 2,
            },
            ooi: Some(OoiRef {
                endpoint: format!("{}/ooi", base),
                id: 5,
            }),
            description: WorldStateDescription::default(),
        }
    }

    pub fn services(ctx: &WorldStateContext) -> Services {
        let http_client = reqwest::Client::new();
        Services {
            icmm: IcmmClient::for_ref(http_client.clone(), &ctx.icmm, IcmmConfig::default()),
            http_client,
            properties: PropertyIds::default(),
        }
    }
}
