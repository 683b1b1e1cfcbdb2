//! Shared indicator base: world-state resolution, the [`Indicator`]
//! interface, and the execute pipeline that publishes results.

mod context;
pub mod registry;
mod runner;

pub use context::{Services, WorldStateContext};
pub use registry::{default_indicators, IndicatorRegistry};
pub use runner::{ExecutionOutputs, ProcessRunner};

use crate::config::PropertyIds;
use crate::model::IndicatorReport;
use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

/// One indicator process.
///
/// Implementations only compute: resolving the world-state and storing
/// the result is done by [`ProcessRunner`].
///
/// # Example
/// ```no_run
/// use indicators::model::{IndicatorOutput, IndicatorReport, IndicatorValue};
/// use indicators::process::{Indicator, Services, WorldStateContext};
/// use async_trait::async_trait;
/// use anyhow::Result;
///
/// struct Patients;
///
/// #[async_trait]
/// impl Indicator for Patients {
///     fn identifier(&self) -> &str {
///         "Patients"
///     }
///
///     fn title(&self) -> &str {
///         "Number of patients"
///     }
///
///     fn abstract_text(&self) -> &str {
///         "Number of patient life records"
///     }
///
///     async fn calculate(&self, ctx: &WorldStateContext, services: &Services) -> Result<IndicatorReport> {
///         let ooi = ctx.ooi_ref()?;
///         let records = services
///             .ooi(ooi)
///             .entity_properties(ooi.id, services.properties.patient_life)
///             .await?;
///         let value = IndicatorValue::number(
///             self.identifier(),
///             self.title(),
///             self.abstract_text(),
///             &ctx.description,
///             vec![ctx.icmm.id],
///             records.len() as u64,
///         );
///         Ok(IndicatorReport {
///             indicator: IndicatorOutput::Single(value),
///             kpi: None,
///             skipped: vec![],
///         })
///     }
/// }
/// ```
#[async_trait]
pub trait Indicator: Send + Sync {
    /// Process identifier used in requests and as ICMM data item name.
    fn identifier(&self) -> &str;

    fn title(&self) -> &str;

    fn abstract_text(&self) -> &str;

    /// Whether the ICMM world-state must cross-reference an OOI world-state.
    fn uses_ooi(&self) -> bool {
        true
    }

    /// OOI property the computed value is mirrored into, if any.
    fn mirror_property(&self, _properties: &PropertyIds) -> Option<u64> {
        None
    }

    async fn calculate(&self, ctx: &WorldStateContext, services: &Services)
        -> Result<IndicatorReport>;
}

/// Reports execution progress as a structured log event.
pub fn progress(percent: u8, message: &str) {
    info!(progress = percent, "{}", message);
}
