//! HTTP surface: the WPS 1.0.0 KVP endpoint plus a small JSON API over the
//! same processes.

mod describe;
mod error;
mod kvp;

pub use describe::{capabilities, describe, summary, Capabilities, ProcessDescription, ProcessSummary};
pub use error::{ExceptionReport, WpsError};
pub use kvp::{parse_data_inputs, worldstate_input, WpsRequest, WORLDSTATE_INPUT};

use axum::{
    extract::{Path, RawQuery, State},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::process::{ExecutionOutputs, IndicatorRegistry, ProcessRunner};

/// Shared application state for the process endpoints
pub struct WpsAppState {
    pub registry: IndicatorRegistry,
    pub runner: ProcessRunner,
}

/// Body of `POST /processes/:id/execute`
#[derive(Deserialize, Debug)]
pub struct ExecuteRequest {
    #[serde(rename = "ICMMworldstateURL")]
    pub icmm_worldstate_url: String,
}

/// Create the process router
pub fn create_wps_router(state: Arc<WpsAppState>) -> Router {
    Router::new()
        .route("/wps", get(wps_kvp))
        .route("/processes", get(list_processes))
        .route("/processes/:id", get(describe_process))
        .route("/processes/:id/execute", post(execute_process))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /wps - KVP-encoded GetCapabilities, DescribeProcess and Execute
async fn wps_kvp(
    State(state): State<Arc<WpsAppState>>,
    RawQuery(query): RawQuery,
) -> Result<Response, WpsError> {
    match WpsRequest::parse(query.as_deref().unwrap_or_default())? {
        WpsRequest::GetCapabilities => Ok(Json(capabilities(&state.registry)).into_response()),
        WpsRequest::DescribeProcess { identifiers } => {
            let properties = &state.runner.config().ooi.properties;
            let descriptions = identifiers
                .iter()
                .map(|id| {
                    state
                        .registry
                        .get(id)
                        .map(|i| describe(i.as_ref(), properties))
                        .ok_or_else(|| WpsError::NoSuchProcess(id.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Json(descriptions).into_response())
        }
        WpsRequest::Execute {
            identifier,
            inputs,
            raw_output,
        } => {
            let icmm_url = worldstate_input(&inputs)?;
            let outputs = execute(&state, &identifier, icmm_url).await?;
            match raw_output {
                Some(output) => outputs
                    .output(&output)
                    .map(|v| Json(v).into_response())
                    .ok_or(WpsError::NoSuchOutput(output)),
                None => Ok(Json(outputs).into_response()),
            }
        }
    }
}

/// GET /processes - List registered processes
async fn list_processes(State(state): State<Arc<WpsAppState>>) -> Json<Vec<ProcessSummary>> {
    Json(state.registry.iter().map(|i| summary(i.as_ref())).collect())
}

/// GET /processes/:id - Describe one process
async fn describe_process(
    State(state): State<Arc<WpsAppState>>,
    Path(id): Path<String>,
) -> Result<Json<ProcessDescription>, WpsError> {
    let indicator = state
        .registry
        .get(&id)
        .ok_or(WpsError::NoSuchProcess(id))?;
    Ok(Json(describe(
        indicator.as_ref(),
        &state.runner.config().ooi.properties,
    )))
}

/// POST /processes/:id/execute - Execute a process for one world-state
async fn execute_process(
    State(state): State<Arc<WpsAppState>>,
    Path(id): Path<String>,
    Json(request): Json<ExecuteRequest>,
) -> Result<Json<ExecutionOutputs>, WpsError> {
    let icmm_url = request.icmm_worldstate_url.trim();
    if icmm_url.is_empty() {
        return Err(WpsError::MissingParameter(WORLDSTATE_INPUT));
    }
    Ok(Json(execute(&state, &id, icmm_url).await?))
}

/// GET /health - Liveness probe
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn execute(
    state: &WpsAppState,
    identifier: &str,
    icmm_url: &str,
) -> Result<ExecutionOutputs, WpsError> {
    let indicator = state
        .registry
        .get(identifier)
        .ok_or_else(|| WpsError::NoSuchProcess(identifier.to_string()))?;
    info!(process = identifier, icmm_url, "Execute request");
    state
        .runner
        .execute(indicator.as_ref(), icmm_url)
        .await
        .map_err(WpsError::from_execution)
}
