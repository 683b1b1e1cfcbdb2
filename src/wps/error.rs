use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::{error, warn};

use crate::error::IndicatorError;

/// Exception report body.
#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionReport {
    pub exception_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    pub text: String,
}

#[derive(Debug)]
pub enum WpsError {
    MissingParameter(&'static str),
    InvalidParameter { locator: String, text: String },
    OperationNotSupported(String),
    NoSuchProcess(String),
    NoSuchOutput(String),
    UnresolvedReference(String),
    Upstream(String),
    Internal(String),
}

impl WpsError {
    /// Classifies an execution failure by the domain error it carries.
    pub fn from_execution(err: anyhow::Error) -> Self {
        match err.downcast_ref::<IndicatorError>() {
            Some(e) if e.is_unresolved_reference() => WpsError::UnresolvedReference(e.to_string()),
            Some(e) => WpsError::Upstream(e.to_string()),
            None if err.downcast_ref::<reqwest::Error>().is_some() => {
                WpsError::Upstream(format!("{:#}", err))
            }
            None => WpsError::Internal(format!("{:#}", err)),
        }
    }

    fn parts(self) -> (StatusCode, ExceptionReport) {
        let report = |code: &str, locator: Option<String>, text: String| ExceptionReport {
            exception_code: code.to_string(),
            locator,
            text,
        };
        match self {
            WpsError::MissingParameter(name) => (
                StatusCode::BAD_REQUEST,
                report(
                    "MissingParameterValue",
                    Some(name.to_string()),
                    format!("missing parameter '{}'", name),
                ),
            ),
            WpsError::InvalidParameter { locator, text } => (
                StatusCode::BAD_REQUEST,
                report("InvalidParameterValue", Some(locator), text),
            ),
            WpsError::OperationNotSupported(op) => (
                StatusCode::BAD_REQUEST,
                report(
                    "OperationNotSupported",
                    Some(op.clone()),
                    format!("operation '{}' is not supported", op),
                ),
            ),
            WpsError::NoSuchProcess(id) => (
                StatusCode::NOT_FOUND,
                report(
                    "InvalidParameterValue",
                    Some("identifier".to_string()),
                    format!("no such process: {}", id),
                ),
            ),
            WpsError::NoSuchOutput(id) => (
                StatusCode::NOT_FOUND,
                report(
                    "InvalidParameterValue",
                    Some("rawdataoutput".to_string()),
                    format!("output '{}' not available", id),
                ),
            ),
            WpsError::UnresolvedReference(text) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                report("NoApplicableCode", Some("ICMMworldstateURL".to_string()), text),
            ),
            WpsError::Upstream(text) => (
                StatusCode::BAD_GATEWAY,
                report("NoApplicableCode", None, text),
            ),
            WpsError::Internal(text) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                report("NoApplicableCode", None, text),
            ),
        }
    }
}

impl IntoResponse for WpsError {
    fn into_response(self) -> Response {
        let (status, report) = self.parts();
        if status.is_server_error() {
            error!(status = status.as_u16(), text = %report.text, "Process execution failed");
        } else {
            warn!(status = status.as_u16(), text = %report.text, "Rejected WPS request");
        }
        (status, Json(report)).into_response()
    }
}
