use std::fmt;

/// Errors that abort an indicator execution before or during calculation.
///
/// Malformed individual records never produce one of these; they end up in
/// the skipped list of a [`crate::model::Scan`] instead.
#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorError {
    InvalidIcmmRef(String),
    InvalidOoiRef(String),
    MissingOoiRef { worldstate: u64 },
    BaselineNotFound { worldstate: u64 },
    WorldStateCycle { worldstate: u64 },
    InvalidSimulatedTime { worldstate: u64, value: String },
    Upstream { service: &'static str, url: String, status: u16 },
}

impl IndicatorError {
    /// True for failures caused by a reference that could not be resolved,
    /// as opposed to a remote service answering with an error.
    pub fn is_unresolved_reference(&self) -> bool {
        !matches!(self, IndicatorError::Upstream { .. })
    }
}

impl fmt::Display for IndicatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorError::InvalidIcmmRef(url) => write!(f, "invalid ICMM ref: {}", url),
            IndicatorError::InvalidOoiRef(url) => write!(f, "invalid OOI ref: {}", url),
            IndicatorError::MissingOoiRef { worldstate } => {
                write!(f, "no OOI worldstate reference for ICMM worldstate {}", worldstate)
            }
            IndicatorError::BaselineNotFound { worldstate } => write!(
                f,
                "base ICMM worldstate not found for actual ICMM worldstate {}",
                worldstate
            ),
            IndicatorError::WorldStateCycle { worldstate } => {
                write!(f, "worldstate parent chain loops at {}", worldstate)
            }
            IndicatorError::InvalidSimulatedTime { worldstate, value } => write!(
                f,
                "worldstate {} has unreadable simulatedTime '{}'",
                worldstate, value
            ),
            IndicatorError::Upstream {
                service,
                url,
                status,
            } => write!(f, "error accessing {} at {}: {}", service, url, status),
        }
    }
}

impl std::error::Error for IndicatorError {}
