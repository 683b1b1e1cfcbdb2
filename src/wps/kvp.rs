//! Key-value-pair encoding of WPS 1.0.0 GET requests.
//!
//! Parameter names are case-insensitive. `datainputs` carries
//! `;`-separated `key=value` pairs whose values may be percent-encoded
//! a second time.

use std::collections::BTreeMap;

use super::error::WpsError;

pub const WORLDSTATE_INPUT: &str = "ICMMworldstateURL";

#[derive(Debug, Clone, PartialEq)]
pub enum WpsRequest {
    GetCapabilities,
    DescribeProcess {
        identifiers: Vec<String>,
    },
    Execute {
        identifier: String,
        inputs: BTreeMap<String, String>,
        raw_output: Option<String>,
    },
}

impl WpsRequest {
    pub fn parse(query: &str) -> Result<Self, WpsError> {
        let pairs: Vec<(String, String)> =
            serde_urlencoded::from_str(query).map_err(|e| WpsError::InvalidParameter {
                locator: "query".to_string(),
                text: e.to_string(),
            })?;
        let params: BTreeMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        let param = |name: &str| params.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());

        match param("service") {
            Some(service) if service.eq_ignore_ascii_case("WPS") => {}
            Some(service) => {
                return Err(WpsError::InvalidParameter {
                    locator: "service".to_string(),
                    text: format!("unsupported service '{}'", service),
                })
            }
            None => return Err(WpsError::MissingParameter("service")),
        }
        if let Some(version) = param("version") {
            if version != "1.0.0" {
                return Err(WpsError::InvalidParameter {
                    locator: "version".to_string(),
                    text: format!("unsupported version '{}'", version),
                });
            }
        }

        let request = param("request").ok_or(WpsError::MissingParameter("request"))?;
        if request.eq_ignore_ascii_case("GetCapabilities") {
            Ok(WpsRequest::GetCapabilities)
        } else if request.eq_ignore_ascii_case("DescribeProcess") {
            let identifiers = param("identifier")
                .ok_or(WpsError::MissingParameter("identifier"))?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            Ok(WpsRequest::DescribeProcess { identifiers })
        } else if request.eq_ignore_ascii_case("Execute") {
            let identifier = param("identifier")
                .ok_or(WpsError::MissingParameter("identifier"))?
                .to_string();
            let inputs = match param("datainputs") {
                Some(raw) => parse_data_inputs(raw)?,
                None => BTreeMap::new(),
            };
            let raw_output = param("rawdataoutput").map(|v| {
                // `id@mimeType=...` attributes are ignored
                v.split('@').next().unwrap_or(v).to_string()
            });
            Ok(WpsRequest::Execute {
                identifier,
                inputs,
                raw_output,
            })
        } else {
            Err(WpsError::OperationNotSupported(request.to_string()))
        }
    }
}

/// Splits `key=value;key=value`, percent-decoding values.
pub fn parse_data_inputs(raw: &str) -> Result<BTreeMap<String, String>, WpsError> {
    let mut inputs = BTreeMap::new();
    for part in raw.split(';').filter(|p| !p.trim().is_empty()) {
        let (key, value) = part.split_once('=').ok_or_else(|| WpsError::InvalidParameter {
            locator: "datainputs".to_string(),
            text: format!("expected key=value, got '{}'", part),
        })?;
        let value = urlencoding::decode(value).map_err(|e| WpsError::InvalidParameter {
            locator: key.trim().to_string(),
            text: e.to_string(),
        })?;
        inputs.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(inputs)
}

/// The world-state URL input of an Execute request.
pub fn worldstate_input(inputs: &BTreeMap<String, String>) -> Result<&str, WpsError> {
    inputs
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(WORLDSTATE_INPUT))
        .map(|(_, v)| v.as_str())
        .filter(|v| !v.is_empty())
        .ok_or(WpsError::MissingParameter(WORLDSTATE_INPUT))
}
