//! OOI-WSR: the world-state data service holding entity properties.

mod client;

pub use client::OoiClient;

use crate::error::IndicatorError;
use reqwest::Url;
use std::fmt;

/// A parsed OOI world-state URL (`<endpoint>/WorldState/<id>`).
#[derive(Debug, Clone, PartialEq)]
pub struct OoiRef {
    pub endpoint: String,
    pub id: u64,
}

impl OoiRef {
    pub fn parse(url: &str) -> Result<Self, IndicatorError> {
        let invalid = || IndicatorError::InvalidOoiRef(url.to_string());
        let parsed = Url::parse(url.trim()).map_err(|_| invalid())?;
        if !parsed.has_host() {
            return Err(invalid());
        }
        let segments: Vec<&str> = parsed
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        let (last, rest) = segments.split_last().ok_or_else(invalid)?;
        let id: u64 = last.parse().map_err(|_| invalid())?;
        let (class, prefix) = rest.split_last().ok_or_else(invalid)?;
        if !class.eq_ignore_ascii_case("worldstate") {
            return Err(invalid());
        }

        let mut endpoint = parsed.origin().ascii_serialization();
        for segment in prefix {
            endpoint.push('/');
            endpoint.push_str(segment);
        }

        Ok(Self { endpoint, id })
    }
}

impl fmt::Display for OoiRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/WorldState/{}", self.endpoint, self.id)
    }
}
