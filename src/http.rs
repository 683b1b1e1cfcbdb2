use crate::config::HttpConfig;
use crate::error::IndicatorError;
use anyhow::{Context, Result};
use reqwest::Client;

/// Builds the pooled client shared by the ICMM and OOI clients.
pub fn build_client(config: &HttpConfig) -> Result<Client> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.timeout())
        .build()
        .context("Failed to build HTTP client")
}

/// Maps any non-2xx status to [`IndicatorError::Upstream`].
pub fn check_response_status(service: &'static str, response: &reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    Err(IndicatorError::Upstream {
        service,
        url: response.url().to_string(),
        status: status.as_u16(),
    }
    .into())
}

/// Trailing numeric path segment of a URL or cids `$ref` (`/CRISMA.worldstates/3` -> 3).
pub fn trailing_id(reference: &str) -> Option<u64> {
    let path = reference.split(&['?', '#'][..]).next().unwrap_or(reference);
    path.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_id() {
        assert_eq!(trailing_id("/CRISMA.worldstates/3"), Some(3));
        assert_eq!(trailing_id("http://ooi/api/EntityProperty/77/"), Some(77));
        assert_eq!(trailing_id("http://icmm/CRISMA.worldstates/5?level=2"), Some(5));
        assert_eq!(trailing_id("/CRISMA.worldstates/abc"), None);
    }

    #[test]
    fn test_build_client() {
        assert!(build_client(&HttpConfig::default()).is_ok());
    }
}
