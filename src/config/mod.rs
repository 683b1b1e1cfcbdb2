pub mod properties;
pub use properties::PropertyIds;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// Complete indicator service configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndicatorsConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub icmm: IcmmConfig,
    #[serde(default)]
    pub ooi: OoiConfig,
}

/// Process server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Recalculate indicators that already have a stored value.
    /// When false the stored value is reported instead.
    #[serde(default = "default_recalculate")]
    pub recalculate: bool,
}

fn default_bind() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_recalculate() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            recalculate: default_recalculate(),
        }
    }
}

/// Outgoing HTTP client configuration (ICMM and OOI)
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_user_agent() -> String {
    "crisma-indicators/0.1".to_string()
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            user_agent: default_user_agent(),
        }
    }
}

/// ICMM naming conventions
#[derive(Debug, Clone, Deserialize)]
pub struct IcmmConfig {
    /// Category key marking the root world-state of an exercise
    #[serde(default = "default_baseline_category")]
    pub baseline_category: String,
    /// Worldstate data item holding the OOI world-state URL
    #[serde(default = "default_ooi_ref_name")]
    pub ooi_ref_name: String,
    #[serde(default = "default_indicator_category")]
    pub indicator_category: String,
    #[serde(default = "default_kpi_category")]
    pub kpi_category: String,
    /// Category for data items that only carry a URL to a value stored elsewhere
    #[serde(default = "default_reference_category")]
    pub reference_category: String,
    /// Upper bound on parent hops when walking towards the baseline
    #[serde(default = "default_max_parent_depth")]
    pub max_parent_depth: usize,
}

fn default_baseline_category() -> String {
    "Baseline".to_string()
}

fn default_ooi_ref_name() -> String {
    "OOI-worldstate-ref".to_string()
}

fn default_indicator_category() -> String {
    "Indicators".to_string()
}

fn default_kpi_category() -> String {
    "KPIs".to_string()
}

fn default_reference_category() -> String {
    "IndicatorRefs".to_string()
}

fn default_max_parent_depth() -> usize {
    256
}

impl Default for IcmmConfig {
    fn default() -> Self {
        Self {
            baseline_category: default_baseline_category(),
            ooi_ref_name: default_ooi_ref_name(),
            indicator_category: default_indicator_category(),
            kpi_category: default_kpi_category(),
            reference_category: default_reference_category(),
            max_parent_depth: default_max_parent_depth(),
        }
    }
}

/// OOI-WSR configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OoiConfig {
    /// Entity that mirrored indicator values are attached to
    #[serde(default = "default_indicator_entity_id")]
    pub indicator_entity_id: u64,
    #[serde(default)]
    pub properties: PropertyIds,
}

fn default_indicator_entity_id() -> u64 {
    1
}

impl Default for OoiConfig {
    fn default() -> Self {
        Self {
            indicator_entity_id: default_indicator_entity_id(),
            properties: PropertyIds::default(),
        }
    }
}

impl IndicatorsConfig {
    /// Overrides selected values from env vars; unparsable values are ignored.
    pub fn apply_env(mut self) -> Self {
        if let Ok(v) = std::env::var("INDICATORS_BIND") {
            if !v.is_empty() {
                self.server.bind = v;
            }
        }
        if let Ok(v) = std::env::var("INDICATORS_RECALCULATE") {
            if let Ok(b) = v.parse::<bool>() {
                self.server.recalculate = b;
            }
        }
        if let Ok(v) = std::env::var("INDICATORS_HTTP_TIMEOUT_SECONDS") {
            if let Ok(n) = v.parse::<u64>() {
                self.http.timeout_seconds = n;
            }
        }
        self
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<IndicatorsConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path))?;
    let config: IndicatorsConfig =
        toml::from_str(&contents).with_context(|| format!("Failed to parse config file {}", path))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_config() {
        let config = IndicatorsConfig::default();
        assert_eq!(config.server.bind, "0.0.0.0:5000");
        assert!(config.server.recalculate);
        assert_eq!(config.http.timeout_seconds, 30);
        assert_eq!(config.icmm.baseline_category, "Baseline");
        assert_eq!(config.icmm.ooi_ref_name, "OOI-worldstate-ref");
        assert_eq!(config.ooi.properties.life_indicator, 60);
        assert_eq!(config.ooi.properties.deaths_indicator, 61);
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [server]
            bind = "127.0.0.1:8080"
            recalculate = false

            [http]
            timeout_seconds = 5

            [icmm]
            baseline_category = "Root"

            [ooi]
            indicator_entity_id = 99

            [ooi.properties]
            patient_life = 7
            vehicle_capacity = 8
        "#;

        let config: IndicatorsConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert!(!config.server.recalculate);
        assert_eq!(config.http.timeout(), Duration::from_secs(5));
        assert_eq!(config.http.user_agent, "crisma-indicators/0.1");
        assert_eq!(config.icmm.baseline_category, "Root");
        assert_eq!(config.icmm.kpi_category, "KPIs");
        assert_eq!(config.ooi.indicator_entity_id, 99);
        assert_eq!(config.ooi.properties.patient_life, 7);
        assert_eq!(config.ooi.properties.vehicle_capacity, 8);
        assert_eq!(
            config.ooi.properties.patient_exposed,
            PropertyIds::default().patient_exposed
        );
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: IndicatorsConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:5000");
        assert_eq!(config.icmm.max_parent_depth, 256);
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nbind = \"0.0.0.0:9999\"").unwrap();

        let config = load_config(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:9999");
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config("/nonexistent/indicators.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/indicators.toml"));
    }

    #[test]
    fn test_env_overrides() {
        let _lock = ENV_LOCK.lock().unwrap();
        std::env::set_var("INDICATORS_BIND", "127.0.0.1:7000");
        std::env::set_var("INDICATORS_RECALCULATE", "false");
        std::env::set_var("INDICATORS_HTTP_TIMEOUT_SECONDS", "not-a-number");

        let config = IndicatorsConfig::default().apply_env();
        assert_eq!(config.server.bind, "127.0.0.1:7000");
        assert!(!config.server.recalculate);
        assert_eq!(config.http.timeout_seconds, 30);

        std::env::remove_var("INDICATORS_BIND");
        std::env::remove_var("INDICATORS_RECALCULATE");
        std::env::remove_var("INDICATORS_HTTP_TIMEOUT_SECONDS");
    }
}
