// Configuration (TOML file + environment overrides)
pub mod config;

// Domain errors
pub mod error;

// Shared HTTP client helpers
pub mod http;

// Wire types: OOI records, indicator values, KPIs
pub mod model;

// ICMM scenario / world-state tree client
pub mod icmm;

// OOI world-state data client
pub mod ooi;

// Indicator interface, registry and execute pipeline
pub mod process;

// Indicator algorithms
pub mod indicators;

// WPS process endpoints
pub mod wps;

pub use error::IndicatorError;
