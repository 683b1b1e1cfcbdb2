//! Indicator registry - the processes a server exposes.

use super::Indicator;
use crate::indicators::{
    Deaths, EffectiveResponse, Evacuation, Improved, LegacyDeaths, LegacyImproved, LifeStatus,
    PatientHealth, ResourceDepleted, SeriouslyDeteriorated, UnusedResources,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Returns all available indicators.
pub fn default_indicators() -> Vec<Arc<dyn Indicator>> {
    vec![
        Arc::new(Deaths),
        Arc::new(EffectiveResponse),
        Arc::new(Evacuation),
        Arc::new(Improved),
        Arc::new(PatientHealth),
        Arc::new(ResourceDepleted),
        Arc::new(UnusedResources),
        Arc::new(LifeStatus),
        Arc::new(LegacyDeaths),
        Arc::new(LegacyImproved),
        Arc::new(SeriouslyDeteriorated),
    ]
}

/// Lookup of indicators by process identifier. Iteration follows
/// registration order; a repeated identifier replaces the earlier entry in place.
#[derive(Clone, Default)]
pub struct IndicatorRegistry {
    indicators: Vec<Arc<dyn Indicator>>,
    index: HashMap<String, usize>,
}

impl IndicatorRegistry {
    pub fn new(indicators: Vec<Arc<dyn Indicator>>) -> Self {
        let mut registry = Self::default();
        for indicator in indicators {
            registry.register(indicator);
        }
        registry
    }

    pub fn register(&mut self, indicator: Arc<dyn Indicator>) {
        match self.index.get(indicator.identifier()) {
            Some(&pos) => self.indicators[pos] = indicator,
            None => {
                self.index
                    .insert(indicator.identifier().to_string(), self.indicators.len());
                self.indicators.push(indicator);
            }
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(default_indicators())
    }

    pub fn get(&self, identifier: &str) -> Option<Arc<dyn Indicator>> {
        self.index
            .get(identifier)
            .and_then(|&pos| self.indicators.get(pos))
            .cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Indicator>> {
        self.indicators.iter()
    }

    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }
}
