//! Static adapter registry.
//!
//! Built once at startup from the compile-time adapter list; never
//! mutated afterwards.

use std::sync::Arc;

use super::adapter::SourceAdapter;
use super::sources;
use crate::config::Config;
use crate::domain::SourceId;

/// The set of registered source adapters.
pub struct SourceRegistry {
    adapters: Vec<Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    /// Builds the production adapter set from configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::with_adapters(vec![
            Arc::new(sources::sms::SmsAdapter::new()),
            Arc::new(sources::quake_notice::QuakeNoticeAdapter::new()),
            Arc::new(sources::pews::PewsAdapter::new(config.pews_sim.clone())),
            Arc::new(sources::weather_alert::WeatherAlertAdapter::new(
                config.kma_api_key.clone(),
            )),
            Arc::new(sources::forest_fire::ForestFireAdapter::new()),
        ])
    }

    /// Builds a registry from an explicit adapter list (tests).
    #[must_use]
    pub fn with_adapters(adapters: Vec<Arc<dyn SourceAdapter>>) -> Self {
        Self { adapters }
    }

    /// All registered adapters, in registration order.
    #[must_use]
    pub fn list(&self) -> &[Arc<dyn SourceAdapter>] {
        &self.adapters
    }

    /// The adapter for a source, if registered.
    #[must_use]
    pub fn get(&self, source_id: SourceId) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters
            .iter()
            .find(|adapter| adapter.source_id() == source_id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn production_registry() -> SourceRegistry {
        let config = crate::config::Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://localhost/vigil".to_string()),
            "REDIS_URL" => Some("redis://localhost".to_string()),
            _ => None,
        })
        .unwrap_or_else(|_| unreachable!("minimal config loads"));
        SourceRegistry::from_config(&config)
    }

    #[test]
    fn every_source_has_exactly_one_adapter() {
        let registry = production_registry();
        assert_eq!(registry.list().len(), SourceId::ALL.len());
        for source in SourceId::ALL {
            assert!(registry.get(source).is_some(), "missing adapter for {source}");
        }
    }

    #[test]
    fn adapters_report_positive_intervals() {
        let registry = production_registry();
        for adapter in registry.list() {
            assert!(adapter.poll_interval_secs() > 0);
        }
    }
}
