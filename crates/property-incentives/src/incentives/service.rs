use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use super::analysis::{Analysis, IncentiveAnalyzer};
use super::cache::{CacheStats, SharedCache, SweepHandle};
use super::error::IncentiveError;
use super::export::{export_analysis, ExportFormat};
use super::geo::{
    CachedLookup, DemographicsSource, GeoLocator, SeededDemographics, SiteResolver,
    StaticGeoLocator,
};
use super::programs::ProjectDetails;
use super::report::{generate_financial_report, FinancialReport};
use crate::config::IncentiveConfig;

/// Service composing the analyzer, the lookup cache, and recent analyses.
pub struct IncentiveService {
    analyzer: IncentiveAnalyzer,
    cache: SharedCache<CachedLookup>,
    config: IncentiveConfig,
    history: Mutex<VecDeque<Analysis>>,
    sweeper: Mutex<Option<SweepHandle>>,
}

impl IncentiveService {
    /// Offline collaborators: static geocoding and seeded demographics.
    pub fn new(config: IncentiveConfig) -> Self {
        let demographics = SeededDemographics::new(config.demographics_seed);
        Self::with_collaborators(config, Arc::new(StaticGeoLocator), Arc::new(demographics))
    }

    pub fn with_collaborators(
        config: IncentiveConfig,
        locator: Arc<dyn GeoLocator>,
        demographics: Arc<dyn DemographicsSource>,
    ) -> Self {
        let cache = SharedCache::new(&config.cache);
        let resolver = SiteResolver::new(locator, demographics, cache);
        let analyzer = IncentiveAnalyzer::standard(resolver, config.default_project_cost);
        Self::with_analyzer(config, analyzer)
    }

    pub fn with_analyzer(config: IncentiveConfig, analyzer: IncentiveAnalyzer) -> Self {
        let cache = analyzer.resolver().cache().clone();
        Self {
            analyzer,
            cache,
            config,
            history: Mutex::new(VecDeque::new()),
            sweeper: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &IncentiveConfig {
        &self.config
    }

    /// Start the periodic expiry sweep; a running sweep is replaced.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_cache_sweeper(&self) {
        let handle = self.cache.start_sweeper(self.config.cache.sweep_interval);
        if let Some(previous) = lock(&self.sweeper).replace(handle) {
            previous.stop();
        }
        info!(
            interval_secs = self.config.cache.sweep_interval.as_secs(),
            "lookup cache sweeper started"
        );
    }

    pub fn stop_cache_sweeper(&self) -> bool {
        match lock(&self.sweeper).take() {
            Some(handle) => {
                handle.stop();
                true
            }
            None => false,
        }
    }

    pub fn cache_sweeper_running(&self) -> bool {
        lock(&self.sweeper)
            .as_ref()
            .is_some_and(SweepHandle::is_running)
    }

    /// Analyze and record the result as the latest analysis.
    ///
    /// Nothing is recorded if the future is dropped before completion.
    pub async fn analyze_property(
        &self,
        address: &str,
        details: ProjectDetails,
    ) -> Result<Analysis, IncentiveError> {
        let analysis = self.analyzer.analyze_property(address, details).await?;

        let mut history = lock(&self.history);
        history.push_front(analysis.clone());
        history.truncate(self.config.history_limit.max(1));
        Ok(analysis)
    }

    pub fn latest(&self) -> Option<Analysis> {
        lock(&self.history).front().cloned()
    }

    /// Retained analyses, newest first.
    pub fn history(&self) -> Vec<Analysis> {
        lock(&self.history).iter().cloned().collect()
    }

    pub fn generate_financial_report(
        &self,
        details: Option<&ProjectDetails>,
    ) -> Result<FinancialReport, IncentiveError> {
        let analysis = self.latest().ok_or(IncentiveError::NoAnalysis)?;
        Ok(generate_financial_report(
            &analysis,
            details,
            self.config.default_project_cost,
        ))
    }

    pub fn export_analysis(&self, format: ExportFormat) -> Result<String, IncentiveError> {
        let analysis = self.latest().ok_or(IncentiveError::NoAnalysis)?;
        export_analysis(&analysis, format, self.config.default_project_cost)
    }

    pub fn clear_all_caches(&self) {
        let dropped = self.cache.len();
        self.cache.clear();
        info!(dropped, "lookup cache cleared");
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_require_a_prior_analysis() {
        let service = IncentiveService::new(IncentiveConfig::default());

        assert_eq!(
            service.generate_financial_report(None).unwrap_err(),
            IncentiveError::NoAnalysis
        );
        assert_eq!(
            service.export_analysis(ExportFormat::Csv).unwrap_err(),
            IncentiveError::NoAnalysis
        );
        assert!(service.history().is_empty());
    }

    #[tokio::test]
    async fn history_keeps_the_most_recent_analyses() {
        let config = IncentiveConfig {
            history_limit: 2,
            ..IncentiveConfig::default()
        };
        let service = IncentiveService::new(config);

        for address in [
            "10 Oak St, Austin, TX",
            "20 Pine Ave, Denver, CO",
            "30 Elm Blvd, Columbus, OH",
        ] {
            service
                .analyze_property(address, ProjectDetails::default())
                .await
                .expect("analysis completes");
        }

        let history = service.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].address, "30 Elm Blvd, Columbus, OH");
        assert_eq!(history[1].address, "20 Pine Ave, Denver, CO");
        assert_eq!(
            service.latest().map(|analysis| analysis.address),
            Some("30 Elm Blvd, Columbus, OH".to_string())
        );
    }

    #[tokio::test]
    async fn clearing_caches_drops_every_entry() {
        let service = IncentiveService::new(IncentiveConfig::default());
        service
            .analyze_property("42 Elm St, Austin, TX", ProjectDetails::default())
            .await
            .expect("analysis completes");
        assert!(service.cache_stats().size > 0);

        service.clear_all_caches();
        assert_eq!(service.cache_stats().size, 0);
    }

    #[tokio::test]
    async fn sweeper_lifecycle_is_explicit() {
        let service = IncentiveService::new(IncentiveConfig::default());
        assert!(!service.cache_sweeper_running());

        service.start_cache_sweeper();
        assert!(service.cache_sweeper_running());
        assert!(service.stop_cache_sweeper());
        assert!(!service.stop_cache_sweeper());
    }
}
