use std::sync::Arc;
use tracing::warn;

use super::rate_limit::RateLimits;
use crate::admission::AdmissionGate;
use crate::config::Config;
use crate::extractor::{Extractor, PolicyLimits, YtDlpExtractor};
use crate::observability::Metrics;
use crate::orchestrator::DownloadOrchestrator;
use crate::scratch::{ScratchError, TempStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<DownloadOrchestrator>,
    pub rate_limits: Option<Arc<RateLimits>>,
}

impl AppState {
    pub fn new(config: Config, orchestrator: DownloadOrchestrator) -> Self {
        let rate_limits = RateLimits::from_config(&config.rate_limit).map(Arc::new);

        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            rate_limits,
        }
    }

    /// Wire the production components described by `config`
    pub async fn from_config(config: Config) -> Result<Self, ScratchError> {
        let extractor: Arc<dyn Extractor> = Arc::new(YtDlpExtractor::new(config.extractor.clone()));
        Self::with_extractor(config, extractor).await
    }

    /// Same as [`AppState::from_config`] with a caller-supplied extractor
    pub async fn with_extractor(
        config: Config,
        extractor: Arc<dyn Extractor>,
    ) -> Result<Self, ScratchError> {
        let metrics = Arc::new(Metrics::new());

        let store = TempStore::open(
            &config.scratch.dir,
            config.scratch.cleanup_delay(),
            Arc::clone(&metrics),
        )
        .await?;

        if config.scratch.purge_on_start {
            if let Err(e) = store.purge_stale().await {
                warn!(error = %e, "Could not purge stale scratch files");
            }
        }

        let orchestrator = DownloadOrchestrator::builder()
            .gate(Arc::new(AdmissionGate::new(
                config.limits.max_concurrent_downloads,
            )))
            .extractor(extractor)
            .store(Arc::new(store))
            .limits(PolicyLimits::from_config(&config.limits))
            .metrics(metrics)
            .build();

        Ok(Self::new(config, orchestrator))
    }
}
