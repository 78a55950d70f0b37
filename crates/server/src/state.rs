use std::sync::Arc;

use modkiln_core::{
    AdmissionController, Config, JobStore, PipelineCoordinator, ResultAggregator, SanitizedConfig,
    UploadAssembler,
};

/// Shared application state
pub struct AppState {
    config: Config,
    uploads: Arc<UploadAssembler>,
    jobs: Arc<dyn JobStore>,
    aggregator: Arc<ResultAggregator>,
    coordinator: Arc<PipelineCoordinator>,
    limiter: Arc<AdmissionController>,
}

impl AppState {
    pub fn new(
        config: Config,
        uploads: Arc<UploadAssembler>,
        jobs: Arc<dyn JobStore>,
        aggregator: Arc<ResultAggregator>,
        coordinator: Arc<PipelineCoordinator>,
        limiter: Arc<AdmissionController>,
    ) -> Self {
        Self {
            config,
            uploads,
            jobs,
            aggregator,
            coordinator,
            limiter,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn uploads(&self) -> &UploadAssembler {
        self.uploads.as_ref()
    }

    pub fn jobs(&self) -> &dyn JobStore {
        self.jobs.as_ref()
    }

    pub fn aggregator(&self) -> &ResultAggregator {
        self.aggregator.as_ref()
    }

    pub fn coordinator(&self) -> &PipelineCoordinator {
        self.coordinator.as_ref()
    }

    pub fn limiter(&self) -> &AdmissionController {
        self.limiter.as_ref()
    }
}
