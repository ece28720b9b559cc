use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

use crate::{
    BlobKeyStrategy, BlobStore, ChunkIngestor, ChunkResult, ChunkSubmission, FinalizeOutcome,
    Finalizer, JobDescriptor, JobId, UploadConfig, UploadCoordinator, UploadJob, UploadJobStore,
    UploadQueueRegistry, UploadResult,
};

/// Default upload coordinator wiring registry, ingestion and finalization
/// over one blob store and one job store
pub struct DefaultUploadCoordinator {
    registry: UploadQueueRegistry,
    ingestor: ChunkIngestor,
    finalizer: Finalizer,
    config: UploadConfig,
}

impl DefaultUploadCoordinator {
    pub fn new<S, J, K>(store: S, jobs: J, keys: K, config: UploadConfig) -> Self
    where
        S: BlobStore + 'static,
        J: UploadJobStore + 'static,
        K: BlobKeyStrategy + 'static,
    {
        Self::from_shared(Arc::new(store), Arc::new(jobs), Arc::new(keys), config)
    }

    /// Build from already shared stores
    pub fn from_shared(
        store: Arc<dyn BlobStore>,
        jobs: Arc<dyn UploadJobStore>,
        keys: Arc<dyn BlobKeyStrategy>,
        config: UploadConfig,
    ) -> Self {
        let registry = UploadQueueRegistry::new(jobs, config.upload_rules.clone());
        let finalizer = Finalizer::new(store.clone(), registry.clone(), keys.clone());
        let ingestor = ChunkIngestor::new(
            store,
            registry.clone(),
            keys,
            finalizer.clone(),
            config.registration,
        );
        Self {
            registry,
            ingestor,
            finalizer,
            config,
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }
}

#[async_trait]
impl UploadCoordinator for DefaultUploadCoordinator {
    #[instrument(skip_all, fields(job_id = %descriptor.id))]
    async fn begin(&self, descriptor: JobDescriptor) -> UploadResult<UploadJob> {
        self.registry.register(&descriptor).await
    }

    #[instrument(skip_all, fields(job_id = %descriptor.id, chunk = submission.chunk_number))]
    async fn ingest(
        &self,
        descriptor: JobDescriptor,
        submission: ChunkSubmission,
    ) -> UploadResult<ChunkResult> {
        self.ingestor.ingest(&descriptor, submission).await
    }

    async fn probe(&self, descriptor: &JobDescriptor, chunk_number: u32) -> UploadResult<bool> {
        if chunk_number < 1 {
            return Ok(false);
        }
        self.registry.has_chunk(descriptor, chunk_number).await
    }

    async fn get_queue_by_id(&self, id: &JobId) -> UploadResult<Option<UploadJob>> {
        self.registry.get_by_id(id).await
    }

    #[instrument(skip(self), fields(job_id = %id))]
    async fn finish(&self, id: &JobId) -> UploadResult<FinalizeOutcome> {
        self.finalizer.finalize(id).await
    }
}
