use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    BlobKeyStrategy, BlobStore, ChunkResult, ChunkSubmission, FinalizeOutcome, Finalizer,
    JobDescriptor, Registration, UploadError, UploadJob, UploadQueueRegistry, UploadResult,
};

/// Admits one chunk at a time: validate, store, record, finalize when complete
#[derive(Clone)]
pub struct ChunkIngestor {
    store: Arc<dyn BlobStore>,
    registry: UploadQueueRegistry,
    keys: Arc<dyn BlobKeyStrategy>,
    finalizer: Finalizer,
    registration: Registration,
}

impl ChunkIngestor {
    pub fn new(
        store: Arc<dyn BlobStore>,
        registry: UploadQueueRegistry,
        keys: Arc<dyn BlobKeyStrategy>,
        finalizer: Finalizer,
        registration: Registration,
    ) -> Self {
        Self {
            store,
            registry,
            keys,
            finalizer,
            registration,
        }
    }

    pub async fn ingest(
        &self,
        descriptor: &JobDescriptor,
        submission: ChunkSubmission,
    ) -> UploadResult<ChunkResult> {
        let ChunkSubmission {
            job_id,
            chunk_number,
            body,
        } = submission;

        if job_id != descriptor.id {
            return Err(UploadError::validation("Upload identifier mismatch."));
        }
        if chunk_number < 1 {
            return Err(UploadError::validation("Invalid chunk number."));
        }
        self.registry.rules().check(descriptor)?;

        let job = self.resolve(descriptor).await?;
        if job.finished {
            return Err(UploadError::already_finished(job.id.as_str()));
        }
        if chunk_number > job.total_chunks {
            return Err(UploadError::QueueMismatch {
                chunk_number,
                total_chunks: job.total_chunks,
            });
        }

        let key = self.keys.chunk_key(&job.storage_location, chunk_number);
        let written = self.store.put(&key, None, body).await.map_err(|e| {
            warn!(job_id = %job.id, key = %key, error = %e, "chunk write failed");
            UploadError::upload_io(key.as_str(), e)
        })?;
        debug!(job_id = %job.id, chunk_number, size_bytes = written.size_bytes, "chunk stored");

        // Completeness comes from the record the store returns after the union.
        let job = self
            .registry
            .record_chunk_received(&job.id, chunk_number)
            .await?;
        if job.finished {
            // Written after the job was finalized and its chunks removed.
            if let Err(e) = self.store.delete(&key).await {
                warn!(job_id = %job.id, key = %key, error = %e, "failed to delete late chunk");
            }
            return Err(UploadError::already_finished(job.id.as_str()));
        }
        if !job.is_complete() {
            return Ok(ChunkResult::Partial {
                chunks_received: job.received_count(),
                total_chunks: job.total_chunks,
            });
        }

        // Losing the finalize race still leaves the job complete.
        if let FinalizeOutcome::AlreadyFinalized = self.finalizer.finalize(&job.id).await? {
            debug!(job_id = %job.id, "completion handled by a concurrent chunk");
        }
        let job = self.registry.get_by_id(&job.id).await?.unwrap_or(job);
        Ok(ChunkResult::Complete { job })
    }

    async fn resolve(&self, descriptor: &JobDescriptor) -> UploadResult<UploadJob> {
        match self.registration {
            Registration::Lazy => self.registry.get_or_create(descriptor).await,
            Registration::Explicit => self
                .registry
                .get_by_id(&descriptor.id)
                .await?
                .ok_or_else(|| UploadError::not_found(descriptor.id.as_str())),
        }
    }
}
