use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    BlobKeyStrategy, BlobStore, FinalizeOutcome, JobId, UploadError, UploadJob, UploadQueueRegistry,
    UploadReceipt, UploadResult,
};

/// Composes a complete job's chunks into one object, exactly once.
///
/// Attempts for the same job are serialized by a per-job async mutex; the
/// store's compare-and-set on `finished` decides races across processes.
#[derive(Clone)]
pub struct Finalizer {
    store: Arc<dyn BlobStore>,
    registry: UploadQueueRegistry,
    keys: Arc<dyn BlobKeyStrategy>,
    guards: Arc<DashMap<JobId, Arc<Mutex<()>>>>,
}

impl Finalizer {
    pub fn new(
        store: Arc<dyn BlobStore>,
        registry: UploadQueueRegistry,
        keys: Arc<dyn BlobKeyStrategy>,
    ) -> Self {
        Self {
            store,
            registry,
            keys,
            guards: Arc::new(DashMap::new()),
        }
    }

    pub async fn finalize(&self, id: &JobId) -> UploadResult<FinalizeOutcome> {
        let slot = GuardSlot::acquire(&self.guards, id);
        let _held = slot.lock.lock().await;
        self.finalize_locked(id).await
    }

    async fn finalize_locked(&self, id: &JobId) -> UploadResult<FinalizeOutcome> {
        let job = self
            .registry
            .get_by_id(id)
            .await?
            .ok_or_else(|| UploadError::not_found(id.as_str()))?;

        if job.finished {
            debug!(job_id = %id, "upload already finalized");
            return Ok(FinalizeOutcome::AlreadyFinalized);
        }
        if !job.is_complete() {
            return Err(UploadError::validation("Not done uploading."));
        }

        let chunk_keys: Vec<String> = (1..=job.total_chunks)
            .map(|n| self.keys.chunk_key(&job.storage_location, n))
            .collect();
        let dest = self.keys.composed_key(&job.storage_location);

        let composed = match self.store.compose(&chunk_keys, &dest).await {
            Ok(composed) => composed,
            Err(e) => return self.failed(id, &dest, "compose failed", e).await,
        };
        if let Err(e) = self.store.set_content_type(&dest, &job.content_type).await {
            return self
                .failed(id, &dest, "failed to tag composed object", e)
                .await;
        }

        let won = self.registry.mark_finished(id).await.map_err(|e| {
            error!(job_id = %id, error = %e, "failed to mark upload finished");
            UploadError::finalization(id.as_str(), e)
        })?;
        if !won {
            info!(job_id = %id, "finalization won elsewhere; skipping cleanup");
            return Ok(FinalizeOutcome::AlreadyFinalized);
        }

        let cleanup_failures = self.cleanup_chunks(&job, chunk_keys).await;

        info!(
            job_id = %id,
            key = %dest,
            size_bytes = composed.size_bytes,
            chunks = job.total_chunks,
            "upload finalized"
        );

        let receipt = UploadReceipt::new(job.id.clone(), dest, composed.size_bytes)
            .with_content_type(job.content_type.clone())
            .with_etag(composed.etag)
            .with_cleanup_failures(cleanup_failures);
        Ok(FinalizeOutcome::Finalized(receipt))
    }

    /// Another process may have finished the job and removed the chunks
    /// underneath us; that is a lost race, not a failure.
    async fn failed(
        &self,
        id: &JobId,
        dest: &str,
        what: &'static str,
        cause: UploadError,
    ) -> UploadResult<FinalizeOutcome> {
        if let Ok(Some(job)) = self.registry.get_by_id(id).await {
            if job.finished {
                info!(job_id = %id, error = %cause, "finalization won elsewhere");
                return Ok(FinalizeOutcome::AlreadyFinalized);
            }
        }
        error!(job_id = %id, key = %dest, error = %cause, "{}", what);
        Err(UploadError::finalization(id.as_str(), cause))
    }

    /// Best-effort delete of every chunk object; returns the keys that stayed
    async fn cleanup_chunks(&self, job: &UploadJob, chunk_keys: Vec<String>) -> Vec<String> {
        let mut failures = Vec::new();
        for key in chunk_keys {
            if let Err(e) = self.store.delete(&key).await {
                warn!(job_id = %job.id, key = %key, error = %e, "failed to delete chunk");
                failures.push(key);
            }
        }
        failures
    }
}

/// Per-job lock taken from the guard map. Dropping it, including when the
/// finalize future is cancelled, removes the map entry once no other caller
/// holds or awaits the same lock.
struct GuardSlot<'a> {
    guards: &'a DashMap<JobId, Arc<Mutex<()>>>,
    id: &'a JobId,
    lock: Arc<Mutex<()>>,
}

impl<'a> GuardSlot<'a> {
    fn acquire(guards: &'a DashMap<JobId, Arc<Mutex<()>>>, id: &'a JobId) -> Self {
        let lock = guards
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        Self { guards, id, lock }
    }
}

impl Drop for GuardSlot<'_> {
    fn drop(&mut self) {
        // Map entry plus ours: nobody else is waiting.
        self.guards
            .remove_if(self.id, |_, lock| Arc::strong_count(lock) <= 2);
    }
}
