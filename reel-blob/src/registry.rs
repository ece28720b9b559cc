use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    JobDescriptor, JobId, UploadError, UploadJob, UploadJobStore, UploadResult, UploadRules,
};

/// Owns the lifecycle of upload job records
#[derive(Clone)]
pub struct UploadQueueRegistry {
    jobs: Arc<dyn UploadJobStore>,
    rules: UploadRules,
}

impl UploadQueueRegistry {
    pub fn new(jobs: Arc<dyn UploadJobStore>, rules: UploadRules) -> Self {
        Self { jobs, rules }
    }

    pub fn rules(&self) -> &UploadRules {
        &self.rules
    }

    /// Fetch the job for `descriptor`, creating it on first reference.
    ///
    /// The stored record wins over the descriptor when both exist.
    pub async fn get_or_create(&self, descriptor: &JobDescriptor) -> UploadResult<UploadJob> {
        self.rules.check(descriptor)?;
        if let Some(job) = self.jobs.get(&descriptor.id).await? {
            return Ok(job);
        }
        let job = self
            .jobs
            .create_if_absent(UploadJob::new(descriptor, Utc::now()))
            .await?;
        info!(
            job_id = %job.id,
            total_chunks = job.total_chunks,
            content_type = %job.content_type,
            "upload job created"
        );
        Ok(job)
    }

    /// Create a job ahead of its chunks; an existing job must declare the same shape
    pub async fn register(&self, descriptor: &JobDescriptor) -> UploadResult<UploadJob> {
        self.rules.check(descriptor)?;
        let job = self
            .jobs
            .create_if_absent(UploadJob::new(descriptor, Utc::now()))
            .await?;
        if job.total_chunks != descriptor.total_chunks || job.content_type != descriptor.content_type
        {
            return Err(UploadError::validation("Upload identifier already in use."));
        }
        debug!(job_id = %job.id, "upload job registered");
        Ok(job)
    }

    pub async fn get_by_id(&self, id: &JobId) -> UploadResult<Option<UploadJob>> {
        self.jobs.get(id).await
    }

    /// Whether `chunk_number` has been received; an unknown job has no chunks
    pub async fn has_chunk(
        &self,
        descriptor: &JobDescriptor,
        chunk_number: u32,
    ) -> UploadResult<bool> {
        Ok(self
            .jobs
            .get(&descriptor.id)
            .await?
            .map(|job| job.has_chunk(chunk_number))
            .unwrap_or(false))
    }

    pub async fn record_chunk_received(
        &self,
        id: &JobId,
        chunk_number: u32,
    ) -> UploadResult<UploadJob> {
        let job = self.jobs.add_chunk(id, chunk_number).await?;
        debug!(
            job_id = %id,
            chunk_number,
            received = job.received_count(),
            total = job.total_chunks,
            "chunk recorded"
        );
        Ok(job)
    }

    /// `true` only for the call that performed the transition
    pub async fn mark_finished(&self, id: &JobId) -> UploadResult<bool> {
        self.jobs.mark_finished(id).await
    }
}
