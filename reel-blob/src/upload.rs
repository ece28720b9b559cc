use async_trait::async_trait;

use crate::{
    ChunkResult, ChunkSubmission, FinalizeOutcome, JobDescriptor, JobId, UploadJob, UploadResult,
};

/// Coordinates chunked resumable uploads
#[async_trait]
pub trait UploadCoordinator: Send + Sync {
    /// Register an upload job ahead of its first chunk
    async fn begin(&self, descriptor: JobDescriptor) -> UploadResult<UploadJob>;

    /// Accept one chunk; finalizes the job when it was the last missing chunk
    async fn ingest(
        &self,
        descriptor: JobDescriptor,
        submission: ChunkSubmission,
    ) -> UploadResult<ChunkResult>;

    /// Whether a chunk has already been received; never creates a job
    async fn probe(&self, descriptor: &JobDescriptor, chunk_number: u32) -> UploadResult<bool>;

    /// Look up a job record
    async fn get_queue_by_id(&self, id: &JobId) -> UploadResult<Option<UploadJob>>;

    /// Force finalization of a complete job
    async fn finish(&self, id: &JobId) -> UploadResult<FinalizeOutcome>;
}

/// Storage for upload job records.
///
/// Every operation is atomic for a single record; nothing spans records.
#[async_trait]
pub trait UploadJobStore: Send + Sync {
    async fn get(&self, id: &JobId) -> UploadResult<Option<UploadJob>>;

    /// Insert `job` unless a record with its id exists; returns the stored record
    async fn create_if_absent(&self, job: UploadJob) -> UploadResult<UploadJob>;

    /// Set-union `chunk_number` into the received chunks; returns the updated record
    async fn add_chunk(&self, id: &JobId, chunk_number: u32) -> UploadResult<UploadJob>;

    /// Flip `finished` from false to true; `true` only for the caller that flipped it
    async fn mark_finished(&self, id: &JobId) -> UploadResult<bool>;
}
