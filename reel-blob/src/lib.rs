//! # reel-blob: chunked resumable upload coordination
//!
//! `reel-blob` accepts large files as numbered chunks arriving over
//! independent requests (the Resumable.js convention), tracks which chunks
//! have arrived, and composes them into one object exactly once when the last
//! one lands.
//!
//! ## Quick Start
//!
//! ```rust
//! use reel_blob::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> UploadResult<()> {
//! let blobs = MemoryBlobStore::new();
//! let coordinator = DefaultUploadCoordinator::new(
//!     blobs.clone(),
//!     MemoryUploadJobStore::new(),
//!     DefaultKeyStrategy::default(),
//!     UploadConfig::default(),
//! );
//!
//! let id = JobId::parse("job1")?;
//! let descriptor = JobDescriptor::new(id.clone(), 1, "clip.mp4", "video/mp4");
//! let body: ByteStream = Box::pin(futures::stream::once(async {
//!     Ok(bytes::Bytes::from_static(b"frames"))
//! }));
//!
//! let result = coordinator
//!     .ingest(descriptor, ChunkSubmission::new(id, 1, body))
//!     .await?;
//! assert!(result.is_complete());
//! assert!(blobs.contains("uploads/job1/complete"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │   DefaultUploadCoordinator   │  ← begin / ingest / probe / finish
//! ├───────────────┬──────────────┤
//! │ ChunkIngestor │  Finalizer   │  ← admission, compose + cleanup
//! ├───────────────┴──────────────┤
//! │     UploadQueueRegistry      │  ← job record lifecycle
//! ├──────────────┬───────────────┤
//! │  BlobStore   │ UploadJobStore│  ← storage adapters
//! └──────────────┴───────────────┘
//! ```

mod config;
mod coordinator;
mod error;
mod finalizer;
pub mod fs_store;
mod ingest;
mod job_store;
pub mod memory_store;
mod receipt;
mod registry;
mod s3_store;
pub mod store;
mod types;
mod upload;

pub use config::{Registration, UploadConfig, UploadRules};
pub use coordinator::DefaultUploadCoordinator;
pub use error::{UploadError, UploadResult};
pub use finalizer::Finalizer;
pub use fs_store::FsBlobStore;
pub use ingest::ChunkIngestor;
pub use job_store::{FsUploadJobStore, MemoryUploadJobStore};
pub use memory_store::MemoryBlobStore;
pub use receipt::UploadReceipt;
pub use registry::UploadQueueRegistry;
pub use s3_store::{S3CompatibleStore, S3Config, MIN_COMPOSE_PART_BYTES};
pub use store::{BlobKeyStrategy, BlobStore, DefaultKeyStrategy, GetResult, ObjectHead, PutResult};
pub use types::{
    ByteStream, ChunkResult, ChunkSubmission, FinalizeOutcome, JobDescriptor, JobId, UploadJob,
    MAX_JOB_ID_LEN,
};
pub use upload::{UploadCoordinator, UploadJobStore};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BlobStore, ByteStream, ChunkResult, ChunkSubmission, DefaultKeyStrategy,
        DefaultUploadCoordinator, FinalizeOutcome, JobDescriptor, JobId, MemoryBlobStore,
        MemoryUploadJobStore, UploadConfig, UploadCoordinator, UploadError, UploadJob,
        UploadResult,
    };
}
