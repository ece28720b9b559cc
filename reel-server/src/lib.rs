//! Runnable upload server.
//!
//! Reads [`Settings`] from `REEL__*` variables, opens the configured blob and
//! job stores and mounts the upload routes from `reel-axum` on top of them.

pub mod config;

use std::sync::Arc;

use anyhow::Result;
use reel_axum::{ReelAxumApp, ReelAxumState};
use reel_blob::{
    BlobKeyStrategy, BlobStore, DefaultKeyStrategy, DefaultUploadCoordinator, FsBlobStore,
    FsUploadJobStore, MemoryBlobStore, MemoryUploadJobStore, S3CompatibleStore, UploadJobStore,
};
use tracing::info;

pub use config::{JobsBackend, Settings, StorageBackend, DEFAULT_LOG_FILTER, ENV_PREFIX};

pub async fn build(settings: &Settings) -> Result<ReelAxumApp> {
    let store = blob_store(&settings.storage).await?;
    let jobs = job_store(&settings.jobs).await?;
    let keys: Arc<dyn BlobKeyStrategy> =
        Arc::new(DefaultKeyStrategy::new(settings.key_prefix.as_str()));

    info!(
        storage = ?settings.storage,
        jobs = ?settings.jobs,
        registration = ?settings.upload.registration,
        max_total_chunks = settings.upload.upload_rules.max_total_chunks,
        "upload coordinator configured"
    );

    let coordinator =
        DefaultUploadCoordinator::from_shared(store, jobs, keys, settings.upload.clone());
    let state = ReelAxumState::new(Arc::new(coordinator))
        .with_auth_token(settings.auth_token.as_deref());

    Ok(ReelAxumApp::new(state, settings.body_limit_bytes))
}

async fn blob_store(backend: &StorageBackend) -> Result<Arc<dyn BlobStore>> {
    Ok(match backend {
        StorageBackend::Memory => Arc::new(MemoryBlobStore::new()),
        StorageBackend::Fs { root } => Arc::new(FsBlobStore::open(root).await?),
        StorageBackend::S3 { bucket } => {
            Arc::new(S3CompatibleStore::from_env(bucket.clone()).await?)
        }
    })
}

async fn job_store(backend: &JobsBackend) -> Result<Arc<dyn UploadJobStore>> {
    Ok(match backend {
        JobsBackend::Memory => Arc::new(MemoryUploadJobStore::new()),
        JobsBackend::Fs { root } => Arc::new(FsUploadJobStore::open(root).await?),
    })
}
