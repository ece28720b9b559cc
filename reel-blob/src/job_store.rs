use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::{JobId, UploadError, UploadJob, UploadJobStore, UploadResult};

/// In-memory job store
#[derive(Clone, Default)]
pub struct MemoryUploadJobStore {
    jobs: Arc<Mutex<HashMap<JobId, UploadJob>>>,
}

impl MemoryUploadJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// Run `f` against a stored job under the lock
    fn with_job_mut<F, R>(&self, id: &JobId, f: F) -> UploadResult<R>
    where
        F: FnOnce(&mut UploadJob) -> R,
    {
        let mut jobs = self.jobs.lock();
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| UploadError::not_found(id.as_str()))?;
        Ok(f(job))
    }
}

#[async_trait]
impl UploadJobStore for MemoryUploadJobStore {
    async fn get(&self, id: &JobId) -> UploadResult<Option<UploadJob>> {
        Ok(self.jobs.lock().get(id).cloned())
    }

    async fn create_if_absent(&self, job: UploadJob) -> UploadResult<UploadJob> {
        let mut jobs = self.jobs.lock();
        Ok(jobs.entry(job.id.clone()).or_insert(job).clone())
    }

    async fn add_chunk(&self, id: &JobId, chunk_number: u32) -> UploadResult<UploadJob> {
        self.with_job_mut(id, |job| {
            job.received_chunks.insert(chunk_number);
            job.clone()
        })
    }

    async fn mark_finished(&self, id: &JobId) -> UploadResult<bool> {
        self.with_job_mut(id, |job| {
            if job.finished {
                false
            } else {
                job.finished = true;
                true
            }
        })
    }
}

/// Job store keeping one JSON document per job under a directory.
///
/// Read-modify-write cycles are serialized by an async mutex, so the store is
/// only atomic within one process.
#[derive(Clone)]
pub struct FsUploadJobStore {
    root: PathBuf,
    write_lock: Arc<tokio::sync::Mutex<()>>,
}

impl FsUploadJobStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub async fn open<P: AsRef<Path>>(root: P) -> UploadResult<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    fn doc_path(&self, id: &JobId) -> PathBuf {
        self.root.join(format!("{}.json", id.as_str()))
    }

    async fn read_doc(&self, id: &JobId) -> UploadResult<Option<UploadJob>> {
        match tokio::fs::read(self.doc_path(id)).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_doc(&self, job: &UploadJob) -> UploadResult<()> {
        let path = self.doc_path(&job.id);
        let tmp = self
            .root
            .join(format!(".{}.{}.tmp", job.id.as_str(), uuid::Uuid::new_v4()));
        let raw = serde_json::to_vec_pretty(job)?;
        tokio::fs::write(&tmp, raw).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!(job_id = %job.id, path = %path.display(), "wrote job document");
        Ok(())
    }
}

#[async_trait]
impl UploadJobStore for FsUploadJobStore {
    async fn get(&self, id: &JobId) -> UploadResult<Option<UploadJob>> {
        self.read_doc(id).await
    }

    async fn create_if_absent(&self, job: UploadJob) -> UploadResult<UploadJob> {
        let _guard = self.write_lock.lock().await;
        if let Some(existing) = self.read_doc(&job.id).await? {
            return Ok(existing);
        }
        self.write_doc(&job).await?;
        Ok(job)
    }

    async fn add_chunk(&self, id: &JobId, chunk_number: u32) -> UploadResult<UploadJob> {
        let _guard = self.write_lock.lock().await;
        let mut job = self
            .read_doc(id)
            .await?
            .ok_or_else(|| UploadError::not_found(id.as_str()))?;
        if job.received_chunks.insert(chunk_number) {
            self.write_doc(&job).await?;
        }
        Ok(job)
    }

    async fn mark_finished(&self, id: &JobId) -> UploadResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut job = self
            .read_doc(id)
            .await?
            .ok_or_else(|| UploadError::not_found(id.as_str()))?;
        if job.finished {
            return Ok(false);
        }
        job.finished = true;
        self.write_doc(&job).await?;
        Ok(true)
    }
}
