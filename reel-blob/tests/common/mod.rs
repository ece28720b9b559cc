#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use reel_blob::{
    BlobStore, ByteStream, DefaultKeyStrategy, DefaultUploadCoordinator, GetResult, JobDescriptor,
    JobId, MemoryBlobStore, MemoryUploadJobStore, ObjectHead, PutResult, UploadConfig,
    UploadError, UploadResult,
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Memory store with switchable failures and a compose counter
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryBlobStore,
    pub compose_calls: AtomicU32,
    pub compose_failures_left: AtomicU32,
    pub fail_deletes: AtomicBool,
    pub compose_delay_ms: AtomicU32,
    pub put_delay_ms: AtomicU32,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn composes(&self) -> u32 {
        self.compose_calls.load(Ordering::SeqCst)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("injected failure: {0}")]
pub struct Injected(pub &'static str);

#[async_trait]
impl BlobStore for FlakyStore {
    async fn put(
        &self,
        key: &str,
        content_type: Option<&str>,
        stream: ByteStream,
    ) -> UploadResult<PutResult> {
        let delay = self.put_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        self.inner.put(key, content_type, stream).await
    }

    async fn get(&self, key: &str) -> UploadResult<GetResult> {
        self.inner.get(key).await
    }

    async fn head(&self, key: &str) -> UploadResult<Option<ObjectHead>> {
        self.inner.head(key).await
    }

    async fn compose(&self, sources: &[String], dest: &str) -> UploadResult<PutResult> {
        self.compose_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.compose_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        let failing = self
            .compose_failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(UploadError::backend(Injected("compose")));
        }
        self.inner.compose(sources, dest).await
    }

    async fn set_content_type(&self, key: &str, content_type: &str) -> UploadResult<()> {
        self.inner.set_content_type(key, content_type).await
    }

    async fn delete(&self, key: &str) -> UploadResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(UploadError::backend(Injected("delete")));
        }
        self.inner.delete(key).await
    }
}

pub struct Harness {
    pub store: Arc<FlakyStore>,
    pub jobs: MemoryUploadJobStore,
    pub coordinator: Arc<DefaultUploadCoordinator>,
}

pub fn harness(config: UploadConfig) -> Harness {
    let store = FlakyStore::new();
    let jobs = MemoryUploadJobStore::new();
    let coordinator = DefaultUploadCoordinator::from_shared(
        store.clone(),
        Arc::new(jobs.clone()),
        Arc::new(DefaultKeyStrategy::default()),
        config,
    );
    Harness {
        store,
        jobs,
        coordinator: Arc::new(coordinator),
    }
}

pub fn id(raw: &str) -> JobId {
    JobId::parse(raw).unwrap()
}

pub fn descriptor(raw: &str, total_chunks: u32) -> JobDescriptor {
    JobDescriptor::new(id(raw), total_chunks, "f.mp4", "video/mp4")
}

pub fn body(data: &[u8]) -> ByteStream {
    let data = Bytes::copy_from_slice(data);
    Box::pin(futures::stream::once(async move { Ok(data) }))
}

pub fn aborted_body() -> ByteStream {
    Box::pin(futures::stream::iter(vec![
        Ok(Bytes::from_static(b"half")),
        Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionAborted,
            "client went away",
        )),
    ]))
}
