use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::store::collect_stream;
use crate::{BlobStore, ByteStream, GetResult, ObjectHead, PutResult, UploadError, UploadResult};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
}

/// In-process blob store, for tests and single-node development
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.read().contains_key(key)
    }

    /// Raw bytes of an object, if present
    pub fn bytes(&self, key: &str) -> Option<Bytes> {
        self.objects.read().get(key).map(|o| o.data.clone())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        key: &str,
        content_type: Option<&str>,
        stream: ByteStream,
    ) -> UploadResult<PutResult> {
        // Nothing is visible at `key` until the whole body arrived.
        let data = collect_stream(stream).await?;
        let size_bytes = data.len() as u64;
        self.objects.write().insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.map(str::to_string),
            },
        );
        Ok(PutResult {
            etag: None,
            size_bytes,
        })
    }

    async fn get(&self, key: &str) -> UploadResult<GetResult> {
        let object = self
            .objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| UploadError::not_found(key))?;
        let size_bytes = object.data.len() as u64;
        let data = object.data;
        Ok(GetResult {
            stream: Box::pin(futures::stream::once(async move { Ok(data) })),
            size_bytes,
            content_type: object.content_type,
        })
    }

    async fn head(&self, key: &str) -> UploadResult<Option<ObjectHead>> {
        Ok(self.objects.read().get(key).map(|o| ObjectHead {
            size_bytes: o.data.len() as u64,
            content_type: o.content_type.clone(),
            etag: None,
        }))
    }

    async fn compose(&self, sources: &[String], dest: &str) -> UploadResult<PutResult> {
        let mut objects = self.objects.write();
        let mut buf = BytesMut::new();
        for key in sources {
            let part = objects
                .get(key)
                .ok_or_else(|| UploadError::not_found(key.as_str()))?;
            buf.extend_from_slice(&part.data);
        }
        let data = buf.freeze();
        let size_bytes = data.len() as u64;
        objects.insert(
            dest.to_string(),
            StoredObject {
                data,
                content_type: None,
            },
        );
        Ok(PutResult {
            etag: None,
            size_bytes,
        })
    }

    async fn set_content_type(&self, key: &str, content_type: &str) -> UploadResult<()> {
        let mut objects = self.objects.write();
        let object = objects
            .get_mut(key)
            .ok_or_else(|| UploadError::not_found(key))?;
        object.content_type = Some(content_type.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> UploadResult<()> {
        self.objects.write().remove(key);
        Ok(())
    }
}
