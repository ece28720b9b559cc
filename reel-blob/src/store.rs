use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;

use crate::{ByteStream, UploadResult};

/// Blob storage operations the coordinator needs from a backend
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a blob from a stream; an existing object at `key` is replaced
    async fn put(
        &self,
        key: &str,
        content_type: Option<&str>,
        stream: ByteStream,
    ) -> UploadResult<PutResult>;

    /// Get a blob as a stream
    async fn get(&self, key: &str) -> UploadResult<GetResult>;

    /// Get blob metadata without content; `None` when absent
    async fn head(&self, key: &str) -> UploadResult<Option<ObjectHead>>;

    /// Concatenate `sources` in order into `dest`, replacing any prior object
    async fn compose(&self, sources: &[String], dest: &str) -> UploadResult<PutResult>;

    /// Tag an existing object with a content type
    async fn set_content_type(&self, key: &str, content_type: &str) -> UploadResult<()>;

    /// Delete a blob; deleting a missing key is not an error
    async fn delete(&self, key: &str) -> UploadResult<()>;
}

/// Result of a successful put or compose
#[derive(Debug, Clone)]
pub struct PutResult {
    pub etag: Option<String>,
    pub size_bytes: u64,
}

/// Result of a get operation
pub struct GetResult {
    pub stream: ByteStream,
    pub size_bytes: u64,
    pub content_type: Option<String>,
}

/// Metadata about a blob
#[derive(Debug, Clone)]
pub struct ObjectHead {
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

/// Strategy for naming chunk and composed objects
pub trait BlobKeyStrategy: Send + Sync {
    /// Key of chunk `chunk_number` under a job's storage location
    fn chunk_key(&self, storage_location: &str, chunk_number: u32) -> String;

    /// Key of the composed object for a job
    fn composed_key(&self, storage_location: &str) -> String;
}

/// Default key strategy: `{prefix}/{location}/{n}` and `{prefix}/{location}/complete`
#[derive(Debug, Clone)]
pub struct DefaultKeyStrategy {
    prefix: String,
}

impl DefaultKeyStrategy {
    pub fn new<S: Into<String>>(prefix: S) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: prefix.trim_matches('/').to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn join(&self, storage_location: &str, leaf: &str) -> String {
        if self.prefix.is_empty() {
            format!("{}/{}", storage_location, leaf)
        } else {
            format!("{}/{}/{}", self.prefix, storage_location, leaf)
        }
    }
}

impl Default for DefaultKeyStrategy {
    fn default() -> Self {
        Self::new("uploads")
    }
}

impl BlobKeyStrategy for DefaultKeyStrategy {
    fn chunk_key(&self, storage_location: &str, chunk_number: u32) -> String {
        self.join(storage_location, &chunk_number.to_string())
    }

    fn composed_key(&self, storage_location: &str) -> String {
        self.join(storage_location, "complete")
    }
}

/// Drain a stream into one buffer; the first stream error aborts
pub(crate) async fn collect_stream(mut stream: ByteStream) -> std::io::Result<Bytes> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf.freeze())
}
