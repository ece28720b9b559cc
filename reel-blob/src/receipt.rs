use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::JobId;

/// Receipt returned after an upload job is finalized
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub job_id: JobId,
    /// Key of the composed object
    pub key: String,
    pub size_bytes: u64,
    pub content_type: String,
    pub etag: Option<String>,
    pub finished_at: DateTime<Utc>,
    /// Chunk keys that could not be deleted after composing
    pub cleanup_failures: Vec<String>,
}

impl UploadReceipt {
    pub fn new(job_id: JobId, key: String, size_bytes: u64) -> Self {
        Self {
            job_id,
            key,
            size_bytes,
            content_type: "application/octet-stream".to_string(),
            etag: None,
            finished_at: Utc::now(),
            cleanup_failures: Vec::new(),
        }
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_etag(mut self, etag: Option<String>) -> Self {
        self.etag = etag;
        self
    }

    pub fn with_cleanup_failures(mut self, keys: Vec<String>) -> Self {
        self.cleanup_failures = keys;
        self
    }

    /// True when every chunk object was removed
    pub fn is_clean(&self) -> bool {
        self.cleanup_failures.is_empty()
    }
}
