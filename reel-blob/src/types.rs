use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::pin::Pin;

use crate::{UploadError, UploadReceipt, UploadResult};

/// Stream of bytes for blob content
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Longest accepted job identifier
pub const MAX_JOB_ID_LEN: usize = 200;

/// Client-supplied identifier of one logical file transfer.
///
/// The id doubles as a blob-key path segment, so only ASCII letters, digits,
/// `-`, `_` and `.` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

impl JobId {
    pub fn parse<S: Into<String>>(id: S) -> UploadResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(UploadError::validation("Upload identifier is empty."));
        }
        if id.len() > MAX_JOB_ID_LEN {
            return Err(UploadError::validation("Upload identifier too long."));
        }
        if id == "." || id == ".." {
            return Err(UploadError::validation("Invalid upload identifier."));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(UploadError::validation("Invalid upload identifier."));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for JobId {
    type Error = UploadError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shape of an upload as declared by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDescriptor {
    pub id: JobId,
    pub total_chunks: u32,
    pub display_name: String,
    pub content_type: String,
}

impl JobDescriptor {
    pub fn new<N, C>(id: JobId, total_chunks: u32, display_name: N, content_type: C) -> Self
    where
        N: Into<String>,
        C: Into<String>,
    {
        Self {
            id,
            total_chunks,
            display_name: display_name.into(),
            content_type: content_type.into(),
        }
    }
}

/// The persisted queue record for one upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadJob {
    pub id: JobId,
    pub total_chunks: u32,
    pub display_name: String,
    pub content_type: String,
    pub storage_location: String,
    pub received_chunks: BTreeSet<u32>,
    pub finished: bool,
    pub created_at: DateTime<Utc>,
}

impl UploadJob {
    /// Fresh record for a descriptor; chunks live under the job id.
    pub fn new(descriptor: &JobDescriptor, created_at: DateTime<Utc>) -> Self {
        Self {
            id: descriptor.id.clone(),
            total_chunks: descriptor.total_chunks,
            display_name: descriptor.display_name.clone(),
            content_type: descriptor.content_type.clone(),
            storage_location: descriptor.id.as_str().to_string(),
            received_chunks: BTreeSet::new(),
            finished: false,
            created_at,
        }
    }

    pub fn received_count(&self) -> u32 {
        self.received_chunks.len() as u32
    }

    pub fn has_chunk(&self, chunk_number: u32) -> bool {
        self.received_chunks.contains(&chunk_number)
    }

    /// Every chunk in `1..=total_chunks` has arrived
    pub fn is_complete(&self) -> bool {
        self.received_count() == self.total_chunks
    }

    pub fn missing_chunks(&self) -> Vec<u32> {
        (1..=self.total_chunks)
            .filter(|n| !self.received_chunks.contains(n))
            .collect()
    }
}

/// One chunk as it arrives; lives only for the duration of an ingest call
pub struct ChunkSubmission {
    pub job_id: JobId,
    pub chunk_number: u32,
    pub body: ByteStream,
}

impl ChunkSubmission {
    pub fn new(job_id: JobId, chunk_number: u32, body: ByteStream) -> Self {
        Self {
            job_id,
            chunk_number,
            body,
        }
    }
}

impl std::fmt::Debug for ChunkSubmission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkSubmission")
            .field("job_id", &self.job_id)
            .field("chunk_number", &self.chunk_number)
            .finish_non_exhaustive()
    }
}

/// Result of ingesting a chunk
#[derive(Debug, Clone)]
pub enum ChunkResult {
    /// Chunk stored, waiting for more chunks
    Partial {
        chunks_received: u32,
        total_chunks: u32,
    },
    /// All chunks received and the upload is finalized
    Complete { job: UploadJob },
}

impl ChunkResult {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }
}

/// Result of a finalize attempt
#[derive(Debug, Clone)]
pub enum FinalizeOutcome {
    /// This call composed the object and flipped the finished flag
    Finalized(UploadReceipt),
    /// Another caller got there first; nothing was done
    AlreadyFinalized,
}
