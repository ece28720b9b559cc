use thiserror::Error;

/// Result type for upload operations
pub type UploadResult<T> = Result<T, UploadError>;

/// Errors that can occur while coordinating a chunked upload
#[derive(Error, Debug)]
pub enum UploadError {
    /// Malformed request: bad descriptor, name too long, chunk number below 1
    #[error("Invalid upload request: {message}")]
    Validation { message: String },

    /// Chunk number beyond the job's declared total
    #[error("Chunk {chunk_number} exceeds the declared total of {total_chunks} chunks")]
    QueueMismatch { chunk_number: u32, total_chunks: u32 },

    /// The chunk body could not be written; nothing was recorded
    #[error("Failed to store {key}: {source}")]
    UploadIo {
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Upload {job_id} is already finished")]
    AlreadyFinished { job_id: String },

    /// Compose, tagging or the finished flag failed; the job stays unfinished
    #[error("Failed to finalize upload {job_id}: {reason}")]
    Finalization { job_id: String, reason: String },

    #[error("Upload not found: {id}")]
    NotFound { id: String },

    #[error("Storage backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl UploadError {
    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found<S: Into<String>>(id: S) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn already_finished<S: Into<String>>(job_id: S) -> Self {
        Self::AlreadyFinished {
            job_id: job_id.into(),
        }
    }

    pub fn finalization<S: Into<String>, R: std::fmt::Display>(job_id: S, reason: R) -> Self {
        Self::Finalization {
            job_id: job_id.into(),
            reason: reason.to_string(),
        }
    }

    /// Wrap a failed chunk write; any error kind is reported as an upload IO failure
    pub fn upload_io<S: Into<String>>(key: S, error: UploadError) -> Self {
        match error {
            UploadError::UploadIo { .. } => error,
            other => Self::UploadIo {
                key: key.into(),
                source: Box::new(other),
            },
        }
    }

    /// True for errors the client caused and should not blindly retry
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::QueueMismatch { .. }
                | Self::AlreadyFinished { .. }
                | Self::NotFound { .. }
        )
    }
}
