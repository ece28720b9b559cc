use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use reel_blob::UploadError;
use reel_core::errors::ReelError;
use serde_json::json;
use tracing::{error, warn};

#[derive(Debug)]
pub struct ReelAxumError(pub anyhow::Error);

impl From<anyhow::Error> for ReelAxumError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl From<ReelError> for ReelAxumError {
    fn from(e: ReelError) -> Self {
        Self(e.into_anyhow())
    }
}

impl From<UploadError> for ReelAxumError {
    fn from(e: UploadError) -> Self {
        upload_error_to_reel(e).into()
    }
}

/// Translate a coordinator error into its client-facing form.
///
/// Server-side failures are logged here, before the detail is sanitized away.
pub fn upload_error_to_reel(err: UploadError) -> ReelError {
    let reel = match &err {
        UploadError::Validation { message } => ReelError::bad_request(message.clone()),
        UploadError::QueueMismatch {
            chunk_number,
            total_chunks,
        } => ReelError::conflict("Queue mismatch. Try uploading again.").with_data(json!({
            "chunkNumber": chunk_number,
            "totalChunks": total_chunks,
        })),
        UploadError::UploadIo { key, source } => {
            warn!(key = %key, error = %source, "chunk upload failed");
            ReelError::unprocessable("Upload failed.")
        }
        UploadError::AlreadyFinished { .. } => ReelError::gone("Upload already finished."),
        UploadError::NotFound { .. } => ReelError::not_found("Upload not found."),
        UploadError::Finalization { job_id, reason } => {
            error!(job_id = %job_id, reason = %reason, "finalization failed");
            ReelError::general_error("Upload could not be finalized.")
        }
        UploadError::Backend { .. } | UploadError::Io { .. } | UploadError::Serialization { .. } => {
            error!(error = %err, "upload backend failure");
            ReelError::general_error("Internal error.")
        }
    };
    reel.with_source(anyhow::Error::new(err))
}

impl IntoResponse for ReelAxumError {
    fn into_response(self) -> Response {
        // Keep the structured fields of a ReelError, even under anyhow context.
        if let Some(reel) = self.0.chain().find_map(|e| e.downcast_ref::<ReelError>()) {
            let safe = reel.sanitize_for_client();
            let status =
                StatusCode::from_u16(safe.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return (status, Json(safe.to_json())).into_response();
        }

        error!(error = %self.0, "unhandled error");
        let safe = ReelError::general_error("Internal error.");
        (StatusCode::INTERNAL_SERVER_ERROR, Json(safe.to_json())).into_response()
    }
}
