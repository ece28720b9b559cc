use std::collections::HashMap;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures::TryStreamExt;
use reel_blob::{
    ByteStream, ChunkResult, ChunkSubmission, FinalizeOutcome, JobDescriptor, JobId, UploadJob,
};
use reel_core::errors::ReelError;
use serde_json::{json, Value};
use tracing::debug;

use crate::{params::ResumableParams, ReelAxumError, ReelAxumState};

fn map_json_rejection(rejection: JsonRejection) -> ReelAxumError {
    ReelError::bad_request("Failed to parse the request body as JSON")
        .with_errors(json!({"_schema": [rejection.to_string()]}))
        .into()
}

/// Ids that could never have been stored are reported as absent
fn path_job_id(raw: String) -> Result<JobId, ReelAxumError> {
    JobId::parse(raw).map_err(|_| ReelError::not_found("Upload not found.").into())
}

fn body_stream(body: Body) -> ByteStream {
    Box::pin(body.into_data_stream().map_err(std::io::Error::other))
}

/// `POST /upload`: store one chunk streamed from the request body
pub async fn post_chunk(
    State(state): State<ReelAxumState>,
    Query(query): Query<HashMap<String, String>>,
    body: Body,
) -> Result<Response, ReelAxumError> {
    let params = ResumableParams::from_query(&query)?;
    let descriptor = params.descriptor()?;
    let submission =
        ChunkSubmission::new(descriptor.id.clone(), params.chunk_number, body_stream(body));

    match state.coordinator.ingest(descriptor, submission).await? {
        ChunkResult::Complete { job } => {
            debug!(job_id = %job.id, "upload complete");
            Ok((StatusCode::OK, job.id.to_string()).into_response())
        }
        ChunkResult::Partial { .. } => Ok(StatusCode::OK.into_response()),
    }
}

/// `GET /upload`: whether a chunk already arrived
pub async fn probe_chunk(
    State(state): State<ReelAxumState>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<&'static str, ReelAxumError> {
    let params = ResumableParams::from_query(&query)?;
    let descriptor = params.descriptor()?;

    if state
        .coordinator
        .probe(&descriptor, params.chunk_number)
        .await?
    {
        Ok("ok")
    } else {
        Err(ReelError::not_found("Chunk not received.").into())
    }
}

/// `POST /uploads`: register a job ahead of its chunks
pub async fn begin(
    State(state): State<ReelAxumState>,
    descriptor: Result<Json<JobDescriptor>, JsonRejection>,
) -> Result<Json<UploadJob>, ReelAxumError> {
    let Json(descriptor) = descriptor.map_err(map_json_rejection)?;
    let job = state.coordinator.begin(descriptor).await?;
    Ok(Json(job))
}

/// `GET /uploads/{id}`
pub async fn get_job(
    State(state): State<ReelAxumState>,
    Path(id): Path<String>,
) -> Result<Json<UploadJob>, ReelAxumError> {
    let id = path_job_id(id)?;
    state
        .coordinator
        .get_queue_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ReelError::not_found("Upload not found.").into())
}

/// `POST /uploads/{id}/finish`: force finalization of a complete job
pub async fn finish(
    State(state): State<ReelAxumState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ReelAxumError> {
    let id = path_job_id(id)?;
    let body = match state.coordinator.finish(&id).await? {
        FinalizeOutcome::Finalized(receipt) => json!({
            "status": "finalized",
            "receipt": receipt,
        }),
        FinalizeOutcome::AlreadyFinalized => json!({ "status": "already_finalized" }),
    };
    Ok(Json(body))
}

pub async fn health() -> &'static str {
    "ok"
}
