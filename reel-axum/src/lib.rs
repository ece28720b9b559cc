//! reel-axum: Axum adapter for ReelRS.
//!
//! Exposes an [`UploadCoordinator`](reel_blob::UploadCoordinator) over HTTP:
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `POST /upload` | Resumable.js chunk upload (raw body, query parameters) |
//! | `GET /upload` | Resumable.js chunk probe |
//! | `POST /uploads` | Register a job |
//! | `GET /uploads/{id}` | Inspect a job |
//! | `POST /uploads/{id}/finish` | Force finalization |
//! | `GET /health` | Liveness, never behind the access check |

pub mod app;
pub mod auth;
pub mod params;
pub mod state;
pub mod upload;
mod error;
pub use error::{upload_error_to_reel, ReelAxumError};
pub use state::ReelAxumState;

pub use app::{reel_axum, ReelAxumApp, DEFAULT_BODY_LIMIT};
