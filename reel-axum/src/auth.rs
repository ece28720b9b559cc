use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use reel_core::errors::ReelError;
use subtle::ConstantTimeEq;

use crate::{ReelAxumError, ReelAxumState};

/// Token from an `Authorization: Bearer <token>` header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let v = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let prefix = "Bearer ";
    if v.len() <= prefix.len() || !v.starts_with(prefix) {
        return None;
    }
    Some(v[prefix.len()..].trim())
}

fn tokens_match(expected: &str, given: &str) -> bool {
    bool::from(expected.as_bytes().ct_eq(given.as_bytes()))
}

/// Reject requests without the configured bearer token; open when none is set
pub async fn require_bearer(
    State(state): State<ReelAxumState>,
    request: Request,
    next: Next,
) -> Result<Response, ReelAxumError> {
    if let Some(expected) = state.auth_token.as_deref() {
        let authorized = extract_bearer_token(request.headers())
            .map(|given| tokens_match(expected, given))
            .unwrap_or(false);
        if !authorized {
            return Err(ReelError::not_authenticated("Not authenticated.").into());
        }
    }
    Ok(next.run(request).await)
}
