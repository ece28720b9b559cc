use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use reel_blob::UploadCoordinator;
use tokio::net::{TcpListener, ToSocketAddrs};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{auth, upload, ReelAxumState};

/// Cap on request bodies unless configured otherwise
pub const DEFAULT_BODY_LIMIT: usize = 64 * 1024 * 1024;

#[derive(Clone)]
pub struct ReelAxumApp {
    pub state: ReelAxumState,
    pub router: Router<()>,
}

impl ReelAxumApp {
    pub fn new(state: ReelAxumState, body_limit: usize) -> Self {
        let router = build_router(state.clone(), body_limit);
        Self { state, router }
    }

    pub async fn listen<A>(self, addr: A) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "listening");
        axum::serve(listener, self.router).await?;
        Ok(())
    }
}

/// App with default settings and no access check
pub fn reel_axum(coordinator: Arc<dyn UploadCoordinator>) -> ReelAxumApp {
    ReelAxumApp::new(ReelAxumState::new(coordinator), DEFAULT_BODY_LIMIT)
}

fn build_router(state: ReelAxumState, body_limit: usize) -> Router<()> {
    let protected = Router::new()
        .route(
            "/upload",
            post(upload::post_chunk).get(upload::probe_chunk),
        )
        .route("/uploads", post(upload::begin))
        .route("/uploads/{id}", get(upload::get_job))
        .route("/uploads/{id}/finish", post(upload::finish))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ))
        .with_state(state);

    Router::new()
        .route("/health", get(upload::health))
        .merge(protected)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        let request_id = request
                            .headers()
                            .get("x-request-id")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("-");
                        tracing::info_span!(
                            "http",
                            method = %request.method(),
                            uri = %request.uri(),
                            request_id = %request_id,
                        )
                    }),
                )
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}
