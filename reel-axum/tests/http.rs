use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderValue, Request};
use axum::Router;
use http_body_util::BodyExt;
use reel_axum::{reel_axum, ReelAxumApp, ReelAxumState};
use reel_blob::{
    DefaultKeyStrategy, DefaultUploadCoordinator, MemoryBlobStore, MemoryUploadJobStore,
    Registration, UploadConfig,
};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app_with(config: UploadConfig) -> (Router, MemoryBlobStore) {
    let blobs = MemoryBlobStore::new();
    let coordinator = DefaultUploadCoordinator::new(
        blobs.clone(),
        MemoryUploadJobStore::new(),
        DefaultKeyStrategy::default(),
        config,
    );
    (reel_axum(Arc::new(coordinator)).router, blobs)
}

fn app() -> (Router, MemoryBlobStore) {
    app_with(UploadConfig::default())
}

fn chunk_uri(id: &str, chunk: u32, total: u32, name: &str) -> String {
    format!(
        "/upload?resumableChunkNumber={chunk}&resumableTotalChunks={total}\
         &resumableIdentifier={id}&resumableFilename={name}&resumableType=video%2Fmp4\
         &resumableChunkSize=1048576&resumableRelativePath={name}"
    )
}

fn post_chunk(uri: &str, data: &'static [u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/octet-stream")
        .body(Body::from(data))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn text_body(res: axum::response::Response) -> String {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn json_body(res: axum::response::Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_ok() {
    let (router, _) = app();

    let res = router.oneshot(get("/health")).await.unwrap();

    assert_eq!(res.status().as_u16(), 200);
    assert!(res.headers().get("x-request-id").is_some());
    assert_eq!(text_body(res).await, "ok");
}

#[tokio::test]
async fn chunks_complete_with_identifier_body() {
    let (router, blobs) = app();

    let res = router
        .clone()
        .oneshot(post_chunk(&chunk_uri("job1", 2, 2, "f.mp4"), b"world"))
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(text_body(res).await, "");

    let res = router
        .clone()
        .oneshot(post_chunk(&chunk_uri("job1", 1, 2, "f.mp4"), b"hello "))
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(text_body(res).await, "job1");
    assert_eq!(
        blobs.bytes("uploads/job1/complete").unwrap().as_ref(),
        b"hello world"
    );

    let res = router.oneshot(get("/uploads/job1")).await.unwrap();
    assert_eq!(res.status().as_u16(), 200);
    let job = json_body(res).await;
    assert_eq!(job["finished"], true);
    assert_eq!(job["receivedChunks"], json!([1, 2]));
    assert_eq!(job["contentType"], "video/mp4");
}

#[tokio::test]
async fn probe_reports_received_chunks_only() {
    let (router, _) = app();

    let res = router
        .clone()
        .oneshot(get(&chunk_uri("peek", 1, 2, "f.mp4")))
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 404);

    router
        .clone()
        .oneshot(post_chunk(&chunk_uri("peek", 1, 2, "f.mp4"), b"a"))
        .await
        .unwrap();

    let res = router
        .clone()
        .oneshot(get(&chunk_uri("peek", 1, 2, "f.mp4")))
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(text_body(res).await, "ok");

    let res = router
        .oneshot(get(&chunk_uri("peek", 2, 2, "f.mp4")))
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 404);
}

#[tokio::test]
async fn queue_mismatch_is_409_with_retry_message() {
    let (router, _) = app();
    router
        .clone()
        .oneshot(post_chunk(&chunk_uri("short", 1, 3, "f.mp4"), b"a"))
        .await
        .unwrap();

    let res = router
        .oneshot(post_chunk(&chunk_uri("short", 5, 3, "f.mp4"), b"b"))
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 409);
    let body = json_body(res).await;
    assert_eq!(body["name"], "Conflict");
    assert_eq!(body["className"], "conflict");
    assert_eq!(body["message"], "Queue mismatch. Try uploading again.");
    assert_eq!(body["data"]["totalChunks"], 3);
}

#[tokio::test]
async fn long_file_name_is_400_and_creates_nothing() {
    let (router, _) = app();
    let name = "n".repeat(101);

    let res = router
        .clone()
        .oneshot(post_chunk(&chunk_uri("named", 1, 1, &name), b"a"))
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 400);
    assert_eq!(json_body(res).await["message"], "File name too long.");

    let res = router.oneshot(get("/uploads/named")).await.unwrap();
    assert_eq!(res.status().as_u16(), 404);
}

#[tokio::test]
async fn finished_upload_rejects_redelivery_with_410() {
    let (router, _) = app();
    router
        .clone()
        .oneshot(post_chunk(&chunk_uri("done", 1, 1, "f.mp4"), b"a"))
        .await
        .unwrap();

    let res = router
        .oneshot(post_chunk(&chunk_uri("done", 1, 1, "f.mp4"), b"a"))
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 410);
    assert_eq!(json_body(res).await["name"], "Gone");
}

#[tokio::test]
async fn bad_parameters_are_400() {
    let (router, _) = app();

    let res = router
        .clone()
        .oneshot(post_chunk("/upload?resumableChunkNumber=1", b"a"))
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 400);
    assert_eq!(json_body(res).await["message"], "Missing parameter: identifier");

    let res = router
        .clone()
        .oneshot(post_chunk(&chunk_uri("x", 0, 1, "f"), b"a"))
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 400);

    let res = router
        .oneshot(post_chunk(&chunk_uri("..", 1, 1, "f"), b"a"))
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 400);
}

#[tokio::test]
async fn explicit_registration_flow() {
    let (router, _) = app_with(UploadConfig::new().with_registration(Registration::Explicit));

    let res = router
        .clone()
        .oneshot(post_chunk(&chunk_uri("planned", 1, 2, "f.mp4"), b"a"))
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 404);

    let res = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/uploads")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "id": "planned",
                        "totalChunks": 2,
                        "displayName": "f.mp4",
                        "contentType": "video/mp4"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(json_body(res).await["storageLocation"], "planned");

    let res = router
        .clone()
        .oneshot(post_chunk(&chunk_uri("planned", 1, 2, "f.mp4"), b"a"))
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);

    let finish = || {
        Request::builder()
            .method("POST")
            .uri("/uploads/planned/finish")
            .body(Body::empty())
            .unwrap()
    };
    let res = router.clone().oneshot(finish()).await.unwrap();
    assert_eq!(res.status().as_u16(), 400);
    assert_eq!(json_body(res).await["message"], "Not done uploading.");

    router
        .clone()
        .oneshot(post_chunk(&chunk_uri("planned", 2, 2, "f.mp4"), b"b"))
        .await
        .unwrap();
    let res = router.oneshot(finish()).await.unwrap();
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(json_body(res).await["status"], "already_finalized");
}

#[tokio::test]
async fn malformed_begin_body_is_400() {
    let (router, _) = app();

    let res = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/uploads")
                .header("content-type", "application/json")
                .body(Body::from("{\"id\":\"x\""))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 400);
    let body = json_body(res).await;
    assert_eq!(body["name"], "BadRequest");
    assert!(body.get("errors").is_some());
}

#[tokio::test]
async fn bearer_token_guards_everything_but_health() {
    let coordinator = DefaultUploadCoordinator::new(
        MemoryBlobStore::new(),
        MemoryUploadJobStore::new(),
        DefaultKeyStrategy::default(),
        UploadConfig::default(),
    );
    let state = ReelAxumState::new(Arc::new(coordinator)).with_auth_token(Some("s3cret"));
    let router = ReelAxumApp::new(state, 1024).router;

    let res = router.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(res.status().as_u16(), 200);

    let res = router.clone().oneshot(get("/uploads/any")).await.unwrap();
    assert_eq!(res.status().as_u16(), 401);
    let body = json_body(res).await;
    assert_eq!(body["name"], "NotAuthenticated");
    assert_eq!(body["className"], "not-authenticated");

    let mut req = get("/uploads/any");
    req.headers_mut()
        .insert("authorization", HeaderValue::from_static("Bearer s3cret"));
    let res = router.oneshot(req).await.unwrap();
    assert_eq!(res.status().as_u16(), 404);
}

#[tokio::test]
async fn request_id_is_preserved_when_provided() {
    let (router, _) = app();
    let provided = HeaderValue::from_static("req-test-123");

    let mut req = get("/uploads/missing");
    req.headers_mut().insert("x-request-id", provided.clone());
    let res = router.oneshot(req).await.unwrap();

    assert_eq!(res.status().as_u16(), 404);
    assert_eq!(res.headers().get("x-request-id").unwrap(), &provided);
}
