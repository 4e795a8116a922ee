//! HTTP API integration tests driven through the router with `oneshot`.

use std::path::Path;
use std::process::Output;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use streamclip_core::browser::{
    BrowserResult, ExtractionSession, ExtractionSettings, ManifestExtractor, ManifestObserver,
    SessionFactory,
};
use streamclip_core::config::{ExtractionSection, MediaConfig};
use streamclip_core::{ArtifactStore, CommandExecutor, OverlayAssets, Pipeline};
use streamclipd::{create_router, AppContext};

/// A page that never serves a manifest.
struct EmptyPage;

#[async_trait]
impl SessionFactory for EmptyPage {
    async fn open(&self, _observer: &ManifestObserver) -> BrowserResult<Box<dyn ExtractionSession>> {
        Ok(Box::new(EmptySession))
    }
}

struct EmptySession;

#[async_trait]
impl ExtractionSession for EmptySession {
    async fn navigate(&mut self, _url: &str, _timeout: Duration) -> BrowserResult<()> {
        Ok(())
    }

    async fn evaluate(&mut self, _script: &str) -> BrowserResult<()> {
        Ok(())
    }

    async fn click(&mut self, _selector: &str, _timeout: Duration) -> BrowserResult<bool> {
        Ok(false)
    }

    async fn close(self: Box<Self>) -> BrowserResult<()> {
        Ok(())
    }
}

/// Fails the test if any external tool is spawned.
struct NoCommands;

#[async_trait]
impl CommandExecutor for NoCommands {
    async fn run(&self, program: &Path, _args: &[String]) -> std::io::Result<Output> {
        panic!("unexpected command {}", program.display());
    }
}

fn create_test_context(root: &TempDir) -> AppContext {
    let store = ArtifactStore::new(
        root.path().join("downloads"),
        root.path().join("staging"),
        root.path().join("tiktok"),
        "futebol",
    );
    let assets = OverlayAssets {
        background: root.path().join("assets/background.png"),
        foreground: root.path().join("assets/foreground.png"),
        font_bold: root.path().join("assets/Bold.ttf"),
        font_regular: root.path().join("assets/Regular.ttf"),
    };
    let extractor = ManifestExtractor::new(
        Arc::new(EmptyPage),
        ExtractionSettings::from(&ExtractionSection::default()),
    );
    let pipeline = Pipeline::new(
        extractor,
        Arc::new(NoCommands),
        &MediaConfig::default(),
        store,
        assets,
        2,
    );
    AppContext::new(pipeline)
}

async fn body_to_json(body: Body) -> Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn seed_file(root: &TempDir, relative: &str, contents: &[u8]) {
    let path = root.path().join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

#[tokio::test]
async fn test_health_endpoint() {
    let root = TempDir::new().unwrap();
    let app = create_router(create_test_context(&root));

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["extraction"]["attempts"], 0);
}

#[tokio::test]
async fn test_download_missing_file() {
    let root = TempDir::new().unwrap();
    let app = create_router(create_test_context(&root));

    let response = app
        .oneshot(Request::get("/download/job1").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["detail"], "File not found");
}

#[tokio::test]
async fn test_download_serves_attachment() {
    let root = TempDir::new().unwrap();
    seed_file(&root, "downloads/job1_futebol.mp4", b"fake-mp4-bytes");
    let app = create_router(create_test_context(&root));

    let response = app
        .oneshot(Request::get("/download/job1").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"job1_futebol.mp4\""
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"fake-mp4-bytes");
}

#[tokio::test]
async fn test_head_on_composed_clip() {
    let root = TempDir::new().unwrap();
    seed_file(&root, "tiktok/tiktok_job1_futebol.mp4", b"composed");
    let app = create_router(create_test_context(&root));

    let response = app
        .oneshot(
            Request::head("/tiktok/job1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"tiktok_job1_futebol.mp4\""
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn test_download_rejects_invalid_id() {
    let root = TempDir::new().unwrap();
    let app = create_router(create_test_context(&root));

    let response = app
        .oneshot(
            Request::get("/download/..%2Fsecret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_process_rejects_invalid_id() {
    let root = TempDir::new().unwrap();
    let app = create_router(create_test_context(&root));

    let response = app
        .oneshot(json_request(
            "/process",
            serde_json::json!({ "id": "a/b", "url": "https://example.com/match" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_process_malformed_body() {
    let root = TempDir::new().unwrap();
    let app = create_router(create_test_context(&root));

    let response = app
        .oneshot(json_request("/process", serde_json::json!({ "id": "job1" })))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["status"], "error");
}

#[tokio::test(start_paused = true)]
async fn test_process_without_manifest() {
    let root = TempDir::new().unwrap();
    let app = create_router(create_test_context(&root));

    let response = app
        .oneshot(json_request(
            "/process",
            serde_json::json!({ "id": "job1", "url": "https://example.com/match" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_to_json(response.into_body()).await;
    assert_eq!(
        body,
        serde_json::json!({
            "status": "error",
            "message": "No m3u8 links found after retries."
        })
    );
}

#[tokio::test]
async fn test_tiktok_missing_source() {
    let root = TempDir::new().unwrap();
    let app = create_router(create_test_context(&root));

    let response = app
        .oneshot(json_request(
            "/tiktok",
            serde_json::json!({ "id": "job1", "title": "Final", "description": "Resumo" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["status"], "error");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("job1_futebol.mp4"));
}
