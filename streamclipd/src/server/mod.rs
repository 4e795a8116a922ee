use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use streamclip_core::{
    ArtifactKind, FailureKind, JobId, JobReport, JobSuccess, OverlayJobRequest, Pipeline,
    PipelineError, ProcessRequest,
};
use tokio::signal;
use tower::ServiceExt;
use tower_http::{services::ServeFile, trace::TraceLayer};
use tracing::{error, info, warn};

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub pipeline: Pipeline,
    pub started_at: DateTime<Utc>,
}

impl AppContext {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            started_at: Utc::now(),
        }
    }
}

pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/process", post(process_video))
        .route("/tiktok", post(compose_video))
        // GET routes answer HEAD as well.
        .route("/download/:id", get(download_video))
        .route("/tiktok/:id", get(download_composed))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

pub async fn serve(ctx: AppContext, addr: SocketAddr) -> std::io::Result<()> {
    ctx.pipeline
        .store()
        .ensure_dirs()
        .await
        .map_err(std::io::Error::other)?;
    let app = create_router(ctx);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

async fn health_check(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "started_at": ctx.started_at,
        "extraction": ctx.pipeline.extractor().metrics(),
    }))
}

fn status_for(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::InvalidRequest => StatusCode::BAD_REQUEST,
        FailureKind::NotFound => StatusCode::NOT_FOUND,
        FailureKind::NoManifest => StatusCode::UNPROCESSABLE_ENTITY,
        FailureKind::ToolFailure => StatusCode::BAD_GATEWAY,
        FailureKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn job_response(result: Result<JobSuccess, PipelineError>) -> Response {
    match result {
        Ok(success) => (StatusCode::OK, Json(JobReport::from(&success))).into_response(),
        Err(err) => {
            warn!(error = %err, "job failed");
            (status_for(err.kind()), Json(JobReport::from(&err))).into_response()
        }
    }
}

fn rejection_response(rejection: JsonRejection) -> Response {
    let report = JobReport::Error {
        message: rejection.body_text(),
    };
    (rejection.status(), Json(report)).into_response()
}

async fn process_video(
    State(ctx): State<AppContext>,
    payload: Result<Json<ProcessRequest>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(request)) => job_response(ctx.pipeline.process(&request).await),
        Err(rejection) => rejection_response(rejection),
    }
}

async fn compose_video(
    State(ctx): State<AppContext>,
    payload: Result<Json<OverlayJobRequest>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(request)) => job_response(ctx.pipeline.compose(&request).await),
        Err(rejection) => rejection_response(rejection),
    }
}

async fn download_video(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    request: Request,
) -> Response {
    serve_artifact(&ctx, ArtifactKind::Output, &id, request).await
}

async fn download_composed(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    request: Request,
) -> Response {
    serve_artifact(&ctx, ArtifactKind::Composed, &id, request).await
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "detail": "File not found" })),
    )
        .into_response()
}

async fn serve_artifact(
    ctx: &AppContext,
    kind: ArtifactKind,
    raw_id: &str,
    request: Request,
) -> Response {
    let Ok(id) = JobId::parse(raw_id) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "Invalid job id" })),
        )
            .into_response();
    };
    let store = ctx.pipeline.store();
    let path = match store.existing(kind, &id).await {
        Ok(Some(path)) => path,
        Ok(None) => return not_found(),
        Err(err) => {
            error!(job_id = %id, error = %err, "artifact lookup failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let file_name = store.file_name(kind, &id);
    let response = match ServeFile::new(&path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    let mut response = response.map(Body::new);
    if response.status().is_success() {
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("video/mp4"));
        if let Ok(value) =
            HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\""))
        {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }
    response
}
