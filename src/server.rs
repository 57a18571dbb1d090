//! HTTP API for uploading documents and asking questions about them.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Liveness message |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/upload` | Multipart upload, field `file` (PDF, DOCX, TXT) |
//! | `POST` | `/ask` | `{ "question": "..." }` → answer, confidence, sources |
//! | `POST` | `/extract` | Structured shipment fields of the current corpus |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser front end
//! can be served from anywhere.

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use ultradoc_core::models::StructuredRecord;

use crate::config::Config;
use crate::parser::DocumentKind;
use crate::service::{Answer, Service, UploadOutcome};

/// Largest accepted request body.
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Starts the HTTP server on `[server].bind` and runs until the process
/// is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let service = Arc::new(Service::from_config(config.clone())?);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "server listening");
    println!("ultradoc server listening on http://{}", bind_addr);

    axum::serve(listener, router(service)).await?;
    Ok(())
}

/// All routes over a shared [`Service`].
pub fn router(service: Arc<Service>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/upload", post(handle_upload))
        .route("/ask", post(handle_ask))
        .route("/extract", post(handle_extract))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(service)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    tracing::error!(error = %format!("{:#}", err), "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: format!("{:#}", err),
    }
}

// ============ GET / and GET /health ============

#[derive(Serialize)]
struct StatusResponse {
    status: String,
}

async fn handle_root() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "API is running".to_string(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /upload ============

/// Reads the multipart field `file`, stores it, and rebuilds the index.
async fn handle_upload(
    State(service): State<Arc<Service>>,
    mut multipart: Multipart,
) -> Result<Json<UploadOutcome>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| bad_request("file must have a file name"))?;
        if DocumentKind::from_name(&file_name).is_none() {
            return Err(bad_request(format!(
                "unsupported document type: {} (expected .pdf, .docx, or .txt)",
                file_name
            )));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(e.to_string()))?;

        let outcome = service
            .upload(&file_name, &bytes)
            .await
            .map_err(internal)?;
        return Ok(Json(outcome));
    }
    Err(bad_request("missing multipart field: file"))
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

async fn handle_ask(
    State(service): State<Arc<Service>>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<Answer>, AppError> {
    let Json(req) = payload.map_err(|e| bad_request(e.body_text()))?;
    if req.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }
    let answer = service.ask(&req.question).await.map_err(internal)?;
    Ok(Json(answer))
}

// ============ POST /extract ============

async fn handle_extract(
    State(service): State<Arc<Service>>,
) -> Result<Json<StructuredRecord>, AppError> {
    let record = service.extract().await.map_err(internal)?;
    Ok(Json(record))
}
