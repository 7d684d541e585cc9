//! HTTP API.
//!
//! Thin axum handlers over the workflows in [`App`]. Every handler maps its
//! request onto one workflow call and converts [`ReaderError`] into a JSON
//! error response.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Health check (returns version) |
//! | `GET` | `/files` | List documents with paragraphs |
//! | `POST` | `/files/upload` | Multipart upload, one or more `files` fields |
//! | `GET` | `/files/{filename}` | Document with paragraphs |
//! | `DELETE` | `/files/{filename}` | Delete document, paragraphs and notes |
//! | `POST` | `/files/markdown/{filename}` | Full extracted text |
//! | `PATCH` | `/files/{filename}/rename` | Rename a document |
//! | `GET` | `/notes/file_by_name/{filename}` | Notes of a document |
//! | `POST` | `/notes/{filename}/{paragraph_id}` | Create a note |
//! | `PUT` | `/notes/{note_id}` | Update a note |
//! | `DELETE` | `/notes/{note_id}` | Delete a note |
//! | `POST` | `/openai/get_feedback` | LLM feedback on a note |
//! | `GET`/`POST` | `/auth/api_keys/` | Read or save service credentials (`x-token` header) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "conflict", "message": "Note already exists for this paragraph." } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401), `not_found` (404),
//! `conflict` (409), `service_error` (502), `internal` (500).

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::app::App;
use crate::config::Config;
use crate::credentials::CredentialSet;
use crate::error::{ErrorKind, ReaderError};
use crate::filename::matches_pattern;
use crate::ingest::{BatchReport, Upload, UploadFailure};
use crate::models::{Document, Note};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
type AppState = Arc<App>;

/// Starts the HTTP server with the collaborators named in the configuration.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let app = App::from_config(config).await?;
    run_server_with_app(Arc::new(app)).await
}

/// Starts the HTTP server for an already-built [`App`].
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server_with_app(app: Arc<App>) -> anyhow::Result<()> {
    let bind_addr = app.config.server.bind.clone();
    let router = build_router(app);

    info!(addr = %bind_addr, "reader server listening");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

/// Build the full router, including CORS, tracing, and the optional static frontend.
pub fn build_router(app: AppState) -> Router {
    let server = &app.config.server;

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins(&server.allowed_origins))
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/health", get(handle_health))
        .route("/files", get(handle_list_files))
        .route(
            "/files/upload",
            post(handle_upload).layer(DefaultBodyLimit::max(app.config.uploads.request_limit())),
        )
        .route("/files/markdown/{filename}", post(handle_get_markdown))
        .route(
            "/files/{filename}",
            get(handle_get_file).delete(handle_delete_file),
        )
        .route("/files/{filename}/rename", patch(handle_rename_file))
        .route("/notes/file_by_name/{filename}", get(handle_list_notes))
        .route(
            "/notes/{target}",
            put(handle_update_note).delete(handle_delete_note),
        )
        .route("/notes/{target}/{paragraph_id}", post(handle_create_note))
        .route("/openai/get_feedback", post(handle_feedback))
        .route("/auth/", get(handle_auth_root))
        .route(
            "/auth/api_keys/",
            get(handle_get_api_keys).post(handle_save_api_keys),
        );

    // Mounted last so API routes take precedence.
    if let Some(dir) = &server.frontend_dir {
        let index = dir.join("index.html");
        router = router.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

fn allowed_origins(origins: &[String]) -> AllowOrigin {
    if origins.iter().any(|o| o == "*") {
        return AllowOrigin::any();
    }
    let values: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    AllowOrigin::list(values)
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Inner error detail with a machine-readable code and human-readable message.
#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failures: Vec<UploadFailure>,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
    failures: Vec<UploadFailure>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
                failures: self.failures,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ReaderError> for AppError {
    fn from(err: ReaderError) -> Self {
        let kind = err.kind();
        let status = match kind {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Service => StatusCode::BAD_GATEWAY,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = if kind == ErrorKind::Internal {
            error!(error = %err, "internal error");
            "Internal Server Error".to_string()
        } else {
            err.to_string()
        };
        AppError {
            status,
            code: kind.code().to_string(),
            message,
            failures: err.failures().to_vec(),
        }
    }
}

/// Reject path filenames outside the allow-list pattern.
fn check_path_filename(filename: &str) -> Result<(), AppError> {
    if matches_pattern(filename) {
        Ok(())
    } else {
        Err(ReaderError::Validation(format!("Invalid filename: {}", filename)).into())
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ /files ============

async fn handle_list_files(State(app): State<AppState>) -> Result<Json<Vec<Document>>, AppError> {
    Ok(Json(app.documents.list().await?))
}

async fn handle_get_file(
    State(app): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<Document>, AppError> {
    check_path_filename(&filename)?;
    Ok(Json(app.documents.get(&filename).await?))
}

#[derive(Serialize)]
struct ContentResponse {
    content: String,
}

async fn handle_get_markdown(
    State(app): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<ContentResponse>, AppError> {
    check_path_filename(&filename)?;
    let content = app.documents.content(&filename).await?;
    Ok(Json(ContentResponse { content }))
}

#[derive(Deserialize)]
struct RenameRequest {
    #[serde(default)]
    new_filename: String,
}

async fn handle_rename_file(
    State(app): State<AppState>,
    Path(filename): Path<String>,
    Json(req): Json<RenameRequest>,
) -> Result<Json<Document>, AppError> {
    check_path_filename(&filename)?;
    Ok(Json(app.documents.rename(&filename, &req.new_filename).await?))
}

#[derive(Serialize)]
struct DetailResponse {
    detail: String,
}

async fn handle_delete_file(
    State(app): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<DetailResponse>, AppError> {
    check_path_filename(&filename)?;
    app.documents.delete(&filename).await?;
    Ok(Json(DetailResponse {
        detail: "File and associated paragraphs and notes deleted successfully.".to_string(),
    }))
}

/// Handler for `POST /files/upload`.
///
/// Reads every `files` field of the multipart body, then runs the batch
/// through the ingestion workflow. Unknown fields are ignored. The request
/// as a whole is capped by `[uploads].max_request_bytes`; the per-file cap is
/// checked by the workflow so one oversized file fails alone.
async fn handle_upload(
    State(app): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<BatchReport>, AppError> {
    let mut uploads = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ReaderError::Validation(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some("files") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ReaderError::Validation(format!("Read error: {}", e)))?;
        uploads.push(Upload {
            filename,
            bytes: bytes.to_vec(),
        });
    }

    Ok(Json(app.ingestor.ingest_batch(uploads).await?))
}

// ============ /notes ============

async fn handle_list_notes(
    State(app): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<Vec<Note>>, AppError> {
    check_path_filename(&filename)?;
    Ok(Json(app.notes.list_notes(&filename).await?))
}

#[derive(Deserialize)]
struct NoteBody {
    content: String,
}

async fn handle_create_note(
    State(app): State<AppState>,
    Path((filename, paragraph_id)): Path<(String, i64)>,
    Json(body): Json<NoteBody>,
) -> Result<Json<Note>, AppError> {
    check_path_filename(&filename)?;
    let note = app
        .notes
        .create_note(&filename, paragraph_id, &body.content)
        .await?;
    Ok(Json(note))
}

async fn handle_update_note(
    State(app): State<AppState>,
    Path(note_id): Path<i64>,
    Json(body): Json<NoteBody>,
) -> Result<Json<Note>, AppError> {
    Ok(Json(app.notes.update_note(note_id, &body.content).await?))
}

async fn handle_delete_note(
    State(app): State<AppState>,
    Path(note_id): Path<i64>,
) -> Result<Json<DetailResponse>, AppError> {
    app.notes.delete_note(note_id).await?;
    Ok(Json(DetailResponse {
        detail: "Note deleted successfully.".to_string(),
    }))
}

// ============ POST /openai/get_feedback ============

#[derive(Deserialize)]
struct FeedbackRequest {
    paragraph_id: i64,
    context: String,
    note_content: String,
}

#[derive(Serialize)]
struct FeedbackResponse {
    feedback: String,
}

async fn handle_feedback(
    State(app): State<AppState>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, AppError> {
    let feedback = app
        .notes
        .request_feedback(req.paragraph_id, &req.context, &req.note_content)
        .await?;
    Ok(Json(FeedbackResponse { feedback }))
}

// ============ /auth ============

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

async fn handle_auth_root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "API Key Settings Service".to_string(),
    })
}

fn verify_token(app: &App, headers: &HeaderMap) -> Result<(), AppError> {
    let token = headers.get("x-token").and_then(|v| v.to_str().ok());
    if token == Some(app.config.server.auth_token.as_str()) {
        Ok(())
    } else {
        warn!("rejected credential request with invalid or missing token");
        Err(ReaderError::Unauthorized("Invalid or missing token".to_string()).into())
    }
}

async fn handle_get_api_keys(
    State(app): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CredentialSet>, AppError> {
    verify_token(&app, &headers)?;
    let keys = app
        .credentials
        .read()
        .ok_or_else(|| ReaderError::NotFound("API keys not found".to_string()))?;
    Ok(Json(keys))
}

async fn handle_save_api_keys(
    State(app): State<AppState>,
    headers: HeaderMap,
    Json(keys): Json<CredentialSet>,
) -> Result<Json<CredentialSet>, AppError> {
    verify_token(&app, &headers)?;
    app.credentials.write(&keys)?;
    Ok(Json(keys))
}
