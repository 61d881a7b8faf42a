//! HTTP polling API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::collaborators::{BlobStore, BookStructure, DocumentExtractor, UploadTicket};
use crate::error::LessonError;
use crate::library::LessonCache;
use crate::orchestrator::LessonOrchestrator;
use crate::state_machine::{JobSnapshot, JobStatus, LessonRequest};

const DEFAULT_SOURCE: &str = "default";
const QUEUED_MESSAGE: &str = "Request queued. Poll the job for progress.";

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<LessonOrchestrator>,
    pub cache: Arc<LessonCache>,
    pub documents: Arc<dyn DocumentExtractor>,
    pub blobs: Arc<dyn BlobStore>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub message: String,
}

/// Status body returned to pollers.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub message: String,
    pub result: Option<String>,
}

impl From<JobSnapshot> for JobResponse {
    fn from(snapshot: JobSnapshot) -> Self {
        let message = snapshot
            .message
            .unwrap_or_else(|| format!("Current step: {}", snapshot.status));
        Self {
            job_id: snapshot.job_id,
            status: snapshot.status,
            message,
            result: snapshot.result,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BookQuery {
    source: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadRequest {
    filename: String,
    #[serde(default = "default_content_type")]
    content_type: String,
}

fn default_content_type() -> String {
    "application/pdf".to_string()
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/generate", post(generate))
        .route("/jobs/{job_id}", get(job_status))
        .route("/book-structure", get(book_structure))
        .route("/upload-url", post(upload_url));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .with_state(state)
}

pub async fn run_server(state: AppState, listen: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("bind server listener on {listen} failed"))?;
    tracing::info!(%listen, "lesson API listening");
    axum::serve(listener, router(state))
        .await
        .context("server terminated with error")
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn generate(
    State(state): State<AppState>,
    Json(request): Json<LessonRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let job_id = state
        .orchestrator
        .submit(request)
        .await
        .map_err(map_error)?;
    Ok(Json(GenerateResponse {
        job_id,
        status: JobStatus::Queued,
        message: QUEUED_MESSAGE.to_string(),
    }))
}

async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobResponse>, ApiError> {
    let snapshot = state
        .orchestrator
        .status(&job_id)
        .await
        .map_err(map_error)?;
    Ok(Json(snapshot.into()))
}

async fn book_structure(
    State(state): State<AppState>,
    Query(query): Query<BookQuery>,
) -> Result<Json<BookStructure>, ApiError> {
    let source = query.source.as_deref().unwrap_or(DEFAULT_SOURCE);
    let mut book = state.documents.extract(source).await.map_err(map_error)?;
    for topic in book.topics_mut() {
        topic.is_ready = state.cache.lookup(&topic.topic_id).await.is_some();
    }
    Ok(Json(book))
}

async fn upload_url(
    State(state): State<AppState>,
    Json(request): Json<UploadRequest>,
) -> Result<Json<UploadTicket>, ApiError> {
    let ticket = state
        .blobs
        .upload_url(&request.filename, &request.content_type)
        .await
        .map_err(map_error)?;
    Ok(Json(ticket))
}

fn map_error(err: LessonError) -> ApiError {
    let (status, code) = match &err {
        LessonError::JobNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        LessonError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_argument"),
        LessonError::Collaborator { .. } | LessonError::Anthropic(_) | LessonError::Http(_) => {
            (StatusCode::BAD_GATEWAY, "upstream")
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    (
        status,
        Json(ErrorBody {
            code: code.to_string(),
            message: err.to_string(),
        }),
    )
}
