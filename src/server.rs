//! Submission and query HTTP boundary
//!
//! `POST /api/clip` validates the URL, creates a queued task, spawns the job
//! runner and answers immediately with the task id. `GET /api/tasks/{id}`
//! returns the current snapshot. Only a missing URL is rejected
//! synchronously — everything after submission surfaces through the task
//! record.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::refine::RefineMode;
use crate::runner::{self, JobRequest};
use crate::task::{TaskStatus, TaskStore};

/// Shared server state: the task registry plus one reusable HTTP client.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<TaskStore>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new() -> Self {
        AppState {
            store: Arc::new(TaskStore::new()),
            http: reqwest::Client::new(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Clip submission payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ClipRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub mode: RefineMode,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub save_path: Option<String>,
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

#[derive(Debug, Serialize)]
pub struct ClipResponse {
    pub task_id: Uuid,
    pub status: TaskStatus,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Build the API router with all endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/clip", post(submit_clip))
        .route("/api/tasks/{task_id}", get(get_task))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start serving on the given address.
pub async fn start_server(addr: &str, state: AppState) -> Result<(), std::io::Error> {
    tracing::info!(%addr, "starting clipper server");
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn submit_clip(
    State(state): State<AppState>,
    Json(request): Json<ClipRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let url = request.url.trim().to_string();
    if url.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "url is required".to_string()));
    }

    let task_id = Uuid::new_v4();
    state.store.create(task_id, url.clone(), request.mode);

    let job = JobRequest {
        url,
        mode: request.mode,
        model: request.model,
        api_key: request.api_key,
        base_url: request.base_url,
        save_path: request.save_path,
    };
    let store = state.store.clone();
    let http = state.http.clone();
    tokio::spawn(async move {
        runner::run_job(store, http, task_id, job).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(ClipResponse {
            task_id,
            status: TaskStatus::Queued,
        }),
    ))
}

async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match state.store.get(task_id) {
        Ok(record) => Ok(Json(record)),
        Err(e) => Err((StatusCode::NOT_FOUND, e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_request_defaults() {
        let request: ClipRequest =
            serde_json::from_str(r#"{"url": "https://example.com"}"#).unwrap();
        assert_eq!(request.url, "https://example.com");
        assert_eq!(request.mode, RefineMode::Raw);
        assert_eq!(request.model, "gpt-3.5-turbo");
        assert!(request.api_key.is_none());
        assert!(request.save_path.is_none());

        let rewrite: ClipRequest = serde_json::from_str(
            r#"{"url": "https://example.com", "mode": "ai_rewrite", "model": "gpt-4o"}"#,
        )
        .unwrap();
        assert_eq!(rewrite.mode, RefineMode::AiRewrite);
        assert_eq!(rewrite.model, "gpt-4o");
    }

    #[tokio::test]
    async fn test_submit_rejects_missing_url() {
        let state = AppState::new();
        let result = submit_clip(
            State(state),
            Json(ClipRequest {
                url: "   ".to_string(),
                mode: RefineMode::Raw,
                model: default_model(),
                api_key: None,
                base_url: None,
                save_path: None,
            }),
        )
        .await;
        let (status, _) = result.err().expect("empty url rejected");
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_query_unknown_task_is_not_found() {
        let state = AppState::new();
        let result = get_task(State(state), Path(Uuid::new_v4())).await;
        let (status, _) = result.err().expect("unknown id is a miss");
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
