//! Background job execution
//!
//! One runner invocation per submitted task: extract, refine, file, persist.
//! The runner is a firewall boundary like the dispatcher — every failure in
//! the pipeline lands in the task record, never in a panic or a dropped
//! future. A started job always reaches exactly one terminal state.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{redact_secret, truncate_message, ClipError};
use crate::extract;
use crate::refine::{self, RefineMode, RefineOptions};
use crate::storage;
use crate::task::{TaskPatch, TaskStatus, TaskStore};

/// Everything a job needs beyond its task id.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub url: String,
    pub mode: RefineMode,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub save_path: Option<String>,
}

/// Drive one task from `queued` to a terminal state, recording each phase
/// transition in the store.
pub async fn run_job(
    store: Arc<TaskStore>,
    client: reqwest::Client,
    task_id: Uuid,
    request: JobRequest,
) {
    tracing::info!(%task_id, url = %request.url, mode = ?request.mode, "job started");
    store.patch(
        task_id,
        TaskPatch {
            status: Some(TaskStatus::Processing),
            started_at: Some(Utc::now()),
            ..Default::default()
        },
    );

    match execute(&client, &request).await {
        Ok((filepath, warning)) => {
            tracing::info!(%task_id, filepath = %filepath.display(), "job saved");
            store.patch(
                task_id,
                TaskPatch {
                    status: Some(TaskStatus::Saved),
                    finished_at: Some(Utc::now()),
                    filepath: Some(filepath.to_string_lossy().into_owned()),
                    warning,
                    ..Default::default()
                },
            );
        }
        Err(e) => {
            let message = redact_secret(
                &truncate_message(&e.to_string(), 300),
                request.api_key.as_deref(),
            );
            tracing::warn!(%task_id, error = %message, "job failed");
            store.patch(
                task_id,
                TaskPatch {
                    status: Some(TaskStatus::Error),
                    finished_at: Some(Utc::now()),
                    error: Some(message),
                    ..Default::default()
                },
            );
        }
    }
}

/// The fallible pipeline body. Extraction failures arrive as ordinary error
/// records and still flow through refinement and persistence; only the disk
/// write can fail the task outright.
async fn execute(
    client: &reqwest::Client,
    request: &JobRequest,
) -> Result<(PathBuf, Option<String>), ClipError> {
    let record = extract::extract(client, &request.url).await;

    let options = RefineOptions {
        mode: request.mode,
        model: request.model.clone(),
        api_key: request.api_key.clone(),
        base_url: request.base_url.clone(),
    };
    let refined = refine::refine(client, &options, &record).await;

    let category = storage::classify_category(&record);
    let filename = storage::build_filename(&record.title, Utc::now());
    let root = storage::resolve_root(request.save_path.as_deref());
    let filepath = storage::save_markdown(&root, category, &filename, &refined.markdown)?;

    Ok((filepath, refined.warning))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;

    fn raw_request(url: &str, save_path: &std::path::Path) -> JobRequest {
        JobRequest {
            url: url.to_string(),
            mode: RefineMode::Raw,
            model: "gpt-3.5-turbo".to_string(),
            api_key: None,
            base_url: None,
            save_path: Some(save_path.to_string_lossy().into_owned()),
        }
    }

    #[tokio::test]
    async fn test_unreachable_source_still_reaches_saved() {
        // Extraction failure becomes an error record, which is ordinary data:
        // the task still files a Markdown note instead of erroring out.
        let store = Arc::new(TaskStore::new());
        let client = reqwest::Client::new();
        let tmp = tempfile::tempdir().unwrap();
        let id = Uuid::new_v4();
        let request = raw_request("http://127.0.0.1:9/down", tmp.path());
        store.create(id, request.url.clone(), request.mode);

        run_job(store.clone(), client, id, request).await;

        let record = store.get(id).unwrap();
        assert_eq!(record.status, TaskStatus::Saved);
        assert!(record.started_at.is_some());
        assert!(record.finished_at.is_some());
        let filepath = record.filepath.expect("filepath set");
        assert!(filepath.ends_with(".md"));
        let body = std::fs::read_to_string(&filepath).unwrap();
        assert!(body.contains("Failed to process"));
    }

    #[tokio::test]
    #[ignore = "hits the live network"]
    async fn test_end_to_end_raw_article() {
        let store = Arc::new(TaskStore::new());
        let client = reqwest::Client::new();
        let tmp = tempfile::tempdir().unwrap();
        let id = Uuid::new_v4();
        let request = raw_request("https://www.example.com", tmp.path());
        store.create(id, request.url.clone(), request.mode);

        run_job(store.clone(), client, id, request).await;

        let record = store.get(id).unwrap();
        assert_eq!(record.status, TaskStatus::Saved);
        let filepath = record.filepath.expect("filepath set");
        assert!(filepath.ends_with(".md"));
        assert!(filepath.contains("其他"));
    }
}
