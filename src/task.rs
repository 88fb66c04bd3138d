//! In-memory task registry
//!
//! A single mutex guards the whole map; every read and patch-merge happens
//! under one lock acquisition, so a snapshot never observes a partially
//! applied patch. The lock is never held across network or disk I/O.
//! Records are never evicted for the life of the process — an accepted
//! limitation, since finished tasks must stay queryable by id.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ClipError;
use crate::refine::RefineMode;

/// Task lifecycle states. Strictly forward-only; `Saved` and `Error` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Processing,
    Saved,
    Error,
}

impl TaskStatus {
    fn rank(self) -> u8 {
        match self {
            TaskStatus::Queued => 0,
            TaskStatus::Processing => 1,
            TaskStatus::Saved | TaskStatus::Error => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Saved | TaskStatus::Error)
    }
}

/// Mutable status record tracking one asynchronous clip job.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub url: String,
    pub mode: RefineMode,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub filepath: Option<String>,
    pub warning: Option<String>,
    pub error: Option<String>,
}

impl TaskRecord {
    fn new(task_id: Uuid, url: String, mode: RefineMode) -> Self {
        TaskRecord {
            task_id,
            status: TaskStatus::Queued,
            url,
            mode,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            filepath: None,
            warning: None,
            error: None,
        }
    }
}

/// Partial update applied atomically by [`TaskStore::patch`]. Unset fields
/// leave the record untouched.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub filepath: Option<String>,
    pub warning: Option<String>,
    pub error: Option<String>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        TaskPatch {
            status: Some(status),
            ..Default::default()
        }
    }
}

/// Lock-guarded task registry. Constructed once per process and passed by
/// reference to the boundaries and the job runner — no ambient singleton.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: Mutex<HashMap<Uuid, TaskRecord>>,
}

impl TaskStore {
    pub fn new() -> Self {
        TaskStore {
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Insert a fresh queued record for a submitted job.
    pub fn create(&self, task_id: Uuid, url: String, mode: RefineMode) {
        let mut tasks = self.tasks.lock().expect("task store lock poisoned");
        tasks.insert(task_id, TaskRecord::new(task_id, url, mode));
    }

    /// Merge a patch into a record under the lock. All fields of one patch
    /// become visible together. Missing records are created on the fly.
    /// Status only ever moves forward; a terminal status is never overwritten.
    pub fn patch(&self, task_id: Uuid, patch: TaskPatch) {
        let mut tasks = self.tasks.lock().expect("task store lock poisoned");
        let record = tasks
            .entry(task_id)
            .or_insert_with(|| TaskRecord::new(task_id, String::new(), RefineMode::Raw));

        if let Some(status) = patch.status {
            if !record.status.is_terminal() && status.rank() >= record.status.rank() {
                record.status = status;
            }
        }
        if let Some(started_at) = patch.started_at {
            record.started_at = Some(started_at);
        }
        if let Some(finished_at) = patch.finished_at {
            record.finished_at = Some(finished_at);
        }
        if let Some(filepath) = patch.filepath {
            record.filepath = Some(filepath);
        }
        if let Some(warning) = patch.warning {
            record.warning = Some(warning);
        }
        if let Some(error) = patch.error {
            record.error = Some(error);
        }
    }

    /// Snapshot of a record, or `TaskNotFound`.
    pub fn get(&self, task_id: Uuid) -> Result<TaskRecord, ClipError> {
        let tasks = self.tasks.lock().expect("task store lock poisoned");
        tasks
            .get(&task_id)
            .cloned()
            .ok_or(ClipError::TaskNotFound(task_id))
    }
}
