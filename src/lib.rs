//! Omni-browser web clipper core
//!
//! Extracts content from heterogeneous web sources and files it as Markdown:
//! - YouTube: transcript tiers (timedtext, page caption scrape) + oEmbed
//! - Bilibili: view/player APIs + subtitle flattening, page-scrape fallback
//! - Douyin: best-effort metadata (render-data blob, mobile share retry)
//! - Generic web: readability article extraction
//!
//! Jobs run in the background against an in-memory, lock-guarded task store;
//! the HTTP boundary answers submissions immediately with a task id.

pub mod classify;
pub mod error;
pub mod extract;
pub mod refine;
pub mod runner;
pub mod server;
pub mod storage;
pub mod task;

pub use classify::{classify, Platform};
pub use error::ClipError;
pub use extract::{extract, ContentRecord, SourceType};
pub use refine::{RefineMode, RefineOptions, Refined};
pub use runner::{run_job, JobRequest};
pub use server::{build_router, start_server, AppState};
pub use task::{TaskPatch, TaskRecord, TaskStatus, TaskStore};
