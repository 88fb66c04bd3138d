//! Error taxonomy for extraction, refinement and persistence

use uuid::Uuid;

/// Errors raised inside the clipper core.
///
/// Extraction strategies return these internally; the dispatcher converts
/// every one of them into a `ContentRecord` with `source_type = error`, so
/// nothing here crosses the dispatcher or job-runner boundary as an Err.
#[derive(Debug, thiserror::Error)]
pub enum ClipError {
    /// Malformed or unsupported URL shape (e.g. a non-video Douyin link).
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Network failure while talking to a source platform.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed JSON from a platform endpoint.
    #[error("malformed response: {0}")]
    Json(#[from] serde_json::Error),

    /// A platform API answered but reported an application-level error.
    #[error("{0}")]
    Upstream(String),

    /// LLM rewrite failure. Triggers the raw-mode downgrade, never a task
    /// failure on its own.
    #[error("refinement failed: {0}")]
    Refinement(String),

    /// Disk write failure. Fatal to the task that hit it.
    #[error("persistence failure: {0}")]
    Persistence(#[from] std::io::Error),

    /// Unknown task id at the query boundary.
    #[error("task not found: {0}")]
    TaskNotFound(Uuid),
}

/// Truncate an error message for embedding into a record, keeping it
/// human-readable and bounded.
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    if message.chars().count() <= max_chars {
        return message.to_string();
    }
    let truncated: String = message.chars().take(max_chars).collect();
    format!("{}...", truncated)
}

/// Mask an API key anywhere it appears in user-visible text.
pub fn redact_secret(text: &str, api_key: Option<&str>) -> String {
    match api_key {
        Some(key) if !key.is_empty() => text.replace(key, "***"),
        _ => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_message() {
        assert_eq!(truncate_message("short", 100), "short");
        let long = "x".repeat(300);
        let out = truncate_message(&long, 200);
        assert_eq!(out.chars().count(), 203);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn test_redact_secret() {
        let msg = "401 Unauthorized: key sk-abc123 rejected";
        assert_eq!(
            redact_secret(msg, Some("sk-abc123")),
            "401 Unauthorized: key *** rejected"
        );
        assert_eq!(redact_secret(msg, None), msg);
        assert_eq!(redact_secret(msg, Some("")), msg);
    }
}
