//! Content refinement: raw Markdown rendering and optional LLM rewrite
//!
//! The rewrite path talks to an OpenAI-compatible chat-completions endpoint.
//! Refinement is never allowed to fail a task: an auth failure (detected as a
//! substring match on the result text — deliberately the same brittle
//! heuristic the upstream providers are known by) or any call error downgrades
//! the job to raw rendering with a non-fatal warning.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{redact_secret, truncate_message, ClipError};
use crate::extract::ContentRecord;

const REFINE_TIMEOUT: Duration = Duration::from_secs(25);
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const PROMPT_TRANSCRIPT_CHARS: usize = 4000;

const SYSTEM_PROMPT: &str = "You are an expert technical writer and developer.";

/// Auth-failure markers matched case-insensitively against the rewrite
/// result. Kept as-is for compatibility; known to be fragile for non-English
/// providers and wrapped errors.
const AUTH_FAILURE_MARKERS: [&str; 3] = ["401", "authentication fails", "authentication_error"];

/// Processing mode requested at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefineMode {
    Raw,
    AiRewrite,
}

impl Default for RefineMode {
    fn default() -> Self {
        RefineMode::Raw
    }
}

/// Rewrite configuration carried with each job.
#[derive(Debug, Clone)]
pub struct RefineOptions {
    pub mode: RefineMode,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// Refinement outcome: final Markdown plus an optional non-fatal warning.
#[derive(Debug, Clone)]
pub struct Refined {
    pub markdown: String,
    pub warning: Option<String>,
}

/// Turn a record into Markdown, downgrading to raw rendering when the AI
/// path cannot deliver.
pub async fn refine(
    client: &reqwest::Client,
    options: &RefineOptions,
    record: &ContentRecord,
) -> Refined {
    match options.mode {
        RefineMode::Raw => Refined {
            markdown: render_raw(record),
            warning: None,
        },
        RefineMode::AiRewrite => {
            let result = rewrite(client, options, record).await;
            settle_rewrite(record, result, options.api_key.as_deref())
        }
    }
}

/// Decide what the ai_rewrite outcome means for the task. Split out from
/// `refine` so the downgrade policy is testable without a network.
pub(crate) fn settle_rewrite(
    record: &ContentRecord,
    result: Result<String, ClipError>,
    api_key: Option<&str>,
) -> Refined {
    match result {
        Ok(text) if looks_like_auth_failure(&text) => {
            tracing::warn!("AI response looks like an auth failure, downgrading to raw mode");
            Refined {
                markdown: render_raw(record),
                warning: Some(
                    "AI authentication failed; content saved with raw formatting".to_string(),
                ),
            }
        }
        Ok(text) => Refined {
            markdown: text,
            warning: None,
        },
        Err(e) => {
            let reason = redact_secret(&truncate_message(&e.to_string(), 200), api_key);
            tracing::warn!(error = %reason, "AI rewrite failed, downgrading to raw mode");
            Refined {
                markdown: render_raw(record),
                warning: Some(format!(
                    "AI rewrite failed ({}); content saved with raw formatting",
                    reason
                )),
            }
        }
    }
}

/// Case-insensitive match against the known provider auth-failure markers.
pub fn looks_like_auth_failure(text: &str) -> bool {
    let lower = text.to_lowercase();
    AUTH_FAILURE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Render a record as Markdown without any AI involvement.
pub fn render_raw(record: &ContentRecord) -> String {
    let mut out = format!("# {}\n\n", record.title);
    out.push_str(&format!("**Source URL**: {}\n", record.url));
    if let Some(author) = &record.author {
        out.push_str(&format!("**Author**: {}\n", author));
    }
    if let Some(date) = &record.publish_date {
        out.push_str(&format!("**Published**: {}\n", date));
    }
    out.push_str("\n---\n\n");
    out.push_str(&record.content);
    out.push('\n');
    out
}

/// One chat-completions call against the configured endpoint.
async fn rewrite(
    client: &reqwest::Client,
    options: &RefineOptions,
    record: &ContentRecord,
) -> Result<String, ClipError> {
    let api_key = options
        .api_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ClipError::Refinement("no API key configured".to_string()))?;

    let base = options
        .base_url
        .as_deref()
        .filter(|b| !b.is_empty())
        .unwrap_or(DEFAULT_BASE_URL)
        .trim_end_matches('/');

    let body = serde_json::json!({
        "model": options.model,
        "messages": [
            {"role": "system", "content": SYSTEM_PROMPT},
            {"role": "user", "content": build_prompt(record)},
        ],
    });

    let resp = client
        .post(format!("{}/chat/completions", base))
        .bearer_auth(api_key)
        .json(&body)
        .timeout(REFINE_TIMEOUT)
        .send()
        .await
        .map_err(|e| ClipError::Refinement(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        let detail = resp.text().await.unwrap_or_default();
        return Err(ClipError::Refinement(format!(
            "{} {}",
            status,
            truncate_message(&detail, 200)
        )));
    }

    let json = resp
        .json::<Value>()
        .await
        .map_err(|e| ClipError::Refinement(e.to_string()))?;
    json.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ClipError::Refinement("empty completion".to_string()))
}

fn build_prompt(record: &ContentRecord) -> String {
    let excerpt: String = record.content.chars().take(PROMPT_TRANSCRIPT_CHARS).collect();
    let marker = if record.content.chars().count() > PROMPT_TRANSCRIPT_CHARS {
        "... (truncated)"
    } else {
        ""
    };
    format!(
        "Analyze the following extracted content and rewrite it as a structured Markdown document.\n\n\
         Title: {}\nSource: {}\n\nContent:\n{}{}\n\n\
         Format requirements:\n\
         - Title: derive a suitable title.\n\
         - Summary: brief overview (TL;DR).\n\
         - Key Points: bullet points of the main ideas.\n\
         - Code: keep code snippets in correct language blocks if present.",
        record.title, record.url, excerpt, marker
    )
}
