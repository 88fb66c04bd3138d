//! Category filing and Markdown persistence
//!
//! Categories are a fixed, closed set; anything external maps through an
//! alias table or falls back to the catch-all. Filename and category
//! components are sanitized for cross-platform filesystem use before any
//! path is built.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::error::ClipError;
use crate::extract::ContentRecord;

/// Default destination root, relative to the working directory.
pub const DEFAULT_ROOT: &str = "materials";

/// Catch-all category.
pub const FALLBACK_CATEGORY: &str = "其他";

/// The closed category set.
pub const CATEGORIES: [&str; 7] = ["AI科技", "体育", "影视", "财经", "政治", "编程", "其他"];

const MAX_FILENAME_CHARS: usize = 80;
const MAX_TOPIC_CHARS: usize = 60;

/// Windows reserved device names. A sanitized component that collides with
/// one of these gets an underscore prefix instead of a rejection.
const RESERVED_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Map an externally supplied category label onto the closed set.
pub fn canonical_category(raw: &str) -> &'static str {
    let trimmed = raw.trim();
    for member in CATEGORIES {
        if trimmed == member {
            return member;
        }
    }
    match trimmed.to_lowercase().as_str() {
        "科技" | "ai" | "tech" | "technology" | "人工智能" => "AI科技",
        "sports" | "sport" | "运动" => "体育",
        "movie" | "movies" | "film" | "电影" | "娱乐" => "影视",
        "finance" | "economy" | "金融" | "经济" => "财经",
        "politics" | "时政" => "政治",
        "programming" | "coding" | "code" | "代码" | "开发" => "编程",
        _ => FALLBACK_CATEGORY,
    }
}

/// Keyword-rule category decision over title and content. First match wins.
pub fn classify_category(record: &ContentRecord) -> &'static str {
    let haystack = format!("{} {}", record.title, record.content).to_lowercase();

    let rules: [(&str, &[&str]); 6] = [
        (
            "AI科技",
            &["gpt", "llm", "openai", "人工智能", "大模型", "机器学习", "深度学习", "neural"],
        ),
        (
            "编程",
            &["python", "rust", "javascript", "编程", "代码", "程序员", "github", "tutorial"],
        ),
        (
            "财经",
            &["财经", "股票", "基金", "经济", "投资", "金融", "stock", "market"],
        ),
        (
            "体育",
            &["体育", "足球", "篮球", "nba", "世界杯", "奥运", "sports"],
        ),
        (
            "影视",
            &["电影", "影视", "电视剧", "剧集", "预告", "导演", "movie", "film"],
        ),
        (
            "政治",
            &["政治", "政府", "选举", "政策", "国会", "election"],
        ),
    ];

    for (category, keywords) in rules {
        if keywords.iter().any(|k| haystack.contains(k)) {
            return category;
        }
    }
    FALLBACK_CATEGORY
}

/// Strip filesystem-illegal characters, collapse whitespace to underscores,
/// collapse runs of underscores, guard reserved device names, and truncate.
/// Never returns an empty string when given a fallback.
pub fn sanitize_component(raw: &str, max_chars: usize, fallback: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') && !c.is_control())
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();

    let collapsed = Regex::new("_+").unwrap().replace_all(&cleaned, "_");
    let truncated: String = collapsed.trim_matches('_').chars().take(max_chars).collect();
    let mut name = truncated.trim_matches('_').to_string();

    if name.is_empty() {
        return fallback.to_string();
    }

    let stem = name.split('.').next().unwrap_or(&name).to_uppercase();
    if RESERVED_NAMES.contains(&stem.as_str()) {
        name = format!("_{}", name);
    }
    name
}

/// Build a `YYYYMMDD_<topic>.md` filename from a title.
pub fn build_filename(title: &str, now: DateTime<Utc>) -> String {
    let topic = sanitize_component(title, MAX_TOPIC_CHARS, "untitled");
    ensure_markdown_name(&format!("{}_{}", now.format("%Y%m%d"), topic), now)
}

/// Enforce the date prefix and `.md` suffix on an externally supplied name,
/// bounded to the filename length limit.
pub fn ensure_markdown_name(name: &str, now: DateTime<Utc>) -> String {
    let date_prefix = Regex::new(r"^\d{8}_").unwrap();
    let mut name = sanitize_component(name, MAX_FILENAME_CHARS, "untitled");

    if !date_prefix.is_match(&name) {
        name = format!("{}_{}", now.format("%Y%m%d"), name);
    }
    let mut stem = name.trim_end_matches(".md").to_string();
    // Keep room for the extension within the overall bound.
    let max_stem = MAX_FILENAME_CHARS.saturating_sub(3);
    if stem.chars().count() > max_stem {
        stem = stem.chars().take(max_stem).collect();
    }
    format!("{}.md", stem.trim_matches('_'))
}

/// Destination root: the caller-supplied path when it can be created,
/// otherwise the default.
pub fn resolve_root(save_path: Option<&str>) -> PathBuf {
    if let Some(p) = save_path {
        let trimmed = p.trim();
        if !trimmed.is_empty() && fs::create_dir_all(trimmed).is_ok() {
            return PathBuf::from(trimmed);
        }
        if !trimmed.is_empty() {
            tracing::warn!(path = %trimmed, "save path not usable, falling back to default root");
        }
    }
    PathBuf::from(DEFAULT_ROOT)
}

/// Write Markdown under `<root>/<category>/<filename>`, creating the
/// category directory and resolving filename collisions with a Unix
/// timestamp suffix. Returns the final path.
pub fn save_markdown(
    root: &Path,
    category: &str,
    filename: &str,
    content: &str,
) -> Result<PathBuf, ClipError> {
    let category = sanitize_component(category, MAX_TOPIC_CHARS, FALLBACK_CATEGORY);
    let dir = root.join(category);
    fs::create_dir_all(&dir)?;

    let mut path = dir.join(filename);
    if path.exists() {
        let stem = filename.trim_end_matches(".md");
        path = dir.join(format!("{}_{}.md", stem, Utc::now().timestamp()));
    }

    fs::write(&path, content)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::SourceType;
    use chrono::TimeZone;

    fn record(title: &str, content: &str) -> ContentRecord {
        ContentRecord {
            title: title.to_string(),
            content: content.to_string(),
            author: None,
            publish_date: None,
            source_type: SourceType::Article,
            has_transcript: false,
            url: "https://example.com".to_string(),
        }
    }

    #[test]
    fn test_sanitize_strips_illegal_characters() {
        let out = sanitize_component("Report: 2024/Q1 <final>", 80, "untitled");
        assert!(!out.is_empty());
        for c in ['<', '>', ':', '"', '/', '\\', '|', '?', '*'] {
            assert!(!out.contains(c), "illegal char {:?} in {:?}", c, out);
        }
        assert_eq!(out, "Report_2024Q1_final");
    }

    #[test]
    fn test_sanitize_collapses_and_falls_back() {
        assert_eq!(sanitize_component("a   b___c", 80, "untitled"), "a_b_c");
        assert_eq!(sanitize_component("///???", 80, "untitled"), "untitled");
        assert_eq!(sanitize_component("", 80, "untitled"), "untitled");
    }

    #[test]
    fn test_sanitize_reserved_names() {
        assert_eq!(sanitize_component("CON", 80, "untitled"), "_CON");
        assert_eq!(sanitize_component("com1.md", 80, "untitled"), "_com1.md");
        assert_eq!(sanitize_component("console", 80, "untitled"), "console");
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "x".repeat(200);
        assert_eq!(sanitize_component(&long, 60, "untitled").chars().count(), 60);
    }

    #[test]
    fn test_build_filename_shape() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let name = build_filename("Automate Excel with Python", now);
        assert_eq!(name, "20240501_Automate_Excel_with_Python.md");
        assert!(name.chars().count() <= 80);
    }

    #[test]
    fn test_ensure_markdown_name_enforces_prefix_and_suffix() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(ensure_markdown_name("notes", now), "20240501_notes.md");
        assert_eq!(
            ensure_markdown_name("20231231_notes.md", now),
            "20231231_notes.md"
        );
        let long = format!("20240501_{}", "y".repeat(120));
        let bounded = ensure_markdown_name(&long, now);
        assert!(bounded.chars().count() <= 80);
        assert!(bounded.ends_with(".md"));
    }

    #[test]
    fn test_canonical_category() {
        assert_eq!(canonical_category("AI科技"), "AI科技");
        assert_eq!(canonical_category("tech"), "AI科技");
        assert_eq!(canonical_category("Movies"), "影视");
        assert_eq!(canonical_category("something else"), "其他");
    }

    #[test]
    fn test_classify_category_rules() {
        assert_eq!(
            classify_category(&record("Automate Excel with Python", "pandas tutorial")),
            "编程"
        );
        assert_eq!(
            classify_category(&record("GPT-4 发布", "大模型推理能力提升")),
            "AI科技"
        );
        assert_eq!(classify_category(&record("Daily note", "nothing special")), "其他");
    }

    #[test]
    fn test_save_markdown_and_collision() {
        let tmp = tempfile::tempdir().unwrap();
        let first = save_markdown(tmp.path(), "其他", "20240501_note.md", "one").unwrap();
        assert!(first.exists());
        assert!(first.to_string_lossy().ends_with(".md"));

        let second = save_markdown(tmp.path(), "其他", "20240501_note.md", "two").unwrap();
        assert!(second.exists());
        assert_ne!(first, second);
        assert_eq!(fs::read_to_string(&first).unwrap(), "one");
        assert_eq!(fs::read_to_string(&second).unwrap(), "two");
    }

    #[test]
    fn test_resolve_root_fallback() {
        assert_eq!(resolve_root(None), PathBuf::from(DEFAULT_ROOT));
        assert_eq!(resolve_root(Some("  ")), PathBuf::from(DEFAULT_ROOT));
        let tmp = tempfile::tempdir().unwrap();
        let custom = tmp.path().join("clips");
        let resolved = resolve_root(Some(custom.to_str().unwrap()));
        assert_eq!(resolved, custom);
        assert!(custom.exists());
    }
}
