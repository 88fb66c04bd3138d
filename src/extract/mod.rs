//! Multi-platform content extraction
//!
//! One strategy per platform, each a function `URL -> ContentRecord`, selected
//! by the classifier. The dispatcher is a firewall boundary: any strategy
//! failure is converted into a record with `source_type = error`, never
//! propagated as an Err.

mod bilibili;
mod douyin;
mod web;
mod youtube;

pub use bilibili::{bilibili_bvid, extract_bilibili};
pub use douyin::{douyin_video_id, extract_douyin, normalize_douyin_url};
pub use web::extract_web;
pub use youtube::{extract_youtube, youtube_video_id};

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use crate::classify::{classify, Platform};
use crate::error::{truncate_message, ClipError};

pub(crate) const DESKTOP_UA: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
pub(crate) const MOBILE_UA: &str =
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";

/// Kind of content a record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Video,
    Article,
    Error,
}

/// Normalized extraction output. Title and content are always populated;
/// failed extractions carry the error message as content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    pub title: String,
    pub content: String,
    pub author: Option<String>,
    pub publish_date: Option<String>,
    pub source_type: SourceType,
    pub has_transcript: bool,
    pub url: String,
}

impl ContentRecord {
    /// Build an error record for a failed strategy.
    pub fn failure(platform: &str, url: &str, err: &ClipError) -> Self {
        ContentRecord {
            title: format!("Error Extracting {}", platform),
            content: format!(
                "Failed to process {} source: {}",
                platform,
                truncate_message(&err.to_string(), 300)
            ),
            author: None,
            publish_date: None,
            source_type: SourceType::Error,
            has_transcript: false,
            url: url.to_string(),
        }
    }
}

/// Dispatch a URL to its platform strategy. Never fails: internal errors are
/// embedded in the returned record.
pub async fn extract(client: &reqwest::Client, url: &str) -> ContentRecord {
    match classify(url) {
        Platform::Youtube => extract_youtube(client, url)
            .await
            .unwrap_or_else(|e| ContentRecord::failure("YouTube", url, &e)),
        Platform::Bilibili => extract_bilibili(client, url)
            .await
            .unwrap_or_else(|e| ContentRecord::failure("Bilibili", url, &e)),
        Platform::Douyin => extract_douyin(client, url)
            .await
            .unwrap_or_else(|e| ContentRecord::failure("Douyin", url, &e)),
        Platform::GenericWeb => extract_web(client, url)
            .await
            .unwrap_or_else(|e| ContentRecord::failure("Webpage", url, &e)),
        Platform::Unknown => ContentRecord::failure(
            "Webpage",
            url,
            &ClipError::InvalidUrl(format!("cannot parse URL: {}", url)),
        ),
    }
}

/// First `<title>` text of an HTML document, whitespace-collapsed.
pub(crate) fn page_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").unwrap();
    let element = document.select(&selector).next()?;
    let text = element.text().collect::<String>();
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Content attribute of `<meta name="...">`.
pub(crate) fn meta_content(html: &str, name: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(&format!(r#"meta[name="{}"]"#, name)).ok()?;
    let element = document.select(&selector).next()?;
    let content = element.value().attr("content")?.trim();
    if content.is_empty() {
        None
    } else {
        Some(content.to_string())
    }
}

/// Content attribute of `<meta property="...">` (OpenGraph-style tags).
pub(crate) fn meta_property(html: &str, property: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(&format!(r#"meta[property="{}"]"#, property)).ok()?;
    let element = document.select(&selector).next()?;
    let content = element.value().attr("content")?.trim();
    if content.is_empty() {
        None
    } else {
        Some(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_title_and_meta() {
        let html = r#"
        <html>
        <head>
            <title>  A   Spaced
            Title </title>
            <meta name="description" content="A short description">
            <meta property="article:published_time" content="2024-05-01T10:00:00Z">
        </head>
        </html>
        "#;

        assert_eq!(page_title(html), Some("A Spaced Title".to_string()));
        assert_eq!(
            meta_content(html, "description"),
            Some("A short description".to_string())
        );
        assert_eq!(meta_content(html, "missing"), None);
        assert_eq!(
            meta_property(html, "article:published_time"),
            Some("2024-05-01T10:00:00Z".to_string())
        );
    }

    #[tokio::test]
    async fn test_extract_never_fails_on_unknown_url() {
        let client = reqwest::Client::new();
        let record = extract(&client, "not a url at all").await;
        assert_eq!(record.source_type, SourceType::Error);
        assert!(!record.title.is_empty());
        assert!(!record.content.is_empty());
    }

    #[tokio::test]
    async fn test_extract_embeds_network_failure() {
        // Port 9 (discard) is not listening; the fetch fails fast and the
        // dispatcher must still return a typed record.
        let client = reqwest::Client::new();
        let record = extract(&client, "http://127.0.0.1:9/article").await;
        assert_eq!(record.source_type, SourceType::Error);
        assert!(record.content.contains("Failed to process"));
        assert_eq!(record.url, "http://127.0.0.1:9/article");
    }
}
