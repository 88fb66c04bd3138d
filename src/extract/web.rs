//! Generic webpage extraction via readability
//!
//! Downloads the page and runs the readability article extractor over it,
//! picking up author and publish-date metadata from standard meta tags.

use std::io::Cursor;
use std::time::Duration;

use scraper::{Html, Selector};
use url::Url;

use super::{meta_content, meta_property, ContentRecord, SourceType, DESKTOP_UA};
use crate::error::ClipError;

const PAGE_TIMEOUT: Duration = Duration::from_secs(20);

pub async fn extract_web(
    client: &reqwest::Client,
    url: &str,
) -> Result<ContentRecord, ClipError> {
    let parsed = Url::parse(url).map_err(|e| ClipError::InvalidUrl(format!("{}: {}", url, e)))?;

    let resp = client
        .get(url)
        .header("User-Agent", DESKTOP_UA)
        .timeout(PAGE_TIMEOUT)
        .send()
        .await?
        .error_for_status()?;
    let html = resp.text().await?;

    let mut cursor = Cursor::new(html.as_bytes());
    let product = readability::extractor::extract(&mut cursor, &parsed)
        .map_err(|e| ClipError::Upstream(format!("readability extraction failed: {:?}", e)))?;

    let title = if product.title.is_empty() {
        super::page_title(&html).unwrap_or_else(|| url.to_string())
    } else {
        product.title
    };

    Ok(ContentRecord {
        title,
        content: product.text,
        author: page_authors(&html),
        publish_date: page_publish_date(&html),
        source_type: SourceType::Article,
        has_transcript: false,
        url: url.to_string(),
    })
}

/// All `<meta name="author">` values, joined.
fn page_authors(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"meta[name="author"]"#).unwrap();
    let authors: Vec<String> = document
        .select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if authors.is_empty() {
        None
    } else {
        Some(authors.join(", "))
    }
}

/// Publish date from the usual meta tags, already ISO-formatted upstream.
fn page_publish_date(html: &str) -> Option<String> {
    meta_property(html, "article:published_time").or_else(|| meta_content(html, "date"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_authors_joined() {
        let html = r#"
        <html><head>
            <meta name="author" content="Alice">
            <meta name="author" content="Bob">
        </head></html>
        "#;
        assert_eq!(page_authors(html), Some("Alice, Bob".to_string()));
        assert_eq!(page_authors("<html></html>"), None);
    }

    #[test]
    fn test_page_publish_date_sources() {
        let og = r#"<html><head><meta property="article:published_time" content="2024-03-02T08:00:00Z"></head></html>"#;
        assert_eq!(
            page_publish_date(og),
            Some("2024-03-02T08:00:00Z".to_string())
        );
        let plain = r#"<html><head><meta name="date" content="2024-03-02"></head></html>"#;
        assert_eq!(page_publish_date(plain), Some("2024-03-02".to_string()));
        assert_eq!(page_publish_date("<html></html>"), None);
    }
}
