//! Douyin extraction strategy
//!
//! Best-effort metadata only; transcript extraction is not implemented for
//! this platform, so `has_transcript` is always false. Profile URLs carrying
//! a `modal_id` are normalized to the canonical `/video/<id>` form first;
//! other non-video Douyin paths are rejected outright.

use std::time::Duration;

use percent_encoding::percent_decode_str;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use url::Url;

use super::{meta_content, page_title, ContentRecord, SourceType, DESKTOP_UA, MOBILE_UA};
use crate::error::ClipError;

const PAGE_TIMEOUT: Duration = Duration::from_secs(25);

const METADATA_ONLY: &str = "(Metadata only; transcript not available.)";

/// Rewrite a profile-page URL with a numeric `modal_id` query parameter to
/// the canonical video URL. Direct `/video/<id>` URLs pass through unchanged;
/// anything else is not a video link and is rejected.
pub fn normalize_douyin_url(url: &str) -> Result<String, ClipError> {
    let parsed =
        Url::parse(url).map_err(|e| ClipError::InvalidUrl(format!("{}: {}", url, e)))?;

    let video_path = Regex::new(r"/video/\d+").unwrap();
    if video_path.is_match(parsed.path()) {
        return Ok(url.to_string());
    }

    if let Some((_, id)) = parsed.query_pairs().find(|(k, _)| k == "modal_id") {
        if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
            return Ok(format!("https://www.douyin.com/video/{}", id));
        }
    }

    Err(ClipError::InvalidUrl(
        "not a Douyin video link; open the video and supply its /video/<id> URL".to_string(),
    ))
}

/// Numeric video id from a `/video/<id>` path.
pub fn douyin_video_id(url: &str) -> Option<String> {
    let re = Regex::new(r"/video/(\d+)").unwrap();
    re.captures(url).map(|c| c[1].to_string())
}

pub async fn extract_douyin(
    client: &reqwest::Client,
    url: &str,
) -> Result<ContentRecord, ClipError> {
    let canonical = normalize_douyin_url(url)?;

    let resp = client
        .get(&canonical)
        .header("User-Agent", DESKTOP_UA)
        .header("Accept-Language", "zh-CN,zh;q=0.9,en;q=0.8")
        .timeout(PAGE_TIMEOUT)
        .send()
        .await?
        .error_for_status()?;
    let final_url = resp.url().to_string();
    let html = resp.text().await?;

    let mut title = page_title(&html).unwrap_or_else(|| "Douyin Video".to_string());
    let mut desc = meta_content(&html, "description").unwrap_or_default();

    let render = render_data(&html);
    if let Some(decoded) = &render {
        if let Some(found) = desc_from_render_data(decoded) {
            title = found.clone();
            desc = found;
        }
    }

    if desc.is_empty() && render.is_none() {
        // Mobile share pages expose metadata that the desktop page hides
        // behind client-side rendering.
        let vid = douyin_video_id(&final_url).or_else(|| douyin_video_id(&canonical));
        if let Some(vid) = vid {
            if let Some(share_html) = fetch_share_page(client, &vid).await {
                if let Some(t) = page_title(&share_html) {
                    title = t;
                }
                if let Some(d) = meta_content(&share_html, "description") {
                    desc = d;
                }
            }
        }
    }

    let desc = desc.trim().to_string();
    Ok(ContentRecord {
        title,
        content: if desc.is_empty() {
            METADATA_ONLY.to_string()
        } else {
            desc
        },
        author: None,
        publish_date: None,
        source_type: SourceType::Video,
        has_transcript: false,
        url: final_url,
    })
}

async fn fetch_share_page(client: &reqwest::Client, video_id: &str) -> Option<String> {
    let share_url = format!("https://www.iesdouyin.com/share/video/{}", video_id);
    let resp = client
        .get(&share_url)
        .header("User-Agent", MOBILE_UA)
        .header("Accept-Language", "zh-CN,zh;q=0.9,en;q=0.8")
        .timeout(PAGE_TIMEOUT)
        .send()
        .await
        .ok()?;
    if !resp.status().is_success() {
        return None;
    }
    resp.text().await.ok()
}

/// Locate and percent-decode the embedded `RENDER_DATA` blob.
pub(crate) fn render_data(html: &str) -> Option<String> {
    // Preferred: the dedicated script tag.
    let document = Html::parse_document(html);
    let selector = Selector::parse("script#RENDER_DATA").unwrap();
    let raw = if let Some(element) = document.select(&selector).next() {
        element.text().collect::<String>()
    } else {
        let re = Regex::new(r#"RENDER_DATA["']?\s*:\s*["']([^"']+)["']"#).unwrap();
        re.captures(html)?.get(1)?.as_str().to_string()
    };

    let decoded = percent_decode_str(raw.trim()).decode_utf8().ok()?;
    if decoded.is_empty() {
        None
    } else {
        Some(decoded.into_owned())
    }
}

/// Dig the aweme description out of a decoded render-data document. The blob
/// is keyed arbitrarily, so every top-level object is probed for the known
/// aweme container names.
pub(crate) fn desc_from_render_data(decoded: &str) -> Option<String> {
    let data: Value = serde_json::from_str(decoded).ok()?;
    let obj = data.as_object()?;

    for value in obj.values() {
        let container = match value.as_object() {
            Some(c) => c,
            None => continue,
        };
        for key in ["aweme", "awemeInfo", "aweme_detail", "awemeDetail"] {
            if let Some(aweme) = container.get(key).and_then(Value::as_object) {
                if let Some(desc) = aweme.get("desc").and_then(Value::as_str) {
                    if !desc.is_empty() {
                        return Some(desc.to_string());
                    }
                }
            }
        }
    }
    None
}
