//! Bilibili extraction strategy
//!
//! Structured path: view API for metadata and the first page cid, player API
//! for a subtitle track, subtitle JSON flattened to plain lines. When the
//! structured lookup yields nothing, the raw page HTML is regex-scraped for
//! an embedded `subtitle_url` and the download is retried.

use std::time::Duration;

use regex::Regex;
use serde_json::Value;

use super::{ContentRecord, SourceType, DESKTOP_UA};
use crate::error::ClipError;

const API_TIMEOUT: Duration = Duration::from_secs(20);

const VIEW_API: &str = "https://api.bilibili.com/x/web-interface/view";
const PLAYER_API: &str = "https://api.bilibili.com/x/player/v2";

const NO_SUBTITLE: &str = "(No subtitle found; metadata only.)";

/// Canonical `BV` video identifier from the URL path.
pub fn bilibili_bvid(url: &str) -> Option<String> {
    let re = Regex::new(r"/video/(BV[0-9A-Za-z]+)").unwrap();
    re.captures(url).map(|c| c[1].to_string())
}

pub async fn extract_bilibili(
    client: &reqwest::Client,
    url: &str,
) -> Result<ContentRecord, ClipError> {
    let bvid = match bilibili_bvid(url) {
        Some(b) => b,
        None => {
            return Ok(ContentRecord {
                title: "Bilibili Video".to_string(),
                content: "Could not extract Bilibili BV id from URL. Metadata only.".to_string(),
                author: None,
                publish_date: None,
                source_type: SourceType::Video,
                has_transcript: false,
                url: url.to_string(),
            });
        }
    };

    let view = api_get(client, VIEW_API, &[("bvid", bvid.as_str())]).await?;
    if view.get("code").and_then(Value::as_i64) != Some(0) {
        let message = view
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        return Err(ClipError::Upstream(format!(
            "Bilibili view API error: {}",
            message
        )));
    }

    let data = view.get("data").cloned().unwrap_or(Value::Null);
    let title = data
        .get("title")
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| format!("Bilibili Video ({})", bvid));
    let desc = data
        .get("desc")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let author = data
        .pointer("/owner/name")
        .and_then(Value::as_str)
        .map(String::from);
    let publish_date = data
        .get("pubdate")
        .and_then(Value::as_i64)
        .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string());
    let cid = data
        .pointer("/pages/0/cid")
        .and_then(Value::as_i64);

    let mut transcript = String::new();
    if let Some(cid) = cid {
        transcript = fetch_player_subtitle(client, &bvid, cid).await.unwrap_or_default();
    }
    if transcript.is_empty() {
        // Structured lookup failed; fall back to scraping the page itself.
        if let Some(sub_url) = fetch_page_subtitle_url(client, url).await {
            transcript = fetch_subtitle_body(client, &sub_url).await.unwrap_or_default();
        }
    }

    let has_transcript = !transcript.is_empty();
    let content = if has_transcript {
        transcript
    } else if !desc.is_empty() {
        desc
    } else {
        NO_SUBTITLE.to_string()
    };

    Ok(ContentRecord {
        title,
        content,
        author,
        publish_date,
        source_type: SourceType::Video,
        has_transcript,
        url: url.to_string(),
    })
}

async fn api_get(
    client: &reqwest::Client,
    endpoint: &str,
    params: &[(&str, &str)],
) -> Result<Value, ClipError> {
    let resp = client
        .get(endpoint)
        .query(params)
        .header("User-Agent", DESKTOP_UA)
        .header("Accept-Language", "zh-CN,zh;q=0.9,en;q=0.8")
        .header("Referer", "https://www.bilibili.com/")
        .timeout(API_TIMEOUT)
        .send()
        .await?
        .error_for_status()?;
    Ok(resp.json::<Value>().await?)
}

/// Subtitle track URL via the player API, then the flattened cue text.
async fn fetch_player_subtitle(
    client: &reqwest::Client,
    bvid: &str,
    cid: i64,
) -> Option<String> {
    let cid_str = cid.to_string();
    let player = api_get(client, PLAYER_API, &[("bvid", bvid), ("cid", cid_str.as_str())])
        .await
        .ok()?;
    if player.get("code").and_then(Value::as_i64) != Some(0) {
        return None;
    }
    let sub_url = player
        .pointer("/data/subtitle/subtitles/0/subtitle_url")
        .and_then(Value::as_str)?
        .to_string();
    if sub_url.is_empty() {
        return None;
    }
    fetch_subtitle_body(client, &sub_url).await
}

/// Download a subtitle JSON document and flatten `body[].content` into lines.
async fn fetch_subtitle_body(client: &reqwest::Client, sub_url: &str) -> Option<String> {
    let sub_url = normalize_subtitle_url(sub_url);
    let json = client
        .get(&sub_url)
        .header("User-Agent", DESKTOP_UA)
        .header("Referer", "https://www.bilibili.com/")
        .timeout(API_TIMEOUT)
        .send()
        .await
        .ok()?
        .error_for_status()
        .ok()?
        .json::<Value>()
        .await
        .ok()?;

    let text = flatten_subtitle(&json);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Join all non-empty cue contents, one per line.
fn flatten_subtitle(subtitle: &Value) -> String {
    let body = match subtitle.get("body").and_then(Value::as_array) {
        Some(b) => b,
        None => return String::new(),
    };
    body.iter()
        .filter_map(|item| item.get("content").and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Protocol-relative subtitle URLs come back as `//aisubtitle...`.
fn normalize_subtitle_url(sub_url: &str) -> String {
    if sub_url.starts_with("//") {
        format!("https:{}", sub_url)
    } else {
        sub_url.to_string()
    }
}

/// Fallback: find a JSON-escaped `subtitle_url` in the raw page HTML.
async fn fetch_page_subtitle_url(client: &reqwest::Client, url: &str) -> Option<String> {
    let html = client
        .get(url)
        .header("User-Agent", DESKTOP_UA)
        .header("Accept-Language", "zh-CN,zh;q=0.9,en;q=0.8")
        .header("Referer", "https://www.bilibili.com/")
        .timeout(API_TIMEOUT)
        .send()
        .await
        .ok()?
        .error_for_status()
        .ok()?
        .text()
        .await
        .ok()?;
    page_subtitle_url(&html)
}

pub(crate) fn page_subtitle_url(html: &str) -> Option<String> {
    let re = Regex::new(r#""subtitle_url":"(.*?)""#).unwrap();
    let raw = re.captures(html)?.get(1)?.as_str();
    // The captured value is a JSON string body; run it through the JSON
    // parser to undo \/ and \u escapes.
    let unescaped: String = serde_json::from_str(&format!("\"{}\"", raw)).ok()?;
    if unescaped.is_empty() {
        None
    } else {
        Some(unescaped)
    }
}
