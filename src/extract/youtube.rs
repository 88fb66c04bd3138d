//! YouTube extraction strategy
//!
//! Transcript retrieval is two-tier: the public timedtext endpoint first,
//! then scraping the watch page's embedded player-response JSON for caption
//! tracks. Metadata comes from the oEmbed endpoint (no auth), with a page
//! `<title>` scrape as last resort.

use std::time::Duration;

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use serde_json::Value;
use url::Url;

use super::{page_title, ContentRecord, SourceType, DESKTOP_UA};
use crate::error::ClipError;

const OEMBED_TIMEOUT: Duration = Duration::from_secs(15);
const PAGE_TIMEOUT: Duration = Duration::from_secs(25);

/// Language order for the structured transcript lookup.
const TIMEDTEXT_LANGS: [&str; 3] = ["zh-Hans", "zh-Hant", "en"];
/// Language preference when picking among page caption tracks.
const TRACK_LANG_PREFERENCE: [&str; 4] = ["zh-hans", "zh-cn", "zh", "en"];

const NO_TRANSCRIPT: &str = "(No transcript available for this video. Metadata only.)";

/// Resolve a YouTube video id from the known URL shapes:
/// `youtu.be/<id>`, `youtube.com/watch?v=<id>`, `/embed/<id>`, `/v/<id>`.
pub fn youtube_video_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();

    if host == "youtu.be" {
        let id = parsed.path().trim_start_matches('/');
        return if id.is_empty() {
            None
        } else {
            Some(id.split('/').next().unwrap_or(id).to_string())
        };
    }

    if host == "youtube.com" || host.ends_with(".youtube.com") {
        if parsed.path() == "/watch" {
            return parsed
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.to_string());
        }
        for prefix in ["/embed/", "/v/"] {
            if let Some(rest) = parsed.path().strip_prefix(prefix) {
                let id = rest.split('/').next().unwrap_or("");
                if !id.is_empty() {
                    return Some(id.to_string());
                }
            }
        }
    }

    None
}

pub async fn extract_youtube(
    client: &reqwest::Client,
    url: &str,
) -> Result<ContentRecord, ClipError> {
    let video_id = youtube_video_id(url).ok_or_else(|| {
        ClipError::InvalidUrl("could not extract YouTube video id".to_string())
    })?;

    let (content, has_transcript) = match fetch_timedtext(client, &video_id).await {
        Some(text) => (text, true),
        None => {
            tracing::debug!(video_id = %video_id, "timedtext lookup empty, scraping watch page");
            match fetch_page_captions(client, url).await {
                Some(text) => (text, true),
                None => (NO_TRANSCRIPT.to_string(), false),
            }
        }
    };

    let (mut title, author) = fetch_oembed(client, url).await;
    if title.is_none() {
        title = fetch_page(client, url)
            .await
            .ok()
            .and_then(|html| page_title(&html));
    }

    Ok(ContentRecord {
        title: title.unwrap_or_else(|| format!("YouTube Video ({})", video_id)),
        content,
        author: Some(author.unwrap_or_else(|| "YouTube Creator".to_string())),
        publish_date: None,
        source_type: SourceType::Video,
        has_transcript,
        url: url.to_string(),
    })
}

/// Tier 1: structured transcript via the timedtext endpoint, first language
/// that yields any cues wins.
async fn fetch_timedtext(client: &reqwest::Client, video_id: &str) -> Option<String> {
    for lang in TIMEDTEXT_LANGS {
        let resp = match client
            .get("https://video.google.com/timedtext")
            .query(&[("v", video_id), ("lang", lang)])
            .timeout(OEMBED_TIMEOUT)
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => r,
            _ => continue,
        };
        let xml = match resp.text().await {
            Ok(x) => x,
            Err(_) => continue,
        };
        let lines = parse_timedtext(&xml);
        if !lines.is_empty() {
            return Some(lines.join(" "));
        }
    }
    None
}

/// Flatten timedtext XML (`<transcript><text ...>cue</text>...`) into cues.
fn parse_timedtext(xml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut lines = Vec::new();
    let mut buf = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"text" => in_text = true,
            Ok(Event::End(e)) if e.name().as_ref() == b"text" => in_text = false,
            Ok(Event::Text(e)) if in_text => {
                let text = e.unescape().unwrap_or_default().trim().to_string();
                if !text.is_empty() {
                    lines.push(text);
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    lines
}

/// Tier 2: scrape the watch page for caption track URLs.
async fn fetch_page_captions(client: &reqwest::Client, url: &str) -> Option<String> {
    let html = fetch_page(client, url).await.ok()?;
    let player = player_response(&html)?;

    let tracks = player
        .pointer("/captions/playerCaptionsTracklistRenderer/captionTracks")?
        .as_array()?;
    let base_url = pick_caption_track(tracks)?;

    let sep = if base_url.contains('?') { "&" } else { "?" };
    let vtt_url = format!("{}{}fmt=vtt", base_url, sep);
    let vtt = client
        .get(&vtt_url)
        .header("User-Agent", DESKTOP_UA)
        .timeout(PAGE_TIMEOUT)
        .send()
        .await
        .ok()?
        .error_for_status()
        .ok()?
        .text()
        .await
        .ok()?;

    let text = strip_vtt_cues(&vtt);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Locate and parse the `ytInitialPlayerResponse` JSON embedded in the page.
fn player_response(html: &str) -> Option<Value> {
    let with_semi = Regex::new(r"(?s)ytInitialPlayerResponse\s*=\s*(\{.*?\});").unwrap();
    let without_semi = Regex::new(r"(?s)ytInitialPlayerResponse\s*=\s*(\{.*?\})").unwrap();

    let raw = with_semi
        .captures(html)
        .or_else(|| without_semi.captures(html))?
        .get(1)?
        .as_str();

    // Some page variants serve the blob with escaped quotes.
    let candidate = if raw.contains("\\\"") {
        raw.replace("\\\"", "\"").replace("\\\\", "\\")
    } else {
        raw.to_string()
    };

    serde_json::from_str(&candidate)
        .or_else(|_| serde_json::from_str(&format!("{}}}", candidate)))
        .ok()
}

/// Pick the preferred caption track's base URL, falling back to the first.
fn pick_caption_track(tracks: &[Value]) -> Option<String> {
    for lang in TRACK_LANG_PREFERENCE {
        for track in tracks {
            let code = track
                .get("languageCode")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_lowercase();
            if code.starts_with(lang) {
                if let Some(base) = track.get("baseUrl").and_then(Value::as_str) {
                    return Some(base.to_string());
                }
            }
        }
    }
    tracks
        .first()?
        .get("baseUrl")
        .and_then(Value::as_str)
        .map(String::from)
}

/// Drop WEBVTT headers, cue timings and cue numbers, keeping caption text.
fn strip_vtt_cues(vtt: &str) -> String {
    let mut lines = Vec::new();
    for line in vtt.lines() {
        let line = line.trim();
        if line.is_empty()
            || line.starts_with("WEBVTT")
            || line.contains("-->")
            || line.chars().all(|c| c.is_ascii_digit())
        {
            continue;
        }
        lines.push(line);
    }
    lines.join("\n").trim().to_string()
}

/// Title and author via the public oEmbed endpoint. No API key required.
async fn fetch_oembed(client: &reqwest::Client, url: &str) -> (Option<String>, Option<String>) {
    let resp = match client
        .get("https://www.youtube.com/oembed")
        .query(&[("url", url), ("format", "json")])
        .timeout(OEMBED_TIMEOUT)
        .send()
        .await
    {
        Ok(r) if r.status().is_success() => r,
        _ => return (None, None),
    };

    match resp.json::<Value>().await {
        Ok(json) => (
            json.get("title").and_then(Value::as_str).map(String::from),
            json.get("author_name")
                .and_then(Value::as_str)
                .map(String::from),
        ),
        Err(_) => (None, None),
    }
}

async fn fetch_page(client: &reqwest::Client, url: &str) -> Result<String, ClipError> {
    let resp = client
        .get(url)
        .header("User-Agent", DESKTOP_UA)
        .header("Accept-Language", "en-US,en;q=0.9,zh-CN;q=0.8")
        .timeout(PAGE_TIMEOUT)
        .send()
        .await?
        .error_for_status()?;
    Ok(resp.text().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_id_equivalent_shapes() {
        let expected = Some("SA2iWivDJiE".to_string());
        assert_eq!(youtube_video_id("http://youtu.be/SA2iWivDJiE"), expected);
        assert_eq!(
            youtube_video_id("http://www.youtube.com/watch?v=SA2iWivDJiE&feature=feedu"),
            expected
        );
        assert_eq!(
            youtube_video_id("http://www.youtube.com/embed/SA2iWivDJiE"),
            expected
        );
        assert_eq!(
            youtube_video_id("http://www.youtube.com/v/SA2iWivDJiE?version=3&hl=en_US"),
            expected
        );
    }

    #[test]
    fn test_video_id_invalid_shapes() {
        assert_eq!(youtube_video_id("https://www.youtube.com/feed/library"), None);
        assert_eq!(youtube_video_id("https://www.youtube.com/watch"), None);
        assert_eq!(youtube_video_id("https://youtu.be/"), None);
        assert_eq!(youtube_video_id("https://example.com/watch?v=abc"), None);
    }

    #[test]
    fn test_parse_timedtext() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
        <transcript>
            <text start="0.0" dur="2.5">Hello world</text>
            <text start="2.5" dur="3.0">&amp; welcome back</text>
            <text start="5.5" dur="1.0">  </text>
        </transcript>"#;
        let lines = parse_timedtext(xml);
        assert_eq!(lines, vec!["Hello world", "& welcome back"]);
        assert!(parse_timedtext("").is_empty());
    }

    #[test]
    fn test_strip_vtt_cues() {
        let vtt = "WEBVTT\n\n1\n00:00:00.000 --> 00:00:02.000\nFirst line\n\n2\n00:00:02.000 --> 00:00:04.000\nSecond line\n";
        assert_eq!(strip_vtt_cues(vtt), "First line\nSecond line");
    }

    #[test]
    fn test_pick_caption_track_prefers_chinese() {
        let tracks = vec![
            serde_json::json!({"languageCode": "en", "baseUrl": "https://yt/en"}),
            serde_json::json!({"languageCode": "zh-Hans", "baseUrl": "https://yt/zh"}),
        ];
        assert_eq!(pick_caption_track(&tracks), Some("https://yt/zh".to_string()));

        let only_fr = vec![serde_json::json!({"languageCode": "fr", "baseUrl": "https://yt/fr"})];
        assert_eq!(pick_caption_track(&only_fr), Some("https://yt/fr".to_string()));
        assert_eq!(pick_caption_track(&[]), None);
    }

    #[test]
    fn test_player_response_parse() {
        let html = r#"<script>var ytInitialPlayerResponse = {"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[{"languageCode":"en","baseUrl":"https://yt/cc"}]}}};</script>"#;
        let player = player_response(html).expect("player response parses");
        let tracks = player
            .pointer("/captions/playerCaptionsTracklistRenderer/captionTracks")
            .and_then(Value::as_array)
            .expect("caption tracks present");
        assert_eq!(tracks.len(), 1);
        assert!(player_response("<html>no player here</html>").is_none());
    }
}
