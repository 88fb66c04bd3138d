//! URL classification into platform tags
//!
//! Pure hostname matching, no network. Unrecognized-but-valid URLs map to
//! `GenericWeb`; unparseable URLs (or URLs without a host) map to `Unknown`.

use serde::Serialize;
use url::Url;

/// Known source platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Youtube,
    Bilibili,
    Douyin,
    GenericWeb,
    Unknown,
}

/// Map a URL to a platform tag. Never fails.
pub fn classify(url: &str) -> Platform {
    let parsed = match Url::parse(url) {
        Ok(u) => u,
        Err(_) => return Platform::Unknown,
    };
    let host = match parsed.host_str() {
        Some(h) => h.to_lowercase(),
        None => return Platform::Unknown,
    };

    if host.contains("douyin.com") || host.contains("iesdouyin.com") {
        Platform::Douyin
    } else if host.contains("youtube.com") || host == "youtu.be" {
        Platform::Youtube
    } else if host.contains("bilibili.com") {
        Platform::Bilibili
    } else {
        Platform::GenericWeb
    }
}
