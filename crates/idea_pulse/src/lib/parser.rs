//! # Yt Parser
//!
//! This module provides functionality to parse video search results out of a
//! YouTube results page.

use std::{ops::Deref, sync::LazyLock};

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    error::Error,
    types::{VideoDescriptor, VideoRenderer, UNKNOWN_AUTHOR, UNTITLED},
    yt::video_url,
};

static YT_INTIALDATA_RE: LazyLock<Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?s)<script[^>]*>\s*var\s+ytInitialData\s*=\s*(\{.*?\});\s*</script>")
        .expect("ytInitialData pattern is valid")
});

static PUBLISHED_AGO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s+(second|minute|hour|day|week|month|year)s?")
        .expect("published time pattern is valid")
});

/// Parses up to `limit` videos from the search results JSON.
///
/// # Parameters
/// * `json`: A reference to a `Value` containing the results page `ytInitialData`.
/// * `limit`: The maximum number of videos to return.
///
/// # Returns
/// * `Ok(Vec<VideoDescriptor>)` with the parsed videos in page order. Shelves,
///   channels, playlists, upcoming premieres and renderers that fail to
///   deserialize are skipped.
/// * `Err(Error::ParseError)` if the JSON structure is unexpected.
#[tracing::instrument(skip(json))]
pub fn parse_search_results(json: &Value, limit: usize) -> Result<Vec<VideoDescriptor>, Error> {
    let sections = json["contents"]["twoColumnSearchResultsRenderer"]["primaryContents"]
        ["sectionListRenderer"]["contents"]
        .as_array()
        .ok_or(Error::ParseError(
            "Failed to get ytInitialData['contents']['twoColumnSearchResultsRenderer']['primaryContents']['sectionListRenderer']['contents']",
        ))?;

    let mut videos = Vec::new();

    let renderers = sections
        .iter()
        .filter_map(|section| section["itemSectionRenderer"]["contents"].as_array())
        .flatten()
        .filter_map(|item| item["videoRenderer"].as_object());

    for renderer in renderers {
        if videos.len() >= limit {
            break;
        }

        let video_renderer =
            match serde_json::from_value::<VideoRenderer>(Value::Object(renderer.clone())) {
                Ok(video_renderer) => video_renderer,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed video renderer");
                    continue;
                }
            };
        // Only keep videos that can actually be downloaded
        if video_renderer.upcoming_event_data.is_some() {
            continue;
        }

        videos.push(VideoDescriptor::from(video_renderer));
    }

    Ok(videos)
}

/// Parses `HH:MM:SS`, `MM:SS` or `SS` into seconds
pub fn parse_duration_to_seconds(duration_str: &str) -> Option<u64> {
    let parts = duration_str
        .trim()
        .split(':')
        .map(|p| p.parse::<u64>().ok())
        .collect::<Option<Vec<u64>>>()?;

    match parts.len() {
        3 => Some(parts[0] * 3600 + parts[1] * 60 + parts[2]), // HH:MM:SS
        2 => Some(parts[0] * 60 + parts[1]),                   // MM:SS
        1 => Some(parts[0]),                                   // SS (rare)
        _ => None,
    }
}

/// Converts texts such as `"3 weeks ago"` or `"Streamed 2 days ago"` into
/// seconds. Months count as 30 days and years as 365.
pub fn parse_published_ago(published_text: &str) -> Option<u64> {
    let caps = PUBLISHED_AGO_RE.captures(published_text)?;
    let amount = caps[1].parse::<u64>().ok()?;
    let unit = match &caps[2] {
        "second" => 1,
        "minute" => 60,
        "hour" => 3600,
        "day" => 86_400,
        "week" => 7 * 86_400,
        "month" => 30 * 86_400,
        "year" => 365 * 86_400,
        _ => return None,
    };
    amount.checked_mul(unit)
}

/// Extracts the digits from texts such as `"1,234,567 views"`
pub fn parse_view_count(view_count_text: &str) -> u64 {
    view_count_text
        .chars()
        .filter(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}

impl From<VideoRenderer> for VideoDescriptor {
    fn from(
        VideoRenderer {
            video_id,
            title,
            length_text,
            view_count_text,
            owner_text,
            thumbnail,
            published_time_text,
            ..
        }: VideoRenderer,
    ) -> Self {
        let title = title
            .as_ref()
            .and_then(|t| t.first_text())
            .unwrap_or(UNTITLED)
            .to_string();
        let author = owner_text
            .as_ref()
            .and_then(|o| o.first_text())
            .unwrap_or(UNKNOWN_AUTHOR)
            .to_string();
        let duration_seconds = length_text
            .and_then(|l| l.text())
            .and_then(|d| parse_duration_to_seconds(&d))
            .unwrap_or(0);
        let view_count = view_count_text
            .and_then(|v| v.text())
            .map(|v| parse_view_count(&v))
            .unwrap_or(0);
        let thumbnail_url = thumbnail
            .as_ref()
            .and_then(|t| t.best())
            .map(str::to_string)
            .unwrap_or_else(|| format!("https://img.youtube.com/vi/{video_id}/maxresdefault.jpg"));
        let age_seconds = published_time_text
            .and_then(|p| p.text())
            .and_then(|p| parse_published_ago(&p));

        VideoDescriptor {
            url: video_url(&video_id),
            id: video_id,
            title,
            duration_seconds,
            view_count,
            author,
            thumbnail_url,
            age_seconds,
        }
    }
}

pub struct YtHtmlDocument(String);

impl Deref for YtHtmlDocument {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl YtHtmlDocument {
    pub fn new(doc: String) -> Self {
        YtHtmlDocument(doc)
    }

    pub fn to_json<T>(&self) -> Result<T, crate::error::Error>
    where
        T: DeserializeOwned,
    {
        YT_INTIALDATA_RE
            .captures(self)
            .and_then(|cap| cap.get(1))
            .and_then(|m| serde_json::from_str(m.as_str()).ok())
            .ok_or(Error::ParseError(
                "Failed to extract ytInitialData from the page's script tag",
            ))
    }
}

impl From<String> for YtHtmlDocument {
    fn from(value: String) -> Self {
        YtHtmlDocument(value)
    }
}
