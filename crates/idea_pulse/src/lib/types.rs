//! Raw `ytInitialData` shapes and the descriptors built from them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const UNTITLED: &str = "Untitled video";
pub const UNKNOWN_AUTHOR: &str = "Unknown author";

/// A single search hit, as shown to the user for selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDescriptor {
    pub id: String,
    pub title: String,
    pub url: String,
    pub duration_seconds: u64,
    pub view_count: u64,
    pub author: String,
    pub thumbnail_url: String,
    /// Seconds since upload, from texts like `"3 weeks ago"`
    #[serde(default)]
    pub age_seconds: Option<u64>,
}

impl VideoDescriptor {
    pub fn duration_str(&self) -> String {
        format_duration(self.duration_seconds)
    }

    pub fn views_str(&self) -> String {
        format_views(self.view_count)
    }
}

/// Formats seconds as `H:MM:SS`, or `M:SS` for videos shorter than an hour
pub fn format_duration(seconds: u64) -> String {
    if seconds == 0 {
        return "unknown length".to_string();
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let seconds = seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

pub fn format_views(views: u64) -> String {
    match views {
        0 => "unknown views".to_string(),
        v if v >= 1_000_000 => format!("{:.1}M", v as f64 / 1_000_000.0),
        v if v >= 1_000 => format!("{:.1}K", v as f64 / 1_000.0),
        v => v.to_string(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRenderer {
    pub video_id: String,
    pub title: Option<Runs>,
    pub length_text: Option<SimpleText>,
    pub view_count_text: Option<SimpleText>,
    pub owner_text: Option<Runs>,
    pub thumbnail: Option<Thumbnails>,
    pub published_time_text: Option<SimpleText>,
    pub upcoming_event_data: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Runs {
    #[serde(default)]
    pub runs: Vec<Run>,
}

impl Runs {
    pub fn first_text(&self) -> Option<&str> {
        self.runs
            .first()
            .map(|r| r.text.trim())
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct Run {
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleText {
    pub simple_text: Option<String>,
    pub runs: Option<Vec<Run>>,
}

impl SimpleText {
    /// Live and premiere renderers put the text into `runs` instead of `simpleText`
    pub fn text(&self) -> Option<String> {
        self.simple_text.clone().or_else(|| {
            self.runs
                .as_ref()
                .map(|runs| runs.iter().map(|r| r.text.as_str()).collect::<String>())
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Thumbnails {
    #[serde(default)]
    pub thumbnails: Vec<Thumbnail>,
}

#[derive(Debug, Deserialize)]
pub struct Thumbnail {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl Thumbnails {
    /// The widest thumbnail on offer
    pub fn best(&self) -> Option<&str> {
        self.thumbnails
            .iter()
            .max_by_key(|t| t.width.unwrap_or(0))
            .map(|t| t.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(0), "unknown length");
        assert_eq!(format_duration(59), "0:59");
        assert_eq!(format_duration(754), "12:34");
        assert_eq!(format_duration(3600), "1:00:00");
        assert_eq!(format_duration(3723), "1:02:03");
    }

    #[test]
    fn formats_views() {
        assert_eq!(format_views(0), "unknown views");
        assert_eq!(format_views(999), "999");
        assert_eq!(format_views(1_000), "1.0K");
        assert_eq!(format_views(15_400), "15.4K");
        assert_eq!(format_views(2_500_000), "2.5M");
    }

    #[test]
    fn simple_text_falls_back_to_runs() {
        let text: SimpleText =
            serde_json::from_str(r#"{"runs":[{"text":"1,024"},{"text":" watching"}]}"#).unwrap();
        assert_eq!(text.text().as_deref(), Some("1,024 watching"));
    }

    #[test]
    fn best_thumbnail_is_widest() {
        let thumbs: Thumbnails = serde_json::from_str(
            r#"{"thumbnails":[{"url":"small","width":120},{"url":"large","width":720},{"url":"none"}]}"#,
        )
        .unwrap();
        assert_eq!(thumbs.best(), Some("large"));
    }
}
