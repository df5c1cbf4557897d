//! Duration filtering and ordering of search results.

use std::{cmp::Reverse, fmt, str::FromStr};

use crate::types::VideoDescriptor;

/// Candidates fetched per requested result while a duration filter is active
pub const CANDIDATE_FACTOR: usize = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Page order as returned by the search
    #[default]
    Relevance,
    /// Most viewed first
    Views,
    /// Longest first
    Length,
    /// Most recently uploaded first; videos without an upload age go last
    Recent,
}

#[derive(Debug, thiserror::Error)]
#[error("Unsupported sort order: {0} (use relevance, views, length or recent)")]
pub struct UnsupportedSortOrder(String);

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Relevance => "relevance",
            SortOrder::Views => "views",
            SortOrder::Length => "length",
            SortOrder::Recent => "recent",
        }
    }
}

impl FromStr for SortOrder {
    type Err = UnsupportedSortOrder;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "relevance" => Ok(SortOrder::Relevance),
            "views" => Ok(SortOrder::Views),
            "length" | "duration" => Ok(SortOrder::Length),
            "recent" | "date" => Ok(SortOrder::Recent),
            other => Err(UnsupportedSortOrder(other.to_string())),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which search results to offer and in what order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub min_duration_seconds: u64,
    /// `None` means no upper bound
    pub max_duration_seconds: Option<u64>,
    pub sort: SortOrder,
}

impl SearchOptions {
    pub fn with_duration(mut self, min_seconds: u64, max_seconds: Option<u64>) -> Self {
        self.min_duration_seconds = min_seconds;
        self.max_duration_seconds = max_seconds;
        self
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn filters_duration(&self) -> bool {
        self.min_duration_seconds > 0 || self.max_duration_seconds.is_some()
    }

    /// How many results to request from the searcher so that `limit` of them
    /// are likely to survive the duration filter
    pub fn candidates_for(&self, limit: usize) -> usize {
        if self.filters_duration() {
            limit.saturating_mul(CANDIDATE_FACTOR)
        } else {
            limit
        }
    }

    /// Bounds are inclusive. Videos of unknown length (0 seconds) only pass
    /// when there is no lower bound.
    pub fn accepts(&self, video: &VideoDescriptor) -> bool {
        video.duration_seconds >= self.min_duration_seconds
            && self
                .max_duration_seconds
                .map_or(true, |max| video.duration_seconds <= max)
    }

    /// Keeps the first `limit` videos that pass the duration filter, then
    /// orders them. Ties keep their page order.
    pub fn apply(&self, videos: Vec<VideoDescriptor>, limit: usize) -> Vec<VideoDescriptor> {
        let mut videos = videos
            .into_iter()
            .filter(|video| self.accepts(video))
            .take(limit)
            .collect::<Vec<_>>();

        match self.sort {
            SortOrder::Relevance => {}
            SortOrder::Views => videos.sort_by_key(|v| Reverse(v.view_count)),
            SortOrder::Length => videos.sort_by_key(|v| Reverse(v.duration_seconds)),
            SortOrder::Recent => videos.sort_by_key(|v| v.age_seconds.unwrap_or(u64::MAX)),
        }

        videos
    }
}
