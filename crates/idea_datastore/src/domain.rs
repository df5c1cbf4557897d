use chrono::{DateTime, Utc};
use itertools::Itertools;

/// Separator used when flattening the source video URLs into a single column
pub const URL_SEPARATOR: &str = ", ";

/// A freshly generated idea, not yet persisted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewIdea {
    pub video_urls: Vec<String>,
    pub transcript: String,
    pub idea: String,
}

impl NewIdea {
    pub fn new(
        video_urls: impl IntoIterator<Item = impl Into<String>>,
        transcript: impl Into<String>,
        idea: impl Into<String>,
    ) -> Self {
        Self {
            video_urls: video_urls.into_iter().map(Into::into).collect(),
            transcript: transcript.into(),
            idea: idea.into(),
        }
    }

    pub fn joined_urls(&self) -> String {
        self.video_urls.iter().join(URL_SEPARATOR)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct IdeaRecord {
    pub id: i64,
    pub video_urls: String,
    pub transcript: String,
    pub idea: String,
    pub created_at: DateTime<Utc>,
}

impl IdeaRecord {
    /// Splits the stored URL column back into individual URLs
    pub fn urls(&self) -> Vec<&str> {
        self.video_urls
            .split(URL_SEPARATOR)
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joined_urls_round_trips_through_record() {
        let new_idea = NewIdea::new(
            ["https://youtube.com/watch?v=a", "https://youtube.com/watch?v=b"],
            "t",
            "i",
        );
        let record = IdeaRecord {
            id: 1,
            video_urls: new_idea.joined_urls(),
            transcript: new_idea.transcript.clone(),
            idea: new_idea.idea.clone(),
            created_at: Utc::now(),
        };

        assert_eq!(
            record.urls(),
            vec!["https://youtube.com/watch?v=a", "https://youtube.com/watch?v=b"]
        );
    }

    #[test]
    fn empty_url_column_yields_no_urls() {
        let record = IdeaRecord {
            id: 1,
            video_urls: String::new(),
            transcript: String::new(),
            idea: String::new(),
            created_at: Utc::now(),
        };
        assert!(record.urls().is_empty());
    }
}
