use std::sync::{Arc, Mutex};

use idea_pulse::{types::VideoDescriptor, yt::VideoSearcher};

#[derive(Clone, Default)]
pub struct MockSearcher {
    pub videos: Vec<VideoDescriptor>,
    pub calls: Arc<Mutex<Vec<(String, usize)>>>,
    pub fail_with: Option<String>,
}

impl MockSearcher {
    pub fn with_videos(ids: &[&str]) -> Self {
        Self {
            videos: ids
                .iter()
                .map(|id| VideoDescriptor {
                    id: id.to_string(),
                    title: format!("Video {id}"),
                    url: idea_pulse::yt::video_url(id),
                    duration_seconds: 600,
                    view_count: 1_500,
                    author: "Mock Channel".into(),
                    thumbnail_url: format!("https://img.youtube.com/vi/{id}/maxresdefault.jpg"),
                    age_seconds: None,
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn failing(msg: &str) -> Self {
        Self {
            fail_with: Some(msg.to_string()),
            ..Default::default()
        }
    }
}

impl VideoSearcher for MockSearcher {
    const SEARCH_URL: &'static str = "https://youtube.com/mock/results";
    type Error = anyhow::Error;

    async fn search(&self, keyword: &str, limit: usize) -> anyhow::Result<Vec<VideoDescriptor>> {
        self.calls.lock().unwrap().push((keyword.to_string(), limit));
        if let Some(ref msg) = self.fail_with {
            return Err(anyhow::anyhow!("{}", msg));
        }
        Ok(self.videos.iter().take(limit).cloned().collect())
    }
}
