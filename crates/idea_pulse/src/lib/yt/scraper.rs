use std::ops::Deref;

use crate::{
    error::Error,
    parser::{parse_search_results, YtHtmlDocument},
    types::VideoDescriptor,
    yt::VideoSearcher,
};

#[derive(Debug, Clone, Default)]
pub struct Scraper(pub reqwest::Client);

impl Deref for Scraper {
    type Target = reqwest::Client;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Scraper {
    /// Loads the search results html page
    #[tracing::instrument(skip(self))]
    async fn fetch_results_page(&self, keyword: &str) -> Result<YtHtmlDocument, Error> {
        let yt_html_document = self
            .get(format!(
                "{}?search_query={}",
                Self::SEARCH_URL,
                urlencoding::encode(keyword)
            ))
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(yt_html_document.into())
    }
}

impl VideoSearcher for Scraper {
    const SEARCH_URL: &'static str = "https://www.youtube.com/results";

    type Error = Error;

    #[tracing::instrument(skip(self))]
    async fn search(&self, keyword: &str, limit: usize) -> Result<Vec<VideoDescriptor>, Error> {
        if keyword.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let doc = self.fetch_results_page(keyword).await?;

        // consent walls and layout changes show up as a page without results
        let videos = match doc
            .to_json::<serde_json::Value>()
            .and_then(|json| parse_search_results(&json, limit))
        {
            Ok(videos) => videos,
            Err(e) => {
                tracing::warn!(error = %e, "Search page had no parseable results");
                Vec::new()
            }
        };

        tracing::info!(count = videos.len(), "Search finished");
        Ok(videos)
    }
}
