pub mod audio_handler;
pub mod ffmpeg;
pub mod scraper;
pub mod search;

use std::{
    fmt::{Debug, Display},
    future::Future,
    path::{Path, PathBuf},
};

use crate::{pipeline::Classify, types::VideoDescriptor};

pub const VIDEO_BASE_URL: &str = "https://youtube.com/watch";

/// Canonical watch URL for a video id
pub fn video_url(video_id: &str) -> String {
    format!("{VIDEO_BASE_URL}?v={video_id}")
}

pub trait AudioHandler {
    type Error: Classify + Debug + Display + Send;

    /// Downloads the audio track of `url` into `audio_dl_path` and returns the
    /// path of the produced file. The caller owns the file.
    fn download(
        &self,
        url: &str,
        audio_dl_path: &Path,
    ) -> impl Future<Output = Result<PathBuf, Self::Error>> + Send;
}

pub trait VideoSearcher {
    const SEARCH_URL: &'static str;

    type Error: Debug + Display;

    /// Returns at most `limit` videos for `keyword`. No results is an empty
    /// list, not an error.
    fn search(
        &self,
        keyword: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<VideoDescriptor>, Self::Error>> + Send;
}
