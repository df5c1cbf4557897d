use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use tokio::process::Command;

use crate::{
    pipeline::{Classify, StageErrorKind},
    yt::AudioHandler,
};

/// Thin wrapper around the `yt-dlp` binary
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: PathBuf,
    cookies_path: Option<PathBuf>,
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Invalid video url: {0}")]
    InvalidUrl(String),
    #[error("Failed to launch yt-dlp: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("yt-dlp exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("yt-dlp did not produce expected file: {0}")]
    MissingOutput(PathBuf),
}

/// yt-dlp messages that no amount of retrying will fix
const UNRECOVERABLE_MARKERS: &[&str] = &[
    "Video unavailable",
    "Private video",
    "Unsupported URL",
    "HTTP Error 404",
    "This video has been removed",
    "Sign in to confirm your age",
];

impl Classify for DownloadError {
    fn classify(&self) -> StageErrorKind {
        match self {
            DownloadError::InvalidUrl(_) => StageErrorKind::Input,
            DownloadError::Spawn(e) => e.classify(),
            DownloadError::Failed { stderr, .. }
                if UNRECOVERABLE_MARKERS.iter().any(|m| stderr.contains(m)) =>
            {
                StageErrorKind::Permanent
            }
            DownloadError::Failed { .. } => StageErrorKind::Transient,
            DownloadError::MissingOutput(_) => StageErrorKind::Permanent,
        }
    }
}

impl YtDlp {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            cookies_path: None,
        }
    }

    pub fn with_cookies(mut self, cookies_path: Option<PathBuf>) -> Self {
        self.cookies_path = cookies_path;
        self
    }

    fn audio_command(&self, url: &str, output_template: &Path) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .args(["-f", "bestaudio/best", "-x", "--audio-format", "mp3"])
            .args(["--no-playlist", "--quiet", "--no-warnings"])
            .arg("-o")
            .arg(output_template);

        if let Some(cookies) = &self.cookies_path {
            command.arg("--cookies").arg(cookies);
        }

        command
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            // a timed out stage drops the future; take the child down with it
            .kill_on_drop(true);

        command
    }
}

impl AudioHandler for YtDlp {
    type Error = DownloadError;

    #[tracing::instrument(skip(self))]
    async fn download(&self, url: &str, audio_dl_path: &Path) -> Result<PathBuf, DownloadError> {
        let base_name =
            video_id_from_url(url).ok_or_else(|| DownloadError::InvalidUrl(url.to_string()))?;

        let audio_output_template = audio_dl_path.join(format!("{base_name}.%(ext)s"));
        let audio_mp3_path = audio_dl_path.join(format!("{base_name}.mp3"));

        if audio_mp3_path.exists() {
            tracing::debug!("Audio already exists at {}", audio_mp3_path.display());
            return Ok(audio_mp3_path);
        }

        let output = self
            .audio_command(url, &audio_output_template)
            .output()
            .await
            .inspect_err(|e| tracing::error!(error = ?e, "Failed to launch yt-dlp"))
            .map_err(DownloadError::Spawn)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!(status = %output.status, %stderr, "Failed to download audio");
            return Err(DownloadError::Failed {
                status: output.status.to_string(),
                stderr,
            });
        }

        if !audio_mp3_path.exists() {
            return Err(DownloadError::MissingOutput(audio_mp3_path));
        }

        Ok(audio_mp3_path)
    }
}

/// Extracts a filesystem safe video id from watch, short and embed URLs
pub fn video_id_from_url(url: &str) -> Option<String> {
    let url = url.trim();
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return None;
    }

    let without_fragment = url.split('#').next().unwrap_or(url);
    let (path, query) = match without_fragment.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (without_fragment, None),
    };

    let from_query = query.and_then(|q| {
        q.split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(k, _)| *k == "v")
            .map(|(_, v)| v.to_string())
    });

    let id = from_query.or_else(|| {
        path.trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|segment| !segment.contains('.') && !segment.is_empty())
            .map(str::to_string)
    })?;

    let id = id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect::<String>();

    (!id.is_empty()).then_some(id)
}
