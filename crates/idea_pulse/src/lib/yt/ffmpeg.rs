use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct Ffmpeg {
    binary: PathBuf,
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("Failed to launch ffmpeg: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("ffmpeg exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
}

impl Ffmpeg {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Splits `input` into consecutive `chunk_duration_seconds` long segments
    /// named after `output_pattern` (e.g. `dir/name_%03d.mp3`)
    #[tracing::instrument(skip(self))]
    pub async fn split_audio_to_chunks(
        &self,
        input: &Path,
        chunk_duration_seconds: u16,
        output_pattern: &Path,
    ) -> Result<(), FfmpegError> {
        let output = Command::new(&self.binary)
            .args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
            .arg(input)
            .args(["-f", "segment", "-segment_time"])
            .arg(chunk_duration_seconds.to_string())
            .args(["-c", "copy"])
            .arg(output_pattern)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(FfmpegError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}
