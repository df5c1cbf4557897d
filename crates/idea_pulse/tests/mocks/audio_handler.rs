use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use idea_pulse::{pipeline::StageErrorKind, yt::AudioHandler};

use super::mock_error;

/// Writes the requested URL into `<dir>/audio.mp3` so downstream stages can
/// tell the items apart
#[derive(Clone, Default)]
pub struct MockAudioHandler {
    pub calls: Arc<Mutex<Vec<String>>>,
    /// URLs that always fail, and how
    pub failures: HashMap<String, StageErrorKind>,
    /// Transient failures left per URL before downloads succeed
    pub flaky: Arc<Mutex<HashMap<String, u32>>>,
    pub delay: Option<Duration>,
}

impl MockAudioHandler {
    pub fn failing_for(url: &str, kind: StageErrorKind) -> Self {
        Self {
            failures: HashMap::from([(url.to_string(), kind)]),
            ..Default::default()
        }
    }

    pub fn flaky_for(url: &str, failures: u32) -> Self {
        Self {
            flaky: Arc::new(Mutex::new(HashMap::from([(url.to_string(), failures)]))),
            ..Default::default()
        }
    }
}

impl AudioHandler for MockAudioHandler {
    type Error = anyhow::Error;

    async fn download(&self, url: &str, audio_dl_path: &Path) -> anyhow::Result<PathBuf> {
        self.calls.lock().unwrap().push(url.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(kind) = self.failures.get(url) {
            return Err(mock_error(*kind, &format!("cannot download {url}")));
        }

        {
            let mut flaky = self.flaky.lock().unwrap();
            if let Some(remaining) = flaky.get_mut(url).filter(|r| **r > 0) {
                *remaining -= 1;
                return Err(mock_error(StageErrorKind::Transient, "connection reset"));
            }
        }

        let path = audio_dl_path.join("audio.mp3");
        std::fs::write(&path, url)?;
        Ok(path)
    }
}
