use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use idea_pulse::{pipeline::StageErrorKind, AudioInput, TranscribeResponse, Transcriber};

use super::mock_error;

/// Transcribes the mock audio files written by `MockAudioHandler` into
/// `"transcript of <url>"`
#[derive(Clone, Default)]
pub struct MockTranscriber {
    pub calls: Arc<Mutex<Vec<AudioInput>>>,
    /// URLs whose audio has no speech
    pub silent: HashSet<String>,
    pub fail_with: Option<StageErrorKind>,
    /// Wrap transcripts in subtitle markup and cue timestamps
    pub with_markup: bool,
}

impl MockTranscriber {
    pub fn failing(kind: StageErrorKind) -> Self {
        Self {
            fail_with: Some(kind),
            ..Default::default()
        }
    }

    pub fn with_markup() -> Self {
        Self {
            with_markup: true,
            ..Default::default()
        }
    }

    pub fn silent_for(url: &str) -> Self {
        Self {
            silent: HashSet::from([url.to_string()]),
            ..Default::default()
        }
    }
}

impl Transcriber for MockTranscriber {
    const TRANSCRIBER_MODEL: &'static str = "mock-whisper";
    type Error = anyhow::Error;

    async fn transcribe(&self, audio_input: AudioInput) -> Result<TranscribeResponse, Self::Error> {
        self.calls.lock().unwrap().push(audio_input.clone());

        if let Some(kind) = self.fail_with {
            return Err(mock_error(kind, "whisper unavailable"));
        }

        let url = tokio::fs::read_to_string(audio_input.file_path()).await?;
        let text = if self.silent.contains(&url) {
            String::new()
        } else if self.with_markup {
            format!("[00:00.000] <c>transcript</c>\n  of\t[00:02.500] <i>{url}</i>\n")
        } else {
            format!("transcript of {url}")
        };

        Ok(TranscribeResponse {
            duration: 120.0,
            text,
            segments: None,
        })
    }
}
