use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::{
    pipeline::{keys, Context, Scratch, Stage, StageError},
    yt::AudioHandler,
    AudioInput, Prompt, Synthesizer, Transcriber,
};

pub const DOWNLOAD: &str = "download";
pub const TRANSCRIBE: &str = "transcribe";
pub const SYNTHESIZE: &str = "synthesize";

static MARKUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("markup pattern is valid"));
static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\d{2}:\d{2}\.\d{3}\]").expect("timestamp pattern is valid")
});
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Strips markup tags and `[MM:SS.mmm]` cue timestamps from a transcript and
/// collapses whitespace runs into single spaces
pub fn clean_transcript(text: &str) -> String {
    let text = MARKUP_RE.replace_all(text, "");
    let text = TIMESTAMP_RE.replace_all(&text, "");
    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}

/// Fetches the audio track of `keys::URL` into the attempt scratch directory
pub struct DownloadStage<'a, A> {
    audio_handler: &'a A,
}

impl<'a, A> DownloadStage<'a, A> {
    pub fn new(audio_handler: &'a A) -> Self {
        Self { audio_handler }
    }
}

#[async_trait]
impl<'a, A> Stage for DownloadStage<'a, A>
where
    A: AudioHandler + Send + Sync,
{
    fn name(&self) -> &str {
        DOWNLOAD
    }

    async fn run(&self, mut context: Context, scratch: &Scratch) -> Result<Context, StageError> {
        let url = context
            .text(keys::URL)
            .ok_or_else(|| StageError::input(DOWNLOAD, "item has no video url"))?
            .to_string();

        let audio_path = self
            .audio_handler
            .download(&url, scratch.dir())
            .await
            .inspect_err(|e| tracing::error!(error = %e, url = %url, "Failed to download audio"))
            .map_err(|e| StageError::from_source(DOWNLOAD, &e))?;

        context.set_path(keys::AUDIO_PATH, audio_path);
        Ok(context)
    }
}

/// Turns `keys::AUDIO_PATH` into `keys::TRANSCRIPT`
pub struct TranscribeStage<'a, T> {
    transcriber: &'a T,
    chunk_duration_seconds: Option<u16>,
}

impl<'a, T> TranscribeStage<'a, T> {
    pub fn new(transcriber: &'a T, chunk_duration_seconds: Option<u16>) -> Self {
        Self {
            transcriber,
            chunk_duration_seconds,
        }
    }
}

#[async_trait]
impl<'a, T> Stage for TranscribeStage<'a, T>
where
    T: Transcriber + Send + Sync,
{
    fn name(&self) -> &str {
        TRANSCRIBE
    }

    async fn run(&self, mut context: Context, scratch: &Scratch) -> Result<Context, StageError> {
        let audio_path = context
            .path(keys::AUDIO_PATH)
            .ok_or_else(|| StageError::input(TRANSCRIBE, "item has no downloaded audio"))?;

        let audio_input = match self.chunk_duration_seconds {
            Some(chunk_duration_seconds) => AudioInput::Chunked {
                chunk_duration_seconds,
                chunks_dir_path: scratch.dir().join("chunks"),
                file_path: audio_path,
            },
            None => AudioInput::File(audio_path),
        };

        let response = self
            .transcriber
            .transcribe(audio_input)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to transcribe audio"))
            .map_err(|e| StageError::from_source(TRANSCRIBE, &e))?;

        let transcript = clean_transcript(&response.text);
        if transcript.is_empty() {
            return Err(StageError::permanent(
                TRANSCRIBE,
                "transcription produced no text",
            ));
        }

        context.set_text(keys::TRANSCRIPT, transcript);
        Ok(context)
    }
}

/// Combines `keys::TRANSCRIPTS` into a single `keys::IDEA`
pub struct SynthesizeStage<'a, S> {
    synthesizer: &'a S,
    prompt: &'a Prompt,
}

impl<'a, S> SynthesizeStage<'a, S> {
    pub fn new(synthesizer: &'a S, prompt: &'a Prompt) -> Self {
        Self {
            synthesizer,
            prompt,
        }
    }
}

#[async_trait]
impl<'a, S> Stage for SynthesizeStage<'a, S>
where
    S: Synthesizer + Send + Sync,
{
    fn name(&self) -> &str {
        SYNTHESIZE
    }

    async fn run(&self, mut context: Context, _scratch: &Scratch) -> Result<Context, StageError> {
        let transcripts = context
            .texts(keys::TRANSCRIPTS)
            .filter(|texts| !texts.is_empty())
            .ok_or_else(|| StageError::input(SYNTHESIZE, "no transcripts to synthesize from"))?
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();

        let response = self
            .synthesizer
            .synthesize(self.prompt, &transcripts)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to synthesize idea"))
            .map_err(|e| StageError::from_source(SYNTHESIZE, &e))?;

        let idea = response.text.trim();
        if idea.is_empty() {
            return Err(StageError::permanent(SYNTHESIZE, "model returned an empty idea"));
        }

        context.set_text(keys::IDEA, idea);
        Ok(context)
    }
}
