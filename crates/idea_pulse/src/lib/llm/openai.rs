use std::path::{Path, PathBuf};

use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::{
    pipeline::{Classify, StageErrorKind},
    yt::ffmpeg::Ffmpeg,
    AudioInput, Embedder, Prompt, SynthesisResponse, Synthesizer, TranscribeResponse, Transcriber,
};

/// OpenAI client covering transcription, chat completion and embeddings
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    ffmpeg: Ffmpeg,
    base_url: String,
    chat_model: String,
    temperature: Option<f32>,
}

#[derive(Debug, thiserror::Error)]
pub enum OpenAIError {
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),
    #[error("Empty response: {0}")]
    EmptyResponse(&'static str),
}

impl Classify for OpenAIError {
    fn classify(&self) -> StageErrorKind {
        match self {
            OpenAIError::Request(e) => match e.status() {
                Some(status) => classify_status(status.as_u16()),
                None if e.is_decode() || e.is_builder() => StageErrorKind::Permanent,
                None => StageErrorKind::Transient,
            },
            OpenAIError::Io(e) => e.classify(),
            OpenAIError::Api { status, .. } => classify_status(*status),
            OpenAIError::Ffmpeg(_) => StageErrorKind::Permanent,
            OpenAIError::EmptyResponse(_) => StageErrorKind::Transient,
        }
    }
}

/// Rate limits, conflicts and server side errors are worth another attempt;
/// everything else (bad key, bad request, payload too large) is not
fn classify_status(status: u16) -> StageErrorKind {
    match StatusCode::from_u16(status) {
        Ok(StatusCode::REQUEST_TIMEOUT | StatusCode::CONFLICT | StatusCode::TOO_MANY_REQUESTS) => {
            StageErrorKind::Transient
        }
        Ok(code) if code.is_server_error() => StageErrorKind::Transient,
        _ => StageErrorKind::Permanent,
    }
}

impl OpenAIClient {
    pub fn new(api_key: impl Into<String>, ffmpeg: Ffmpeg) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".into(),
            ffmpeg,
            chat_model: <Self as Synthesizer>::SYNTHESIZER_MODEL.into(),
            temperature: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    pub async fn send_transcribe_request(
        &self,
        file: impl AsRef<Path>,
        model_name: impl Into<String>,
        prompt: Option<String>,
    ) -> Result<TranscribeResponse, OpenAIError> {
        let audio_path = file.as_ref();

        let bytes = tokio::fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.mp3")
            .to_string();
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/mpeg")?;

        let mut form = reqwest::multipart::Form::new()
            .text("model", model_name.into())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment")
            .part("file", part);

        if let Some(prompt) = prompt {
            form = form.text("prompt", prompt);
        }

        let resp = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to make http request"))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(OpenAIError::Api { status, message });
        }

        let response = resp.json::<TranscribeResponse>().await?;

        Ok(response)
    }

    pub async fn send_completion_request(
        &self,
        model_name: &str,
        system_content: &str,
        user_content: String,
    ) -> Result<CompletionResponse, OpenAIError> {
        let mut body = serde_json::json!({
            "model": model_name,
            "messages": [
                {
                    "role": "system",
                    "content": system_content
                },
                {
                    "role": "user",
                    "content": user_content
                }
            ]
        });

        if let Some(temperature) = self.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to make http request"))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(OpenAIError::Api { status, message });
        }

        Ok(resp.json::<CompletionResponse>().await?)
    }

    pub async fn send_embedding_request(
        &self,
        model_name: &str,
        input: &[String],
    ) -> Result<EmbeddingResponse, OpenAIError> {
        let body = serde_json::json!({
            "model": model_name,
            "input": input,
        });

        let resp = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to make http request"))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(OpenAIError::Api { status, message });
        }

        Ok(resp.json::<EmbeddingResponse>().await?)
    }

    /// Splits `file_path` into chunks (unless already done) and transcribes
    /// them in order, feeding each chunk the previous chunk's text as prompt
    async fn transcribe_chunked(
        &self,
        file_path: &Path,
        chunks_dir_path: &Path,
        chunk_duration_seconds: u16,
    ) -> Result<TranscribeResponse, OpenAIError> {
        let chunks_exist = std::fs::read_dir(chunks_dir_path)
            .map(|mut entries| entries.any(|e| e.is_ok()))
            .unwrap_or(false);

        // chunk via ffmpeg if not already done
        if !chunks_exist {
            tokio::fs::create_dir_all(chunks_dir_path).await?;
            let base_name = file_path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| OpenAIError::Ffmpeg("Invalid file path".into()))?;

            tracing::info!("Splitting audio to chunks");
            self.ffmpeg
                .split_audio_to_chunks(
                    file_path,
                    chunk_duration_seconds,
                    &chunks_dir_path.join(format!("{base_name}_%03d.mp3")),
                )
                .await
                .inspect_err(|e| tracing::error!(error = %e, "Failed to split audio to chunks"))
                .map_err(|e| OpenAIError::Ffmpeg(e.to_string()))?;
        }

        // collect and sort chunk files
        let mut chunks: Vec<PathBuf> = std::fs::read_dir(chunks_dir_path)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        chunks.sort();

        let mut all_segments = Vec::new();
        let mut all_text = String::new();
        let mut time_offset = 0.0_f64;
        let mut duration = 0.0_f64;
        let mut previous_text = None;

        for chunk in &chunks {
            let response = self
                .send_transcribe_request(chunk, Self::TRANSCRIBER_MODEL, previous_text)
                .await
                .inspect_err(|e| tracing::error!(error = %e, "Failed to transcribe audio"))?;

            duration += response.duration;

            if let Some(segments) = response.segments {
                for mut seg in segments {
                    seg.start += time_offset;
                    seg.end += time_offset;
                    all_segments.push(seg);
                }
            }

            all_text.push_str(&response.text);
            all_text.push(' ');
            previous_text = Some(response.text);
            time_offset += chunk_duration_seconds as f64;
        }

        Ok(TranscribeResponse {
            duration,
            text: all_text.trim().to_string(),
            segments: Some(all_segments),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CompletionResponse {
    pub id: String,
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
pub struct CompletionChoice {
    pub index: u32,
    pub message: CompletionMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompletionMessage {
    pub role: String,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingResponse {
    pub data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingData {
    pub index: usize,
    pub embedding: Vec<f32>,
}

impl Transcriber for OpenAIClient {
    const TRANSCRIBER_MODEL: &'static str = "whisper-1";
    type Error = OpenAIError;

    #[tracing::instrument(skip(self))]
    async fn transcribe(&self, input: AudioInput) -> Result<TranscribeResponse, Self::Error> {
        match input {
            AudioInput::File(file_path) => {
                self.send_transcribe_request(&file_path, Self::TRANSCRIBER_MODEL, None)
                    .await
            }
            AudioInput::Chunked {
                file_path,
                chunks_dir_path,
                chunk_duration_seconds,
            } => {
                self.transcribe_chunked(&file_path, &chunks_dir_path, chunk_duration_seconds)
                    .await
            }
        }
    }
}

impl Synthesizer for OpenAIClient {
    const SYNTHESIZER_MODEL: &'static str = "gpt-3.5-turbo";
    type Error = OpenAIError;

    #[tracing::instrument(skip_all, fields(model = %self.chat_model, contexts = context_texts.len()))]
    async fn synthesize(
        &self,
        prompt: &Prompt,
        context_texts: &[String],
    ) -> Result<SynthesisResponse, Self::Error> {
        let response = self
            .send_completion_request(
                &self.chat_model,
                &prompt.system,
                prompt.render_user_message(context_texts),
            )
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to synthesize content"))?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(OpenAIError::EmptyResponse("No content in completion response"))?;

        Ok(SynthesisResponse { text })
    }
}

impl Embedder for OpenAIClient {
    const EMBEDDING_MODEL: &'static str = "text-embedding-3-small";
    type Error = OpenAIError;

    #[tracing::instrument(skip_all, fields(count = texts.len()))]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, Self::Error> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut response = self
            .send_embedding_request(Self::EMBEDDING_MODEL, texts)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to embed texts"))?;

        if response.data.len() != texts.len() {
            return Err(OpenAIError::EmptyResponse(
                "Embedding count does not match input count",
            ));
        }

        response.data.sort_by_key(|d| d.index);
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}
