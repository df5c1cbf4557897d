use std::{
    fmt::{Debug, Display},
    future::Future,
    path::PathBuf,
};

use serde::Deserialize;

use crate::pipeline::Classify;

pub trait Transcriber {
    const TRANSCRIBER_MODEL: &'static str;

    type Error: Classify + Debug + Display + Send;

    fn transcribe(
        &self,
        audio_input: AudioInput,
    ) -> impl Future<Output = Result<TranscribeResponse, Self::Error>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioInput {
    Chunked {
        chunk_duration_seconds: u16,
        chunks_dir_path: PathBuf,
        file_path: PathBuf,
    },
    File(PathBuf),
}

impl AudioInput {
    pub fn file_path(&self) -> &PathBuf {
        match self {
            AudioInput::Chunked { file_path, .. } | AudioInput::File(file_path) => file_path,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscribeResponse {
    pub duration: f64,
    pub text: String,
    pub segments: Option<Vec<TranscribeSegment>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscribeSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}
