mod error;
mod llm;
pub mod parser;
pub mod pipeline;
mod processor;
pub mod report;
pub mod tracing;
pub mod types;
pub mod yt;

pub use error::Error;
pub use llm::openai;
pub use llm::{
    embedder::Embedder,
    synthesizer::{Prompt, SynthesisResponse, Synthesizer},
    transcriber::{AudioInput, TranscribeResponse, TranscribeSegment, Transcriber},
};
pub use processor::{
    builder::IdeaProcessorBuilder, stages, ChunkingConfig, IdeaOutcome, IdeaProcessor,
    IDEA_SYSTEM_PROMPT, IDEA_USER_PROMPT,
};
