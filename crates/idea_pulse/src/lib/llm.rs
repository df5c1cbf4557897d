pub mod embedder;
pub mod openai;
pub mod synthesizer;
pub mod transcriber;
