pub mod audio_handler;
pub mod datastore;
pub mod embedder;
pub mod searcher;
pub mod synthesizer;
pub mod transcriber;

use idea_pulse::pipeline::{StageError, StageErrorKind};

/// A collaborator error that classifies as `kind`
pub fn mock_error(kind: StageErrorKind, message: &str) -> anyhow::Error {
    anyhow::Error::new(StageError::new(kind, "mock", message))
}
