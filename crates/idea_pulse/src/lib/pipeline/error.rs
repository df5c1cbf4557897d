use std::fmt;

use serde::{Deserialize, Serialize};

/// How a stage failure should be treated by the runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageErrorKind {
    /// Bad configuration or selection; reported, never retried
    Input,
    /// Network or service blip; retried while budget remains
    Transient,
    /// The stage exceeded its time limit; retried like `Transient`
    Timeout,
    /// Retrying cannot help (unsupported format, rejected request, ...)
    Permanent,
    /// The run was cancelled before the stage could start
    Cancelled,
}

impl StageErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, StageErrorKind::Transient | StageErrorKind::Timeout)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StageErrorKind::Input => "input",
            StageErrorKind::Transient => "transient",
            StageErrorKind::Timeout => "timeout",
            StageErrorKind::Permanent => "permanent",
            StageErrorKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for StageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure that occurred while executing a pipeline stage.
///
/// # Display format
///
/// ```text
/// [permanent] transcribe: no speech could be extracted from the audio
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("[{kind}] {stage}: {message}")]
pub struct StageError {
    pub kind: StageErrorKind,
    /// Name of the stage that produced the error
    pub stage: String,
    pub message: String,
}

impl StageError {
    pub fn new(kind: StageErrorKind, stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            stage: stage.into(),
            message: message.into(),
        }
    }

    pub fn input(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StageErrorKind::Input, stage, message)
    }

    pub fn transient(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StageErrorKind::Transient, stage, message)
    }

    pub fn timeout(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StageErrorKind::Timeout, stage, message)
    }

    pub fn permanent(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StageErrorKind::Permanent, stage, message)
    }

    pub fn cancelled(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StageErrorKind::Cancelled, stage, message)
    }

    /// Wraps a collaborator error, keeping the kind it reports for itself
    pub fn from_source<E>(stage: impl Into<String>, error: &E) -> Self
    where
        E: Classify + fmt::Display,
    {
        Self::new(error.classify(), stage, error.to_string())
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Implemented by collaborator errors so stages can tell the runner whether a
/// failure is worth retrying
pub trait Classify {
    fn classify(&self) -> StageErrorKind;
}

impl Classify for StageError {
    fn classify(&self) -> StageErrorKind {
        self.kind
    }
}

/// Opaque errors are assumed to be blips
impl Classify for anyhow::Error {
    fn classify(&self) -> StageErrorKind {
        self.downcast_ref::<StageError>()
            .map(|e| e.kind)
            .unwrap_or(StageErrorKind::Transient)
    }
}

impl Classify for std::io::Error {
    fn classify(&self) -> StageErrorKind {
        use std::io::ErrorKind;
        match self.kind() {
            ErrorKind::TimedOut
            | ErrorKind::Interrupted
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::WouldBlock => StageErrorKind::Transient,
            _ => StageErrorKind::Permanent,
        }
    }
}
