use crate::pipeline::{Classify, StageErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Parse error: {0}")]
    ParseError(&'static str),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Classify for Error {
    fn classify(&self) -> StageErrorKind {
        match self {
            Error::Http(_) => StageErrorKind::Transient,
            Error::ParseError(_) | Error::Json(_) => StageErrorKind::Permanent,
        }
    }
}
