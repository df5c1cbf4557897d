use std::{
    future::Future,
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;

use super::{Context, StageError};

/// Scratch space handed to a single stage attempt.
///
/// `item_dir` lives as long as the item is being processed; `dir` is private
/// to this attempt and is removed by the runner if the attempt fails.
#[derive(Debug, Clone)]
pub struct Scratch {
    item_dir: PathBuf,
    attempt_dir: PathBuf,
    attempt: u32,
}

impl Scratch {
    pub(crate) fn new(item_dir: PathBuf, attempt_dir: PathBuf, attempt: u32) -> Self {
        Self {
            item_dir,
            attempt_dir,
            attempt,
        }
    }

    /// Directory reserved for this attempt; write new artifacts here
    pub fn dir(&self) -> &Path {
        &self.attempt_dir
    }

    pub fn item_dir(&self) -> &Path {
        &self.item_dir
    }

    /// 1-based attempt number
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// A single named step of a pipeline
///
/// A stage consumes the context of one item and returns the updated context,
/// or a [`StageError`] whose kind decides whether the runner retries it.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Get stage name for logging and error reporting
    fn name(&self) -> &str;

    /// Hard upper bound for one attempt; falls back to the policy timeout
    fn timeout(&self) -> Option<Duration> {
        None
    }

    async fn run(&self, context: Context, scratch: &Scratch) -> Result<Context, StageError>;
}

/// Adapts an async closure into a [`Stage`]
pub struct FnStage<F> {
    name: String,
    timeout: Option<Duration>,
    f: F,
}

impl<F> FnStage<F> {
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            timeout: None,
            f,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl<F, Fut> Stage for FnStage<F>
where
    F: Fn(Context, Scratch) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Context, StageError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn run(&self, context: Context, scratch: &Scratch) -> Result<Context, StageError> {
        (self.f)(context, scratch.clone()).await
    }
}
