use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Retry, concurrency, timeout and cancellation settings for one run
#[derive(Debug, Clone)]
pub struct RunPolicy {
    /// Extra attempts allowed per stage for retryable failures
    pub max_retries: u32,
    /// Delay before each retry
    pub backoff: Duration,
    /// Items processed at the same time
    pub concurrency: usize,
    /// Default per-attempt timeout for stages that do not declare one
    pub stage_timeout: Option<Duration>,
    pub cancellation: CancellationToken,
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            backoff: Duration::ZERO,
            concurrency: 1,
            stage_timeout: None,
            cancellation: CancellationToken::new(),
        }
    }
}

impl RunPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_stage_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stage_timeout = timeout;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
