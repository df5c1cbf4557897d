use std::{
    any::Any,
    panic::AssertUnwindSafe,
    path::{Path, PathBuf},
    time::Instant,
};

use futures::{stream, FutureExt, StreamExt};
use tempfile::TempDir;

use super::{
    BatchResult, Context, ItemResult, PipelineItem, RunPolicy, Scratch, Stage, StageError,
};

/// Stage name reported when the runner cannot set up an item's scratch space
const SCRATCH_STAGE: &str = "scratch";

/// Runs batches of items through an ordered list of stages
///
/// # Example
/// ```no_run
/// use idea_pulse::pipeline::{
///     Context, FnStage, PipelineItem, PipelineRunner, RunPolicy, Scratch, Stage, StageError,
/// };
///
/// # async fn demo() {
/// let runner = PipelineRunner::new("/var/tmp/idea-pulse/scratch");
/// let stages: Vec<Box<dyn Stage>> = vec![Box::new(FnStage::new("shout", |ctx: Context, _: Scratch| async move {
///     let text = ctx.text("text").unwrap_or_default().to_uppercase();
///     Ok::<_, StageError>(ctx.with_text("text", text))
/// }))];
///
/// let items = vec![PipelineItem::new("a").with_text("text", "hello")];
/// let batch = runner.run(items, &stages, &RunPolicy::default()).await;
/// assert_eq!(batch.success_count(), 1);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PipelineRunner {
    scratch_root: PathBuf,
}

impl PipelineRunner {
    pub fn new(scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            scratch_root: scratch_root.into(),
        }
    }

    pub fn scratch_root(&self) -> &Path {
        &self.scratch_root
    }

    /// Processes every item through `stages` and returns one result per item.
    ///
    /// Items are independent: a failing item never stops or delays its
    /// siblings. Up to `policy.concurrency` items are in flight at a time.
    #[tracing::instrument(skip_all, fields(items = items.len(), stages = stages.len()))]
    pub async fn run(
        &self,
        items: Vec<PipelineItem>,
        stages: &[Box<dyn Stage + '_>],
        policy: &RunPolicy,
    ) -> BatchResult {
        if items.is_empty() {
            return BatchResult::default();
        }

        let started = Instant::now();

        let results = stream::iter(items.into_iter().enumerate())
            .map(|(index, item)| async move {
                let id = item.id.clone();
                let outcome = self.process_item(item, stages, policy).await;
                ItemResult::new(index, id, outcome)
            })
            .buffer_unordered(policy.concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

        let batch = BatchResult::from_results(results);

        tracing::info!(
            succeeded = batch.success_count(),
            failed = batch.failure_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Pipeline run finished"
        );

        batch
    }

    #[tracing::instrument(skip_all, fields(item = %item.id))]
    async fn process_item(
        &self,
        item: PipelineItem,
        stages: &[Box<dyn Stage + '_>],
        policy: &RunPolicy,
    ) -> Result<Context, StageError> {
        let PipelineItem { id, context } = item;

        let Some(first) = stages.first() else {
            return Ok(context);
        };

        if policy.is_cancelled() {
            tracing::info!("Run cancelled, item not started");
            return Err(StageError::cancelled(
                first.name(),
                "run cancelled before the item started",
            ));
        }

        let scratch = self
            .allocate_scratch(&id)
            .inspect_err(|e| tracing::error!(error = ?e, "Failed to allocate scratch directory"))
            .map_err(|e| StageError::from_source(SCRATCH_STAGE, &e))?;

        let outcome = self.run_stages(context, stages, scratch.path(), policy).await;

        release_scratch(scratch);

        outcome
    }

    async fn run_stages(
        &self,
        mut context: Context,
        stages: &[Box<dyn Stage + '_>],
        item_dir: &Path,
        policy: &RunPolicy,
    ) -> Result<Context, StageError> {
        for (position, stage) in stages.iter().enumerate() {
            if position > 0 && policy.is_cancelled() {
                tracing::info!(stage = stage.name(), "Run cancelled, stopping item");
                return Err(StageError::cancelled(
                    stage.name(),
                    "run cancelled before the stage started",
                ));
            }

            context = self
                .run_stage(position, stage.as_ref(), context, item_dir, policy)
                .await?;
        }

        Ok(context)
    }

    /// Runs one stage, retrying retryable failures while budget remains
    async fn run_stage(
        &self,
        position: usize,
        stage: &(dyn Stage + '_),
        context: Context,
        item_dir: &Path,
        policy: &RunPolicy,
    ) -> Result<Context, StageError> {
        let name = stage.name();
        let limit = stage.timeout().or(policy.stage_timeout);
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let attempt_dir = item_dir.join(format!("{position:02}-{}-{attempt}", sanitize(name)));
            tokio::fs::create_dir_all(&attempt_dir)
                .await
                .map_err(|e| StageError::from_source(SCRATCH_STAGE, &e))?;
            let scratch = Scratch::new(item_dir.to_path_buf(), attempt_dir.clone(), attempt);

            // a panicking stage fails only its own item
            let guarded = AssertUnwindSafe(stage.run(context.clone(), &scratch))
                .catch_unwind()
                .map(|outcome| {
                    outcome.unwrap_or_else(|payload| {
                        Err(StageError::permanent(
                            name,
                            format!("stage panicked: {}", panic_message(payload.as_ref())),
                        ))
                    })
                });

            let result = match limit {
                Some(limit) => tokio::time::timeout(limit, guarded)
                    .await
                    .unwrap_or_else(|_| {
                        Err(StageError::timeout(
                            name,
                            format!("attempt exceeded {}ms", limit.as_millis()),
                        ))
                    }),
                None => guarded.await,
            };

            let error = match result {
                Ok(next) => {
                    tracing::debug!(stage = name, attempt, "Stage succeeded");
                    return Ok(next);
                }
                Err(error) => StageError {
                    stage: name.to_string(),
                    ..error
                },
            };

            // artifacts of a failed attempt must never be seen by a retry
            if let Err(e) = tokio::fs::remove_dir_all(&attempt_dir).await {
                tracing::warn!(error = ?e, path = ?attempt_dir, "Failed to release attempt scratch directory");
            }

            if !error.is_retryable() || attempt > policy.max_retries {
                tracing::warn!(stage = name, attempt, error = %error, "Stage failed");
                return Err(error);
            }

            tracing::warn!(stage = name, attempt, error = %error, "Stage failed, retrying");

            if !policy.backoff.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(policy.backoff) => {}
                    _ = policy.cancellation.cancelled() => {
                        return Err(StageError::cancelled(name, "run cancelled while waiting to retry"));
                    }
                }
            }
        }
    }

    fn allocate_scratch(&self, id: &str) -> std::io::Result<TempDir> {
        std::fs::create_dir_all(&self.scratch_root)?;
        tempfile::Builder::new()
            .prefix(&format!("{}-", sanitize(id)))
            .tempdir_in(&self.scratch_root)
    }
}

fn release_scratch(scratch: TempDir) {
    let path = scratch.path().to_path_buf();
    match scratch.close() {
        Ok(()) => tracing::debug!(path = ?path, "Released item scratch directory"),
        Err(e) => tracing::warn!(error = ?e, path = ?path, "Failed to release item scratch directory"),
    }
}

/// Turns an identifier (often a URL) into a short, filesystem safe name
fn sanitize(id: &str) -> String {
    const MAX_LEN: usize = 40;

    let cleaned = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect::<Vec<_>>();

    // the tail of a URL is where the video id lives
    let start = cleaned.len().saturating_sub(MAX_LEN);
    let name = cleaned[start..].iter().collect::<String>();

    if name.is_empty() {
        "item".to_string()
    } else {
        name
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
