//! Sequential multi-stage pipeline with per-item failure isolation.
//!
//! A [`PipelineRunner`] pushes a batch of independent [`PipelineItem`]s through
//! an ordered list of [`Stage`]s. Each item owns a private scratch directory for
//! the duration of its processing, stages are retried on retryable failures
//! according to the [`RunPolicy`], and every item ends up with exactly one
//! entry in the resulting [`BatchResult`].

mod batch;
mod context;
mod error;
mod policy;
mod runner;
mod sink;
mod stage;

pub use batch::{BatchResult, ItemResult};
pub use context::{keys, Context, PipelineItem};
pub use error::{Classify, StageError, StageErrorKind};
pub use policy::RunPolicy;
pub use runner::PipelineRunner;
pub use sink::AppendSink;
pub use stage::{FnStage, Scratch, Stage};
