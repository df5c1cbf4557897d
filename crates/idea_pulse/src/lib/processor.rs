pub mod builder;
pub mod stages;

use std::path::PathBuf;

use anyhow::Context as _;
use idea_datastore::{DataStore, IdeaRecord, NewIdea};
use itertools::Itertools;

use crate::{
    pipeline::{
        keys, AppendSink, BatchResult, Context, PipelineItem, PipelineRunner, RunPolicy, Stage,
        StageError,
    },
    types::VideoDescriptor,
    yt::{search::SearchOptions, AudioHandler, VideoSearcher},
    Prompt, Synthesizer, Transcriber,
};

use self::stages::{DownloadStage, SynthesizeStage, TranscribeStage, SYNTHESIZE};

pub const IDEA_SYSTEM_PROMPT: &str =
    "Combine the content of the selected videos and propose an innovative project idea.";
pub const IDEA_USER_PROMPT: &str = "\
Based on the content of the following videos, propose 3 project ideas.

For each idea include:
1. Project name
2. Main features
3. Tech stack
4. Expected development period
5. Difficulty (beginner, intermediate or advanced)

Then list the pros and cons of each idea and suggest directions for further development.";

/// Separator between the transcripts of the individual videos
pub const TRANSCRIPT_SEPARATOR: &str = "\n";

/// Pipeline item id of the synthesis run
const SYNTHESIS_ITEM: &str = "synthesis";

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub chunk_duration_seconds: u16,
}

/// Everything a call to [`IdeaProcessor::run`] produced
#[derive(Debug)]
pub struct IdeaOutcome {
    /// One entry per selected video: its transcript or why it failed
    pub batch: BatchResult,
    pub idea: Option<String>,
    pub synthesis_error: Option<StageError>,
    pub record_id: Option<i64>,
}

impl IdeaOutcome {
    fn without_idea(batch: BatchResult) -> Self {
        Self {
            batch,
            idea: None,
            synthesis_error: None,
            record_id: None,
        }
    }
}

/// Searches videos, turns a selection of them into transcripts and
/// synthesizes a single project idea from those transcripts
#[derive(Debug)]
pub struct IdeaProcessor<D, T, S, A, P>
where
    D: DataStore + Send + Sync + 'static,
    T: Transcriber + Send + Sync + 'static,
    S: Synthesizer + Send + Sync + 'static,
    A: AudioHandler + Send + Sync + 'static,
    P: VideoSearcher + Send + Sync + 'static,
{
    workdir: PathBuf,
    runner: PipelineRunner,
    sink: AppendSink<D>,
    transcriber: T,
    synthesizer: S,
    audio_handler: A,
    searcher: P,
    search_limit: usize,
    chunking_config: Option<ChunkingConfig>,
    prompt: Prompt,
}

impl<D, T, S, A, P> IdeaProcessor<D, T, S, A, P>
where
    D: DataStore + Send + Sync + 'static,
    T: Transcriber + Send + Sync + 'static,
    S: Synthesizer + Send + Sync + 'static,
    A: AudioHandler + Send + Sync + 'static,
    P: VideoSearcher + Send + Sync + 'static,
{
    pub fn workdir(&self) -> &PathBuf {
        &self.workdir
    }

    pub fn search_limit(&self) -> usize {
        self.search_limit
    }

    pub async fn search(&self, keyword: &str) -> anyhow::Result<Vec<VideoDescriptor>> {
        self.search_with(keyword, &SearchOptions::default()).await
    }

    /// Searches `keyword`, keeps at most [`Self::search_limit`] videos that
    /// pass the duration filter of `options` and orders them
    #[tracing::instrument(skip(self))]
    pub async fn search_with(
        &self,
        keyword: &str,
        options: &SearchOptions,
    ) -> anyhow::Result<Vec<VideoDescriptor>> {
        let candidates = self
            .searcher
            .search(keyword, options.candidates_for(self.search_limit))
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to search videos"))
            .map_err(|e| anyhow::anyhow!("Failed to search videos: {e}"))?;

        let found = candidates.len();
        let videos = options.apply(candidates, self.search_limit);

        tracing::info!(found, count = videos.len(), "Found videos");
        Ok(videos)
    }

    /// Transcribes every selected video and synthesizes one idea from the
    /// transcripts that made it. The idea is persisted together with the URLs
    /// of the videos it was built from.
    ///
    /// Per-video failures are reported in [`IdeaOutcome::batch`]; only an
    /// empty selection or a failing store is an error.
    #[tracing::instrument(skip_all, fields(selected = urls.len()))]
    pub async fn run(&self, urls: &[String], policy: &RunPolicy) -> anyhow::Result<IdeaOutcome> {
        let selection = urls
            .iter()
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
            .unique()
            .map(str::to_string)
            .collect::<Vec<_>>();

        if selection.is_empty() {
            anyhow::bail!("No videos selected");
        }

        let items = selection
            .iter()
            .map(|url| PipelineItem::new(url.as_str()).with_text(keys::URL, url.as_str()))
            .collect::<Vec<_>>();

        let stages: Vec<Box<dyn Stage + '_>> = vec![
            Box::new(DownloadStage::new(&self.audio_handler)),
            Box::new(TranscribeStage::new(
                &self.transcriber,
                self.chunking_config.map(|c| c.chunk_duration_seconds),
            )),
        ];

        let batch = self.runner.run(items, &stages, policy).await;

        for failure in batch.failure_report() {
            tracing::warn!(failure = %failure, "Video failed");
        }

        let (transcribed_urls, transcripts): (Vec<String>, Vec<String>) = batch
            .artifacts(keys::TRANSCRIPT)
            .into_iter()
            .map(|(url, transcript)| (url.to_string(), transcript.to_string()))
            .unzip();

        if transcripts.is_empty() {
            tracing::warn!("No transcripts available, skipping idea synthesis");
            return Ok(IdeaOutcome::without_idea(batch));
        }

        let idea = match self.synthesize(&transcripts, policy).await {
            Ok(idea) => idea,
            Err(error) => {
                tracing::error!(error = %error, "Failed to synthesize idea");
                return Ok(IdeaOutcome {
                    synthesis_error: Some(error),
                    ..IdeaOutcome::without_idea(batch)
                });
            }
        };

        let record = NewIdea::new(
            transcribed_urls,
            transcripts.join(TRANSCRIPT_SEPARATOR),
            idea.as_str(),
        );
        let record_id = self
            .sink
            .append(&record)
            .await
            .inspect_err(|e| tracing::error!(error = ?e, "Failed to persist idea"))
            .context("Failed to persist idea")?;

        Ok(IdeaOutcome {
            batch,
            idea: Some(idea),
            synthesis_error: None,
            record_id: Some(record_id),
        })
    }

    /// Runs the synthesis as a one item pipeline so it gets the same retry,
    /// timeout and cancellation handling as the per-video stages
    async fn synthesize(
        &self,
        transcripts: &[String],
        policy: &RunPolicy,
    ) -> Result<String, StageError> {
        let mut context = Context::new();
        context.set_texts(keys::TRANSCRIPTS, transcripts.iter().cloned());

        let stages: Vec<Box<dyn Stage + '_>> =
            vec![Box::new(SynthesizeStage::new(&self.synthesizer, &self.prompt))];

        let item = PipelineItem::new(SYNTHESIS_ITEM).with_context(context);
        let result = self
            .runner
            .run(vec![item], &stages, policy)
            .await
            .into_results()
            .into_iter()
            .next()
            .ok_or_else(|| StageError::permanent(SYNTHESIZE, "synthesis produced no result"))?;

        result.outcome.and_then(|context| {
            context
                .text(keys::IDEA)
                .map(str::to_string)
                .ok_or_else(|| StageError::permanent(SYNTHESIZE, "synthesis produced no idea"))
        })
    }

    pub async fn list_ideas(&self) -> anyhow::Result<Vec<IdeaRecord>> {
        self.sink
            .list()
            .await
            .inspect_err(|e| tracing::error!(error = ?e, "Failed to list ideas"))
            .context("Failed to list ideas")
    }
}
