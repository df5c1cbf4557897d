use std::path::PathBuf;

use async_trait::async_trait;
use itertools::Itertools;

use crate::{
    pipeline::{
        keys, BatchResult, Context, PipelineItem, PipelineRunner, RunPolicy, Scratch, Stage,
        StageError,
    },
    report::{
        retriever::{Retriever, DEFAULT_TOP_K},
        template::Template,
    },
    Prompt, Synthesizer,
};

pub const RETRIEVE: &str = "retrieve";
pub const FILL: &str = "fill";

pub const REPORT_SYSTEM_PROMPT: &str = "You are writing one section of a project report. \
Use the reference material that follows the instructions where it is relevant.";

/// Separator between filled sections in the assembled report
pub const SECTION_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    pub name: String,
    pub team_members: Vec<String>,
    pub topic: String,
}

impl ProjectInfo {
    /// `team_members` is a comma separated list of names
    pub fn new(name: impl Into<String>, team_members: &str, topic: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            team_members: team_members
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect(),
            topic: topic.into(),
        }
    }

    /// Instruction for filling a single template section
    pub fn section_query(&self, section: &str) -> String {
        format!(
            "Project name: {}\nTeam members: {}\nTopic: {}\n\n\
             Fill in the following section:\n\n{}\n\n\
             Based on the information above, write specific and professional content for this section.",
            self.name,
            self.team_members.iter().join(", "),
            self.topic,
            section
        )
    }
}

/// Looks up reference passages for `keys::SECTION`
pub struct RetrieveStage<'a, R> {
    retriever: &'a R,
    top_k: usize,
}

#[async_trait]
impl<'a, R> Stage for RetrieveStage<'a, R>
where
    R: Retriever + Send + Sync,
{
    fn name(&self) -> &str {
        RETRIEVE
    }

    async fn run(&self, mut context: Context, _scratch: &Scratch) -> Result<Context, StageError> {
        let section = context
            .text(keys::SECTION)
            .ok_or_else(|| StageError::input(RETRIEVE, "item has no template section"))?
            .to_string();

        let passages = self
            .retriever
            .retrieve(&section, self.top_k)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to retrieve reference passages"))
            .map_err(|e| StageError::from_source(RETRIEVE, &e))?;

        tracing::debug!(passages = passages.len(), "Retrieved reference passages");
        context.set_texts(keys::RETRIEVED, passages);
        Ok(context)
    }
}

/// Asks the model to write `keys::SECTION` given the retrieved passages
pub struct FillStage<'a, S> {
    synthesizer: &'a S,
    project: &'a ProjectInfo,
}

#[async_trait]
impl<'a, S> Stage for FillStage<'a, S>
where
    S: Synthesizer + Send + Sync,
{
    fn name(&self) -> &str {
        FILL
    }

    async fn run(&self, mut context: Context, _scratch: &Scratch) -> Result<Context, StageError> {
        let section = context
            .text(keys::SECTION)
            .ok_or_else(|| StageError::input(FILL, "item has no template section"))?;
        let prompt = Prompt::new(REPORT_SYSTEM_PROMPT, self.project.section_query(section));

        let passages = context
            .texts(keys::RETRIEVED)
            .unwrap_or_default()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();

        let response = self
            .synthesizer
            .synthesize(&prompt, &passages)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to fill section"))
            .map_err(|e| StageError::from_source(FILL, &e))?;

        let filled = response.text.trim();
        if filled.is_empty() {
            return Err(StageError::permanent(FILL, "model returned an empty section"));
        }

        context.set_text(keys::FILLED, filled);
        Ok(context)
    }
}

#[derive(Debug)]
pub struct Report {
    /// One entry per template section
    pub batch: BatchResult,
    /// Filled sections in template order; failed sections are left out
    pub content: String,
}

/// Fills template sections one pipeline item each: `retrieve` then `fill`
#[derive(Debug)]
pub struct ReportWriter<S, R> {
    runner: PipelineRunner,
    synthesizer: S,
    retriever: R,
    top_k: usize,
}

impl<S, R> ReportWriter<S, R>
where
    S: Synthesizer + Send + Sync,
    R: Retriever + Send + Sync,
{
    pub fn new(scratch_root: impl Into<PathBuf>, synthesizer: S, retriever: R) -> Self {
        Self {
            runner: PipelineRunner::new(scratch_root),
            synthesizer,
            retriever,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[tracing::instrument(skip_all, fields(project = %project.name, sections = template.len()))]
    pub async fn write(
        &self,
        project: &ProjectInfo,
        template: &Template,
        policy: &RunPolicy,
    ) -> Report {
        let items = template
            .sections()
            .iter()
            .enumerate()
            .map(|(i, section)| {
                PipelineItem::new(format!("section-{:02}", i + 1))
                    .with_text(keys::SECTION, section.as_str())
            })
            .collect::<Vec<_>>();

        let stages: Vec<Box<dyn Stage + '_>> = vec![
            Box::new(RetrieveStage {
                retriever: &self.retriever,
                top_k: self.top_k,
            }),
            Box::new(FillStage {
                synthesizer: &self.synthesizer,
                project,
            }),
        ];

        let batch = self.runner.run(items, &stages, policy).await;

        for failure in batch.failure_report() {
            tracing::warn!(failure = %failure, "Section failed");
        }

        let content = batch.concat_artifact(keys::FILLED, SECTION_SEPARATOR);
        Report { batch, content }
    }
}
