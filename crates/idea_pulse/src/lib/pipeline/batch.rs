use itertools::{Either, Itertools};

use super::{Context, StageError};

/// The terminal outcome of one submitted item
#[derive(Debug, Clone, PartialEq)]
pub struct ItemResult {
    /// Position of the item in the submitted batch
    pub index: usize,
    pub id: String,
    pub outcome: Result<Context, StageError>,
}

impl ItemResult {
    pub fn new(index: usize, id: impl Into<String>, outcome: Result<Context, StageError>) -> Self {
        Self {
            index,
            id: id.into(),
            outcome,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn context(&self) -> Option<&Context> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&StageError> {
        self.outcome.as_ref().err()
    }
}

/// One entry per submitted item, kept in submission order.
///
/// Everything here is pure data shaping over finished results: no I/O and no
/// calls to collaborators.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    results: Vec<ItemResult>,
}

impl BatchResult {
    pub(crate) fn from_results(mut results: Vec<ItemResult>) -> Self {
        results.sort_by_key(|r| r.index);
        Self { results }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemResult> {
        self.results.iter()
    }

    /// First result submitted under `id`
    pub fn get(&self, id: &str) -> Option<&ItemResult> {
        self.results.iter().find(|r| r.id == id)
    }

    pub fn succeeded(&self) -> impl Iterator<Item = (&str, &Context)> {
        self.results
            .iter()
            .filter_map(|r| r.context().map(|ctx| (r.id.as_str(), ctx)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &StageError)> {
        self.results
            .iter()
            .filter_map(|r| r.error().map(|err| (r.id.as_str(), err)))
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.len() - self.success_count()
    }

    pub fn partition(&self) -> (Vec<(&str, &Context)>, Vec<(&str, &StageError)>) {
        self.results
            .iter()
            .partition_map(|r| match &r.outcome {
                Ok(ctx) => Either::Left((r.id.as_str(), ctx)),
                Err(err) => Either::Right((r.id.as_str(), err)),
            })
    }

    /// `(id, text)` of the `key` artifact of every succeeded item that has it
    pub fn artifacts<'a>(&'a self, key: &'a str) -> Vec<(&'a str, &'a str)> {
        self.succeeded()
            .filter_map(|(id, ctx)| ctx.text(key).map(|text| (id, text)))
            .collect()
    }

    /// Joins the `key` artifact of every succeeded item, in submission order
    pub fn concat_artifact(&self, key: &str, separator: &str) -> String {
        self.artifacts(key)
            .into_iter()
            .map(|(_, text)| text)
            .join(separator)
    }

    /// One human readable line per failed item: identifier, stage and message
    pub fn failure_report(&self) -> Vec<String> {
        self.failed()
            .map(|(id, err)| {
                format!(
                    "{id}: stage '{}' failed ({}): {}",
                    err.stage, err.kind, err.message
                )
            })
            .collect()
    }

    pub fn into_results(self) -> Vec<ItemResult> {
        self.results
    }
}

impl IntoIterator for BatchResult {
    type Item = ItemResult;
    type IntoIter = std::vec::IntoIter<ItemResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}
