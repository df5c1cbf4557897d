use std::future::Future;

use crate::{IdeaRecord, NewIdea};

pub mod sqlite;

pub trait DataStore {
    /// Appends a new idea and returns the id of the created record
    fn insert_idea(&self, idea: &NewIdea) -> impl Future<Output = anyhow::Result<i64>> + Send;

    /// Lists every stored idea ordered by creation time, newest first
    fn list_ideas(&self) -> impl Future<Output = anyhow::Result<Vec<IdeaRecord>>> + Send;
}

impl<T: DataStore + Send + Sync> DataStore for &T {
    async fn insert_idea(&self, idea: &NewIdea) -> anyhow::Result<i64> {
        (**self).insert_idea(idea).await
    }

    async fn list_ideas(&self) -> anyhow::Result<Vec<IdeaRecord>> {
        (**self).list_ideas().await
    }
}
