use idea_datastore::{DataStore, IdeaRecord, NewIdea};
use tokio::sync::Mutex;

/// Append-only persistence sink with a single writer at a time.
///
/// Appends are serialized through an async mutex so concurrent batches never
/// interleave partial writes; reads go straight to the store.
#[derive(Debug)]
pub struct AppendSink<D> {
    store: D,
    write_lock: Mutex<()>,
}

impl<D> AppendSink<D>
where
    D: DataStore + Send + Sync,
{
    pub fn new(store: D) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    #[tracing::instrument(skip_all, fields(videos = idea.video_urls.len()))]
    pub async fn append(&self, idea: &NewIdea) -> anyhow::Result<i64> {
        let _guard = self.write_lock.lock().await;
        let id = self.store.insert_idea(idea).await?;
        tracing::info!(record_id = id, "Persisted idea");
        Ok(id)
    }

    pub async fn list(&self) -> anyhow::Result<Vec<IdeaRecord>> {
        self.store.list_ideas().await
    }

    pub fn store(&self) -> &D {
        &self.store
    }
}
