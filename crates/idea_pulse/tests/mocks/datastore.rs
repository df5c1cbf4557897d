use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use chrono::Utc;
use idea_datastore::{DataStore, IdeaRecord, NewIdea};

#[derive(Clone, Default)]
pub struct MockDataStore {
    pub inserted: Arc<Mutex<Vec<NewIdea>>>,
    pub fail_with: Option<String>,
    pub delay: Option<Duration>,
    pub in_flight: Arc<AtomicUsize>,
    pub max_in_flight: Arc<AtomicUsize>,
}

impl MockDataStore {
    pub fn failing(msg: &str) -> Self {
        Self {
            fail_with: Some(msg.to_string()),
            ..Default::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }
}

impl DataStore for MockDataStore {
    async fn insert_idea(&self, idea: &NewIdea) -> anyhow::Result<i64> {
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = match &self.fail_with {
            Some(msg) => Err(anyhow::anyhow!("{}", msg)),
            None => {
                let mut inserted = self.inserted.lock().unwrap();
                inserted.push(idea.clone());
                Ok(inserted.len() as i64)
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn list_ideas(&self) -> anyhow::Result<Vec<IdeaRecord>> {
        if let Some(msg) = &self.fail_with {
            return Err(anyhow::anyhow!("{}", msg));
        }

        let inserted = self.inserted.lock().unwrap();
        Ok(inserted
            .iter()
            .enumerate()
            .rev()
            .map(|(i, idea)| IdeaRecord {
                id: i as i64 + 1,
                video_urls: idea.joined_urls(),
                transcript: idea.transcript.clone(),
                idea: idea.idea.clone(),
                created_at: Utc::now(),
            })
            .collect())
    }
}
