use std::sync::{Arc, Mutex};

use idea_pulse::Embedder;

/// Dimensions of the mock embedding space
pub const VOCABULARY: [&str; 4] = ["budget", "schedule", "team", "risk"];

/// Embeds a text as the number of occurrences of each vocabulary word
#[derive(Clone, Default)]
pub struct MockEmbedder {
    pub calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl Embedder for MockEmbedder {
    const EMBEDDING_MODEL: &'static str = "mock-embedding";
    type Error = anyhow::Error;

    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.lock().unwrap().push(texts.to_vec());

        Ok(texts
            .iter()
            .map(|text| {
                let text = text.to_lowercase();
                VOCABULARY
                    .iter()
                    .map(|word| text.matches(*word).count() as f32)
                    .collect()
            })
            .collect())
    }
}
