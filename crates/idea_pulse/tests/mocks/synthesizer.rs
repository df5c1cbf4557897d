use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc, Mutex,
};

use idea_pulse::{pipeline::StageErrorKind, Prompt, SynthesisResponse, Synthesizer};

use super::mock_error;

type Responder = dyn Fn(&Prompt, &[String]) -> anyhow::Result<String> + Send + Sync;

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisCall {
    pub prompt: Prompt,
    pub context_texts: Vec<String>,
}

#[derive(Clone)]
pub struct MockSynthesizer {
    pub calls: Arc<Mutex<Vec<SynthesisCall>>>,
    responder: Arc<Responder>,
}

impl MockSynthesizer {
    pub fn new(reply: &str) -> Self {
        let reply = reply.to_string();
        Self::with_responder(move |_, _| Ok(reply.clone()))
    }

    pub fn failing(kind: StageErrorKind) -> Self {
        Self::with_responder(move |_, _| Err(mock_error(kind, "completion rejected")))
    }

    /// Fails with a transient error `failures` times, then replies
    pub fn flaky(reply: &str, failures: u32) -> Self {
        let reply = reply.to_string();
        let remaining = AtomicU32::new(failures);
        Self::with_responder(move |_, _| {
            if remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |r| r.checked_sub(1))
                .is_ok()
            {
                return Err(mock_error(StageErrorKind::Transient, "rate limited"));
            }
            Ok(reply.clone())
        })
    }

    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&Prompt, &[String]) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            responder: Arc::new(responder),
        }
    }
}

impl Synthesizer for MockSynthesizer {
    const SYNTHESIZER_MODEL: &'static str = "mock-gpt";
    type Error = anyhow::Error;

    async fn synthesize(
        &self,
        prompt: &Prompt,
        context_texts: &[String],
    ) -> Result<SynthesisResponse, Self::Error> {
        self.calls.lock().unwrap().push(SynthesisCall {
            prompt: prompt.clone(),
            context_texts: context_texts.to_vec(),
        });

        let text = (self.responder)(prompt, context_texts)?;
        Ok(SynthesisResponse { text })
    }
}
