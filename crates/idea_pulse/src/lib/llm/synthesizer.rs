use std::{
    fmt::{Debug, Display},
    future::Future,
};

use crate::pipeline::Classify;

/// System and user instructions for one completion request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// The user message sent to the model: the instruction followed by the
    /// context texts, one per line
    pub fn render_user_message(&self, context_texts: &[String]) -> String {
        if context_texts.is_empty() {
            return self.user.clone();
        }
        format!("{}\n\n{}", self.user, context_texts.join("\n"))
    }
}

#[derive(Debug, Clone)]
pub struct SynthesisResponse {
    pub text: String,
}

pub trait Synthesizer {
    const SYNTHESIZER_MODEL: &'static str;

    type Error: Classify + Debug + Display + Send;

    fn synthesize(
        &self,
        prompt: &Prompt,
        context_texts: &[String],
    ) -> impl Future<Output = Result<SynthesisResponse, Self::Error>> + Send;
}
