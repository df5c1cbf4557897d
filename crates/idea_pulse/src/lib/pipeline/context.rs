use std::{collections::BTreeMap, path::PathBuf};

use serde_json::Value;

/// Well known artifact names shared by the built-in stages
pub mod keys {
    pub const URL: &str = "url";
    pub const AUDIO_PATH: &str = "audio_path";
    pub const TRANSCRIPT: &str = "transcript";
    pub const TRANSCRIPTS: &str = "transcripts";
    pub const IDEA: &str = "idea";
    pub const SECTION: &str = "section";
    pub const RETRIEVED: &str = "retrieved";
    pub const FILLED: &str = "filled";
}

/// Named artifacts accumulated by the stages of one item.
///
/// Stages receive the context by value and hand back a new one, so an
/// attempt that fails never leaks partial writes into the next attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    artifacts: BTreeMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_text(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.artifacts.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.artifacts.get(key)
    }

    pub fn set_text(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.set(key, Value::String(value.into()));
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn set_texts(&mut self, key: impl Into<String>, values: impl IntoIterator<Item = String>) {
        self.set(key, Value::Array(values.into_iter().map(Value::String).collect()));
    }

    /// Returns the list stored under `key`; non-string entries are skipped
    pub fn texts(&self, key: &str) -> Option<Vec<&str>> {
        self.get(key)
            .and_then(Value::as_array)
            .map(|values| values.iter().filter_map(Value::as_str).collect())
    }

    pub fn set_path(&mut self, key: impl Into<String>, path: PathBuf) {
        self.set_text(key, path.to_string_lossy());
    }

    pub fn path(&self, key: &str) -> Option<PathBuf> {
        self.text(key).map(PathBuf::from)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.artifacts.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.artifacts.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.artifacts.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

/// One unit of work: an opaque identifier and its starting context
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineItem {
    pub id: String,
    pub context: Context,
}

impl PipelineItem {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            context: Context::new(),
        }
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn with_text(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.set_text(key, value);
        self
    }
}
