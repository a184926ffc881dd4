//! Fakes shared by unit tests.

use crate::error::{BenchError, Result};
use crate::llm::ChatBackend;
use crate::record::{EvaluationRecord, StoredRecord};
use crate::store::RecordStore;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Script {
    queued: HashMap<String, VecDeque<Result<String>>>,
    fallback: HashMap<String, String>,
    calls: HashMap<String, usize>,
    prompts: Vec<(String, String)>,
}

/// Chat backend that plays back canned replies per model.
///
/// Queued replies are used first, then the model's fallback text. A model
/// with neither answers with an HTTP error.
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    script: Mutex<Script>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(self: Arc<Self>, model: &str, reply: Result<String>) -> Arc<Self> {
        self.script
            .lock()
            .unwrap()
            .queued
            .entry(model.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn always(self: Arc<Self>, model: &str, text: &str) -> Arc<Self> {
        self.script
            .lock()
            .unwrap()
            .fallback
            .insert(model.to_string(), text.to_string());
        self
    }

    pub fn calls(&self, model: &str) -> usize {
        self.script
            .lock()
            .unwrap()
            .calls
            .get(model)
            .copied()
            .unwrap_or(0)
    }

    pub fn prompts_for(&self, model: &str) -> Vec<String> {
        self.script
            .lock()
            .unwrap()
            .prompts
            .iter()
            .filter(|(m, _)| m == model)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn send(&self, model: &str, prompt: &str) -> Result<String> {
        let mut script = self.script.lock().unwrap();
        *script.calls.entry(model.to_string()).or_default() += 1;
        script.prompts.push((model.to_string(), prompt.to_string()));

        if let Some(reply) = script.queued.get_mut(model).and_then(VecDeque::pop_front) {
            return reply;
        }

        script
            .fallback
            .get(model)
            .cloned()
            .ok_or_else(|| BenchError::Http(format!("no scripted reply for {}", model)))
    }
}

/// Store whose writes always fail.
pub(crate) struct FailingStore;

#[async_trait]
impl RecordStore for FailingStore {
    async fn create(&self, _record: EvaluationRecord) -> Result<StoredRecord> {
        Err(BenchError::Storage("disk full".to_string()))
    }

    async fn find(&self) -> Result<Vec<StoredRecord>> {
        Ok(Vec::new())
    }
}
