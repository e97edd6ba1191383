//! Shared test helpers for memory tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use contextkeeper_core::error::ProviderError;
use contextkeeper_core::provider::{Completion, TextCompletion};

/// A completion model that returns a queue of scripted replies.
///
/// Each call to `complete` pops the next reply and records the prompt.
/// Panics if more calls are made than replies provided.
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Replies with each text in order.
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextCompletion for ScriptedCompletion {
    async fn complete(&self, prompt: &str) -> Result<Completion, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(reply) => reply.map(Completion::new),
            None => panic!(
                "ScriptedCompletion: no more replies (call #{})",
                self.call_count()
            ),
        }
    }
}

/// `{"facts": [...]}` as the model would return it.
pub fn facts_json(facts: &[&str]) -> String {
    serde_json::json!({ "facts": facts }).to_string()
}
