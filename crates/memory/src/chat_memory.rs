//! Token-bounded conversation memory with pluggable memory blocks.
//!
//! Recent turns are kept verbatim until they exceed
//! `token_limit * short_term_token_limit_ratio`. The oldest turns are then
//! handed to every [`MemoryBlock`] and dropped from the short-term history.
//! With no blocks attached this degrades to a sliding window.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use contextkeeper_config::MemoryConfig;
use contextkeeper_context::token::{estimate_message_tokens, estimate_messages_tokens};
use contextkeeper_core::error::MemoryError;
use contextkeeper_core::memory::{ConversationMemory, MemoryBlock, MemoryFactory};
use contextkeeper_core::message::Message;
use contextkeeper_core::provider::TextCompletion;
use tracing::{debug, info};

use crate::fact_block::FactMemoryBlock;

pub struct ChatMemory {
    token_limit: usize,
    short_term_limit: usize,
    blocks: Vec<Arc<dyn MemoryBlock>>,
    history: Mutex<Vec<Message>>,
    /// Held across block `put` calls so flushes happen one at a time.
    flush_lock: tokio::sync::Mutex<()>,
}

impl ChatMemory {
    pub fn new(token_limit: usize, short_term_token_limit_ratio: f64) -> Self {
        let ratio = short_term_token_limit_ratio.clamp(0.0, 1.0);
        Self {
            token_limit,
            short_term_limit: (token_limit as f64 * ratio).floor() as usize,
            blocks: Vec::new(),
            history: Mutex::new(Vec::new()),
            flush_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn from_config(config: &MemoryConfig) -> Self {
        Self::new(config.token_limit, config.short_term_token_limit_ratio)
    }

    pub fn with_block(mut self, block: Arc<dyn MemoryBlock>) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn blocks(&self) -> &[Arc<dyn MemoryBlock>] {
        &self.blocks
    }

    pub fn token_limit(&self) -> usize {
        self.token_limit
    }

    pub fn short_term_token_limit(&self) -> usize {
        self.short_term_limit
    }

    fn history(&self) -> std::sync::MutexGuard<'_, Vec<Message>> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Oldest messages to flush so the rest fits the short-term limit.
    /// The newest message is never flushed.
    fn overflow(history: &[Message], limit: usize) -> Vec<Message> {
        let mut total = estimate_messages_tokens(history);
        if total <= limit {
            return Vec::new();
        }
        let mut flushed = Vec::new();
        for msg in &history[..history.len().saturating_sub(1)] {
            if total <= limit {
                break;
            }
            total -= estimate_message_tokens(msg);
            flushed.push(msg.clone());
        }
        flushed
    }
}

#[async_trait]
impl ConversationMemory for ChatMemory {
    async fn add(&self, message: Message) -> Result<(), MemoryError> {
        let _flush = self.flush_lock.lock().await;

        let overflow = {
            let mut history = self.history();
            history.push(message);
            Self::overflow(&history, self.short_term_limit)
        };
        if overflow.is_empty() {
            return Ok(());
        }

        for block in &self.blocks {
            block.put(&overflow).await?;
        }

        let flushed: HashSet<&str> = overflow.iter().map(|m| m.id.as_str()).collect();
        self.history().retain(|m| !flushed.contains(m.id.as_str()));

        if self.blocks.is_empty() {
            debug!(dropped = overflow.len(), "Short-term history trimmed");
        } else {
            info!(
                flushed = overflow.len(),
                blocks = self.blocks.len(),
                "Flushed short-term history into memory blocks"
            );
        }
        Ok(())
    }

    fn messages(&self) -> Vec<Message> {
        self.history().clone()
    }

    fn context_messages(&self) -> Vec<Message> {
        let mut out: Vec<Message> = self.blocks.iter().filter_map(|b| b.get()).collect();
        let block_tokens = estimate_messages_tokens(&out);
        let mut remaining = self.token_limit.saturating_sub(block_tokens);

        let history = self.history();
        let mut recent = Vec::new();
        for msg in history.iter().rev() {
            let cost = estimate_message_tokens(msg);
            if cost > remaining {
                break;
            }
            remaining -= cost;
            recent.push(msg.clone());
        }
        recent.reverse();
        out.extend(recent);
        out
    }

    fn clear(&self) {
        self.history().clear();
    }
}

/// Builds a [`ChatMemory`] per session, with a fact block when a model is
/// available and fact extraction is enabled.
pub struct ChatMemoryFactory {
    config: MemoryConfig,
    llm: Option<Arc<dyn TextCompletion>>,
}

impl ChatMemoryFactory {
    pub fn new(config: MemoryConfig) -> Self {
        Self { config, llm: None }
    }

    pub fn with_completion(mut self, llm: Arc<dyn TextCompletion>) -> Self {
        self.llm = Some(llm);
        self
    }
}

impl MemoryFactory for ChatMemoryFactory {
    fn create(&self, session_id: &str) -> Arc<dyn ConversationMemory> {
        let mut memory = ChatMemory::from_config(&self.config);
        if let (true, Some(llm)) = (self.config.fact_extraction, &self.llm) {
            memory = memory.with_block(Arc::new(FactMemoryBlock::new(
                llm.clone(),
                self.config.max_facts,
            )));
        }
        debug!(session_id, blocks = memory.blocks().len(), "Created chat memory");
        Arc::new(memory)
    }
}
