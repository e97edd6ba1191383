//! Fact memory block: a compact digest of durable facts.
//!
//! Two prompts do two jobs:
//!
//! 1. **Extraction** (every `put`): existing facts + new turns in, new
//!    atomic facts out. They are appended.
//! 2. **Condensation** (only when the list exceeds `max_facts`): the whole
//!    list in, a shorter equivalent list out. It replaces the old list.
//!
//! Model output is parsed with [`extract_string_list`]. Unparseable output
//! is logged and ignored: extraction adds nothing, condensation is skipped
//! and the list stays over the cap until the next successful attempt.
//! Only a failed completion call is returned to the caller, and in that case
//! nothing is written.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use contextkeeper_core::error::MemoryError;
use contextkeeper_core::memory::MemoryBlock;
use contextkeeper_core::message::{transcript, Message};
use contextkeeper_core::provider::TextCompletion;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::json_extract::extract_string_list;

const FACTS_KEY: &str = "facts";
const SECTION_HEADER: &str = "[Known Facts]";

const EXTRACTION_PROMPT: &str = r#"You maintain a list of durable facts learned during a conversation: who the user is, what they are working on, their preferences, decisions and constraints.

Existing facts:
{existing}

New conversation:
{conversation}

Extract facts from the new conversation that are not already covered by the existing facts. Each fact must be one short, self-contained statement. Skip greetings, questions, and anything that is only true for this single turn.

Respond with JSON only, in this shape:
{"facts": ["first fact", "second fact"]}
If there is nothing new, respond with {"facts": []}."#;

const CONDENSE_PROMPT: &str = r#"The following list of facts about a conversation has grown too long.

Facts:
{facts}

Rewrite it as at most {max_facts} facts. Merge related facts, drop duplicates and facts that were later superseded, and keep every distinct piece of information that still matters. Each fact must remain one short, self-contained statement.

Respond with JSON only, in this shape:
{"facts": ["first fact", "second fact"]}"#;

/// Appends extracted facts and condenses them when over `max_facts`.
pub struct FactMemoryBlock {
    id: String,
    max_facts: usize,
    llm: Arc<dyn TextCompletion>,
    facts: RwLock<Vec<String>>,
    /// Serialises `put` calls; held across completion calls.
    update_lock: Mutex<()>,
}

impl FactMemoryBlock {
    pub fn new(llm: Arc<dyn TextCompletion>, max_facts: usize) -> Self {
        Self {
            id: "facts".into(),
            max_facts,
            llm,
            facts: RwLock::new(Vec::new()),
            update_lock: Mutex::new(()),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Seed the list, e.g. when restoring a digest.
    pub fn with_facts(self, facts: Vec<String>) -> Self {
        *self.facts.write().unwrap_or_else(|e| e.into_inner()) = facts;
        self
    }

    pub fn max_facts(&self) -> usize {
        self.max_facts
    }

    pub fn facts(&self) -> Vec<String> {
        self.facts.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.facts.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ask for a condensed list. `Ok(None)` means the reply was unusable.
    async fn condense(&self, facts: &[String]) -> Result<Option<Vec<String>>, MemoryError> {
        let prompt = CONDENSE_PROMPT
            .replace("{facts}", &bullet_list(facts))
            .replace("{max_facts}", &self.max_facts.to_string());
        let completion = self.llm.complete(&prompt).await?;

        let Some(mut condensed) = extract_string_list(&completion.text, FACTS_KEY) else {
            warn!(block = %self.id, "Could not parse condensation response; keeping facts");
            debug!(raw = %completion.text, "Raw condensation response");
            return Ok(None);
        };
        if condensed.is_empty() {
            warn!(block = %self.id, "Condensation returned no facts; keeping facts");
            return Ok(None);
        }
        condensed.truncate(self.max_facts);
        Ok(Some(condensed))
    }
}

#[async_trait]
impl MemoryBlock for FactMemoryBlock {
    fn id(&self) -> &str {
        &self.id
    }

    fn get(&self) -> Option<Message> {
        let facts = self.facts.read().unwrap_or_else(|e| e.into_inner());
        if facts.is_empty() {
            return None;
        }
        Some(Message::system(format!(
            "{SECTION_HEADER}\n{}",
            bullet_list(&facts)
        )))
    }

    async fn put(&self, messages: &[Message]) -> Result<(), MemoryError> {
        if messages.is_empty() {
            return Ok(());
        }
        let _guard = self.update_lock.lock().await;

        let existing = self.facts();
        let existing_text = if existing.is_empty() {
            "(none)".to_string()
        } else {
            bullet_list(&existing)
        };
        let prompt = EXTRACTION_PROMPT
            .replace("{existing}", &existing_text)
            .replace("{conversation}", &transcript(messages));

        let completion = self.llm.complete(&prompt).await?;
        let Some(extracted) = extract_string_list(&completion.text, FACTS_KEY) else {
            warn!(block = %self.id, "Could not parse fact extraction response; no new facts");
            debug!(raw = %completion.text, "Raw extraction response");
            return Ok(());
        };

        let mut updated = existing;
        let before = updated.len();
        for fact in extracted {
            if !contains_fact(&updated, &fact) {
                updated.push(fact);
            }
        }
        let added = updated.len() - before;
        if added == 0 {
            debug!(block = %self.id, "No new facts extracted");
            return Ok(());
        }

        if updated.len() > self.max_facts {
            let over = updated.len();
            if let Some(condensed) = self.condense(&updated).await? {
                info!(
                    block = %self.id,
                    from = over,
                    to = condensed.len(),
                    "Condensed fact list"
                );
                updated = condensed;
            }
        }

        debug!(block = %self.id, added, total = updated.len(), "Fact list updated");
        *self.facts.write().unwrap_or_else(|e| e.into_inner()) = updated;
        Ok(())
    }
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|f| format!("- {f}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn contains_fact(facts: &[String], candidate: &str) -> bool {
    facts.iter().any(|f| f.eq_ignore_ascii_case(candidate))
}
