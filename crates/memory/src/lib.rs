//! Conversation memory for ContextKeeper.
//!
//! - [`SessionManager`]: per-session memory handles with TTL expiry and
//!   LRU eviction.
//! - [`ChatMemory`]: token-bounded short-term history that flushes old turns
//!   into memory blocks.
//! - [`FactMemoryBlock`]: a model-maintained list of durable facts.

pub mod chat_memory;
pub mod fact_block;
pub mod json_extract;
pub mod session;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use chat_memory::{ChatMemory, ChatMemoryFactory};
pub use fact_block::FactMemoryBlock;
pub use json_extract::{extract_json, extract_string_list};
pub use session::{CleanupReport, SessionInfo, SessionManager, SessionStats};
