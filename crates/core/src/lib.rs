//! # ContextKeeper Core
//!
//! Domain types, traits, and error definitions for the ContextKeeper
//! bounded-memory context pipeline. This crate has **zero framework
//! dependencies**: it defines the seams that the memory, context and
//! provider crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator the pipeline talks to is a trait here:
//! - [`Provider`] / [`TextCompletion`]: the language model
//! - [`ConversationMemory`] / [`MemoryBlock`]: per-session memory
//! - [`MemoryFactory`]: how the session manager builds a fresh memory
//! - [`Clock`]: wall-clock time, swappable in tests

pub mod clock;
pub mod error;
pub mod memory;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{MemoryError, ProviderError};
pub use memory::{ConversationMemory, MemoryBlock, MemoryFactory};
pub use message::{Message, Role};
pub use provider::{
    Completion, ModelCompletion, Provider, ProviderRequest, ProviderResponse, TextCompletion,
    Usage,
};
