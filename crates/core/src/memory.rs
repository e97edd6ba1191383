//! Memory traits: per-conversation memory and the blocks it digests into.
//!
//! A [`ConversationMemory`] is the opaque handle a session owns. It keeps
//! recent turns verbatim and may hand older turns to [`MemoryBlock`]s,
//! which keep a compact digest (for example, a list of durable facts).
//!
//! A [`MemoryFactory`] builds a fresh handle for an unseen session.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::MemoryError;
use crate::message::Message;

/// A long-lived digest of a conversation.
#[async_trait]
pub trait MemoryBlock: Send + Sync {
    /// Stable identifier (e.g. "facts").
    fn id(&self) -> &str;

    /// Current content as privileged context, or `None` when empty.
    ///
    /// Pure read: must not call out to a model.
    fn get(&self) -> Option<Message>;

    /// Digest the given turns into the block.
    ///
    /// Only upstream completion failures are returned as errors; the block is
    /// left unchanged when that happens.
    async fn put(&self, messages: &[Message]) -> Result<(), MemoryError>;
}

/// The per-session memory handle.
#[async_trait]
pub trait ConversationMemory: Send + Sync {
    /// Record a turn.
    async fn add(&self, message: Message) -> Result<(), MemoryError>;

    /// Snapshot of the verbatim short-term history.
    fn messages(&self) -> Vec<Message>;

    /// Messages to send to the model: block digests first, then recent turns.
    fn context_messages(&self) -> Vec<Message>;

    /// Drop the short-term history.
    fn clear(&self);
}

/// Builds a fresh memory handle for a session.
pub trait MemoryFactory: Send + Sync {
    fn create(&self, session_id: &str) -> Arc<dyn ConversationMemory>;
}

impl<F> MemoryFactory for F
where
    F: Fn(&str) -> Arc<dyn ConversationMemory> + Send + Sync,
{
    fn create(&self, session_id: &str) -> Arc<dyn ConversationMemory> {
        self(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct VecMemory {
        messages: Mutex<Vec<Message>>,
    }

    #[async_trait]
    impl ConversationMemory for VecMemory {
        async fn add(&self, message: Message) -> Result<(), MemoryError> {
            self.messages.lock().unwrap().push(message);
            Ok(())
        }

        fn messages(&self) -> Vec<Message> {
            self.messages.lock().unwrap().clone()
        }

        fn context_messages(&self) -> Vec<Message> {
            self.messages()
        }

        fn clear(&self) {
            self.messages.lock().unwrap().clear();
        }
    }

    #[tokio::test]
    async fn closure_is_a_memory_factory() {
        let factory = |_id: &str| -> Arc<dyn ConversationMemory> { Arc::new(VecMemory::default()) };
        let a = factory.create("a");
        let b = factory.create("b");

        a.add(Message::user("hello")).await.unwrap();
        assert_eq!(a.messages().len(), 1);
        assert!(b.messages().is_empty());
    }
}
