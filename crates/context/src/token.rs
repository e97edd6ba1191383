//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token. Every budget
//! in the pipeline (passage selection, memory windows) is measured with
//! these functions so the numbers agree with each other.

use contextkeeper_core::message::Message;

/// Characters per estimated token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token count for a string.
///
/// Heuristic: `ceil(chars / 4)`. Counts Unicode scalar values, not bytes.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Estimate tokens for a single message including per-message overhead.
///
/// Each message costs ~4 tokens of overhead for role name, delimiters,
/// and formatting markers in the API wire format.
pub fn estimate_message_tokens(message: &Message) -> usize {
    let overhead = 4;
    overhead + estimate_tokens(&message.content)
}

/// Estimate tokens for a slice of messages.
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}
