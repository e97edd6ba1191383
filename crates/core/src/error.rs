//! Error types for the ContextKeeper domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type.

use thiserror::Error;

/// Failures of the upstream language model.
///
/// These are the only failures that reach a memory caller; malformed model
/// output is recovered from locally and never becomes a `ProviderError`.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    /// The completion call behind a memory block failed; nothing was written.
    #[error("Memory update failed: {0}")]
    CompletionFailed(#[from] ProviderError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        };
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn completion_failure_wraps_provider_error() {
        let err: MemoryError = ProviderError::Network("connection reset".into()).into();
        let msg = err.to_string();
        assert!(msg.starts_with("Memory update failed"));
        assert!(msg.contains("connection reset"));
    }
}
