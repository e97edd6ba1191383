//! Provider trait: the abstraction over LLM backends.
//!
//! A Provider knows how to send a conversation to an LLM and get a complete
//! response back. The memory subsystem only needs a much narrower view of
//! that: "prompt in, text out". [`TextCompletion`] is that view, and
//! [`ModelCompletion`] adapts any `Provider` to it.
//!
//! No structured-output guarantee is assumed from any backend: callers must
//! treat `Completion::text` as arbitrary text.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "anthropic/claude-sonnet-4", "gpt-4o")
    pub model: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

fn default_temperature() -> f32 {
    0.7
}

impl ProviderRequest {
    /// A single-turn request with default sampling settings.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: default_temperature(),
            max_tokens: None,
            stop: Vec::new(),
        }
    }
}

/// A complete (non-streaming) response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated message
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core Provider trait.
///
/// Every LLM backend implements this trait. Callers invoke `complete()`
/// without knowing which backend is being used.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openrouter", "ollama").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;

    /// List available models for this provider.
    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        Ok(Vec::new())
    }

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }
}

/// Raw text returned by a completion call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
}

impl Completion {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// The narrow "prompt in, text out" capability consumed by memory blocks.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<Completion, ProviderError>;
}

/// Adapts a [`Provider`] and a model name into a [`TextCompletion`].
///
/// The prompt is sent as a single user message.
pub struct ModelCompletion {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl ModelCompletion {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextCompletion for ModelCompletion {
    async fn complete(&self, prompt: &str) -> Result<Completion, ProviderError> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: vec![Message::user(prompt)],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stop: Vec::new(),
        };
        tracing::debug!(
            provider = %self.provider.name(),
            model = %self.model,
            prompt_chars = prompt.len(),
            "Sending completion"
        );
        let response = self.provider.complete(request).await?;
        Ok(Completion::new(response.message.content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct EchoProvider {
        seen: Mutex<Vec<ProviderRequest>>,
    }

    #[async_trait]
    impl Provider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            let reply = format!("echo: {}", request.messages[0].content);
            let model = request.model.clone();
            self.seen.lock().unwrap().push(request);
            Ok(ProviderResponse {
                message: Message::assistant(reply),
                usage: None,
                model,
            })
        }
    }

    #[test]
    fn provider_request_defaults() {
        let req = ProviderRequest::new("gpt-4o", vec![]);
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
        assert!(req.max_tokens.is_none());
    }

    #[tokio::test]
    async fn model_completion_sends_prompt_as_user_message() {
        let provider = Arc::new(EchoProvider {
            seen: Mutex::new(Vec::new()),
        });
        let completion = ModelCompletion::new(provider.clone(), "test-model")
            .with_temperature(0.0)
            .with_max_tokens(256);

        let out = completion.complete("list the facts").await.unwrap();
        assert_eq!(out.text, "echo: list the facts");

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model, "test-model");
        assert_eq!(seen[0].messages[0].role, crate::message::Role::User);
        assert_eq!(seen[0].max_tokens, Some(256));
        assert!(seen[0].temperature.abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn model_completion_propagates_provider_failure() {
        struct Down;

        #[async_trait]
        impl Provider for Down {
            fn name(&self) -> &str {
                "down"
            }
            async fn complete(
                &self,
                _request: ProviderRequest,
            ) -> Result<ProviderResponse, ProviderError> {
                Err(ProviderError::Timeout("30s".into()))
            }
        }

        let completion = ModelCompletion::new(Arc::new(Down), "m");
        let err = completion.complete("x").await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
    }
}
