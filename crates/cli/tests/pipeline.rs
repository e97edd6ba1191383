//! End-to-end tests for the context pipeline.
//!
//! These exercise the path a chat turn takes: retrieved passages are
//! reranked into a budget, the turn is recorded in session memory, old turns
//! are flushed into a fact block, and the facts come back as context.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use contextkeeper_config::{MemoryConfig, RerankerConfig, SessionConfig};
use contextkeeper_context::{CodeReranker, Passage, estimate_tokens};
use contextkeeper_core::clock::ManualClock;
use contextkeeper_core::error::{MemoryError, ProviderError};
use contextkeeper_core::message::{Message, Role};
use contextkeeper_core::provider::{
    ModelCompletion, Provider, ProviderRequest, ProviderResponse, Usage,
};
use contextkeeper_memory::{ChatMemoryFactory, SessionManager};

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that returns scripted responses in sequence.
struct ScriptedProvider {
    responses: Mutex<Vec<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().rev().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn prompt(&self, call: usize) -> String {
        self.requests.lock().unwrap()[call].messages[0].content.clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);
        let text = self
            .responses
            .lock()
            .unwrap()
            .pop()
            .expect("ScriptedProvider: no more responses")?;
        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: Some(Usage {
                prompt_tokens: 0,
                completion_tokens: 0,
                total_tokens: 0,
            }),
            model,
        })
    }
}

fn facts(list: &[&str]) -> Result<String, ProviderError> {
    Ok(serde_json::json!({ "facts": list }).to_string())
}

/// Small windows so a handful of turns triggers a flush.
fn memory_config(max_facts: usize) -> MemoryConfig {
    MemoryConfig {
        token_limit: 120,
        short_term_token_limit_ratio: 0.5,
        max_facts,
        fact_extraction: true,
    }
}

fn sessions_with(provider: Arc<ScriptedProvider>, memory: MemoryConfig) -> SessionManager {
    let llm = Arc::new(ModelCompletion::new(provider, "test-model").with_temperature(0.0));
    let factory = ChatMemoryFactory::new(memory).with_completion(llm);
    SessionManager::new(&SessionConfig::default(), Arc::new(factory))
}

/// 52 chars: 17 tokens with overhead.
fn turn(i: usize) -> Message {
    Message::user(format!("turn {i:02}: I am working on the consensus module today."))
}

#[tokio::test]
async fn flushed_turns_become_fact_context() {
    let provider = Arc::new(ScriptedProvider::new(vec![facts(&[
        "The user is working on a consensus module",
    ])]));
    let sessions = sessions_with(provider.clone(), memory_config(10));

    let memory = sessions.get_session_memory("s1");
    for i in 0..4 {
        memory.add(turn(i)).await.unwrap();
    }

    assert_eq!(provider.calls(), 1);
    assert!(provider.prompt(0).contains("turn 00"));

    let context = sessions.get_session_memory("s1").context_messages();
    assert_eq!(context[0].role, Role::System);
    assert!(context[0].content.contains("consensus module"));
    assert!(context.iter().any(|m| m.content.contains("turn 03")));
}

#[tokio::test]
async fn sessions_do_not_share_facts() {
    let provider = Arc::new(ScriptedProvider::new(vec![facts(&["Only in s1"])]));
    let sessions = sessions_with(provider.clone(), memory_config(10));

    let s1 = sessions.get_session_memory("s1");
    for i in 0..4 {
        s1.add(turn(i)).await.unwrap();
    }
    let s2 = sessions.get_session_memory("s2");
    s2.add(Message::user("hello")).await.unwrap();

    assert!(s2.context_messages().iter().all(|m| !m.content.contains("Only in s1")));
}

#[tokio::test]
async fn condensation_keeps_fact_cap() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        facts(&["A", "B"]),
        facts(&["C", "D"]),
        facts(&["A and B", "C and D"]),
    ]));
    let sessions = sessions_with(provider.clone(), memory_config(3));

    let memory = sessions.get_session_memory("s1");
    for i in 0..5 {
        memory.add(turn(i)).await.unwrap();
    }

    assert_eq!(provider.calls(), 3);
    assert!(provider.prompt(2).contains("at most 3 facts"));
    let digest = &memory.context_messages()[0].content;
    assert!(digest.contains("- A and B\n- C and D"));
}

#[tokio::test]
async fn provider_failure_surfaces_as_memory_error() {
    let provider = Arc::new(ScriptedProvider::new(vec![Err(
        ProviderError::AuthenticationFailed("bad key".into()),
    )]));
    let sessions = sessions_with(provider, memory_config(10));

    let memory = sessions.get_session_memory("s1");
    for i in 0..3 {
        memory.add(turn(i)).await.unwrap();
    }
    let err = memory.add(turn(3)).await.unwrap_err();

    assert!(matches!(err, MemoryError::CompletionFailed(ProviderError::AuthenticationFailed(_))));
    assert!(err.to_string().starts_with("Memory update failed"));
    assert_eq!(memory.messages().len(), 4);
}

#[tokio::test]
async fn expired_session_starts_fresh() {
    let clock = Arc::new(ManualClock::starting_now());
    let config = SessionConfig {
        max_sessions: 10,
        session_ttl_ms: 1_000,
        cleanup_interval_ms: 500,
        background_cleanup: false,
    };
    let factory = ChatMemoryFactory::new(MemoryConfig::default());
    let sessions = SessionManager::new(&config, Arc::new(factory)).with_clock(clock.clone());

    sessions
        .get_session_memory("s1")
        .add(Message::user("remember me"))
        .await
        .unwrap();
    clock.advance_ms(5_000);

    let memory = sessions.get_session_memory("s1");
    assert!(memory.messages().is_empty());
    assert_eq!(sessions.session_count(), 1);
}

#[test]
fn reranked_context_fits_budget() {
    let passages = vec![
        Passage::new("Release notes and a changelog summary. ".repeat(20), 0.95),
        Passage::new(
            "The consensus protocol keeps an invariant across every replica. \
             Each transaction passes through the module interface once. "
                .repeat(10),
            0.8,
        ),
        Passage::new("A short note about the algorithm.", 0.7),
    ];
    let config = RerankerConfig {
        max_tokens: 500,
        ..RerankerConfig::default()
    };
    let reranker = CodeReranker::from_config(&config);

    let selected = reranker.rerank(&passages);
    let total: usize = selected.iter().map(|p| estimate_tokens(&p.content)).sum();

    assert!(total <= 500);
    let order: Vec<usize> = selected.iter().map(|p| p.index).collect();
    assert_eq!(order, vec![1, 2, 0]);
    assert!(!selected[0].truncated);
    assert!(selected[2].truncated);
    assert!(selected[2].content.ends_with('.'));

    let stats = reranker.stats(&passages, &selected);
    assert_eq!(stats.original_count, 3);
    assert_eq!(stats.total_tokens, total);
}
