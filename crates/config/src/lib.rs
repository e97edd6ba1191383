//! Configuration loading, validation, and management for ContextKeeper.
//!
//! Loads configuration from `~/.contextkeeper/config.toml` with environment
//! variable overrides. Validates all settings at startup. Components are
//! built from these typed sections; nothing reads the environment later.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.contextkeeper/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Session registry limits
    #[serde(default)]
    pub sessions: SessionConfig,

    /// Conversation memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Context reranker configuration
    #[serde(default)]
    pub reranker: RerankerConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("sessions", &self.sessions)
            .field("memory", &self.memory)
            .field("reranker", &self.reranker)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

/// Limits for the in-process session registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Registry size after a cleanup pass never exceeds this.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Idle time after which a session is expired.
    #[serde(default = "default_session_ttl_ms")]
    pub session_ttl_ms: u64,

    /// Minimum time between cleanup passes.
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,

    /// Also run cleanup on a timer, not only on access.
    #[serde(default)]
    pub background_cleanup: bool,
}

fn default_max_sessions() -> usize {
    100
}
fn default_session_ttl_ms() -> u64 {
    24 * 60 * 60 * 1000
}
fn default_cleanup_interval_ms() -> u64 {
    60 * 60 * 1000
}

impl SessionConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(clamp_ms(self.session_ttl_ms))
    }

    pub fn cleanup_interval(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(clamp_ms(self.cleanup_interval_ms))
    }
}

fn clamp_ms(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX / 1_000)
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            session_ttl_ms: default_session_ttl_ms(),
            cleanup_interval_ms: default_cleanup_interval_ms(),
            background_cleanup: false,
        }
    }
}

/// Per-session conversation memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Token ceiling for the messages a memory hands to the model.
    #[serde(default = "default_token_limit")]
    pub token_limit: usize,

    /// Share of `token_limit` kept as verbatim recent turns before
    /// older turns are flushed into memory blocks.
    #[serde(default = "default_short_term_ratio")]
    pub short_term_token_limit_ratio: f64,

    /// Soft cap on the fact list of a fact memory block.
    #[serde(default = "default_max_facts")]
    pub max_facts: usize,

    /// Attach a fact memory block to every session memory.
    #[serde(default = "default_true")]
    pub fact_extraction: bool,
}

fn default_token_limit() -> usize {
    30_000
}
fn default_short_term_ratio() -> f64 {
    0.7
}
fn default_max_facts() -> usize {
    50
}
fn default_true() -> bool {
    true
}

impl MemoryConfig {
    /// Tokens of verbatim history kept before flushing.
    pub fn short_term_token_limit(&self) -> usize {
        (self.token_limit as f64 * self.short_term_token_limit_ratio).floor() as usize
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            token_limit: default_token_limit(),
            short_term_token_limit_ratio: default_short_term_ratio(),
            max_facts: default_max_facts(),
            fact_extraction: true,
        }
    }
}

/// Context reranking and token budgeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    /// Multiplier applied to the code-relevance score.
    #[serde(default = "default_boost_factor")]
    pub boost_factor: f64,

    /// Token budget for the selected passages.
    #[serde(default = "default_rerank_max_tokens")]
    pub max_tokens: usize,

    /// A boundary passage is only truncated when more than this many
    /// tokens remain.
    #[serde(default = "default_min_truncation_tokens")]
    pub min_truncation_tokens: usize,

    /// How many entries the diagnostics breakdown lists.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Replaces the built-in code vocabulary when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
}

fn default_boost_factor() -> f64 {
    1.5
}
fn default_rerank_max_tokens() -> usize {
    3000
}
fn default_min_truncation_tokens() -> usize {
    100
}
fn default_top_n() -> usize {
    5
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            boost_factor: default_boost_factor(),
            max_tokens: default_rerank_max_tokens(),
            min_truncation_tokens: default_min_truncation_tokens(),
            top_n: default_top_n(),
            keywords: None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.contextkeeper/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `CONTEXTKEEPER_API_KEY` (highest priority)
    /// - `OPENROUTER_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        // Environment variable overrides (highest priority)
        if config.api_key.is_none() {
            config.api_key = std::env::var("CONTEXTKEEPER_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("CONTEXTKEEPER_PROVIDER") {
            config.default_provider = provider;
        }

        if let Ok(model) = std::env::var("CONTEXTKEEPER_MODEL") {
            config.default_model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".contextkeeper")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.sessions.max_sessions == 0 {
            return Err(ConfigError::ValidationError(
                "sessions.max_sessions must be > 0".into(),
            ));
        }

        if self.sessions.session_ttl_ms == 0 || self.sessions.cleanup_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "sessions.session_ttl_ms and sessions.cleanup_interval_ms must be > 0".into(),
            ));
        }

        let ratio = self.memory.short_term_token_limit_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(ConfigError::ValidationError(
                "memory.short_term_token_limit_ratio must be in (0, 1]".into(),
            ));
        }

        if self.memory.max_facts == 0 {
            return Err(ConfigError::ValidationError(
                "memory.max_facts must be > 0".into(),
            ));
        }

        if !self.reranker.boost_factor.is_finite() || self.reranker.boost_factor < 0.0 {
            return Err(ConfigError::ValidationError(
                "reranker.boost_factor must be a finite, non-negative number".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// The model to use with the default provider: its own
    /// `default_model` when set, the top-level one otherwise.
    pub fn active_model(&self) -> &str {
        self.providers
            .get(&self.default_provider)
            .and_then(|p| p.default_model.as_deref())
            .unwrap_or(&self.default_model)
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            sessions: SessionConfig::default(),
            memory: MemoryConfig::default(),
            reranker: RerankerConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
