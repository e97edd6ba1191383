pub mod chat;
pub mod facts;
pub mod rerank;
pub mod status;

use std::path::Path;
use std::sync::Arc;

use contextkeeper_config::AppConfig;
use contextkeeper_core::ProviderError;
use contextkeeper_core::provider::{ModelCompletion, Provider, TextCompletion};

/// Providers that run locally and accept any key.
const KEYLESS_PROVIDERS: &[&str] = &["ollama", "vllm", "llamacpp", "llama.cpp"];

pub(crate) fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Read a file, or stdin when the path is "-".
pub(crate) fn read_input(path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    if path.as_os_str() == "-" {
        return Ok(std::io::read_to_string(std::io::stdin())?);
    }
    std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()).into())
}

/// The default provider, the model it is asked for, and a prompt-in/text-out
/// view of the pair for memory blocks.
pub(crate) struct ActiveModel {
    pub provider: Arc<dyn Provider>,
    pub name: String,
    pub completion: Arc<dyn TextCompletion>,
}

pub(crate) fn model_from_config(
    config: &AppConfig,
) -> Result<ActiveModel, Box<dyn std::error::Error>> {
    let keyless = KEYLESS_PROVIDERS.contains(&config.default_provider.as_str());
    let configured = config
        .providers
        .get(&config.default_provider)
        .is_some_and(|p| p.api_key.is_some());

    // Check for API key early and give a clear error
    if !keyless && !configured && config.api_key.is_none() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OPENROUTER_API_KEY=sk-or-v1-...     (recommended)");
        eprintln!("    OPENAI_API_KEY=sk-...               (for OpenAI direct)");
        eprintln!("    CONTEXTKEEPER_API_KEY=sk-...        (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let router = contextkeeper_providers::build_from_config(config);
    let provider = router
        .default()
        .ok_or_else(|| ProviderError::NotConfigured(router.default_name().to_string()))?;
    let name = config.active_model().to_string();

    // Fact extraction wants stable, parseable output.
    let completion = ModelCompletion::new(provider.clone(), name.clone())
        .with_temperature(0.0)
        .with_max_tokens(config.default_max_tokens);

    Ok(ActiveModel {
        provider,
        name,
        completion: Arc::new(completion),
    })
}

/// Human-readable duration for diagnostics ("2h 5m", "42s").
pub(crate) fn format_duration_ms(ms: i64) -> String {
    let secs = ms.max(0) / 1000;
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    match (h, m) {
        (0, 0) => format!("{s}s"),
        (0, _) => format!("{m}m {s}s"),
        _ => format!("{h}h {m}m"),
    }
}
