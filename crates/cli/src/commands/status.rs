//! `contextkeeper status`: Show configuration and pipeline limits.

use contextkeeper_config::AppConfig;

use super::{format_duration_ms, load_config};

pub async fn run(check: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;

    println!("ContextKeeper Status");
    println!("====================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Provider:     {}", config.default_provider);
    println!("  Model:        {}", config.active_model());
    println!(
        "  API key:      {}",
        if config.has_api_key() { "configured" } else { "missing" }
    );
    println!();
    println!("  Sessions");
    println!("    Max sessions:      {}", config.sessions.max_sessions);
    println!(
        "    Idle TTL:          {}",
        format_duration_ms(config.sessions.ttl().num_milliseconds())
    );
    println!(
        "    Cleanup interval:  {} ({})",
        format_duration_ms(config.sessions.cleanup_interval().num_milliseconds()),
        if config.sessions.background_cleanup { "timer + on access" } else { "on access" }
    );
    println!();
    println!("  Memory");
    println!("    Token limit:       {}", config.memory.token_limit);
    println!(
        "    Short-term:        {} tokens ({:.0}%)",
        config.memory.short_term_token_limit(),
        config.memory.short_term_token_limit_ratio * 100.0
    );
    println!(
        "    Fact extraction:   {} (max {} facts)",
        if config.memory.fact_extraction { "enabled" } else { "disabled" },
        config.memory.max_facts
    );
    println!();
    println!("  Reranker");
    println!("    Token budget:      {}", config.reranker.max_tokens);
    println!("    Boost factor:      {}", config.reranker.boost_factor);
    println!(
        "    Vocabulary:        {}",
        match &config.reranker.keywords {
            Some(list) => format!("{} custom keywords", list.len()),
            None => "built-in".into(),
        }
    );

    println!();
    println!("  Providers");
    let router = contextkeeper_providers::build_from_config(&config);
    if check {
        for health in router.health_check_all().await {
            let marker = if health.name == router.default_name() { "*" } else { " " };
            let state = if health.healthy { "reachable" } else { "unreachable" };
            println!("  {marker} {:<14} {state}", health.name);
            if !health.models.is_empty() {
                println!("      {} models: {}", health.models.len(), preview(&health.models, 5));
            }
        }
    } else {
        for name in router.list() {
            let marker = if name == router.default_name() { "*" } else { " " };
            println!("  {marker} {name}");
        }
        println!("    (run with --check to contact providers)");
    }

    // Check config file existence
    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file, using defaults. Example:\n");
        for line in AppConfig::default_toml().lines() {
            println!("    {line}");
        }
    }

    Ok(())
}

/// The first `n` items, comma separated, with a count of the rest.
fn preview(items: &[String], n: usize) -> String {
    let shown = items.iter().take(n).map(String::as_str).collect::<Vec<_>>().join(", ");
    match items.len().saturating_sub(n) {
        0 => shown,
        rest => format!("{shown}, +{rest} more"),
    }
}
