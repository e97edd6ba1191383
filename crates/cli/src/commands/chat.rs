//! `contextkeeper chat`: Interactive chat backed by session memory.
//!
//! Each line goes into the current session's memory; the model sees the
//! memory's context window (remembered facts plus recent turns).

use std::io::Write;
use std::sync::Arc;

use contextkeeper_config::AppConfig;
use contextkeeper_core::message::Message;
use contextkeeper_core::provider::ProviderRequest;
use contextkeeper_memory::{ChatMemoryFactory, SessionManager};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use super::{ActiveModel, format_duration_ms, load_config, model_from_config};

#[derive(Debug, PartialEq, Eq)]
enum SlashCommand {
    Sessions,
    Stats,
    Clear,
    Switch(String),
    Quit,
    Help,
    Unknown(String),
}

impl SlashCommand {
    fn parse(input: &str) -> Option<Self> {
        let rest = input.trim().strip_prefix('/')?;
        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let arg = parts.next();
        Some(match (name, arg) {
            ("sessions", _) => Self::Sessions,
            ("stats", _) => Self::Stats,
            ("clear", _) => Self::Clear,
            ("switch", Some(id)) => Self::Switch(id.to_string()),
            ("quit" | "exit", _) => Self::Quit,
            ("help", _) => Self::Help,
            _ => Self::Unknown(rest.to_string()),
        })
    }
}

pub async fn run(session: String) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let model = model_from_config(&config)?;

    let factory =
        ChatMemoryFactory::new(config.memory.clone()).with_completion(model.completion.clone());
    let sessions = Arc::new(SessionManager::new(&config.sessions, Arc::new(factory)));
    let cleanup = config
        .sessions
        .background_cleanup
        .then(|| sessions.spawn_cleanup_task());

    let mut current = session;

    println!();
    println!("  ContextKeeper: Interactive Chat");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", model.name);
    println!("  Session:   {current}");
    println!();
    println!("  Type a message, or /help for commands.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt(&current)?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            prompt(&current)?;
            continue;
        }

        match SlashCommand::parse(line) {
            Some(SlashCommand::Quit) => break,
            Some(command) => handle_command(command, &sessions, &mut current),
            None => {
                if let Err(e) = chat_turn(&sessions, &current, &model, &config, line).await {
                    eprintln!("  [Error] {e}");
                }
            }
        }
        prompt(&current)?;
    }

    if let Some(task) = cleanup {
        task.abort();
    }
    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

fn prompt(session: &str) -> std::io::Result<()> {
    print!("  [{session}] You > ");
    std::io::stdout().flush()
}

fn handle_command(command: SlashCommand, sessions: &SessionManager, current: &mut String) {
    match command {
        SlashCommand::Sessions => {
            let all = sessions.get_all_sessions();
            if all.is_empty() {
                println!("  No sessions yet.");
            }
            for info in all {
                let marker = if info.session_id == *current { "*" } else { " " };
                println!(
                    "  {marker} {:<20} created {}  idle {}",
                    info.session_id,
                    info.created.format("%H:%M:%S"),
                    format_duration_ms(info.idle_ms)
                );
            }
        }
        SlashCommand::Stats => {
            let stats = sessions.get_session_stats();
            println!("  Sessions:      {} / {}", stats.total_sessions, stats.max_sessions);
            if let (Some(oldest), Some(newest)) = (stats.oldest_created, stats.newest_created) {
                println!("  Oldest:        {}", oldest.format("%Y-%m-%d %H:%M:%S"));
                println!("  Newest:        {}", newest.format("%Y-%m-%d %H:%M:%S"));
            }
            println!("  Last cleanup:  {}", stats.last_cleanup.format("%H:%M:%S"));
            println!(
                "  Next cleanup:  {} (in {})",
                stats.next_cleanup.format("%H:%M:%S"),
                format_duration_ms(stats.time_until_next_cleanup_ms)
            );
        }
        SlashCommand::Clear => {
            sessions.clear_session(current);
            println!("  Cleared session '{current}'.");
        }
        SlashCommand::Switch(id) => {
            *current = id;
            println!("  Switched to session '{current}'.");
        }
        SlashCommand::Help => {
            println!("  /sessions     list sessions");
            println!("  /stats        registry statistics");
            println!("  /clear        forget the current session");
            println!("  /switch ID    continue in another session");
            println!("  /quit         exit");
        }
        SlashCommand::Unknown(cmd) => println!("  Unknown command: /{cmd} (try /help)"),
        SlashCommand::Quit => {}
    }
}

async fn chat_turn(
    sessions: &SessionManager,
    session_id: &str,
    model: &ActiveModel,
    config: &AppConfig,
    input: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let memory = sessions.get_session_memory(session_id);

    // A failed memory update still records the turn; keep chatting.
    if let Err(e) = memory.add(Message::user(input)).await {
        warn!(session_id, error = %e, "Memory update failed");
    }

    let mut request = ProviderRequest::new(&model.name, memory.context_messages());
    request.temperature = config.default_temperature;
    request.max_tokens = Some(config.default_max_tokens);

    eprint!("  ...");
    let response = model.provider.complete(request).await;
    eprint!("\r     \r");
    let response = response?;

    println!();
    for line in response.message.content.lines() {
        println!("  Assistant > {line}");
    }
    println!();

    if let Err(e) = memory.add(response.message).await {
        warn!(session_id, error = %e, "Memory update failed");
    }
    Ok(())
}
