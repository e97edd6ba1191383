//! ContextKeeper CLI: the main entry point.
//!
//! Commands:
//! - `status`: Show configuration and pipeline limits
//! - `rerank`: Rerank retrieved passages from a JSON file under a token budget
//! - `facts`: Extract durable facts from a conversation transcript
//! - `chat`: Interactive chat backed by session memory

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "contextkeeper",
    about = "ContextKeeper: bounded-memory context pipeline for RAG chat",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show configuration and pipeline limits
    Status {
        /// Also contact each provider and list its models
        #[arg(long)]
        check: bool,
    },

    /// Rerank retrieved passages and fit them into a token budget
    Rerank {
        /// JSON array of passages ({"content", "score", "id"?, "source"?}); "-" reads stdin
        #[arg(short, long)]
        input: PathBuf,

        /// Override the token budget
        #[arg(long)]
        max_tokens: Option<usize>,

        /// Override the code-relevance boost factor
        #[arg(long)]
        boost: Option<f64>,

        /// Print machine-readable JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Extract durable facts from a transcript
    Facts {
        /// JSON array of messages, or "role: content" lines; "-" reads stdin
        #[arg(short, long)]
        transcript: PathBuf,

        /// Override the fact cap
        #[arg(long)]
        max_facts: Option<usize>,
    },

    /// Interactive chat with per-session memory
    Chat {
        /// Session to start in
        #[arg(short, long, default_value = "default")]
        session: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Status { check } => commands::status::run(check).await?,
        Commands::Rerank {
            input,
            max_tokens,
            boost,
            json,
        } => commands::rerank::run(&input, max_tokens, boost, json).await?,
        Commands::Facts {
            transcript,
            max_facts,
        } => commands::facts::run(&transcript, max_facts).await?,
        Commands::Chat { session } => commands::chat::run(session).await?,
    }

    Ok(())
}
