//! # LINE document bot CLI (`line-doc-bot`)
//!
//! ## Usage
//!
//! ```bash
//! line-doc-bot [--config ./config/bot.toml] [serve|docs|prompt]
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `serve` | Load documents and start the webhook server (default) |
//! | `docs` | List the documents the bot would load |
//! | `prompt` | Print the system prompt built from the documents |
//!
//! Credentials come from the environment (or a `.env` file):
//! `OPENAI_API_KEY`, `LINE_CHANNEL_ACCESS_TOKEN`, `LINE_CHANNEL_SECRET`.
//! `PORT` and `DATA_DIR` override the listen port and the document directory.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use line_doc_bot::config::{self, Config};
use line_doc_bot::loader::load_documents;
use line_doc_bot::prompt::compose_system_prompt;
use line_doc_bot::server;
use line_doc_bot::state::AppState;

/// Answers LINE messages from a local document set via a chat completion API.
#[derive(Parser)]
#[command(name = "line-doc-bot", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// When omitted, `./config/bot.toml` is used if present, otherwise
    /// built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load documents and start the webhook server.
    Serve,

    /// List the documents found in the document directory.
    ///
    /// Prints one line per loaded file with its extracted length. Files
    /// that fail to load are reported in the log and left out.
    Docs,

    /// Print the system prompt composed from the document directory.
    Prompt,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the process environment is used as-is.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(cfg).await?,
        Commands::Docs => {
            let docs = load_documents(&cfg.documents.dir);
            if docs.is_empty() {
                println!("No documents loaded from {}", cfg.documents.dir.display());
            }
            for doc in &docs {
                println!("{:<40} {:>10} chars", doc.name, doc.text.chars().count());
            }
        }
        Commands::Prompt => {
            let docs = load_documents(&cfg.documents.dir);
            println!("{}", compose_system_prompt(&docs, &cfg.prompt));
        }
    }

    Ok(())
}

async fn serve(cfg: Config) -> anyhow::Result<()> {
    let bind = cfg.server.bind.clone();
    let state = AppState::initialize(cfg)?;
    server::run_server(state, &bind).await
}
