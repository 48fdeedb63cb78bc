mod cli;
mod config;
mod content;
mod db;
mod embedding;
mod ingest;
mod memory;
mod search;
mod server;
mod summarize;
mod temporal;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "tabrecall",
    version,
    about = "Browsing memory MCP server with temporal-aware retrieval"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server
    Serve {
        /// Overrides the configured transport
        #[arg(long, value_enum)]
        transport: Option<Transport>,
    },
    /// Manage the local models
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// Run a unified search and print the results
    Search {
        query: String,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List the newest memories
    Recent {
        #[arg(long)]
        user: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Show store statistics
    Stats {
        #[arg(long)]
        user: Option<String>,
    },
    /// Check the database and model files
    Doctor,
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model and the reranker
    Download,
}

#[derive(Clone, Copy, ValueEnum)]
enum Transport {
    Stdio,
    Http,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::TabRecallConfig::load()?;

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let default_user = config.storage.default_user.clone();

    match cli.command {
        Command::Serve { transport } => {
            let transport = match transport {
                Some(t) => t,
                None if config.server.transport.eq_ignore_ascii_case("http") => Transport::Http,
                None => Transport::Stdio,
            };
            match transport {
                Transport::Stdio => server::serve_stdio(config).await?,
                Transport::Http => server::serve_http(config).await?,
            }
        }
        Command::Model { action } => match action {
            ModelAction::Download => cli::model_download(&config).await?,
        },
        Command::Search { query, user, limit } => {
            let limit = limit.unwrap_or(config.retrieval.default_limit);
            let state = server::AppState::open(config)?;
            let user = user.unwrap_or(default_user);
            cli::search::search(&state, &query, &user, limit).await?;
        }
        Command::Recent { user, limit } => {
            let state = server::AppState::open(config)?;
            cli::recent::recent(&state, &user.unwrap_or(default_user), limit)?;
        }
        Command::Stats { user } => {
            cli::stats::stats(&config, &user.unwrap_or(default_user))?;
        }
        Command::Doctor => cli::doctor::doctor(&config)?,
    }

    Ok(())
}
