//! # askdesk CLI
//!
//! The `askdesk` binary starts the HTTP service and offers a couple of local
//! commands for poking at the document cache without a running server.
//!
//! ## Usage
//!
//! ```bash
//! askdesk --config ./askdesk.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `askdesk serve` | Start the HTTP service |
//! | `askdesk search "<query>"` | Rank cached documents against a query |
//! | `askdesk docs` | List the documents the cache loads |
//!
//! The config file is optional; without one the service runs with
//! development defaults (docs from `./docs`, local rate-limit buckets,
//! unsigned requests admitted).

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use askdesk::answer::CannedAnswerer;
use askdesk::config::Config;
use askdesk::docstore::DocStore;
use askdesk::limiter::RateLimiter;
use askdesk::metrics::Metrics;
use askdesk::retriever;
use askdesk::server::{run_server, AppState};

/// askdesk — a Slack knowledge assistant over local documents.
#[derive(Parser)]
#[command(name = "askdesk", version)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "askdesk.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service.
    Serve,
    /// Rank cached documents against a query and print the results.
    Search {
        query: String,
        /// Number of results to return (defaults to the configured top_k).
        #[arg(long)]
        k: Option<usize>,
    },
    /// List the documents currently eligible for the cache.
    Docs,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("askdesk=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            let docs = Arc::new(DocStore::new(&config.docs)?);
            let limiter = Arc::new(RateLimiter::connect(&config.rate_limit).await);
            let state = AppState {
                config: Arc::new(config),
                docs,
                limiter,
                answerer: Arc::new(CannedAnswerer),
                metrics: Arc::new(Metrics::new()),
            };
            run_server(state).await
        }
        Commands::Search { query, k } => run_search(&config, &query, k),
        Commands::Docs => run_docs(&config),
    }
}

fn run_search(config: &Config, query: &str, k: Option<usize>) -> Result<()> {
    let store = DocStore::new(&config.docs)?;
    let ranked = retriever::retrieve(&store, query, k.unwrap_or(config.retrieval.top_k));
    if ranked.is_empty() {
        println!("No results.");
        return Ok(());
    }

    let payload = retriever::compose(&store, &ranked, query, config.retrieval.excerpt_chars);
    for (i, (doc, snippet)) in ranked.iter().zip(payload.context.iter()).enumerate() {
        println!("{}. [{:.1}] {}", i + 1, doc.score, doc.path);
        let preview: String = snippet.excerpt.chars().take(120).collect();
        println!("   excerpt: \"{}\"", preview.replace('\n', " ").trim());
    }
    Ok(())
}

fn run_docs(config: &Config) -> Result<()> {
    let store = DocStore::new(&config.docs)?;
    let docs = store.all();

    println!("{:<56} {:>10}", "DOCUMENT", "CHARS");
    for (path, body) in docs.iter() {
        println!("{:<56} {:>10}", path, body.chars().count());
    }
    println!(
        "{} documents loaded from {}",
        docs.len(),
        config.docs.dir.display()
    );
    Ok(())
}
