//! Driftnet main entry point
//!
//! This is the command-line interface for the Driftnet crawl-and-index pipeline.

use anyhow::{bail, Context, Result};
use clap::Parser;
use driftnet::config::{load_config, load_config_unvalidated, Config};
use driftnet::crawler::Coordinator;
use driftnet::index::{MeilisearchEngine, SearchEngine, SearchQuery};
use driftnet::output::{print_report, print_run_history, print_search_hits};
use driftnet::storage::{SqliteStorage, Storage};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Driftnet: a polite crawl-and-index pipeline
///
/// Driftnet crawls from a set of seed URLs while respecting robots.txt and
/// per-host pacing, extracts page text, skips duplicate content, and
/// delivers documents in batches to a Meilisearch index.
///
/// Settings come from environment variables (SEED_URLS, MAX_PAGES,
/// CRAWL_DELAY, MEILISEARCH_URL, ...) layered over an optional TOML file.
#[derive(Parser, Debug)]
#[command(name = "driftnet")]
#[command(version)]
#[command(about = "A polite crawl-and-index pipeline", long_about = None)]
struct Cli {
    /// Path to an optional TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Discard stored content fingerprints before crawling
    #[arg(long)]
    fresh: bool,

    /// Validate the configuration, print it, and exit
    #[arg(long, conflicts_with_all = ["history", "search"])]
    dry_run: bool,

    /// Show recent runs from the state database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "search"])]
    history: bool,

    /// Run a ranked search against the index and exit
    #[arg(long, value_name = "QUERY", conflicts_with_all = ["dry_run", "history"])]
    search: Option<String>,

    /// Maximum number of search results
    #[arg(
        long,
        default_value_t = SearchQuery::DEFAULT_LIMIT,
        requires = "search",
        value_parser = parse_limit
    )]
    limit: usize,
}

fn parse_limit(value: &str) -> std::result::Result<usize, String> {
    match value.parse::<usize>() {
        Ok(limit) if limit > 0 => Ok(limit),
        _ => Err(format!("'{}' is not a positive integer", value)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config_path = cli.config.as_deref();
    if let Some(path) = config_path {
        tracing::info!("Loading configuration from: {}", path.display());
    }

    if cli.history {
        let config = load_config_unvalidated(config_path).context("Failed to load configuration")?;
        return handle_history(&config);
    }

    if let Some(query) = &cli.search {
        let config = load_config_unvalidated(config_path).context("Failed to load configuration")?;
        return handle_search(&config, query, cli.limit).await;
    }

    let config = load_config(config_path).context("Failed to load configuration")?;
    tracing::info!(
        "Configuration loaded successfully (hash: {})",
        driftnet::config::compute_config_hash(&config)
    );

    if cli.dry_run {
        return handle_dry_run(&config);
    }

    handle_crawl(config, cli.fresh).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("driftnet=info,warn"),
            1 => EnvFilter::new("driftnet=debug,info"),
            2 => EnvFilter::new("driftnet=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> Result<()> {
    println!("=== Driftnet Dry Run ===\n");

    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    println!("{}", rendered.trim_end());
    println!(
        "\n# api-key: {}",
        if config.index.api_key.is_some() { "set (hidden)" } else { "not set" }
    );

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would crawl up to {} pages from {} seed URLs into index '{}'",
        config.crawler.max_pages,
        config.crawler.seed_urls.len(),
        config.index.name
    );

    Ok(())
}

/// Handles the --history mode: lists recent runs from the state database
fn handle_history(config: &Config) -> Result<()> {
    let Some(path) = &config.storage.database_path else {
        bail!("--history needs a state database; set STATE_DB_PATH or storage.database-path");
    };

    println!("Database: {}\n", path);
    let storage = SqliteStorage::new(Path::new(path))
        .with_context(|| format!("Failed to open state database {}", path))?;
    let runs = storage.list_runs(20)?;
    print_run_history(&runs);

    Ok(())
}

/// Handles the --search mode: ranked search through the engine
async fn handle_search(config: &Config, query: &str, limit: usize) -> Result<()> {
    let query = SearchQuery::new(query, Some(limit))?;
    let engine = MeilisearchEngine::new(&config.index)?;

    let hits = engine
        .search(&query)
        .await
        .with_context(|| format!("Search against {} failed", config.index.url))?;
    print_search_hits(&hits);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, fresh: bool) -> Result<()> {
    tracing::info!(
        "Starting crawl of {} seed URLs (max {} pages, {} workers)",
        config.crawler.seed_urls.len(),
        config.crawler.max_pages,
        config.crawler.concurrency
    );

    let coordinator = Coordinator::from_config(config, fresh)?;

    let cancel = coordinator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, draining crawl");
            cancel.cancel();
        }
    });

    match coordinator.run().await {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
