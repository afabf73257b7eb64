//! forumgraph CLI
//!
//! Local execution entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use forumgraph::{
    error::Result,
    graph::GraphSnapshot,
    models::Config,
    pipeline,
    services::{Credentials, ForumExtractor, HttpFetcher},
};

/// forumgraph - Forum Crawler and Leaderboards
#[derive(Parser, Debug)]
#[command(
    name = "forumgraph",
    version,
    about = "Crawl a forum into a graph and rank its authors and topics"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "forumgraph.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the snapshot, or log in and crawl the forum when there is none
    Crawl {
        /// Crawl even if a snapshot exists (cached pages are still reused)
        #[arg(long)]
        force: bool,
    },

    /// Compute leaderboards and write the text report and HTML pages
    Stats {
        /// Also print the reports as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Validate the configuration file
    Validate,

    /// Show snapshot presence and entity counts
    Info,
}

/// Initialize logging based on verbosity flag and configured level.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Build the network fetcher. Missing credentials only fail once a crawl
/// actually needs to log in.
fn http_fetcher(config: &Config) -> Result<HttpFetcher> {
    let credentials = match Credentials::from_env(&config.crawler) {
        Ok(credentials) => Some(credentials),
        Err(e) => {
            log::debug!("{e}");
            None
        }
    };
    HttpFetcher::new(&config.crawler, credentials)
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = Config::load(&cli.config);
    let level = loaded
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_logging(cli.verbose, &level);

    let config = match loaded {
        Ok(config) => {
            log::info!("Loaded configuration from {}", cli.config.display());
            config
        }
        Err(e) => {
            log::warn!(
                "Config load failed from {}: {}. Using defaults.",
                cli.config.display(),
                e
            );
            Config::default()
        }
    };

    match cli.command {
        Command::Crawl { force } => {
            config.validate()?;
            let extractor = ForumExtractor::new(&config.selectors)?;
            let fetcher = http_fetcher(&config)?;

            let store = if force {
                let snapshot = GraphSnapshot::new(&config.paths.snapshot_file);
                pipeline::run_crawler(&config, fetcher, extractor, &snapshot).await?
            } else {
                pipeline::load_or_crawl(&config, fetcher, extractor).await?
            };

            log::info!(
                "Graph ready: {} categories, {} topics, {} posts, {} authors",
                store.category_count(),
                store.topic_count(),
                store.post_count(),
                store.author_count()
            );
        }

        Command::Stats { json } => {
            config.validate()?;
            let extractor = ForumExtractor::new(&config.selectors)?;
            let fetcher = http_fetcher(&config)?;

            let store = pipeline::load_or_crawl(&config, fetcher, extractor).await?;
            let reports = pipeline::run_stats(&config, store).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK (crawler, paths, selectors, and reports)");
        }

        Command::Info => {
            let snapshot = GraphSnapshot::new(&config.paths.snapshot_file);
            log::info!("Snapshot: {}", snapshot.path().display());
            log::info!("Page cache: {}", config.paths.cache_dir);

            match snapshot.load().await {
                Ok(Some(store)) => {
                    log::info!("Categories: {}", store.category_count());
                    log::info!("Topics: {}", store.topic_count());
                    log::info!("Posts: {}", store.post_count());
                    log::info!("Authors: {}", store.author_count());
                }
                Ok(None) => log::info!("No snapshot found yet."),
                Err(e) if e.is_snapshot_corruption() => {
                    log::error!("Snapshot is unreadable, delete it to crawl again: {e}");
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
