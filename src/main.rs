//! # News Harvest
//!
//! Incrementally harvests news articles from the listing pages of configured
//! sources and appends every article not seen before to a JSON-lines record
//! store.
//!
//! ## Usage
//!
//! ```sh
//! news_harvest -c ./config/spiders -s ./data/news.jsonl
//! ```
//!
//! ## Architecture
//!
//! Each source gets one sequential pass:
//! 1. **Listing**: fetch the listing page and collect article links
//! 2. **Dedup**: drop links already stored for the source
//! 3. **Ordering**: oldest articles first, dates guessed from the URL
//! 4. **Harvest**: fetch each article, extract its fields and store it
//!
//! Sources are processed one after another; a failing source is logged and
//! the run moves on to the next one.

use futures::stream::{self, StreamExt};
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod models;
mod scrapers;
mod store;
mod utils;

use cli::Cli;
use clap::Parser;
use scrapers::crawl::{self, CrawlError};
use scrapers::fetch::HttpFetcher;
use store::jsonl::JsonlStore;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("news_harvest starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // Early check: the store's directory must be writable
    if let Some(dir) = args.store.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(
                path = %dir.display(),
                error = %e,
                "Store directory is not writable (fix perms or choose a different path)"
            );
            return Err(e.into());
        }
    }

    let configs = config::load_spider_dir(&args.config_dir).await?;
    let configs: Vec<_> = configs.into_iter().filter(|c| args.wants(&c.sub)).collect();
    if configs.is_empty() {
        warn!(dir = %args.config_dir.display(), "No sources selected; nothing to do");
        return Ok(());
    }
    info!(count = configs.len(), "Sources selected");

    let store = JsonlStore::open(&args.store).await?;
    let fetcher = HttpFetcher::new(
        Duration::from_secs(args.timeout_secs),
        args.accept_invalid_certs,
    )?;
    if args.accept_invalid_certs {
        warn!("TLS certificate validation is disabled");
    }

    // Sources run one at a time; `then` awaits each pass before starting the next.
    let results: Vec<_> = stream::iter(configs.iter())
        .then(|config| {
            let fetcher = &fetcher;
            let store = &store;
            async move {
                match crawl::run(config, fetcher, store).await {
                    Ok(summary) => (Some(summary), false),
                    Err(CrawlError::Persistence {
                        href,
                        partial,
                        source,
                        ..
                    }) => {
                        error!(
                            sub = %config.sub,
                            %href,
                            stored = partial.stored(),
                            failed_articles = partial.failed(),
                            error = %source,
                            "Source pass aborted by a storage failure"
                        );
                        (Some(partial), true)
                    }
                    Err(e) => {
                        error!(sub = %config.sub, error = %e, "Source pass failed");
                        (None, true)
                    }
                }
            }
        })
        .collect()
        .await;

    let sources = results.len();
    let failed_sources = results.iter().filter(|(_, failed)| *failed).count();
    let summaries: Vec<_> = results
        .into_iter()
        .filter_map(|(summary, _)| summary)
        .collect();
    let stored: usize = summaries.iter().map(|s| s.stored()).sum();
    let failed_articles: usize = summaries.iter().map(|s| s.failed()).sum();

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        store = %store.path().display(),
        sources,
        failed_sources,
        stored,
        failed_articles,
        "Execution complete"
    );

    Ok(())
}
