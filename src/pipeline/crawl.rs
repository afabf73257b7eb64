// src/pipeline/crawl.rs

//! Forum crawling pipeline.

use chrono::Utc;

use crate::error::Result;
use crate::graph::{GraphSnapshot, GraphStore};
use crate::models::Config;
use crate::services::{CrawlScheduler, Extractor, Fetcher, PageTask};
use crate::storage::PageCache;
use crate::utils::log;

/// Return the forum graph, crawling only when no snapshot exists.
///
/// An existing snapshot is trusted as-is: no login, no fetches. A snapshot
/// that exists but cannot be read is an error rather than a reason to
/// crawl again.
pub async fn load_or_crawl<F, E>(config: &Config, fetcher: F, extractor: E) -> Result<GraphStore>
where
    F: Fetcher,
    E: Extractor,
{
    let snapshot = GraphSnapshot::new(&config.paths.snapshot_file);
    if let Some(store) = snapshot.load().await? {
        return Ok(store);
    }

    ::log::info!(
        "No snapshot at {}, crawling {}",
        snapshot.path().display(),
        config.crawler.forum_url
    );
    run_crawler(config, fetcher, extractor, &snapshot).await
}

/// Log in, crawl the whole forum, and persist the result.
pub async fn run_crawler<F, E>(
    config: &Config,
    fetcher: F,
    extractor: E,
    snapshot: &GraphSnapshot,
) -> Result<GraphStore>
where
    F: Fetcher,
    E: Extractor,
{
    let start_time = Utc::now();
    log::header("Crawling forum");

    log::step(1, 3, "Authenticating");
    fetcher.authenticate().await?;

    log::step(2, 3, "Fetching pages");
    let cache = PageCache::new(&config.paths.cache_dir, fetcher);
    let mut scheduler = CrawlScheduler::new(cache, extractor)
        .with_progress_interval(config.crawler.progress_interval);
    scheduler.enqueue(PageTask::forum_index(config.crawler.forum_url.clone()));

    let mut store = GraphStore::new();
    let progress = scheduler.run(&mut store).await?;
    store.check_integrity()?;

    log::step(3, 3, "Saving snapshot");
    snapshot.save(&store).await?;

    let elapsed = Utc::now() - start_time;
    log::summary(
        "Crawl complete",
        &[
            ("Pages", progress.completed.to_string()),
            ("From network", progress.from_network.to_string()),
            ("From cache", progress.from_cache.to_string()),
            ("Categories", store.category_count().to_string()),
            ("Topics", store.topic_count().to_string()),
            ("Posts", store.post_count().to_string()),
            ("Authors", store.author_count().to_string()),
            ("Elapsed", format!("{}s", elapsed.num_seconds())),
        ],
    );

    Ok(store)
}
