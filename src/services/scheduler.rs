// src/services/scheduler.rs

//! Two-lane breadth-first crawl.
//!
//! Structural pages (the forum index and category listings) go into the high
//! lane; topic pages go into the low lane. The high lane is always drained
//! first, so the category → topic hierarchy is known before the bulk of the
//! post pages is fetched. Within a lane tasks run in discovery order.

use std::collections::{HashSet, VecDeque};

use crate::error::{AppError, Result};
use crate::graph::GraphStore;
use crate::models::{Category, EntityId, Post, Topic};
use crate::services::extractor::{Extraction, Extractor, PostAuthor};
use crate::services::Fetcher;
use crate::storage::{PageCache, PageOrigin};

/// What a page is, and which entity it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageContext {
    ForumIndex,
    Category(EntityId),
    Topic(EntityId),
}

/// Scheduling priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    High,
    Low,
}

/// A page to visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTask {
    pub url: String,
    pub context: PageContext,
}

impl PageTask {
    pub fn forum_index(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            context: PageContext::ForumIndex,
        }
    }

    pub fn category(url: impl Into<String>, category: EntityId) -> Self {
        Self {
            url: url.into(),
            context: PageContext::Category(category),
        }
    }

    pub fn topic(url: impl Into<String>, topic: EntityId) -> Self {
        Self {
            url: url.into(),
            context: PageContext::Topic(topic),
        }
    }

    pub fn lane(&self) -> Lane {
        match self.context {
            PageContext::ForumIndex | PageContext::Category(_) => Lane::High,
            PageContext::Topic(_) => Lane::Low,
        }
    }
}

/// Crawl counters. Advisory only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlProgress {
    pub completed: usize,
    pub from_network: usize,
    pub from_cache: usize,
    pub remaining: usize,
}

/// Drives the crawl from a seed page until both lanes are empty.
pub struct CrawlScheduler<F, E> {
    cache: PageCache<F>,
    extractor: E,
    seen: HashSet<String>,
    /// URLs currently waiting in either lane
    queued: HashSet<String>,
    high: VecDeque<PageTask>,
    low: VecDeque<PageTask>,
    progress: CrawlProgress,
    progress_interval: usize,
}

impl<F: Fetcher, E: Extractor> CrawlScheduler<F, E> {
    pub fn new(cache: PageCache<F>, extractor: E) -> Self {
        Self {
            cache,
            extractor,
            seen: HashSet::new(),
            queued: HashSet::new(),
            high: VecDeque::new(),
            low: VecDeque::new(),
            progress: CrawlProgress::default(),
            progress_interval: 50,
        }
    }

    /// Log progress every `interval` pages.
    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    pub fn cache(&self) -> &PageCache<F> {
        &self.cache
    }

    pub fn progress(&self) -> CrawlProgress {
        CrawlProgress {
            remaining: self.high.len() + self.low.len(),
            ..self.progress
        }
    }

    /// Queue a task in the lane its kind belongs to. A URL already visited or
    /// already waiting is dropped; the first context queued for it wins.
    pub fn enqueue(&mut self, task: PageTask) {
        if self.seen.contains(&task.url) || !self.queued.insert(task.url.clone()) {
            return;
        }
        match task.lane() {
            Lane::High => self.high.push_back(task),
            Lane::Low => self.low.push_back(task),
        }
    }

    fn next_task(&mut self) -> Option<PageTask> {
        let task = self.high.pop_front().or_else(|| self.low.pop_front())?;
        self.queued.remove(&task.url);
        Some(task)
    }

    /// Crawl until both lanes are empty. The first fetch failure aborts the
    /// run.
    pub async fn run(&mut self, store: &mut GraphStore) -> Result<CrawlProgress> {
        while let Some(task) = self.next_task() {
            if !self.seen.insert(task.url.clone()) {
                continue;
            }

            let page = self.cache.fetch(&task.url).await?;
            match page.origin {
                PageOrigin::Network => self.progress.from_network += 1,
                PageOrigin::Cache => self.progress.from_cache += 1,
            }

            let extraction = self.extractor.extract(&page.body, &task)?;
            self.merge(&task, extraction, store)?;
            self.progress.completed += 1;

            if self.progress.completed % self.progress_interval == 0 {
                let p = self.progress();
                log::info!(
                    "Crawled {} pages ({} network, {} cache), {} queued",
                    p.completed,
                    p.from_network,
                    p.from_cache,
                    p.remaining
                );
            }
        }

        Ok(self.progress())
    }

    /// Fold one page's records into the graph and queue what it links to.
    fn merge(&mut self, task: &PageTask, extraction: Extraction, store: &mut GraphStore) -> Result<()> {
        match &task.context {
            PageContext::ForumIndex => {
                for link in extraction.categories {
                    let id = store.insert_category(Category::new(link.title, link.url.clone()));
                    self.enqueue(PageTask::category(link.url, id));
                }
            }
            PageContext::Category(category_id) => {
                for link in extraction.topics {
                    let topic = Topic::new(link.title, link.url.clone(), category_id.clone());
                    let id = store.insert_topic(topic)?;
                    self.enqueue(PageTask::topic(link.url, id));
                }
                for url in extraction.next_pages {
                    self.enqueue(PageTask::category(url, category_id.clone()));
                }
            }
            PageContext::Topic(topic_id) => {
                if let Some(opener) = &extraction.topic_opener {
                    let author_id = resolve_author(store, opener);
                    store.assign_topic_author(topic_id, &author_id)?;
                }

                let authors: Vec<EntityId> = extraction
                    .posts
                    .iter()
                    .map(|post| resolve_author(store, &post.author))
                    .collect();
                let topic = store.topic(topic_id).ok_or_else(|| {
                    AppError::validation(format!("page {} belongs to an unknown topic", task.url))
                })?;
                let posts: Vec<Post> = extraction
                    .posts
                    .into_iter()
                    .zip(authors)
                    .map(|(post, author_id)| Post::new(topic, author_id, post.content, post.posted_at))
                    .collect();
                for post in posts {
                    store.insert_post(post)?;
                }

                for url in extraction.next_pages {
                    self.enqueue(PageTask::topic(url, topic_id.clone()));
                }
            }
        }
        Ok(())
    }
}

fn resolve_author(store: &mut GraphStore, author: &PostAuthor) -> EntityId {
    match author {
        PostAuthor::Member { name, url } => store.author_or_create(name, url.as_deref()),
        PostAuthor::Deleted => store.deleted_author(),
    }
}
