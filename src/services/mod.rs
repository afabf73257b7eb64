//! Service layer for the forum crawler.
//!
//! - Page downloads and login (`Fetcher`, `HttpFetcher`)
//! - Page interpretation (`Extractor`, `ForumExtractor`)
//! - Crawl ordering (`CrawlScheduler`)

pub mod extractor;
pub mod fetcher;
pub mod scheduler;

pub use extractor::{Extraction, Extractor, ForumExtractor, PostAuthor};
pub use fetcher::{Credentials, Fetcher, HttpFetcher};
pub use scheduler::{CrawlProgress, CrawlScheduler, Lane, PageContext, PageTask};
