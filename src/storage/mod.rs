//! Local persistence for fetched pages.

pub mod page_cache;

pub use page_cache::{FetchedPage, PageCache, PageOrigin};
