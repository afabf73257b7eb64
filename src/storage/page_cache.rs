//! On-disk page cache.
//!
//! Every fetched page is written to `{root}/{cache_key(url)}` before it is
//! handed back, and any later request for the same URL is served from that
//! file. Entries never expire.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── apda.online_forum_.html
//! ├── apda.online_forum_general-discussion_.html
//! └── apda.online_forum_general-discussion_page_2_.html
//! ```

use std::path::PathBuf;

use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::services::Fetcher;
use crate::utils::url::cache_key;

/// Where a page body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOrigin {
    Cache,
    Network,
}

/// A page body and its provenance.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub body: String,
    pub origin: PageOrigin,
}

/// Memoizes a [`Fetcher`] on the local filesystem.
pub struct PageCache<F> {
    root_dir: PathBuf,
    fetcher: F,
}

impl<F: Fetcher> PageCache<F> {
    /// Create a cache rooted at the given directory. The directory is created
    /// on the first write.
    pub fn new(root_dir: impl Into<PathBuf>, fetcher: F) -> Self {
        Self {
            root_dir: root_dir.into(),
            fetcher,
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Path of the cache entry for `url`.
    pub fn path_for(&self, url: &str) -> PathBuf {
        self.root_dir.join(cache_key(url))
    }

    /// Return the page at `url`, from disk when present.
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let path = self.path_for(url);
        if let Some(body) = self.read(&path).await? {
            log::debug!("Cache hit for {url}");
            return Ok(FetchedPage {
                url: url.to_string(),
                body,
                origin: PageOrigin::Cache,
            });
        }

        log::debug!("Fetching {url}");
        let body = self.fetcher.fetch(url).await?;
        self.write(&path, &body).await?;
        Ok(FetchedPage {
            url: url.to_string(),
            body,
            origin: PageOrigin::Network,
        })
    }

    /// Read an entry, returning None if it doesn't exist.
    async fn read(&self, path: &PathBuf) -> Result<Option<String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Write an entry atomically (write to temp, then rename).
    async fn write(&self, path: &PathBuf, body: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.root_dir).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(body.as_bytes()).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}
