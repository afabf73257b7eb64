// src/services/extractor.rs

//! Page interpretation.
//!
//! An [`Extractor`] turns one fetched document into plain records; the
//! scheduler owns the graph and decides what to do with them.

use chrono::NaiveDateTime;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::ForumSelectors;
use crate::services::scheduler::{PageContext, PageTask};
use crate::utils::resolve_url;
use crate::utils::url::strip_fragment;

/// A titled link to a category or topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub title: String,
    pub url: String,
}

/// Who wrote a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostAuthor {
    Member { name: String, url: Option<String> },
    /// The author element is absent.
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPost {
    pub author: PostAuthor,
    pub content: String,
    pub posted_at: NaiveDateTime,
}

/// Records found on one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Categories listed on the forum index
    pub categories: Vec<PageLink>,
    /// Topics listed on a category page
    pub topics: Vec<PageLink>,
    /// Posts on a topic page, in page order
    pub posts: Vec<ExtractedPost>,
    /// Author of the topic's opening post, when this page shows it
    pub topic_opener: Option<PostAuthor>,
    /// Further pages of the same listing or topic
    pub next_pages: Vec<String>,
}

/// Reads a fetched document in the context of the task that requested it.
pub trait Extractor {
    fn extract(&self, document: &str, task: &PageTask) -> Result<Extraction>;
}

/// Extractor driven by the configured CSS selectors.
pub struct ForumExtractor {
    category_link: Selector,
    topic_link: Selector,
    pagination_link: Selector,
    post: Selector,
    first_post_class: String,
    post_date: Selector,
    post_message: Selector,
    paragraph: Selector,
    author_link: Selector,
    date_format: String,
}

impl ForumExtractor {
    pub fn new(selectors: &ForumSelectors) -> Result<Self> {
        Ok(Self {
            category_link: Self::parse_selector(&selectors.category_link)?,
            topic_link: Self::parse_selector(&selectors.topic_link)?,
            pagination_link: Self::parse_selector(&selectors.pagination_link)?,
            post: Self::parse_selector(&selectors.post)?,
            first_post_class: selectors.first_post_class.clone(),
            post_date: Self::parse_selector(&selectors.post_date)?,
            post_message: Self::parse_selector(&selectors.post_message)?,
            paragraph: Self::parse_selector(&selectors.paragraph)?,
            author_link: Self::parse_selector(&selectors.author_link)?,
            date_format: selectors.date_format.clone(),
        })
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }

    fn links(&self, document: &Html, selector: &Selector, base: &Url) -> Vec<PageLink> {
        document
            .select(selector)
            .filter_map(|el| {
                let href = el.value().attr("href")?;
                Some(PageLink {
                    title: text_of(&el),
                    url: absolute(base, href),
                })
            })
            .collect()
    }

    fn next_pages(&self, document: &Html, base: &Url) -> Vec<String> {
        let mut pages: Vec<String> = Vec::new();
        for el in document.select(&self.pagination_link) {
            if let Some(href) = el.value().attr("href") {
                let url = absolute(base, href);
                if !pages.contains(&url) {
                    pages.push(url);
                }
            }
        }
        pages
    }

    fn author_of(&self, post: &ElementRef, base: &Url) -> PostAuthor {
        match post.select(&self.author_link).next() {
            Some(link) => PostAuthor::Member {
                name: text_of(&link),
                url: link.value().attr("href").map(|href| absolute(base, href)),
            },
            None => PostAuthor::Deleted,
        }
    }

    /// Read one post element. Elements missing their date or body are
    /// skipped.
    fn post_of(&self, post: &ElementRef, base: &Url) -> Option<ExtractedPost> {
        let page_url = base.as_str();
        let Some(date) = post.select(&self.post_date).next() else {
            log::debug!("Skipping post without a date on {page_url}");
            return None;
        };
        let date_text = text_of(&date);
        let posted_at = match NaiveDateTime::parse_from_str(&date_text, &self.date_format) {
            Ok(posted_at) => posted_at,
            Err(e) => {
                log::debug!("Skipping post with unreadable date '{date_text}' on {page_url}: {e}");
                return None;
            }
        };
        let Some(message) = post.select(&self.post_message).next() else {
            log::debug!("Skipping post without a body on {page_url}");
            return None;
        };
        let content = message
            .select(&self.paragraph)
            .map(|p| text_of(&p))
            .collect::<Vec<_>>()
            .join("\n");

        Some(ExtractedPost {
            author: self.author_of(post, base),
            content,
            posted_at,
        })
    }
}

impl Extractor for ForumExtractor {
    fn extract(&self, document: &str, task: &PageTask) -> Result<Extraction> {
        let base = Url::parse(&task.url)?;
        let html = Html::parse_document(document);
        let mut extraction = Extraction::default();

        match &task.context {
            PageContext::ForumIndex => {
                extraction.categories = self.links(&html, &self.category_link, &base);
            }
            PageContext::Category(_) => {
                extraction.topics = self.links(&html, &self.topic_link, &base);
                extraction.next_pages = self.next_pages(&html, &base);
            }
            PageContext::Topic(_) => {
                let elements: Vec<ElementRef> = html.select(&self.post).collect();
                if let Some(first) = elements.first() {
                    if first.value().classes().any(|c| c == self.first_post_class) {
                        extraction.topic_opener = Some(self.author_of(first, &base));
                    }
                }
                extraction.posts = elements
                    .iter()
                    .filter_map(|el| self.post_of(el, &base))
                    .collect();
                extraction.next_pages = self.next_pages(&html, &base);
            }
        }

        Ok(extraction)
    }
}

fn text_of(el: &ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn absolute(base: &Url, href: &str) -> String {
    strip_fragment(&resolve_url(base, href)).to_string()
}
