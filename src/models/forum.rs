// src/models/forum.rs

//! Category, Topic, Post, and Author entities.
//!
//! Entities reference each other only through [`EntityId`]s; the
//! [`GraphStore`](crate::graph::GraphStore) owns them and keeps every edge
//! pair symmetric. Equality and hashing go through the identity alone.

use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use chrono::NaiveDateTime;

use crate::models::EntityId;
use crate::utils::text;

/// Name of the shared author that stands in for removed accounts.
pub const DELETED_AUTHOR: &str = "deleted";

macro_rules! identity_eq {
    ($ty:ty) => {
        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                self.id == other.id
            }
        }

        impl Eq for $ty {}

        impl Hash for $ty {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.id.hash(state);
            }
        }
    };
}

/// A forum section listing topics.
#[derive(Debug, Clone)]
pub struct Category {
    id: EntityId,
    title: String,
    url: String,
    pub(crate) topics: BTreeSet<EntityId>,
}

impl Category {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            id: Self::id_for(&url),
            title: title.into(),
            url,
            topics: BTreeSet::new(),
        }
    }

    /// Identity of the category living at `url`.
    pub fn id_for(url: &str) -> EntityId {
        EntityId::from_key(url)
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn topics(&self) -> &BTreeSet<EntityId> {
        &self.topics
    }
}

identity_eq!(Category);

/// A discussion thread.
#[derive(Debug, Clone)]
pub struct Topic {
    id: EntityId,
    title: String,
    url: String,
    pub(crate) category: Option<EntityId>,
    pub(crate) author: Option<EntityId>,
    pub(crate) posts: BTreeSet<EntityId>,
}

impl Topic {
    pub fn new(title: impl Into<String>, url: impl Into<String>, category: EntityId) -> Self {
        let mut topic = Self::unlinked(title, url);
        topic.category = Some(category);
        topic
    }

    /// A topic carrying only its scalar fields; links are wired afterwards.
    pub(crate) fn unlinked(title: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            id: Self::id_for(&url),
            title: title.into(),
            url,
            category: None,
            author: None,
            posts: BTreeSet::new(),
        }
    }

    /// Identity of the topic living at `url`.
    pub fn id_for(url: &str) -> EntityId {
        EntityId::from_key(url)
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn category(&self) -> Option<&EntityId> {
        self.category.as_ref()
    }

    /// Author of the first post, once it has been seen.
    pub fn author(&self) -> Option<&EntityId> {
        self.author.as_ref()
    }

    pub fn posts(&self) -> &BTreeSet<EntityId> {
        &self.posts
    }
}

identity_eq!(Topic);

/// A single message in a topic.
#[derive(Debug, Clone)]
pub struct Post {
    id: EntityId,
    pub(crate) topic: Option<EntityId>,
    pub(crate) category: Option<EntityId>,
    pub(crate) author: Option<EntityId>,
    content: String,
    posted_at: NaiveDateTime,
    words: Option<BTreeMap<String, usize>>,
    word_count: Option<usize>,
}

impl Post {
    /// Create a post in `topic`; its category defaults to the topic's.
    pub fn new(
        topic: &Topic,
        author: EntityId,
        content: impl Into<String>,
        posted_at: NaiveDateTime,
    ) -> Self {
        let mut post = Self::unlinked(content, posted_at);
        post.topic = Some(topic.id().clone());
        post.category = topic.category().cloned();
        post.author = Some(author);
        post
    }

    /// Override the owning category.
    pub fn with_category(mut self, category: EntityId) -> Self {
        self.category = Some(category);
        self
    }

    pub(crate) fn unlinked(content: impl Into<String>, posted_at: NaiveDateTime) -> Self {
        let content = content.into();
        Self {
            id: Self::id_for(&content),
            topic: None,
            category: None,
            author: None,
            content,
            posted_at,
            words: None,
            word_count: None,
        }
    }

    /// Identity of a post with this raw content.
    ///
    /// Two posts with byte-identical text share an identity.
    pub fn id_for(content: &str) -> EntityId {
        EntityId::from_key(content)
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn topic(&self) -> Option<&EntityId> {
        self.topic.as_ref()
    }

    pub fn category(&self) -> Option<&EntityId> {
        self.category.as_ref()
    }

    pub fn author(&self) -> Option<&EntityId> {
        self.author.as_ref()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn posted_at(&self) -> NaiveDateTime {
        self.posted_at
    }

    /// Word multiset, if pre-computed.
    pub fn words(&self) -> Option<&BTreeMap<String, usize>> {
        self.words.as_ref()
    }

    pub fn word_count(&self) -> Option<usize> {
        self.word_count
    }

    pub fn is_pre_computed(&self) -> bool {
        self.words.is_some()
    }

    /// Populate the derived word fields. No-op when already done.
    pub fn pre_compute(&mut self) {
        if self.is_pre_computed() {
            return;
        }
        let words = text::word_counts(&self.content);
        self.word_count = Some(words.values().sum());
        self.words = Some(words);
    }

    pub(crate) fn restore_words(&mut self, words: BTreeMap<String, usize>, word_count: usize) {
        self.words = Some(words);
        self.word_count = Some(word_count);
    }
}

identity_eq!(Post);

/// A forum member, or the shared [`DELETED_AUTHOR`].
#[derive(Debug, Clone)]
pub struct Author {
    id: EntityId,
    name: String,
    pub(crate) url: Option<String>,
    pub(crate) posts: BTreeSet<EntityId>,
    pub(crate) new_threads: BTreeSet<EntityId>,
}

impl Author {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: Self::id_for(&name),
            name,
            url: None,
            posts: BTreeSet::new(),
            new_threads: BTreeSet::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Identity of the author with this display name.
    pub fn id_for(name: &str) -> EntityId {
        EntityId::from_key(name)
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn posts(&self) -> &BTreeSet<EntityId> {
        &self.posts
    }

    /// Topics this author opened.
    pub fn new_threads(&self) -> &BTreeSet<EntityId> {
        &self.new_threads
    }

    pub fn is_deleted(&self) -> bool {
        self.name == DELETED_AUTHOR
    }
}

identity_eq!(Author);
