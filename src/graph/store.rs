// src/graph/store.rs

//! Identity-keyed registry of every crawled entity.

use std::collections::HashMap;

use crate::error::{AppError, Result};
use crate::models::{Author, Category, DELETED_AUTHOR, EntityId, Post, Topic};

/// In-memory forum graph.
///
/// Each entity type lives in its own table keyed by [`EntityId`]. The stored
/// entity is canonical: inserting one whose identity is already present
/// leaves the table unchanged. All edge mutations go through this type so
/// that both directions of every relationship stay in step.
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    categories: HashMap<EntityId, Category>,
    topics: HashMap<EntityId, Topic>,
    posts: HashMap<EntityId, Post>,
    authors: HashMap<EntityId, Author>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_tables(
        categories: HashMap<EntityId, Category>,
        topics: HashMap<EntityId, Topic>,
        posts: HashMap<EntityId, Post>,
        authors: HashMap<EntityId, Author>,
    ) -> Self {
        Self {
            categories,
            topics,
            posts,
            authors,
        }
    }

    /// Register a category. Returns its identity.
    pub fn insert_category(&mut self, category: Category) -> EntityId {
        let id = category.id().clone();
        self.categories.entry(id.clone()).or_insert(category);
        id
    }

    /// Register a topic and add it to its category.
    pub fn insert_topic(&mut self, topic: Topic) -> Result<EntityId> {
        let id = topic.id().clone();
        if self.topics.contains_key(&id) {
            return Ok(id);
        }

        let category_id = topic
            .category()
            .cloned()
            .ok_or_else(|| AppError::validation(format!("topic {} has no category", topic.url())))?;
        let category = self.categories.get_mut(&category_id).ok_or_else(|| {
            AppError::validation(format!(
                "topic {} references unknown category {}",
                topic.url(),
                category_id.short()
            ))
        })?;

        category.topics.insert(id.clone());
        self.topics.insert(id.clone(), topic);
        Ok(id)
    }

    /// Register a post and add it to its topic and its author.
    ///
    /// A post whose content matches an existing one resolves to the stored
    /// post; no edges are added for the duplicate.
    pub fn insert_post(&mut self, post: Post) -> Result<EntityId> {
        let id = post.id().clone();
        if self.posts.contains_key(&id) {
            log::debug!("Post {} already stored, keeping first occurrence", id.short());
            return Ok(id);
        }

        let topic_id = post
            .topic()
            .cloned()
            .ok_or_else(|| AppError::validation("post has no topic"))?;
        let author_id = post
            .author()
            .cloned()
            .ok_or_else(|| AppError::validation("post has no author"))?;
        if let Some(category_id) = post.category() {
            if !self.categories.contains_key(category_id) {
                return Err(AppError::validation(format!(
                    "post references unknown category {}",
                    category_id.short()
                )));
            }
        }
        if !self.authors.contains_key(&author_id) {
            return Err(AppError::validation(format!(
                "post references unknown author {}",
                author_id.short()
            )));
        }
        let topic = self.topics.get_mut(&topic_id).ok_or_else(|| {
            AppError::validation(format!("post references unknown topic {}", topic_id.short()))
        })?;

        topic.posts.insert(id.clone());
        if let Some(author) = self.authors.get_mut(&author_id) {
            author.posts.insert(id.clone());
        }
        self.posts.insert(id.clone(), post);
        Ok(id)
    }

    /// Find the author named `name`, or register a new one.
    ///
    /// A profile URL fills in a missing one on an existing author.
    pub fn author_or_create(&mut self, name: &str, url: Option<&str>) -> EntityId {
        let id = Author::id_for(name);
        let author = self
            .authors
            .entry(id.clone())
            .or_insert_with(|| Author::new(name));
        if author.url.is_none() {
            author.url = url.map(str::to_string);
        }
        id
    }

    /// The shared author for posts without one.
    pub fn deleted_author(&mut self) -> EntityId {
        self.author_or_create(DELETED_AUTHOR, None)
    }

    /// Record `author` as the originator of `topic`.
    ///
    /// Returns `false` when the topic already has an author; the first one
    /// wins.
    pub fn assign_topic_author(&mut self, topic_id: &EntityId, author_id: &EntityId) -> Result<bool> {
        let topic = self.topics.get_mut(topic_id).ok_or_else(|| {
            AppError::validation(format!("unknown topic {}", topic_id.short()))
        })?;
        if topic.author.is_some() {
            return Ok(false);
        }
        let author = self.authors.get_mut(author_id).ok_or_else(|| {
            AppError::validation(format!("unknown author {}", author_id.short()))
        })?;

        author.new_threads.insert(topic_id.clone());
        topic.author = Some(author_id.clone());
        Ok(true)
    }

    /// Populate the word fields of every post.
    pub fn pre_compute_words(&mut self) {
        for post in self.posts.values_mut() {
            post.pre_compute();
        }
    }

    pub fn category(&self, id: &EntityId) -> Option<&Category> {
        self.categories.get(id)
    }

    pub fn topic(&self, id: &EntityId) -> Option<&Topic> {
        self.topics.get(id)
    }

    pub fn post(&self, id: &EntityId) -> Option<&Post> {
        self.posts.get(id)
    }

    pub fn author(&self, id: &EntityId) -> Option<&Author> {
        self.authors.get(id)
    }

    pub fn author_by_name(&self, name: &str) -> Option<&Author> {
        self.authors.get(&Author::id_for(name))
    }

    pub fn category_by_title(&self, title: &str) -> Option<&Category> {
        self.categories.values().find(|c| c.title() == title)
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.values()
    }

    pub fn topics(&self) -> impl Iterator<Item = &Topic> {
        self.topics.values()
    }

    pub fn posts(&self) -> impl Iterator<Item = &Post> {
        self.posts.values()
    }

    pub fn authors(&self) -> impl Iterator<Item = &Author> {
        self.authors.values()
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    pub fn post_count(&self) -> usize {
        self.posts.len()
    }

    pub fn author_count(&self) -> usize {
        self.authors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
            && self.topics.is_empty()
            && self.posts.is_empty()
            && self.authors.is_empty()
    }

    /// Check that every reference resolves and every edge has its mirror.
    pub fn check_integrity(&self) -> Result<()> {
        let broken = |message: String| Err(AppError::validation(message));

        for category in self.categories.values() {
            for topic_id in category.topics() {
                match self.topics.get(topic_id) {
                    Some(topic) if topic.category() == Some(category.id()) => {}
                    _ => {
                        return broken(format!(
                            "category '{}' lists topic {} that does not point back",
                            category.title(),
                            topic_id.short()
                        ));
                    }
                }
            }
        }

        for topic in self.topics.values() {
            let category = topic.category().and_then(|id| self.categories.get(id));
            if !category.is_some_and(|c| c.topics().contains(topic.id())) {
                return broken(format!("topic '{}' is missing from its category", topic.title()));
            }
            if let Some(author_id) = topic.author() {
                let author = self.authors.get(author_id);
                if !author.is_some_and(|a| a.new_threads().contains(topic.id())) {
                    return broken(format!(
                        "topic '{}' is missing from its author's new threads",
                        topic.title()
                    ));
                }
            }
            for post_id in topic.posts() {
                if self.posts.get(post_id).and_then(Post::topic) != Some(topic.id()) {
                    return broken(format!(
                        "topic '{}' lists post {} that does not point back",
                        topic.title(),
                        post_id.short()
                    ));
                }
            }
        }

        for post in self.posts.values() {
            let topic = post.topic().and_then(|id| self.topics.get(id));
            if !topic.is_some_and(|t| t.posts().contains(post.id())) {
                return broken(format!("post {} is missing from its topic", post.id().short()));
            }
            let author = post.author().and_then(|id| self.authors.get(id));
            if !author.is_some_and(|a| a.posts().contains(post.id())) {
                return broken(format!("post {} is missing from its author", post.id().short()));
            }
            if !post.category().is_some_and(|id| self.categories.contains_key(id)) {
                return broken(format!("post {} has no known category", post.id().short()));
            }
        }

        for author in self.authors.values() {
            for post_id in author.posts() {
                if self.posts.get(post_id).and_then(Post::author) != Some(author.id()) {
                    return broken(format!(
                        "author '{}' lists post {} that does not point back",
                        author.name(),
                        post_id.short()
                    ));
                }
            }
            for topic_id in author.new_threads() {
                if self.topics.get(topic_id).and_then(Topic::author) != Some(author.id()) {
                    return broken(format!(
                        "author '{}' lists thread {} that does not point back",
                        author.name(),
                        topic_id.short()
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{NaiveDate, NaiveDateTime};

    use super::*;

    pub(crate) fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    /// General → T1 (alice, bob, alice) and T2 (alice, deleted).
    pub(crate) fn sample_store() -> GraphStore {
        let mut store = GraphStore::new();
        let general = store.insert_category(Category::new("General", "https://forum.test/general/"));

        let t1 = store
            .insert_topic(Topic::new("T1", "https://forum.test/t1/", general.clone()))
            .unwrap();
        let t2 = store
            .insert_topic(Topic::new("T2", "https://forum.test/t2/", general))
            .unwrap();

        let alice = store.author_or_create("alice", Some("https://forum.test/u/alice/"));
        let bob = store.author_or_create("bob", None);
        let deleted = store.deleted_author();

        store.assign_topic_author(&t1, &alice).unwrap();
        store.assign_topic_author(&t2, &alice).unwrap();

        let posts = [
            (&t1, &alice, "Opening T1", at(1, 9)),
            (&t1, &bob, "Reply from bob", at(1, 10)),
            (&t1, &alice, "Alice again", at(2, 11)),
            (&t2, &alice, "Opening T2", at(3, 9)),
            (&t2, &deleted, "Ghost reply", at(3, 12)),
        ];
        for (topic_id, author_id, content, when) in posts {
            let topic = store.topic(topic_id).unwrap().clone();
            store
                .insert_post(Post::new(&topic, author_id.clone(), content, when))
                .unwrap();
        }
        store
    }

    #[test]
    fn test_insert_category_is_idempotent() {
        let mut store = GraphStore::new();
        let a = store.insert_category(Category::new("General", "https://forum.test/general/"));
        let b = store.insert_category(Category::new("Renamed", "https://forum.test/general/"));
        assert_eq!(a, b);
        assert_eq!(store.category_count(), 1);
        assert_eq!(store.category(&a).unwrap().title(), "General");
    }

    #[test]
    fn test_insert_topic_wires_category() {
        let store = sample_store();
        let general = store.category_by_title("General").unwrap();
        assert_eq!(general.topics().len(), 2);
    }

    #[test]
    fn test_insert_topic_unknown_category() {
        let mut store = GraphStore::new();
        let topic = Topic::new("T", "https://forum.test/t/", Category::id_for("nowhere"));
        assert!(store.insert_topic(topic).is_err());
    }

    #[test]
    fn test_author_or_create_reuses_existing() {
        let mut store = GraphStore::new();
        let a = store.author_or_create("alice", None);
        let b = store.author_or_create("alice", Some("https://forum.test/u/alice/"));
        assert_eq!(a, b);
        assert_eq!(store.author_count(), 1);
        assert_eq!(
            store.author(&a).unwrap().url(),
            Some("https://forum.test/u/alice/")
        );
    }

    #[test]
    fn test_deleted_author_is_shared() {
        let mut store = GraphStore::new();
        let a = store.deleted_author();
        let b = store.deleted_author();
        assert_eq!(a, b);
        assert_eq!(store.author_count(), 1);
        assert!(store.author(&a).unwrap().is_deleted());
    }

    #[test]
    fn test_insert_post_wires_topic_and_author() {
        let store = sample_store();
        let alice = store.author_by_name("alice").unwrap();
        assert_eq!(alice.posts().len(), 3);
        assert_eq!(alice.new_threads().len(), 2);
        assert_eq!(store.author_by_name(DELETED_AUTHOR).unwrap().posts().len(), 1);
        assert_eq!(store.post_count(), 5);
        store.check_integrity().unwrap();
    }

    #[test]
    fn test_duplicate_post_content_is_merged() {
        let mut store = sample_store();
        let t2 = store.topic(&Topic::id_for("https://forum.test/t2/")).unwrap().clone();
        let bob = store.author_or_create("bob", None);
        store
            .insert_post(Post::new(&t2, bob, "Opening T1", at(5, 9)))
            .unwrap();

        assert_eq!(store.post_count(), 5);
        assert_eq!(store.author_by_name("bob").unwrap().posts().len(), 1);
        store.check_integrity().unwrap();
    }

    #[test]
    fn test_topic_author_assigned_once() {
        let mut store = sample_store();
        let t1 = Topic::id_for("https://forum.test/t1/");
        let bob = Author::id_for("bob");
        assert!(!store.assign_topic_author(&t1, &bob).unwrap());
        assert_eq!(store.topic(&t1).unwrap().author(), Some(&Author::id_for("alice")));
        assert!(store.author(&bob).unwrap().new_threads().is_empty());
    }

    #[test]
    fn test_pre_compute_words() {
        let mut store = sample_store();
        store.pre_compute_words();
        assert!(store.posts().all(Post::is_pre_computed));
        let total: usize = store.posts().filter_map(Post::word_count).sum();
        assert_eq!(total, 11);
    }
}
