// src/graph/snapshot.rs

//! Whole-graph persistence.
//!
//! The snapshot is a flat JSON document with one table per entity type.
//! Every relationship is written as an identity (or a list of identities),
//! never as a nested object, so the cyclic graph fits a linear format.
//!
//! Loading happens in two phases:
//!
//! 1. every record becomes an entity built from its scalar fields alone,
//!    indexed by identity;
//! 2. every encoded identity is resolved against that index and both ends of
//!    the edge are wired, so a relationship stored in only one direction is
//!    restored in both.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::graph::GraphStore;
use crate::models::{Author, Category, EntityId, Post, Topic};

/// Current document layout.
pub const SNAPSHOT_VERSION: u32 = 1;

/// The persisted form of a [`GraphStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDocument {
    #[serde(default = "default_version")]
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub categories: Vec<CategoryRecord>,
    pub topics: Vec<TopicRecord>,
    pub posts: Vec<PostRecord>,
    pub authors: Vec<AuthorRecord>,
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: EntityId,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub topics: Vec<EntityId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicRecord {
    pub id: EntityId,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub category: Option<EntityId>,
    #[serde(default)]
    pub author: Option<EntityId>,
    #[serde(default)]
    pub posts: Vec<EntityId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: EntityId,
    #[serde(default)]
    pub topic: Option<EntityId>,
    #[serde(default)]
    pub category: Option<EntityId>,
    #[serde(default)]
    pub author: Option<EntityId>,
    pub content: String,
    pub datetime: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<BTreeMap<String, usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub posts: Vec<EntityId>,
    #[serde(default)]
    pub new_threads: Vec<EntityId>,
}

/// Flatten a graph into its document form. Records are ordered by identity.
pub fn serialize(store: &GraphStore) -> SnapshotDocument {
    let mut categories: Vec<CategoryRecord> = store
        .categories()
        .map(|c| CategoryRecord {
            id: c.id().clone(),
            title: c.title().to_string(),
            url: c.url().to_string(),
            topics: c.topics().iter().cloned().collect(),
        })
        .collect();
    let mut topics: Vec<TopicRecord> = store
        .topics()
        .map(|t| TopicRecord {
            id: t.id().clone(),
            title: t.title().to_string(),
            url: t.url().to_string(),
            category: t.category().cloned(),
            author: t.author().cloned(),
            posts: t.posts().iter().cloned().collect(),
        })
        .collect();
    let mut posts: Vec<PostRecord> = store
        .posts()
        .map(|p| PostRecord {
            id: p.id().clone(),
            topic: p.topic().cloned(),
            category: p.category().cloned(),
            author: p.author().cloned(),
            content: p.content().to_string(),
            datetime: p.posted_at(),
            words: p.words().cloned(),
            word_count: p.word_count(),
        })
        .collect();
    let mut authors: Vec<AuthorRecord> = store
        .authors()
        .map(|a| AuthorRecord {
            id: a.id().clone(),
            name: a.name().to_string(),
            url: a.url().map(str::to_string),
            posts: a.posts().iter().cloned().collect(),
            new_threads: a.new_threads().iter().cloned().collect(),
        })
        .collect();

    categories.sort_by(|a, b| a.id.cmp(&b.id));
    topics.sort_by(|a, b| a.id.cmp(&b.id));
    posts.sort_by(|a, b| a.id.cmp(&b.id));
    authors.sort_by(|a, b| a.id.cmp(&b.id));

    SnapshotDocument {
        version: SNAPSHOT_VERSION,
        saved_at: Utc::now(),
        categories,
        topics,
        posts,
        authors,
    }
}

/// Rebuild a graph from its document form.
pub fn deserialize(document: &SnapshotDocument) -> Result<GraphStore> {
    if document.version != SNAPSHOT_VERSION {
        return Err(AppError::snapshot(format!(
            "unsupported snapshot version {}",
            document.version
        )));
    }

    let mut graph = allocate(document)?;
    graph.wire(document)?;
    graph.finish()
}

/// Entities indexed by identity, links not yet resolved.
struct Allocated {
    categories: HashMap<EntityId, Category>,
    topics: HashMap<EntityId, Topic>,
    posts: HashMap<EntityId, Post>,
    authors: HashMap<EntityId, Author>,
}

/// Phase 1: instantiate every entity from its scalar fields.
fn allocate(document: &SnapshotDocument) -> Result<Allocated> {
    let mut categories = HashMap::with_capacity(document.categories.len());
    for record in &document.categories {
        let category = Category::new(&record.title, &record.url);
        register("category", &mut categories, &record.id, category.id().clone(), category)?;
    }

    let mut topics = HashMap::with_capacity(document.topics.len());
    for record in &document.topics {
        let topic = Topic::unlinked(&record.title, &record.url);
        register("topic", &mut topics, &record.id, topic.id().clone(), topic)?;
    }

    let mut posts = HashMap::with_capacity(document.posts.len());
    for record in &document.posts {
        let mut post = Post::unlinked(&record.content, record.datetime);
        if let (Some(words), Some(count)) = (&record.words, record.word_count) {
            post.restore_words(words.clone(), count);
        }
        register("post", &mut posts, &record.id, post.id().clone(), post)?;
    }

    let mut authors = HashMap::with_capacity(document.authors.len());
    for record in &document.authors {
        let mut author = Author::new(&record.name);
        author.url = record.url.clone();
        register("author", &mut authors, &record.id, author.id().clone(), author)?;
    }

    Ok(Allocated {
        categories,
        topics,
        posts,
        authors,
    })
}

fn register<T>(
    kind: &str,
    table: &mut HashMap<EntityId, T>,
    stored: &EntityId,
    derived: EntityId,
    entity: T,
) -> Result<()> {
    if *stored != derived {
        return Err(AppError::snapshot(format!(
            "{kind} {} does not match the identity of its natural key ({})",
            stored.short(),
            derived.short()
        )));
    }
    if table.insert(derived, entity).is_some() {
        return Err(AppError::snapshot(format!(
            "{kind} {} appears more than once",
            stored.short()
        )));
    }
    Ok(())
}

/// Point `slot` at `target`, rejecting a different existing value.
fn link(slot: &mut Option<EntityId>, target: &EntityId, what: &str) -> Result<()> {
    match slot {
        Some(existing) if existing != target => Err(AppError::snapshot(format!(
            "{what} points at both {} and {}",
            existing.short(),
            target.short()
        ))),
        Some(_) => Ok(()),
        None => {
            *slot = Some(target.clone());
            Ok(())
        }
    }
}

fn dangling(owner: &str, owner_id: &EntityId, kind: &str, id: &EntityId) -> AppError {
    AppError::snapshot(format!(
        "{owner} {} references missing {kind} {}",
        owner_id.short(),
        id.short()
    ))
}

impl Allocated {
    /// Phase 2: resolve every encoded identity and wire both directions.
    fn wire(&mut self, document: &SnapshotDocument) -> Result<()> {
        for record in &document.posts {
            self.wire_post(record)?;
        }
        for record in &document.topics {
            self.wire_topic(record)?;
        }
        for record in &document.categories {
            self.wire_category(record)?;
        }
        for record in &document.authors {
            self.wire_author(record)?;
        }
        Ok(())
    }

    fn wire_post(&mut self, record: &PostRecord) -> Result<()> {
        let id = &record.id;
        let Some(post) = self.posts.get_mut(id) else {
            return Err(dangling("post", id, "post", id));
        };

        if let Some(topic_id) = &record.topic {
            let topic = self
                .topics
                .get_mut(topic_id)
                .ok_or_else(|| dangling("post", id, "topic", topic_id))?;
            link(&mut post.topic, topic_id, "post topic")?;
            topic.posts.insert(id.clone());
        }
        if let Some(category_id) = &record.category {
            if !self.categories.contains_key(category_id) {
                return Err(dangling("post", id, "category", category_id));
            }
            link(&mut post.category, category_id, "post category")?;
        }
        if let Some(author_id) = &record.author {
            let author = self
                .authors
                .get_mut(author_id)
                .ok_or_else(|| dangling("post", id, "author", author_id))?;
            link(&mut post.author, author_id, "post author")?;
            author.posts.insert(id.clone());
        }
        Ok(())
    }

    fn wire_topic(&mut self, record: &TopicRecord) -> Result<()> {
        let id = &record.id;
        let Some(topic) = self.topics.get_mut(id) else {
            return Err(dangling("topic", id, "topic", id));
        };

        if let Some(category_id) = &record.category {
            let category = self
                .categories
                .get_mut(category_id)
                .ok_or_else(|| dangling("topic", id, "category", category_id))?;
            link(&mut topic.category, category_id, "topic category")?;
            category.topics.insert(id.clone());
        }
        if let Some(author_id) = &record.author {
            let author = self
                .authors
                .get_mut(author_id)
                .ok_or_else(|| dangling("topic", id, "author", author_id))?;
            link(&mut topic.author, author_id, "topic author")?;
            author.new_threads.insert(id.clone());
        }
        for post_id in &record.posts {
            let post = self
                .posts
                .get_mut(post_id)
                .ok_or_else(|| dangling("topic", id, "post", post_id))?;
            link(&mut post.topic, id, "post topic")?;
            topic.posts.insert(post_id.clone());
        }
        Ok(())
    }

    fn wire_category(&mut self, record: &CategoryRecord) -> Result<()> {
        let id = &record.id;
        let Some(category) = self.categories.get_mut(id) else {
            return Err(dangling("category", id, "category", id));
        };

        for topic_id in &record.topics {
            let topic = self
                .topics
                .get_mut(topic_id)
                .ok_or_else(|| dangling("category", id, "topic", topic_id))?;
            link(&mut topic.category, id, "topic category")?;
            category.topics.insert(topic_id.clone());
        }
        Ok(())
    }

    fn wire_author(&mut self, record: &AuthorRecord) -> Result<()> {
        let id = &record.id;
        let Some(author) = self.authors.get_mut(id) else {
            return Err(dangling("author", id, "author", id));
        };

        for post_id in &record.posts {
            let post = self
                .posts
                .get_mut(post_id)
                .ok_or_else(|| dangling("author", id, "post", post_id))?;
            link(&mut post.author, id, "post author")?;
            author.posts.insert(post_id.clone());
        }
        for topic_id in &record.new_threads {
            let topic = self
                .topics
                .get_mut(topic_id)
                .ok_or_else(|| dangling("author", id, "topic", topic_id))?;
            link(&mut topic.author, id, "topic author")?;
            author.new_threads.insert(topic_id.clone());
        }
        Ok(())
    }

    /// Fill defaulted links, reject missing required ones.
    fn finish(mut self) -> Result<GraphStore> {
        for topic in self.topics.values() {
            if topic.category.is_none() {
                return Err(AppError::snapshot(format!(
                    "topic {} has no category",
                    topic.id().short()
                )));
            }
        }

        for post in self.posts.values_mut() {
            let Some(topic_id) = post.topic.clone() else {
                return Err(AppError::snapshot(format!(
                    "post {} has no topic",
                    post.id().short()
                )));
            };
            if post.author.is_none() {
                return Err(AppError::snapshot(format!(
                    "post {} has no author",
                    post.id().short()
                )));
            }
            if post.category.is_none() {
                post.category = self.topics.get(&topic_id).and_then(|t| t.category.clone());
            }
        }

        let store = GraphStore::from_tables(self.categories, self.topics, self.posts, self.authors);
        store
            .check_integrity()
            .map_err(|e| AppError::snapshot(format!("inconsistent graph: {e}")))?;
        Ok(store)
    }
}

/// Parse a snapshot document, reporting any failure as corruption.
pub fn from_json(bytes: &[u8]) -> Result<SnapshotDocument> {
    serde_json::from_slice(bytes).map_err(|e| AppError::snapshot(format!("unreadable document: {e}")))
}

/// A snapshot file on disk.
#[derive(Debug, Clone)]
pub struct GraphSnapshot {
    path: PathBuf,
}

impl GraphSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a snapshot is present. Presence alone decides whether a run
    /// skips crawling.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the graph, or `None` when no snapshot has been written yet.
    pub async fn load(&self) -> Result<Option<GraphStore>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::Io(e)),
        };
        let document = from_json(&bytes)?;
        let store = deserialize(&document)?;
        log::info!(
            "Loaded snapshot from {} ({} categories, {} topics, {} posts, {} authors)",
            self.path.display(),
            store.category_count(),
            store.topic_count(),
            store.post_count(),
            store.author_count()
        );
        Ok(Some(store))
    }

    /// Write the whole graph (write to temp, then rename).
    pub async fn save(&self, store: &GraphStore) -> Result<()> {
        let document = serialize(store);
        let bytes = serde_json::to_vec_pretty(&document)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);
        tokio::fs::rename(&tmp, &self.path).await?;

        log::info!(
            "Snapshot saved to {} ({} posts)",
            self.path.display(),
            store.post_count()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use tempfile::TempDir;

    use super::*;
    use crate::graph::store::tests::sample_store;
    use crate::models::DELETED_AUTHOR;

    fn edges(store: &GraphStore) -> BTreeSet<(String, EntityId, EntityId)> {
        let mut edges = BTreeSet::new();
        for c in store.categories() {
            for t in c.topics() {
                edges.insert(("category.topics".to_string(), c.id().clone(), t.clone()));
            }
        }
        for t in store.topics() {
            if let Some(c) = t.category() {
                edges.insert(("topic.category".to_string(), t.id().clone(), c.clone()));
            }
            if let Some(a) = t.author() {
                edges.insert(("topic.author".to_string(), t.id().clone(), a.clone()));
            }
            for p in t.posts() {
                edges.insert(("topic.posts".to_string(), t.id().clone(), p.clone()));
            }
        }
        for p in store.posts() {
            for (name, target) in [
                ("post.topic", p.topic()),
                ("post.category", p.category()),
                ("post.author", p.author()),
            ] {
                if let Some(target) = target {
                    edges.insert((name.to_string(), p.id().clone(), target.clone()));
                }
            }
        }
        for a in store.authors() {
            for p in a.posts() {
                edges.insert(("author.posts".to_string(), a.id().clone(), p.clone()));
            }
            for t in a.new_threads() {
                edges.insert(("author.new_threads".to_string(), a.id().clone(), t.clone()));
            }
        }
        edges
    }

    fn ids<'a>(iter: impl Iterator<Item = &'a EntityId>) -> BTreeSet<EntityId> {
        iter.cloned().collect()
    }

    #[test]
    fn test_round_trip_preserves_identities_and_edges() {
        let store = sample_store();
        let restored = deserialize(&serialize(&store)).unwrap();

        assert_eq!(
            ids(store.categories().map(Category::id)),
            ids(restored.categories().map(Category::id))
        );
        assert_eq!(
            ids(store.topics().map(Topic::id)),
            ids(restored.topics().map(Topic::id))
        );
        assert_eq!(
            ids(store.posts().map(Post::id)),
            ids(restored.posts().map(Post::id))
        );
        assert_eq!(
            ids(store.authors().map(Author::id)),
            ids(restored.authors().map(Author::id))
        );
        assert_eq!(edges(&store), edges(&restored));
    }

    #[test]
    fn test_round_trip_through_json_keeps_words() {
        let mut store = sample_store();
        store.pre_compute_words();
        let json = serde_json::to_vec(&serialize(&store)).unwrap();
        let restored = deserialize(&from_json(&json).unwrap()).unwrap();

        let post = restored.post(&Post::id_for("Reply from bob")).unwrap();
        assert_eq!(post.word_count(), Some(3));
        assert_eq!(post.words().unwrap().get("bob"), Some(&1));
    }

    #[test]
    fn test_relationships_are_identity_strings() {
        let json = serde_json::to_value(serialize(&sample_store())).unwrap();
        let topic = &json["topics"][0];
        assert!(topic["category"].is_string());
        assert!(topic["posts"].as_array().unwrap().iter().all(|p| p.is_string()));
        let author = &json["authors"][0];
        assert!(author["posts"].as_array().unwrap().iter().all(|p| p.is_string()));
    }

    #[test]
    fn test_elided_back_references_are_rebuilt() {
        let store = sample_store();
        let mut document = serialize(&store);
        for category in &mut document.categories {
            category.topics.clear();
        }
        for author in &mut document.authors {
            author.posts.clear();
            author.new_threads.clear();
        }
        for topic in &mut document.topics {
            topic.posts.clear();
        }

        let restored = deserialize(&document).unwrap();
        assert_eq!(edges(&store), edges(&restored));
        assert_eq!(
            restored.category_by_title("General").unwrap().topics().len(),
            2
        );
    }

    #[test]
    fn test_forward_links_rebuilt_from_lists() {
        let store = sample_store();
        let mut document = serialize(&store);
        for topic in &mut document.topics {
            topic.category = None;
            topic.author = None;
        }
        for post in &mut document.posts {
            post.topic = None;
            post.author = None;
            post.category = None;
        }

        let restored = deserialize(&document).unwrap();
        assert_eq!(edges(&store), edges(&restored));
    }

    #[test]
    fn test_dangling_reference_is_corruption() {
        let mut document = serialize(&sample_store());
        document.posts[0].author = Some(EntityId::from_key("nobody"));
        let err = deserialize(&document).unwrap_err();
        assert!(err.is_snapshot_corruption());
        assert!(err.to_string().contains("missing author"));
    }

    #[test]
    fn test_identity_mismatch_is_corruption() {
        let mut document = serialize(&sample_store());
        document.authors[0].name = "mallory".to_string();
        assert!(deserialize(&document).unwrap_err().is_snapshot_corruption());
    }

    #[test]
    fn test_non_hex_identity_is_corruption() {
        let mut json = serde_json::to_value(serialize(&sample_store())).unwrap();
        json["authors"][0]["id"] = serde_json::Value::from("aéééééééé");
        let bytes = serde_json::to_vec(&json).unwrap();

        let err = deserialize(&from_json(&bytes).unwrap()).unwrap_err();
        assert!(err.is_snapshot_corruption());
        assert!(err.to_string().contains("aéééééééé"));
    }

    #[test]
    fn test_contradicting_links_are_corruption() {
        let store = sample_store();
        let mut document = serialize(&store);
        let bob = Author::id_for("bob");
        let record = document
            .authors
            .iter_mut()
            .find(|a| a.id == bob)
            .unwrap();
        record.posts.push(Post::id_for("Opening T1"));
        assert!(deserialize(&document).unwrap_err().is_snapshot_corruption());
    }

    #[test]
    fn test_missing_author_is_corruption() {
        let mut document = serialize(&sample_store());
        document.posts[0].author = None;
        for author in &mut document.authors {
            author.posts.clear();
        }
        assert!(deserialize(&document).unwrap_err().is_snapshot_corruption());
    }

    #[test]
    fn test_malformed_json_is_corruption() {
        assert!(from_json(b"{\"categories\": [").unwrap_err().is_snapshot_corruption());
        assert!(from_json(b"{\"categories\": []}").unwrap_err().is_snapshot_corruption());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let snapshot = GraphSnapshot::new(tmp.path().join("graph.json"));
        assert!(!snapshot.exists());
        assert!(snapshot.load().await.unwrap().is_none());

        let store = sample_store();
        snapshot.save(&store).await.unwrap();
        assert!(snapshot.exists());

        let restored = snapshot.load().await.unwrap().unwrap();
        assert_eq!(restored.post_count(), 5);
        assert_eq!(
            restored.author_by_name(DELETED_AUTHOR).unwrap().posts().len(),
            1
        );
        assert_eq!(edges(&store), edges(&restored));
    }

    #[tokio::test]
    async fn test_load_truncated_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("graph.json");
        std::fs::write(&path, b"{ \"version\": 1, \"saved_at\": ").unwrap();
        let err = GraphSnapshot::new(&path).load().await.unwrap_err();
        assert!(err.is_snapshot_corruption());
    }
}
