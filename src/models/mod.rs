// src/models/mod.rs

//! Domain models for the forum crawler.
//!
//! Entities, their content-derived identities, and configuration.

mod config;
mod forum;
mod identity;

// Re-export all public types
pub use config::{
    Config, CrawlerConfig, ForumSelectors, LoggingConfig, PathsConfig, ReportConfig, StatsConfig,
};
pub use forum::{Author, Category, DELETED_AUTHOR, Post, Topic};
pub use identity::EntityId;
