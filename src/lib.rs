// src/lib.rs

//! forumgraph: forum crawler, page cache, and entity graph store

pub mod error;
pub mod graph;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
