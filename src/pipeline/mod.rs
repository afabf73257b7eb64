//! Pipeline entry points for crawler operations.
//!
//! - `load_or_crawl`: Return the forum graph from its snapshot, or crawl it
//! - `run_stats`: Compute and write the leaderboard reports

pub mod crawl;
pub mod stats;

pub use crawl::{load_or_crawl, run_crawler};
pub use stats::{ReportStats, calculate_all, calculate_stats, run_stats};
