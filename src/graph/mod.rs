//! The forum graph and its on-disk snapshot.

pub mod snapshot;
pub mod store;

pub use snapshot::{GraphSnapshot, SnapshotDocument};
pub use store::GraphStore;
