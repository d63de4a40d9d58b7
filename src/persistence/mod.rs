//! Persistence layer for the exchange store
//!
//! Provides a local JSON dump that is restored on startup and refreshed
//! periodically while the supervisor runs.

pub mod dump;

pub use dump::SnapshotService;
