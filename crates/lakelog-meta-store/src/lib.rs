//! Lakelog Metadata Store - redb-backed persistence
//!
//! Holds the catalog's table records and the coordinated commits log. Every
//! mutation runs inside a single redb write transaction; a failed or
//! abandoned transaction leaves no partial state behind.

pub mod commit_log;
pub mod store;
pub mod tables;
pub mod types;

// Re-exports
pub use commit_log::{AppendOutcome, AppendPrecondition, LogBounds};
pub use store::{MetaStore, MetaStoreError, MetaStoreResult};
pub use types::CommitLogEntry;
