//! Coordinated commits for Lakelog Delta tables.
//!
//! Writers append table versions through the catalog before those versions
//! are backfilled into the table's own `_delta_log`. The catalog keeps a
//! bounded, gap-free window of recent commits per table and trims it as
//! writers report backfill progress.
//!
//! The API is an Axum router; the server binary mounts it at the root.

pub mod backfill;
pub mod catalog;
pub mod coordinator;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod reader;
pub mod types;

use axum::Router;
use axum::routing::{get, post};
use coordinator::CommitStateMachine;
use lakelog_common::config::CommitsConfig;
use lakelog_meta_store::MetaStore;
use metrics::CommitMetrics;
use reader::CommitLogReader;
use std::sync::Arc;

pub use error::CommitError;

/// Shared state for coordinated commits handlers.
pub struct CommitsState {
    pub store: Arc<MetaStore>,
    pub machine: CommitStateMachine,
    pub reader: CommitLogReader,
    pub metrics: Arc<CommitMetrics>,
}

impl CommitsState {
    pub fn new(store: Arc<MetaStore>, config: CommitsConfig) -> Self {
        let metrics = Arc::new(CommitMetrics::new());
        Self {
            machine: CommitStateMachine::new(Arc::clone(&store), config, Arc::clone(&metrics)),
            reader: CommitLogReader::new(Arc::clone(&store), config, Arc::clone(&metrics)),
            store,
            metrics,
        }
    }
}

/// Build the coordinated commits REST API router.
pub fn router(state: CommitsState) -> Router {
    Router::new()
        // Commit log
        .route(
            "/coordinated-commits",
            post(handlers::commit).get(handlers::get_commits),
        )
        // Table registry
        .route(
            "/tables",
            post(handlers::create_table).get(handlers::list_tables),
        )
        .route("/tables/{table_id}", get(handlers::get_table))
        // Operational
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .with_state(Arc::new(state))
}
