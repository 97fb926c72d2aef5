//! Stored types for metadata persistence.
//!
//! These types are serialized to redb via bincode, so they must not use
//! serde attributes that skip fields.

use lakelog_common::TableId;
use serde::{Deserialize, Serialize};

/// One row of a table's coordinated commits log.
///
/// Rows are immutable once written except for `is_backfilled_latest_commit`,
/// which flips from false to true at most once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitLogEntry {
    pub table_id: TableId,
    pub commit_version: u64,
    /// Name of the staged commit file this entry describes
    pub commit_filename: String,
    pub commit_filesize: u64,
    /// Milliseconds since epoch
    pub commit_file_modification_timestamp: i64,
    /// Milliseconds since epoch
    pub commit_timestamp: i64,
    /// Newest version known to be durably present in the table's own log
    pub is_backfilled_latest_commit: bool,
    pub is_preregistration_commit: bool,
    /// Tombstone: the catalog gave up coordinating this table at this version
    pub is_disown_commit: bool,
}
