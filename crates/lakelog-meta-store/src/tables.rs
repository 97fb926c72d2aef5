//! Redb table definitions for persistent metadata storage.

use redb::TableDefinition;

// Catalog
// Key: table_id, Value: JSON-encoded TableInfo
pub const TABLES: TableDefinition<&str, &[u8]> = TableDefinition::new("tables");

// Coordinated commits
// Key: (table_id, commit_version), Value: bincode-encoded CommitLogEntry.
// The composite key is the uniqueness constraint: a version can be claimed once.
pub const COMMITS: TableDefinition<(&str, u64), &[u8]> = TableDefinition::new("commits");
