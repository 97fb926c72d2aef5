//! Persistent metadata store backed by redb.
//!
//! Provides typed put/get/update methods for catalog tables. The commit log
//! operations live in [`crate::commit_log`]. Unlike a cache-fronted store,
//! every error is returned to the caller: the commit log must never report
//! success for a write that did not land.

use crate::tables;
use lakelog_common::{TableId, TableInfo};
use redb::backends::InMemoryBackend;
use redb::{Database, ReadableTable};
use std::path::Path;
use tracing::debug;

/// Error type for metadata store operations
#[derive(Debug, thiserror::Error)]
pub enum MetaStoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::DatabaseError),
    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("redb transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redb::TransactionError> for MetaStoreError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Transaction(Box::new(e))
    }
}

pub type MetaStoreResult<T> = Result<T, MetaStoreError>;

/// Persistent metadata store backed by redb.
///
/// The handle is shared (`Arc<MetaStore>`) by every component that touches
/// persistent state; there is no global instance.
pub struct MetaStore {
    pub(crate) db: Database,
}

impl MetaStore {
    /// Open (or create) the redb database at the given path.
    pub fn open(path: impl AsRef<Path>) -> MetaStoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;
        debug!("Opened metadata store at {}", path.display());
        Self::init(db)
    }

    /// Open a store that lives only in memory. Used by tests and ephemeral
    /// development servers.
    pub fn open_in_memory() -> MetaStoreResult<Self> {
        let db = Database::builder().create_with_backend(InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> MetaStoreResult<Self> {
        // Create all tables eagerly so later read txns don't fail
        let write_txn = db.begin_write()?;
        {
            let _t = write_txn.open_table(tables::TABLES)?;
            let _t = write_txn.open_table(tables::COMMITS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    // ---- Tables (JSON) ----

    pub fn put_table(&self, table: &TableInfo) -> MetaStoreResult<()> {
        let bytes = serde_json::to_vec(table)?;
        self.put_bytes(tables::TABLES, table.table_id.as_str(), &bytes)
    }

    pub fn get_table(&self, table_id: &TableId) -> MetaStoreResult<Option<TableInfo>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::TABLES)?;
        match table.get(table_id.as_str())? {
            Some(val) => Ok(Some(serde_json::from_slice(val.value())?)),
            None => Ok(None),
        }
    }

    /// Read-modify-write a table record in one write transaction.
    /// Returns the updated record, or `None` if the table does not exist.
    pub fn update_table<F>(&self, table_id: &TableId, f: F) -> MetaStoreResult<Option<TableInfo>>
    where
        F: FnOnce(&mut TableInfo),
    {
        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut table = write_txn.open_table(tables::TABLES)?;
            // Read, then drop the guard before mutating
            let current = table
                .get(table_id.as_str())?
                .map(|val| serde_json::from_slice::<TableInfo>(val.value()))
                .transpose()?;
            match current {
                Some(mut info) => {
                    f(&mut info);
                    let bytes = serde_json::to_vec(&info)?;
                    table.insert(table_id.as_str(), bytes.as_slice())?;
                    Some(info)
                }
                None => None,
            }
        };
        if updated.is_some() {
            write_txn.commit()?;
        }
        Ok(updated)
    }

    pub fn list_tables(&self) -> MetaStoreResult<Vec<TableInfo>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::TABLES)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let entry = entry?;
            result.push(serde_json::from_slice(entry.1.value())?);
        }
        Ok(result)
    }

    // ---- Generic helpers ----

    fn put_bytes(
        &self,
        table_def: redb::TableDefinition<&str, &[u8]>,
        key: &str,
        value: &[u8],
    ) -> MetaStoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(table_def)?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}
