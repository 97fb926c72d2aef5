//! Coordinated commits log operations on [`MetaStore`].
//!
//! Rows live in the `commits` table under a `(table_id, commit_version)`
//! key, so a range scan over one table id yields that table's log in version
//! order. Every mutating call is exactly one redb write transaction; a
//! transaction dropped without `commit()` is rolled back.

use crate::store::{MetaStore, MetaStoreResult};
use crate::tables::COMMITS;
use crate::types::CommitLogEntry;
use lakelog_common::TableId;
use redb::ReadableTable;
use std::ops::RangeInclusive;
use tracing::debug;

/// What the caller expects the log head to be when appending
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppendPrecondition {
    /// The table has no retained entries
    Empty,
    /// The newest retained entry has this version
    LastVersion(u64),
}

/// Result of an append attempt. Losing a race is not an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// `(table_id, version)` is already claimed
    VersionExists(u64),
    /// The log head moved since the caller read it
    UnexpectedHead {
        expected: Option<u64>,
        actual: Option<u64>,
    },
}

impl AppendOutcome {
    #[must_use]
    pub const fn is_appended(&self) -> bool {
        matches!(self, Self::Appended)
    }
}

/// Lowest and highest retained entries of a table's log
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogBounds {
    pub first: CommitLogEntry,
    pub last: CommitLogEntry,
}

fn table_range(table_id: &str) -> RangeInclusive<(&str, u64)> {
    (table_id, 0)..=(table_id, u64::MAX)
}

fn decode(bytes: &[u8]) -> MetaStoreResult<CommitLogEntry> {
    Ok(bincode::deserialize(bytes)?)
}

/// Version of the newest retained entry for a table
fn head_version<T>(table: &T, table_id: &str) -> MetaStoreResult<Option<u64>>
where
    T: ReadableTable<(&'static str, u64), &'static [u8]>,
{
    match table.range(table_range(table_id))?.next_back() {
        Some(row) => Ok(Some(row?.0.value().1)),
        None => Ok(None),
    }
}

/// Up to `limit` retained versions `<= up_to`, ascending
fn versions_up_to<T>(table: &T, table_id: &str, up_to: u64, limit: u64) -> MetaStoreResult<Vec<u64>>
where
    T: ReadableTable<(&'static str, u64), &'static [u8]>,
{
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    let mut versions = Vec::new();
    for row in table.range((table_id, 0)..=(table_id, up_to))?.take(limit) {
        versions.push(row?.0.value().1);
    }
    Ok(versions)
}

impl MetaStore {
    /// Append one entry if `(table_id, version)` is free and the log head
    /// matches `precondition`. Both checks and the insert share one write
    /// transaction, so concurrent appends for the same version serialize and
    /// exactly one of them observes `Appended`.
    pub fn append_commit(
        &self,
        entry: &CommitLogEntry,
        precondition: AppendPrecondition,
    ) -> MetaStoreResult<AppendOutcome> {
        let table_id = entry.table_id.as_str();
        let version = entry.commit_version;
        let bytes = bincode::serialize(entry)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(COMMITS)?;
            if table.get((table_id, version))?.is_some() {
                return Ok(AppendOutcome::VersionExists(version));
            }

            let actual = head_version(&table, table_id)?;
            let expected = match precondition {
                AppendPrecondition::Empty => None,
                AppendPrecondition::LastVersion(v) => Some(v),
            };
            if actual != expected {
                return Ok(AppendOutcome::UnexpectedHead { expected, actual });
            }

            table.insert((table_id, version), bytes.as_slice())?;
        }
        write_txn.commit()?;

        debug!("Appended commit {} for table {}", version, table_id);
        Ok(AppendOutcome::Appended)
    }

    /// First and last retained entries, read in one snapshot.
    /// `None` when the table has no coordinated history.
    pub fn first_and_last(&self, table_id: &TableId) -> MetaStoreResult<Option<LogBounds>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(COMMITS)?;
        let mut rows = table.range(table_range(table_id.as_str()))?;

        let first = match rows.next() {
            Some(row) => decode(row?.1.value())?,
            None => return Ok(None),
        };
        let last = match rows.next_back() {
            Some(row) => decode(row?.1.value())?,
            None => first.clone(),
        };
        Ok(Some(LogBounds { first, last }))
    }

    /// Up to `limit` newest entries, descending by version
    pub fn latest_commits(
        &self,
        table_id: &TableId,
        limit: u64,
    ) -> MetaStoreResult<Vec<CommitLogEntry>> {
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(COMMITS)?;

        let mut entries = Vec::new();
        for row in table.range(table_range(table_id.as_str()))?.rev().take(limit) {
            entries.push(decode(row?.1.value())?);
        }
        Ok(entries)
    }

    /// Set `is_backfilled_latest_commit` on the entry at `version`.
    ///
    /// Idempotent. Returns `false` if no entry exists at that version.
    pub fn mark_backfilled(&self, table_id: &TableId, version: u64) -> MetaStoreResult<bool> {
        let key = (table_id.as_str(), version);
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(COMMITS)?;
            let current = table.get(key)?.map(|val| decode(val.value())).transpose()?;
            let Some(mut entry) = current else {
                return Ok(false);
            };
            if entry.is_backfilled_latest_commit {
                return Ok(true);
            }
            entry.is_backfilled_latest_commit = true;
            let bytes = bincode::serialize(&entry)?;
            table.insert(key, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(true)
    }

    /// Delete at most `batch_size` entries with `commit_version <= up_to`,
    /// lowest versions first, in a single transaction. Returns the number of
    /// rows removed.
    pub fn delete_commits_up_to(
        &self,
        table_id: &TableId,
        up_to: u64,
        batch_size: u64,
    ) -> MetaStoreResult<u64> {
        let id = table_id.as_str();
        let write_txn = self.db.begin_write()?;
        let deleted = {
            let mut table = write_txn.open_table(COMMITS)?;
            let versions = versions_up_to(&table, id, up_to, batch_size)?;
            for version in &versions {
                table.remove((id, *version))?;
            }
            versions.len() as u64
        };
        write_txn.commit()?;
        Ok(deleted)
    }

    /// Replace a disowned history with a fresh entry.
    ///
    /// Verifies the newest entry is still the tombstone at
    /// `tombstone_version`, drops every retained entry, and appends `entry`,
    /// all in one transaction.
    pub fn reboard_commit(
        &self,
        tombstone_version: u64,
        entry: &CommitLogEntry,
    ) -> MetaStoreResult<AppendOutcome> {
        let table_id = entry.table_id.as_str();
        let bytes = bincode::serialize(entry)?;

        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(COMMITS)?;
            let actual = head_version(&table, table_id)?;
            if actual != Some(tombstone_version) {
                return Ok(AppendOutcome::UnexpectedHead {
                    expected: Some(tombstone_version),
                    actual,
                });
            }
            let still_disowned = table
                .get((table_id, tombstone_version))?
                .map(|val| decode(val.value()))
                .transpose()?
                .is_some_and(|e| e.is_disown_commit);
            if !still_disowned {
                return Ok(AppendOutcome::VersionExists(tombstone_version));
            }

            let versions = versions_up_to(&table, table_id, tombstone_version, u64::MAX)?;
            for version in &versions {
                table.remove((table_id, *version))?;
            }
            table.insert((table_id, entry.commit_version), bytes.as_slice())?;
            versions.len()
        };
        write_txn.commit()?;

        debug!(
            "Reboarded table {} at version {} ({} disowned entries dropped)",
            table_id, entry.commit_version, removed
        );
        Ok(AppendOutcome::Appended)
    }

    /// Number of retained entries for a table
    #[cfg(test)]
    pub(crate) fn count_commits(&self, table_id: &TableId) -> MetaStoreResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(COMMITS)?;
        let mut count = 0;
        for row in table.range(table_range(table_id.as_str()))? {
            row?;
            count += 1;
        }
        Ok(count)
    }
}
