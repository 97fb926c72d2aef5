//! `getCommits`: the visible window of a table's commit log.

use crate::coordinator::{load_coordinated_table, parse_table_ref};
use crate::error::CommitError;
use crate::metrics::CommitMetrics;
use crate::types::{Commit, GetCommitsQuery, GetCommitsResponse, to_wire_version};
use lakelog_common::TableId;
use lakelog_common::config::CommitsConfig;
use lakelog_meta_store::MetaStore;
use std::sync::Arc;
use tracing::debug;

type Result<T> = std::result::Result<T, CommitError>;

pub struct CommitLogReader {
    store: Arc<MetaStore>,
    config: CommitsConfig,
    metrics: Arc<CommitMetrics>,
}

impl CommitLogReader {
    pub fn new(store: Arc<MetaStore>, config: CommitsConfig, metrics: Arc<CommitMetrics>) -> Self {
        Self {
            store,
            config,
            metrics,
        }
    }

    /// Validate a `GET /coordinated-commits` query and answer it.
    ///
    /// # Errors
    /// `InvalidArgument` for missing or negative parameters, `NotFound` or
    /// `PreconditionFailed` when the table cannot hold coordinated commits.
    pub fn query(&self, query: &GetCommitsQuery) -> Result<GetCommitsResponse> {
        let table_id = parse_table_ref(&query.table_id, &query.table_uri)?;
        let start_version = query
            .start_version
            .ok_or_else(|| CommitError::invalid_argument("start_version is required"))?;
        let start_version = u64::try_from(start_version)
            .map_err(|_| CommitError::invalid_argument("start_version must be >= 0"))?;
        let limit = self.clamp_limit(query.max_num_commits);

        load_coordinated_table(&self.store, &table_id)?;
        self.get_commits(&table_id, start_version, limit)
    }

    /// Clamp a requested page size into `[1, max_commits_per_table]`
    fn clamp_limit(&self, requested: Option<i64>) -> u64 {
        let ceiling = self.config.max_commits_per_table;
        requested.map_or(ceiling, |n| u64::try_from(n).unwrap_or(0).clamp(1, ceiling))
    }

    /// Commits in `[start_version, end)` plus the newest known version.
    ///
    /// The retained log is a sliding window, so `start_version` may predate
    /// everything still stored. `latestTableVersion` is always reported so
    /// callers can tell "nothing new" apart from "no history" (`-1`).
    ///
    /// # Errors
    /// `Internal` on store failures.
    pub fn get_commits(
        &self,
        table_id: &TableId,
        start_version: u64,
        limit: u64,
    ) -> Result<GetCommitsResponse> {
        self.metrics.record_get_commits();

        // Descending: index 0 is the newest retained entry
        let latest = self.store.latest_commits(table_id, limit)?;
        let Some(newest) = latest.first() else {
            return Ok(GetCommitsResponse::empty());
        };
        let latest_table_version = to_wire_version(newest.commit_version);

        if newest.is_backfilled_latest_commit {
            debug!(
                "Table {} fully backfilled at version {}",
                table_id, newest.commit_version
            );
            return Ok(GetCommitsResponse {
                commits: Vec::new(),
                latest_table_version,
            });
        }

        let end_version = start_version.max(newest.commit_version.saturating_add(1));
        let commits = latest
            .iter()
            .rev()
            .filter(|e| (start_version..end_version).contains(&e.commit_version))
            .map(Commit::from)
            .collect();

        Ok(GetCommitsResponse {
            commits,
            latest_table_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lakelog_meta_store::{AppendPrecondition, CommitLogEntry};

    fn reader_with(versions: std::ops::RangeInclusive<u64>) -> (CommitLogReader, TableId) {
        let store = Arc::new(MetaStore::open_in_memory().unwrap());
        let id = TableId::generate();
        let mut pre = AppendPrecondition::Empty;
        for v in versions {
            let entry = CommitLogEntry {
                table_id: id.clone(),
                commit_version: v,
                commit_filename: format!("f{v}"),
                commit_filesize: 100,
                commit_file_modification_timestamp: 1,
                commit_timestamp: 2,
                is_backfilled_latest_commit: false,
                is_preregistration_commit: false,
                is_disown_commit: false,
            };
            store.append_commit(&entry, pre).unwrap();
            pre = AppendPrecondition::LastVersion(v);
        }
        let reader = CommitLogReader::new(
            store,
            CommitsConfig::default(),
            Arc::new(CommitMetrics::new()),
        );
        (reader, id)
    }

    fn versions(resp: &GetCommitsResponse) -> Vec<i64> {
        resp.commits
            .iter()
            .filter_map(|c| c.commit_info.as_ref().map(|i| i.version))
            .collect()
    }

    #[test]
    fn test_no_history() {
        let store = Arc::new(MetaStore::open_in_memory().unwrap());
        let reader = CommitLogReader::new(
            store,
            CommitsConfig::default(),
            Arc::new(CommitMetrics::new()),
        );
        let resp = reader.get_commits(&TableId::generate(), 0, 50).unwrap();
        assert_eq!(resp, GetCommitsResponse::empty());
    }

    #[test]
    fn test_window_from_start_version() {
        let (reader, id) = reader_with(1..=5);

        let resp = reader.get_commits(&id, 0, 50).unwrap();
        assert_eq!(versions(&resp), vec![1, 2, 3, 4, 5]);
        assert_eq!(resp.latest_table_version, 5);

        let resp = reader.get_commits(&id, 3, 50).unwrap();
        assert_eq!(versions(&resp), vec![3, 4, 5]);

        // Caller already has everything
        let resp = reader.get_commits(&id, 6, 50).unwrap();
        assert!(resp.commits.is_empty());
        assert_eq!(resp.latest_table_version, 5);
    }

    #[test]
    fn test_limit_keeps_newest() {
        let (reader, id) = reader_with(1..=5);
        let resp = reader.get_commits(&id, 0, 2).unwrap();
        assert_eq!(versions(&resp), vec![4, 5]);
        assert_eq!(resp.latest_table_version, 5);
    }

    #[test]
    fn test_fully_backfilled_returns_only_version() {
        let (reader, id) = reader_with(1..=3);
        reader.store.mark_backfilled(&id, 3).unwrap();

        let resp = reader.get_commits(&id, 0, 50).unwrap();
        assert!(resp.commits.is_empty());
        assert_eq!(resp.latest_table_version, 3);
    }

    #[test]
    fn test_clamp_limit() {
        let (reader, _) = reader_with(1..=1);
        assert_eq!(reader.clamp_limit(None), 50);
        assert_eq!(reader.clamp_limit(Some(0)), 1);
        assert_eq!(reader.clamp_limit(Some(-4)), 1);
        assert_eq!(reader.clamp_limit(Some(500)), 50);
        assert_eq!(reader.clamp_limit(Some(7)), 7);
    }
}
