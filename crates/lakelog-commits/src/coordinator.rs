//! Commit classification and routing.
//!
//! Each `POST /coordinated-commits` request is validated, classified against
//! the table's first and last retained log entries, and executed as one of
//! first commit, normal commit, backfill-only report, or reboard. Version
//! races are settled by the store's append outcome, never by in-process
//! locking, so any number of server threads may run commits concurrently.

use crate::backfill::{BackfillReconciler, TrimOutcome};
use crate::error::CommitError;
use crate::metrics::{CommitKind, CommitMetrics};
use crate::types::{Commit, CommitInfo, Metadata};
use lakelog_common::config::CommitsConfig;
use lakelog_common::{TableId, TableInfo};
use lakelog_meta_store::{AppendOutcome, AppendPrecondition, CommitLogEntry, LogBounds, MetaStore};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

type Result<T> = std::result::Result<T, CommitError>;

/// What to do with a commit request, given the current log
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitAction {
    /// No retained entries: claim coordination at the caller's version
    First,
    /// No `commitInfo`: only advance the backfill frontier
    BackfillOnly,
    /// Last entry is a disown tombstone: a new coordinator takes over
    Reboard { tombstone: u64 },
    /// Append `last + 1`
    Normal { last: u64 },
}

/// Classify a request against the retained log bounds.
///
/// # Errors
/// `InvalidArgument` if there is neither a commit nor any history to
/// backfill.
pub fn classify(bounds: Option<&LogBounds>, commit_info: Option<&CommitInfo>) -> Result<CommitAction> {
    match (bounds, commit_info) {
        (None, Some(_)) => Ok(CommitAction::First),
        (None, None) => Err(CommitError::invalid_argument(
            "commitInfo is required for the first commit of a table",
        )),
        (Some(_), None) => Ok(CommitAction::BackfillOnly),
        (Some(b), Some(_)) if b.last.is_disown_commit => Ok(CommitAction::Reboard {
            tombstone: b.last.commit_version,
        }),
        (Some(b), Some(_)) => Ok(CommitAction::Normal {
            last: b.last.commit_version,
        }),
    }
}

/// Validate the `tableId`/`tableUri` pair every request carries.
pub(crate) fn parse_table_ref(table_id: &str, table_uri: &str) -> Result<TableId> {
    if table_id.is_empty() {
        return Err(CommitError::invalid_argument("tableId is required"));
    }
    if table_uri.trim().is_empty() {
        return Err(CommitError::invalid_argument("tableUri is required"));
    }
    TableId::new(table_id).map_err(|e| CommitError::invalid_argument(e.to_string()))
}

/// Load a table and check it may hold coordinated commits.
pub(crate) fn load_coordinated_table(store: &MetaStore, table_id: &TableId) -> Result<TableInfo> {
    let table = store
        .get_table(table_id)?
        .ok_or_else(|| CommitError::not_found(format!("table {table_id} not found")))?;
    if !table.accepts_coordinated_commits() {
        return Err(CommitError::precondition_failed(format!(
            "table {table_id} is {} {}; coordinated commits require MANAGED DELTA",
            table.table_type, table.data_source_format
        )));
    }
    Ok(table)
}

fn non_negative(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| CommitError::invalid_argument(format!("{field} must be >= 0")))
}

/// `commitInfo` converted to its stored form, before the table id is known
struct ValidatedCommit {
    version: u64,
    file_name: String,
    file_size: u64,
    file_modification_timestamp: i64,
    timestamp: Option<i64>,
    disown: bool,
}

impl ValidatedCommit {
    fn parse(info: &CommitInfo) -> Result<Self> {
        if info.file_name.is_empty() {
            return Err(CommitError::invalid_argument("commitInfo.fileName is required"));
        }
        Ok(Self {
            version: non_negative(info.version, "commitInfo.version")?,
            file_name: info.file_name.clone(),
            file_size: non_negative(info.file_size, "commitInfo.fileSize")?,
            file_modification_timestamp: info.file_modification_timestamp,
            timestamp: info.timestamp,
            disown: info.is_disown(),
        })
    }

    fn into_entry(self, table_id: &TableId) -> CommitLogEntry {
        CommitLogEntry {
            table_id: table_id.clone(),
            commit_version: self.version,
            commit_filename: self.file_name,
            commit_filesize: self.file_size,
            commit_file_modification_timestamp: self.file_modification_timestamp,
            commit_timestamp: self
                .timestamp
                .unwrap_or_else(|| chrono::Utc::now().timestamp_millis()),
            is_backfilled_latest_commit: false,
            is_preregistration_commit: false,
            is_disown_commit: self.disown,
        }
    }
}

pub struct CommitStateMachine {
    store: Arc<MetaStore>,
    config: CommitsConfig,
    metrics: Arc<CommitMetrics>,
    reconciler: BackfillReconciler,
}

impl CommitStateMachine {
    pub fn new(store: Arc<MetaStore>, config: CommitsConfig, metrics: Arc<CommitMetrics>) -> Self {
        let reconciler = BackfillReconciler::new(Arc::clone(&store), config, Arc::clone(&metrics));
        Self {
            store,
            config,
            metrics,
            reconciler,
        }
    }

    /// Validate, classify and apply one commit request.
    ///
    /// # Errors
    /// See [`CommitError`]; conflicts and rejections are counted in metrics.
    pub fn commit(&self, request: &Commit) -> Result<CommitKind> {
        let result = self.apply(request);
        match &result {
            Ok(kind) => self.metrics.record_accepted(*kind),
            Err(CommitError::Conflict(msg)) => {
                self.metrics.record_conflict();
                debug!("Commit conflict for table {}: {}", request.table_id, msg);
            }
            Err(e) => {
                self.metrics.record_rejected();
                warn!("Rejected commit for table {}: {}", request.table_id, e);
            }
        }
        result
    }

    fn apply(&self, request: &Commit) -> Result<CommitKind> {
        let table_id = parse_table_ref(&request.table_id, &request.table_uri)?;
        load_coordinated_table(&self.store, &table_id)?;

        let commit = request.commit_info.as_ref().map(ValidatedCommit::parse).transpose()?;
        let backfilled = request
            .latest_backfilled_version
            .map(|v| non_negative(v, "latestBackfilledVersion"))
            .transpose()?;

        let bounds = self.store.first_and_last(&table_id)?;
        let action = classify(bounds.as_ref(), request.commit_info.as_ref())?;
        debug!("Table {} commit classified as {:?}", table_id, action);

        let kind = match (action, commit, bounds) {
            (CommitAction::First, Some(commit), _) => {
                self.first_commit(&table_id, commit, backfilled)?
            }
            (CommitAction::BackfillOnly, _, Some(bounds)) => {
                let up_to = backfilled.ok_or_else(|| {
                    CommitError::invalid_argument(
                        "latestBackfilledVersion is required when commitInfo is absent",
                    )
                })?;
                let outcome = self.reconciler.reconcile(
                    &table_id,
                    up_to,
                    &bounds.first,
                    bounds.last.commit_version,
                )?;
                info!(
                    "Table {} backfilled up to {} ({} commits trimmed)",
                    table_id, up_to, outcome.deleted
                );
                CommitKind::BackfillOnly
            }
            (CommitAction::Reboard { tombstone }, Some(commit), _) => {
                self.reboard(&table_id, tombstone, commit, backfilled)?
            }
            (CommitAction::Normal { last }, Some(commit), Some(bounds)) => {
                self.normal_commit(&table_id, last, &bounds.first, commit, backfilled)?
            }
            _ => return Err(CommitError::internal("commit classification mismatch")),
        };

        if let Some(metadata) = &request.metadata {
            self.metadata_after_commit(&table_id, metadata);
        }
        Ok(kind)
    }

    fn first_commit(
        &self,
        table_id: &TableId,
        commit: ValidatedCommit,
        backfilled: Option<u64>,
    ) -> Result<CommitKind> {
        if commit.disown {
            return Err(CommitError::invalid_argument(
                "cannot disown a table with no coordinated commits",
            ));
        }
        let version = commit.version;
        check_backfill_bound(backfilled, version)?;

        let entry = commit.into_entry(table_id);
        let outcome = self.store.append_commit(&entry, AppendPrecondition::Empty)?;
        expect_appended(outcome, table_id, version)?;
        info!("Table {} onboarded to coordinated commits at version {}", table_id, version);

        self.backfill_after_append(table_id, &entry, backfilled, version);
        Ok(CommitKind::First)
    }

    fn normal_commit(
        &self,
        table_id: &TableId,
        last: u64,
        first: &CommitLogEntry,
        commit: ValidatedCommit,
        backfilled: Option<u64>,
    ) -> Result<CommitKind> {
        let version = commit.version;
        let expected = last.saturating_add(1);
        if version != expected {
            return Err(CommitError::conflict(format!(
                "commit version {version} for table {table_id} does not match expected version {expected}"
            )));
        }
        check_backfill_bound(backfilled, version)?;
        self.check_ceiling(table_id, first, version, backfilled)?;

        let disown = commit.disown;
        let entry = commit.into_entry(table_id);
        let outcome = self
            .store
            .append_commit(&entry, AppendPrecondition::LastVersion(last))?;
        expect_appended(outcome, table_id, version)?;

        if disown {
            info!("Table {} disowned at version {}", table_id, version);
        } else {
            info!("Table {} committed version {}", table_id, version);
        }

        self.backfill_after_append(table_id, first, backfilled, version);
        Ok(if disown {
            CommitKind::Disown
        } else {
            CommitKind::Normal
        })
    }

    fn reboard(
        &self,
        table_id: &TableId,
        tombstone: u64,
        commit: ValidatedCommit,
        backfilled: Option<u64>,
    ) -> Result<CommitKind> {
        let version = commit.version;
        if version <= tombstone {
            return Err(CommitError::precondition_failed(format!(
                "reboard version {version} for table {table_id} must be greater than disowned version {tombstone}"
            )));
        }
        if commit.disown {
            return Err(CommitError::invalid_argument(
                "cannot disown a table that is already disowned",
            ));
        }
        check_backfill_bound(backfilled, version)?;

        let entry = commit.into_entry(table_id);
        let outcome = self.store.reboard_commit(tombstone, &entry)?;
        expect_appended(outcome, table_id, version)?;
        info!(
            "Table {} reboarded at version {} after disown at {}",
            table_id, version, tombstone
        );

        self.backfill_after_append(table_id, &entry, backfilled, version);
        Ok(CommitKind::Reboard)
    }

    /// Reject a commit that would leave more than `max_commits_per_table`
    /// commits waiting for backfill.
    fn check_ceiling(
        &self,
        table_id: &TableId,
        first: &CommitLogEntry,
        version: u64,
        backfilled: Option<u64>,
    ) -> Result<()> {
        let mut effective_first = if first.is_backfilled_latest_commit {
            first.commit_version.saturating_add(1)
        } else {
            first.commit_version
        };
        if let Some(up_to) = backfilled {
            effective_first = effective_first.max(up_to.saturating_add(1));
        }

        let pending = (version + 1).saturating_sub(effective_first);
        if pending > self.config.max_commits_per_table {
            return Err(CommitError::resource_exhausted(format!(
                "table {table_id} has {pending} commits awaiting backfill (limit {}); backfill before committing",
                self.config.max_commits_per_table
            )));
        }
        Ok(())
    }

    /// Run a backfill report carried by a commit that was already appended.
    /// The commit stands even if reconciliation fails.
    fn backfill_after_append(
        &self,
        table_id: &TableId,
        first: &CommitLogEntry,
        backfilled: Option<u64>,
        highest: u64,
    ) {
        let Some(up_to) = backfilled else {
            return;
        };
        match self.reconciler.reconcile(table_id, up_to, first, highest) {
            Ok(TrimOutcome { deleted, .. }) => {
                debug!("Table {} backfilled up to {} ({} trimmed)", table_id, up_to, deleted);
            }
            Err(e) => error!(
                "Backfill up to {} for table {} failed after commit {}: {}",
                up_to, table_id, highest, e
            ),
        }
    }

    /// Apply commit metadata once the version is durable. The commit stands
    /// even if the table update fails, so the failure is logged rather than
    /// returned. Returns whether the update landed.
    fn metadata_after_commit(&self, table_id: &TableId, metadata: &Metadata) -> bool {
        match self.apply_metadata(table_id, metadata) {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "Metadata update for table {} failed after its commit landed: {}",
                    table_id, e
                );
                false
            }
        }
    }

    fn apply_metadata(&self, table_id: &TableId, metadata: &Metadata) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let updated = self.store.update_table(table_id, |table| {
            if let Some(description) = &metadata.description {
                table.comment = Some(description.clone());
            }
            if let Some(properties) = &metadata.properties {
                table
                    .properties
                    .extend(properties.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            if let Some(schema) = &metadata.schema {
                table.columns.clone_from(&schema.columns);
            }
            table.updated_at = Some(now);
        })?;
        if updated.is_none() {
            return Err(CommitError::not_found(format!("table {table_id} not found")));
        }
        debug!("Applied commit metadata to table {}", table_id);
        Ok(())
    }
}

fn check_backfill_bound(backfilled: Option<u64>, version: u64) -> Result<()> {
    match backfilled {
        Some(up_to) if up_to > version => Err(CommitError::invalid_argument(format!(
            "latestBackfilledVersion {up_to} is beyond commit version {version}"
        ))),
        _ => Ok(()),
    }
}

fn expect_appended(outcome: AppendOutcome, table_id: &TableId, version: u64) -> Result<()> {
    match outcome {
        AppendOutcome::Appended => Ok(()),
        AppendOutcome::VersionExists(v) => Err(CommitError::conflict(format!(
            "commit version {v} already exists for table {table_id}"
        ))),
        AppendOutcome::UnexpectedHead { actual, .. } => Err(CommitError::conflict(format!(
            "commit version {version} for table {table_id} lost a race; latest version is now {}",
            actual.map_or_else(|| "none".to_string(), |v| v.to_string())
        ))),
    }
}
