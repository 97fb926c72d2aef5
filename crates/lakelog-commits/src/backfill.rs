//! Backfill reconciliation.
//!
//! A writer reports that every version up to `upTo` now exists in the
//! table's own log. The reconciler records the frontier and trims rows the
//! catalog no longer needs to retain. Trimming is best effort: each batch is
//! its own transaction, and a trim that runs out of attempts is reported
//! through [`TrimOutcome`] instead of failing the request.

use crate::error::CommitError;
use crate::metrics::CommitMetrics;
use lakelog_common::TableId;
use lakelog_common::config::CommitsConfig;
use lakelog_meta_store::{CommitLogEntry, MetaStore, MetaStoreResult};
use std::sync::Arc;
use tracing::{debug, error, warn};

type Result<T> = std::result::Result<T, CommitError>;

/// Result of one trim pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrimOutcome {
    /// Rows that should have been removed
    pub expected: u64,
    pub deleted: u64,
    /// Delete transactions attempted
    pub batches: u32,
    /// Every expected row is gone
    pub converged: bool,
}

impl TrimOutcome {
    const fn nothing_to_do() -> Self {
        Self {
            expected: 0,
            deleted: 0,
            batches: 0,
            converged: true,
        }
    }
}

/// Deletes one batch of retained commits. [`MetaStore`] is the production
/// implementation; each call is one transaction.
pub trait CommitTrimmer: Send + Sync {
    /// Delete at most `batch_size` entries `<= up_to`, returning the count.
    fn delete_batch(&self, table_id: &TableId, up_to: u64, batch_size: u64) -> MetaStoreResult<u64>;
}

impl CommitTrimmer for MetaStore {
    fn delete_batch(&self, table_id: &TableId, up_to: u64, batch_size: u64) -> MetaStoreResult<u64> {
        self.delete_commits_up_to(table_id, up_to, batch_size)
    }
}

pub struct BackfillReconciler {
    store: Arc<MetaStore>,
    trimmer: Arc<dyn CommitTrimmer>,
    config: CommitsConfig,
    metrics: Arc<CommitMetrics>,
}

impl BackfillReconciler {
    pub fn new(store: Arc<MetaStore>, config: CommitsConfig, metrics: Arc<CommitMetrics>) -> Self {
        let trimmer: Arc<dyn CommitTrimmer> = Arc::<MetaStore>::clone(&store);
        Self::with_trimmer(store, trimmer, config, metrics)
    }

    /// Build a reconciler whose trim batches go through `trimmer`
    pub fn with_trimmer(
        store: Arc<MetaStore>,
        trimmer: Arc<dyn CommitTrimmer>,
        config: CommitsConfig,
        metrics: Arc<CommitMetrics>,
    ) -> Self {
        Self {
            store,
            trimmer,
            config,
            metrics,
        }
    }

    /// Apply a backfill report.
    ///
    /// `first` is the lowest retained entry and `highest` the newest version
    /// the catalog has recorded for the table.
    ///
    /// # Errors
    /// `InvalidArgument` if `up_to` is beyond `highest`. Store failures while
    /// marking the frontier surface as `Internal`; trim failures never do.
    pub fn reconcile(
        &self,
        table_id: &TableId,
        up_to: u64,
        first: &CommitLogEntry,
        highest: u64,
    ) -> Result<TrimOutcome> {
        if up_to > highest {
            return Err(CommitError::invalid_argument(format!(
                "latestBackfilledVersion {up_to} is beyond the latest commit version {highest}"
            )));
        }

        // Everything is backfilled: keep the newest row as the frontier marker
        let bound = if up_to == highest {
            if !self.store.mark_backfilled(table_id, highest)? {
                // Trimmed by a concurrent report
                debug!("Frontier {} for table {} already gone", highest, table_id);
            }
            match up_to.checked_sub(1) {
                Some(bound) => bound,
                None => return Ok(TrimOutcome::nothing_to_do()),
            }
        } else {
            up_to
        };

        if bound < first.commit_version {
            debug!(
                "Backfill report {} for table {} is below retained version {}",
                up_to, table_id, first.commit_version
            );
            return Ok(TrimOutcome::nothing_to_do());
        }

        let expected = bound - first.commit_version + 1;
        let outcome = self.trim(table_id, bound, expected);
        self.metrics.record_trim(&outcome);
        Ok(outcome)
    }

    /// Delete rows `<= bound` in batches of at most `delete_batch_size`,
    /// attempting at most `delete_max_retries` transactions.
    ///
    /// `expected` comes from a snapshot taken before the trim, so a batch that
    /// deletes nothing means a concurrent trim already reached `bound`.
    pub fn trim(&self, table_id: &TableId, bound: u64, expected: u64) -> TrimOutcome {
        let mut outcome = TrimOutcome {
            expected,
            ..TrimOutcome::default()
        };
        let mut drained = false;

        while outcome.batches < self.config.delete_max_retries && outcome.deleted < expected {
            outcome.batches += 1;
            match self
                .trimmer
                .delete_batch(table_id, bound, self.config.delete_batch_size)
            {
                Ok(0) => {
                    drained = true;
                    break;
                }
                Ok(n) => outcome.deleted += n,
                Err(e) => {
                    warn!(
                        "Trim batch {} for table {} failed: {}",
                        outcome.batches, table_id, e
                    );
                }
            }
        }

        outcome.converged = drained || outcome.deleted >= expected;
        if outcome.converged {
            debug!(
                "Trimmed {} commits <= {} for table {} in {} batches",
                outcome.deleted, bound, table_id, outcome.batches
            );
        } else {
            error!(
                "Trim for table {} stopped after {} batches: deleted {} of {} commits <= {}",
                table_id, outcome.batches, outcome.deleted, expected, bound
            );
        }
        outcome
    }
}
