//! Reconciliation of a staged batch into the persistent contacts table.
//!
//! The merge runs in one store transaction:
//!
//! 1. Dedup the staging table on `id`. The row with the greatest
//!    `registered_at` survives; on equal timestamps the row staged last wins.
//!    Leftover rows from a run whose cleanup failed were staged earlier, so a
//!    fresh snapshot always beats them on a tie.
//! 2. Upsert the survivors: matched rows are overwritten column for column,
//!    unmatched ones inserted. Rows absent from the batch are never touched.
//!
//! A failure anywhere rolls the transaction back, so readers see the target
//! either before or after the whole batch.

use tracing::{Level, debug, enabled, info, instrument};

use contactsync_storage::{Column, ContactStore, MergeSpec, MergeStats, TableName};

use crate::error::SyncError;
use crate::staging::StagedBatch;

#[derive(Debug, Clone)]
pub struct MergeEngine {
    target: TableName,
    tie_break: Column,
}

impl MergeEngine {
    pub fn new(target: TableName) -> Self {
        Self {
            target,
            tie_break: Column::RegisteredAt,
        }
    }

    pub fn target(&self) -> &TableName {
        &self.target
    }

    pub fn tie_break(&self) -> Column {
        self.tie_break
    }

    #[instrument(level = "info", skip_all, fields(target = %self.target, source = %batch.table))]
    pub fn merge<S: ContactStore>(
        &self,
        store: &mut S,
        batch: &StagedBatch,
    ) -> Result<MergeStats, SyncError> {
        let spec = MergeSpec {
            target: &self.target,
            source: &batch.table,
            natural_key: Column::Id,
            tie_break: self.tie_break,
        };
        let stats = store
            .execute_upsert_merge(&spec)
            .map_err(SyncError::MergeFailed)?;

        info!(
            staged = stats.staged,
            distinct = stats.deduplicated,
            duplicates = stats.duplicates_dropped(),
            inserted = stats.inserted,
            updated = stats.updated,
            "merge committed"
        );

        // Diagnostics only; the merge is already committed.
        if enabled!(Level::DEBUG)
            && let (Ok(rows), Ok(digest)) = (
                store.row_count(&self.target),
                store.table_digest(&self.target),
            )
        {
            debug!(rows, digest = %digest.to_hex(), "target after merge");
        }
        Ok(stats)
    }
}
