use tracing::{info, instrument, warn};

use contactsync_core::CanonicalRecord;
use contactsync_storage::{ContactStore, RowError, TableName, TableRole};

use crate::error::SyncError;

/// Rejected rows logged individually before the rest are summarized.
const MAX_LOGGED_REJECTIONS: usize = 10;

/// A populated staging table, ready for the merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedBatch {
    pub table: TableName,
    /// Rows written by this run.
    pub written: usize,
    /// Rows already present when this run started staging.
    pub leftover: u64,
}

/// Lands normalized batches in the staging table. Append-only: duplicates
/// are kept for the merge to arbitrate.
#[derive(Debug, Clone)]
pub struct StagingSink {
    table: TableName,
}

impl StagingSink {
    pub fn new(table: TableName) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    pub fn land<S: ContactStore>(
        &self,
        store: &mut S,
        batch: &[CanonicalRecord],
    ) -> Result<StagedBatch, SyncError> {
        self.land_listing(store, batch, &[], Vec::new())
    }

    /// Land the decodable part of a fetched listing. `positions[i]` is the
    /// listing index of `batch[i]` (identity when empty), and `upstream`
    /// holds listing entries refused before staging. Any refusal fails the
    /// batch, with every rejection indexed by listing position.
    #[instrument(level = "info", skip_all, fields(table = %self.table, rows = batch.len()))]
    pub fn land_listing<S: ContactStore>(
        &self,
        store: &mut S,
        batch: &[CanonicalRecord],
        positions: &[usize],
        upstream: Vec<RowError>,
    ) -> Result<StagedBatch, SyncError> {
        let created = store
            .create_if_absent(&self.table, TableRole::Staging)
            .map_err(SyncError::Staging)?;
        let leftover = if created {
            0
        } else {
            store.row_count(&self.table).map_err(SyncError::Staging)?
        };
        if leftover > 0 {
            warn!(leftover, "staging table still holds rows from an earlier run");
        }

        let attempted = batch.len() + upstream.len();
        let mut rejected = upstream;
        for mut row in store
            .insert_rows(&self.table, batch)
            .map_err(SyncError::Staging)?
        {
            if let Some(&position) = positions.get(row.index) {
                row.index = position;
            }
            rejected.push(row);
        }
        if !rejected.is_empty() {
            rejected.sort_by_key(|row| row.index);
            for row in rejected.iter().take(MAX_LOGGED_REJECTIONS) {
                warn!(index = row.index, contact_id = ?row.contact_id, reason = %row.reason, "row rejected");
            }
            return Err(SyncError::StagingWrite {
                table: self.table.to_string(),
                attempted,
                rejected,
            });
        }

        info!(written = batch.len(), "batch staged");
        Ok(StagedBatch {
            table: self.table.clone(),
            written: batch.len(),
            leftover,
        })
    }
}
