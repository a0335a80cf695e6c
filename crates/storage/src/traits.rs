use contactsync_core::{CanonicalRecord, ContactId};

use crate::error::StorageError;
use crate::schema::{Column, TableName};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableRole {
    /// The persistent mirror, keyed by contact id.
    Target,
    /// The per-run landing area, ids may repeat.
    Staging,
}

impl TableRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Target => "target",
            Self::Staging => "staging",
        }
    }
}

/// A row the store refused during `insert_rows`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// Position of the row in the submitted batch. Pipeline reports use the
    /// position in the fetched listing instead.
    pub index: usize,
    /// Absent when the entry never yielded a readable id.
    pub contact_id: Option<ContactId>,
    pub reason: String,
}

/// Parameters of an upsert merge from a staging table into a target table.
#[derive(Debug, Clone)]
pub struct MergeSpec<'a> {
    pub target: &'a TableName,
    pub source: &'a TableName,
    pub natural_key: Column,
    pub tie_break: Column,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Rows present in the staging table, duplicates included.
    pub staged: u64,
    /// Distinct natural keys that survived dedup.
    pub deduplicated: u64,
    pub inserted: u64,
    pub updated: u64,
}

impl MergeStats {
    pub fn duplicates_dropped(&self) -> u64 {
        self.staged - self.deduplicated
    }
}

pub trait ContactStore {
    /// Create the table for `role` unless it exists. Returns true if created.
    fn create_if_absent(&mut self, table: &TableName, role: TableRole)
        -> Result<bool, StorageError>;

    /// Append rows one by one. Rows the store rejects are reported and
    /// skipped; the accepted ones stay written.
    fn insert_rows(
        &mut self,
        table: &TableName,
        rows: &[CanonicalRecord],
    ) -> Result<Vec<RowError>, StorageError>;

    /// Deduplicate `spec.source` on the natural key, keeping the greatest
    /// tie-break value (latest staged row on equal values), then upsert the
    /// survivors into `spec.target`. All or nothing.
    fn execute_upsert_merge(&mut self, spec: &MergeSpec<'_>) -> Result<MergeStats, StorageError>;

    /// Drop the table. Returns false if it did not exist.
    fn delete_if_exists(&mut self, table: &TableName) -> Result<bool, StorageError>;

    fn table_exists(&self, table: &TableName) -> Result<bool, StorageError>;

    fn row_count(&self, table: &TableName) -> Result<u64, StorageError>;

    fn get_contact(
        &self,
        table: &TableName,
        id: ContactId,
    ) -> Result<Option<CanonicalRecord>, StorageError>;

    /// All rows of a table; ordered by id, then staging order.
    fn list_contacts(&self, table: &TableName) -> Result<Vec<CanonicalRecord>, StorageError>;

    /// Digest over the stored column values of every row, in id order.
    fn table_digest(&self, table: &TableName) -> Result<blake3::Hash, StorageError>;
}
