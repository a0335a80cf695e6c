use std::collections::BTreeSet;

use rusqlite::ffi;

use contactsync_core::{CanonicalRecord, ContactId};
use contactsync_storage::{
    ContactStore, MergeSpec, MergeStats, RowError, StorageError, TableName, TableRole,
};

/// Wraps a store and injects failures into selected calls. Everything not
/// armed is delegated unchanged.
#[derive(Debug)]
pub struct FlakyStore<S> {
    inner: S,
    fail_delete: bool,
    reject_ids: BTreeSet<ContactId>,
}

impl<S> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_delete: false,
            reject_ids: BTreeSet::new(),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Make every `delete_if_exists` fail with an I/O error.
    pub fn fail_deletes(&mut self, fail: bool) {
        self.fail_delete = fail;
    }

    /// Refuse rows with this id in `insert_rows`.
    pub fn reject(&mut self, id: ContactId) {
        self.reject_ids.insert(id);
    }

    pub fn clear_faults(&mut self) {
        self.fail_delete = false;
        self.reject_ids.clear();
    }
}

fn io_error(what: &str) -> StorageError {
    StorageError::Sqlite(rusqlite::Error::SqliteFailure(
        ffi::Error::new(ffi::SQLITE_IOERR),
        Some(format!("injected I/O error during {what}")),
    ))
}

impl<S: ContactStore> ContactStore for FlakyStore<S> {
    fn create_if_absent(&mut self, table: &TableName, role: TableRole) -> Result<bool, StorageError> {
        self.inner.create_if_absent(table, role)
    }

    fn insert_rows(
        &mut self,
        table: &TableName,
        rows: &[CanonicalRecord],
    ) -> Result<Vec<RowError>, StorageError> {
        if self.reject_ids.is_empty() {
            return self.inner.insert_rows(table, rows);
        }

        let mut errors = Vec::new();
        let mut accepted = Vec::new();
        let mut positions = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            if self.reject_ids.contains(&row.id) {
                errors.push(RowError {
                    index,
                    contact_id: Some(row.id),
                    reason: "injected rejection".to_string(),
                });
            } else {
                accepted.push(row.clone());
                positions.push(index);
            }
        }
        for mut err in self.inner.insert_rows(table, &accepted)? {
            err.index = positions[err.index];
            errors.push(err);
        }
        errors.sort_by_key(|e| e.index);
        Ok(errors)
    }

    fn execute_upsert_merge(&mut self, spec: &MergeSpec<'_>) -> Result<MergeStats, StorageError> {
        self.inner.execute_upsert_merge(spec)
    }

    fn delete_if_exists(&mut self, table: &TableName) -> Result<bool, StorageError> {
        if self.fail_delete {
            return Err(io_error("drop"));
        }
        self.inner.delete_if_exists(table)
    }

    fn table_exists(&self, table: &TableName) -> Result<bool, StorageError> {
        self.inner.table_exists(table)
    }

    fn row_count(&self, table: &TableName) -> Result<u64, StorageError> {
        self.inner.row_count(table)
    }

    fn get_contact(
        &self,
        table: &TableName,
        id: ContactId,
    ) -> Result<Option<CanonicalRecord>, StorageError> {
        self.inner.get_contact(table, id)
    }

    fn list_contacts(&self, table: &TableName) -> Result<Vec<CanonicalRecord>, StorageError> {
        self.inner.list_contacts(table)
    }

    fn table_digest(&self, table: &TableName) -> Result<blake3::Hash, StorageError> {
        self.inner.table_digest(table)
    }
}
