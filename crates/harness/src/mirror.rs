use std::path::Path;

use contactsync_core::{CanonicalRecord, ContactId, RawContact, RawTag};
use contactsync_engine::{StoreConfig, SyncPipeline, SyncReport};
use contactsync_storage::{ContactStore, SqliteStore, StorageError, TableName, TableRole};

use crate::source::ScriptedSource;
use crate::store::FlakyStore;

/// A full pipeline over a scripted source and a real SQLite store, with
/// the target table bootstrapped.
pub struct TestMirror {
    pipeline: SyncPipeline<ScriptedSource, FlakyStore<SqliteStore>>,
    config: StoreConfig,
}

impl TestMirror {
    pub fn new() -> Result<Self, StorageError> {
        Self::with_store(SqliteStore::open_in_memory()?)
    }

    pub fn open(path: &Path) -> Result<Self, StorageError> {
        Self::with_store(SqliteStore::open(path)?)
    }

    fn with_store(mut store: SqliteStore) -> Result<Self, StorageError> {
        let config = StoreConfig::default();
        store.create_if_absent(&config.target_table, TableRole::Target)?;
        let pipeline = SyncPipeline::new(ScriptedSource::new(), FlakyStore::new(store), &config);
        Ok(Self { pipeline, config })
    }

    pub fn set_snapshot(&mut self, contacts: Vec<RawContact>, tags: Vec<RawTag>) {
        self.pipeline.source_mut().set_snapshot(contacts, tags);
    }

    pub fn source_mut(&mut self) -> &mut ScriptedSource {
        self.pipeline.source_mut()
    }

    pub fn store(&self) -> &FlakyStore<SqliteStore> {
        self.pipeline.store()
    }

    pub fn store_mut(&mut self) -> &mut FlakyStore<SqliteStore> {
        self.pipeline.store_mut()
    }

    /// Raw connection, for arming triggers and other direct SQL.
    pub fn conn(&self) -> &rusqlite::Connection {
        self.store().inner().conn()
    }

    pub fn sync(&mut self) -> SyncReport {
        self.pipeline.run()
    }

    pub fn target(&self) -> &TableName {
        &self.config.target_table
    }

    pub fn staging(&self) -> &TableName {
        &self.config.staging_table
    }

    pub fn contact(&self, id: i64) -> Result<Option<CanonicalRecord>, StorageError> {
        self.store().get_contact(self.target(), ContactId::new(id))
    }

    pub fn contacts(&self) -> Result<Vec<CanonicalRecord>, StorageError> {
        self.store().list_contacts(self.target())
    }

    pub fn ids(&self) -> Result<Vec<i64>, StorageError> {
        Ok(self.contacts()?.iter().map(|c| c.id.get()).collect())
    }

    pub fn digest(&self) -> Result<blake3::Hash, StorageError> {
        self.store().table_digest(self.target())
    }

    pub fn staging_exists(&self) -> Result<bool, StorageError> {
        self.store().table_exists(self.staging())
    }
}
