use contactsync_source::SourceError;
use contactsync_storage::{RowError, StorageError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("source fetch failed: {0}")]
    SourceFetch(#[from] SourceError),

    #[error("staging table {table} rejected {} of {attempted} rows", .rejected.len())]
    StagingWrite {
        table: String,
        attempted: usize,
        rejected: Vec<RowError>,
    },

    #[error("staging failed: {0}")]
    Staging(#[source] StorageError),

    #[error("merge failed, target left unchanged: {0}")]
    MergeFailed(#[source] StorageError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
