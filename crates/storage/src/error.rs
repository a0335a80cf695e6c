use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("merge key must be the target's primary key, got {0}")]
    InvalidMergeKey(&'static str),

    #[error("core error: {0}")]
    Core(#[from] contactsync_core::CoreError),
}
