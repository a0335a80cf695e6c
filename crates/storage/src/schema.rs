use std::fmt;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

pub fn init_connection(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA cache_size = -32000;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    Ok(())
}

/// A validated SQL identifier naming a contacts table.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableName(String);

impl TableName {
    pub fn new(name: impl Into<String>) -> Result<Self, StorageError> {
        let name = name.into();
        let mut chars = name.chars();
        let valid_head = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        let valid_tail = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_head || !valid_tail || name.len() > 64 || name.starts_with("sqlite_") {
            return Err(StorageError::InvalidIdentifier(name));
        }
        Ok(Self(name))
    }

    /// Default persistent table.
    pub fn default_target() -> Self {
        Self("contacts".to_string())
    }

    /// Default staging location, shared by every run.
    pub fn default_staging() -> Self {
        Self("contacts_staging".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TableName {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TableName> for String {
    fn from(value: TableName) -> Self {
        value.0
    }
}

impl fmt::Debug for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableName({})", self.0)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Columns of the contact shape, shared by target and staging tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    Email,
    RegisteredAt,
    Locale,
    SourceUrl,
    Unsubscribed,
    Bounced,
    NeedsConfirmation,
    Fields,
    Tags,
}

impl Column {
    pub const ALL: [Column; 10] = [
        Column::Id,
        Column::Email,
        Column::RegisteredAt,
        Column::Locale,
        Column::SourceUrl,
        Column::Unsubscribed,
        Column::Bounced,
        Column::NeedsConfirmation,
        Column::Fields,
        Column::Tags,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Email => "email",
            Self::RegisteredAt => "registered_at",
            Self::Locale => "locale",
            Self::SourceUrl => "source_url",
            Self::Unsubscribed => "unsubscribed",
            Self::Bounced => "bounced",
            Self::NeedsConfirmation => "needs_confirmation",
            Self::Fields => "fields",
            Self::Tags => "tags",
        }
    }
}

/// Comma-separated column list in canonical order.
pub fn column_list() -> String {
    Column::ALL
        .iter()
        .map(Column::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Shared column constraints. Rows that violate them are rejected per row
/// by `insert_rows`.
const CONTACT_COLUMNS: &str = "
    email TEXT NOT NULL CHECK (length(trim(email)) > 0),
    registered_at TEXT NOT NULL CHECK (length(registered_at) = 27),
    locale TEXT,
    source_url TEXT,
    unsubscribed INTEGER CHECK (unsubscribed IN (0, 1)),
    bounced INTEGER CHECK (bounced IN (0, 1)),
    needs_confirmation INTEGER CHECK (needs_confirmation IN (0, 1)),
    fields TEXT NOT NULL,
    tags TEXT NOT NULL
";

/// Persistent mirror: one row per contact id.
pub fn target_ddl(table: &TableName) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY CHECK (id > 0),
            {CONTACT_COLUMNS}
        );"
    )
}

/// Staging batch: append-only, ids may repeat. `seq` records arrival order
/// and is the final tie-break in the merge.
pub fn staging_ddl(table: &TableName) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id INTEGER NOT NULL CHECK (id > 0),
            {CONTACT_COLUMNS}
        );
        CREATE INDEX IF NOT EXISTS idx_{table}_id ON {table} (id);"
    )
}
