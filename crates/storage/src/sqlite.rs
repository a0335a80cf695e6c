use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, instrument};

use contactsync_core::record::{format_timestamp, parse_timestamp};
use contactsync_core::{CanonicalRecord, ContactFields, ContactId, Tags};

use crate::error::StorageError;
use crate::schema::{Column, TableName, column_list, staging_ddl, target_ddl};
use crate::traits::{ContactStore, MergeSpec, MergeStats, RowError, TableRole};

/// Temp table holding the deduplicated batch for the duration of a merge.
const SURVIVORS: &str = "temp.merge_survivors";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_connection(&conn)?;
        Ok(Self { conn })
    }

    /// Raw connection, for diagnostics and fault injection in tests.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn require_table(&self, table: &TableName) -> Result<(), StorageError> {
        if self.table_exists(table)? {
            Ok(())
        } else {
            Err(StorageError::TableNotFound(table.to_string()))
        }
    }

    fn count(&self, sql: &str) -> Result<u64, StorageError> {
        let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(n as u64)
    }
}

fn read_contact(row: &rusqlite::Row<'_>) -> Result<CanonicalRecord, StorageError> {
    let registered_at: String = row.get(2)?;
    let fields: String = row.get(8)?;
    let tags: String = row.get(9)?;

    Ok(CanonicalRecord {
        id: ContactId::new(row.get(0)?),
        email: row.get(1)?,
        registered_at: parse_timestamp(&registered_at)?,
        locale: row.get(3)?,
        source_url: row.get(4)?,
        unsubscribed: row.get(5)?,
        bounced: row.get(6)?,
        needs_confirmation: row.get(7)?,
        fields: ContactFields::from_json(&fields)?,
        tags: Tags::from_json(&tags)?,
    })
}

fn hash_value(hasher: &mut blake3::Hasher, value: ValueRef<'_>) {
    match value {
        ValueRef::Null => {
            hasher.update(&[0]);
        }
        ValueRef::Integer(n) => {
            hasher.update(&[1]);
            hasher.update(&n.to_le_bytes());
        }
        ValueRef::Real(f) => {
            hasher.update(&[2]);
            hasher.update(&f.to_bits().to_le_bytes());
        }
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            let tag = if matches!(value, ValueRef::Text(_)) { 3 } else { 4 };
            hasher.update(&[tag]);
            hasher.update(&(bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }
    }
}

impl ContactStore for SqliteStore {
    #[instrument(level = "debug", skip(self), fields(table = %table, role = role.as_str()))]
    fn create_if_absent(
        &mut self,
        table: &TableName,
        role: TableRole,
    ) -> Result<bool, StorageError> {
        if self.table_exists(table)? {
            return Ok(false);
        }
        let ddl = match role {
            TableRole::Target => target_ddl(table),
            TableRole::Staging => staging_ddl(table),
        };
        self.conn.execute_batch(&ddl)?;
        debug!("created {} table", role.as_str());
        Ok(true)
    }

    #[instrument(level = "debug", skip(self, rows), fields(table = %table, rows = rows.len()))]
    fn insert_rows(
        &mut self,
        table: &TableName,
        rows: &[CanonicalRecord],
    ) -> Result<Vec<RowError>, StorageError> {
        self.require_table(table)?;
        let sql = format!(
            "INSERT INTO main.{table} ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            column_list()
        );

        let tx = self.conn.transaction()?;
        let mut rejected = Vec::new();
        {
            let mut stmt = tx.prepare(&sql)?;
            for (index, record) in rows.iter().enumerate() {
                let result = stmt.execute(rusqlite::params![
                    record.id.get(),
                    record.email,
                    format_timestamp(&record.registered_at),
                    record.locale,
                    record.source_url,
                    record.unsubscribed,
                    record.bounced,
                    record.needs_confirmation,
                    record.fields.to_json()?,
                    record.tags.to_json()?,
                ]);
                match result {
                    Ok(_) => {}
                    Err(rusqlite::Error::SqliteFailure(err, msg))
                        if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                    {
                        rejected.push(RowError {
                            index,
                            contact_id: Some(record.id),
                            reason: msg.unwrap_or_else(|| err.to_string()),
                        });
                    }
                    Err(e) => return Err(StorageError::Sqlite(e)),
                }
            }
        }
        tx.commit()?;

        debug!(
            accepted = rows.len() - rejected.len(),
            rejected = rejected.len(),
            "rows inserted"
        );
        Ok(rejected)
    }

    #[instrument(level = "debug", skip(self, spec), fields(target = %spec.target, source = %spec.source))]
    fn execute_upsert_merge(&mut self, spec: &MergeSpec<'_>) -> Result<MergeStats, StorageError> {
        if spec.natural_key != Column::Id {
            return Err(StorageError::InvalidMergeKey(spec.natural_key.as_str()));
        }
        self.require_table(spec.target)?;
        self.require_table(spec.source)?;

        let cols = column_list();
        let key = spec.natural_key.as_str();
        let tie = spec.tie_break.as_str();
        let (target, source) = (spec.target, spec.source);
        let assignments = Column::ALL
            .iter()
            .filter(|c| **c != spec.natural_key)
            .map(|c| format!("{0} = excluded.{0}", c.as_str()))
            .collect::<Vec<_>>()
            .join(", ");

        // IMMEDIATE takes the write lock up front so no other writer can
        // slip in between the dedup and the apply.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let staged: i64 =
            tx.query_row(&format!("SELECT COUNT(*) FROM main.{source}"), [], |row| row.get(0))?;

        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {SURVIVORS};
             CREATE TEMP TABLE merge_survivors AS
             SELECT {cols} FROM (
                 SELECT {cols}, ROW_NUMBER() OVER (
                     PARTITION BY {key} ORDER BY {tie} DESC, seq DESC
                 ) AS survivor_rank
                 FROM main.{source}
             )
             WHERE survivor_rank = 1;"
        ))?;

        let deduplicated: i64 =
            tx.query_row(&format!("SELECT COUNT(*) FROM {SURVIVORS}"), [], |row| row.get(0))?;
        let updated: i64 = tx.query_row(
            &format!(
                "SELECT COUNT(*) FROM {SURVIVORS} WHERE {key} IN (SELECT {key} FROM main.{target})"
            ),
            [],
            |row| row.get(0),
        )?;

        // `WHERE true` keeps SQLite from parsing ON CONFLICT as a join constraint.
        tx.execute(
            &format!(
                "INSERT INTO main.{target} ({cols})
                 SELECT {cols} FROM {SURVIVORS} WHERE true
                 ON CONFLICT({key}) DO UPDATE SET {assignments}"
            ),
            [],
        )?;

        tx.execute_batch(&format!("DROP TABLE {SURVIVORS};"))?;
        tx.commit()?;

        let stats = MergeStats {
            staged: staged as u64,
            deduplicated: deduplicated as u64,
            inserted: (deduplicated - updated) as u64,
            updated: updated as u64,
        };
        debug!(?stats, "merge committed");
        Ok(stats)
    }

    #[instrument(level = "debug", skip(self), fields(table = %table))]
    fn delete_if_exists(&mut self, table: &TableName) -> Result<bool, StorageError> {
        let existed = self.table_exists(table)?;
        self.conn
            .execute_batch(&format!("DROP TABLE IF EXISTS main.{table};"))?;
        Ok(existed)
    }

    fn table_exists(&self, table: &TableName) -> Result<bool, StorageError> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM main.sqlite_master WHERE type = 'table' AND name = ?1",
                [table.as_str()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn row_count(&self, table: &TableName) -> Result<u64, StorageError> {
        self.require_table(table)?;
        self.count(&format!("SELECT COUNT(*) FROM main.{table}"))
    }

    fn get_contact(
        &self,
        table: &TableName,
        id: ContactId,
    ) -> Result<Option<CanonicalRecord>, StorageError> {
        self.require_table(table)?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM main.{table} WHERE id = ?1 ORDER BY rowid DESC LIMIT 1",
            column_list()
        ))?;
        let mut rows = stmt.query([id.get()])?;
        match rows.next()? {
            Some(row) => Ok(Some(read_contact(row)?)),
            None => Ok(None),
        }
    }

    fn list_contacts(&self, table: &TableName) -> Result<Vec<CanonicalRecord>, StorageError> {
        self.require_table(table)?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM main.{table} ORDER BY id, rowid",
            column_list()
        ))?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(read_contact(row)?);
        }
        Ok(out)
    }

    fn table_digest(&self, table: &TableName) -> Result<blake3::Hash, StorageError> {
        self.require_table(table)?;
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM main.{table} ORDER BY id, rowid"))?;
        let column_count = stmt.column_count();
        let mut rows = stmt.query([])?;
        let mut hasher = blake3::Hasher::new();
        while let Some(row) = rows.next()? {
            for i in 0..column_count {
                hash_value(&mut hasher, row.get_ref(i)?);
            }
        }
        Ok(hasher.finalize())
    }
}
