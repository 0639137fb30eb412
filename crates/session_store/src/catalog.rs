//! Session metadata catalog.
//!
//! The catalog only needs insert, find-by-id, find-by-status, and update-in-place.
//! Updates are plain read-modify-write; concurrent writers to the same record
//! resolve as last write wins.

use std::fs;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::clock::normalize_record_timestamp;
use crate::error::SessionStoreError;
use crate::schema::{SessionRecord, SessionStatus};

/// Storage seam for session records.
pub trait MetadataStore {
    fn insert(&mut self, record: &SessionRecord) -> Result<(), SessionStoreError>;

    fn find_by_id(&self, id: &str) -> Result<Option<SessionRecord>, SessionStoreError>;

    fn find_by_status(&self, status: SessionStatus)
        -> Result<Vec<SessionRecord>, SessionStoreError>;

    /// Overwrites the stored record with the same id. Returns false when no row matched.
    fn update(&mut self, record: &SessionRecord) -> Result<bool, SessionStoreError>;
}

/// SQLite-backed catalog using a single `chat_history` table.
pub struct SqliteMetadataStore {
    conn: Connection,
}

impl SqliteMetadataStore {
    /// Opens (or creates) the catalog database, creating its parent directory and table.
    pub fn open(db_path: &Path) -> Result<Self, SessionStoreError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| {
                SessionStoreError::io("creating session database directory", parent, source)
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|source| SessionStoreError::database("opening session database", source))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, SessionStoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|source| SessionStoreError::database("opening in-memory database", source))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, SessionStoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS chat_history (
                id TEXT PRIMARY KEY NOT NULL,
                name TEXT NOT NULL,
                created TEXT NOT NULL,
                updated TEXT NOT NULL,
                folder TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active'
            )",
            [],
        )
        .map_err(|source| SessionStoreError::database("creating chat_history table", source))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_chat_history_status ON chat_history(status)",
            [],
        )
        .map_err(|source| SessionStoreError::database("creating status index", source))?;

        Ok(Self { conn })
    }
}

impl MetadataStore for SqliteMetadataStore {
    fn insert(&mut self, record: &SessionRecord) -> Result<(), SessionStoreError> {
        self.conn
            .execute(
                "INSERT INTO chat_history (id, name, created, updated, folder, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.id,
                    record.name,
                    record.created,
                    record.updated,
                    record.folder,
                    record.status.as_str(),
                ],
            )
            .map_err(|source| SessionStoreError::database("inserting session record", source))?;

        Ok(())
    }

    fn find_by_id(&self, id: &str) -> Result<Option<SessionRecord>, SessionStoreError> {
        let raw = self
            .conn
            .query_row(
                "SELECT id, name, created, updated, folder, status
                 FROM chat_history WHERE id = ?1",
                params![id],
                RawRecord::from_row,
            )
            .optional()
            .map_err(|source| SessionStoreError::database("finding session record", source))?;

        raw.map(RawRecord::into_record).transpose()
    }

    fn find_by_status(
        &self,
        status: SessionStatus,
    ) -> Result<Vec<SessionRecord>, SessionStoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, created, updated, folder, status
                 FROM chat_history WHERE status = ?1
                 ORDER BY created ASC, rowid ASC",
            )
            .map_err(|source| SessionStoreError::database("preparing status query", source))?;

        let raw_records = stmt
            .query_map(params![status.as_str()], RawRecord::from_row)
            .map_err(|source| SessionStoreError::database("querying sessions by status", source))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| SessionStoreError::database("reading session rows", source))?;

        raw_records
            .into_iter()
            .map(RawRecord::into_record)
            .collect()
    }

    fn update(&mut self, record: &SessionRecord) -> Result<bool, SessionStoreError> {
        let changed = self
            .conn
            .execute(
                "UPDATE chat_history SET name = ?2, updated = ?3, status = ?4 WHERE id = ?1",
                params![
                    record.id,
                    record.name,
                    record.updated,
                    record.status.as_str(),
                ],
            )
            .map_err(|source| SessionStoreError::database("updating session record", source))?;

        Ok(changed > 0)
    }
}

struct RawRecord {
    id: String,
    name: String,
    created: String,
    updated: String,
    folder: String,
    status: String,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            created: row.get(2)?,
            updated: row.get(3)?,
            folder: row.get(4)?,
            status: row.get(5)?,
        })
    }

    fn into_record(self) -> Result<SessionRecord, SessionStoreError> {
        let status =
            self.status
                .parse::<SessionStatus>()
                .map_err(|_| SessionStoreError::UnknownStatus {
                    id: self.id.clone(),
                    value: self.status.clone(),
                })?;

        let created = record_timestamp(&self.id, "created", &self.created)?;
        let updated = record_timestamp(&self.id, "updated", &self.updated)?;

        Ok(SessionRecord {
            id: self.id,
            name: self.name,
            created,
            updated,
            folder: self.folder,
            status,
        })
    }
}

fn record_timestamp(
    id: &str,
    field: &'static str,
    value: &str,
) -> Result<String, SessionStoreError> {
    normalize_record_timestamp(value).ok_or_else(|| SessionStoreError::InvalidRecordTimestamp {
        id: id.to_string(),
        field,
        value: value.to_string(),
    })
}
