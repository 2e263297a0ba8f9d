//! `SQLite`-backed identity store.

use super::{acquire_lock, configure_connection, record_operation_metrics};
use crate::models::EnrolledIdentity;
use crate::storage::traits::{IdentityRecord, IdentityStore};
use crate::{Error, Result};
use rusqlite::{Connection, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::instrument;

const BACKEND: &str = "sqlite";

/// Identity store persisted in a `SQLite` database.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE faces (
///     name TEXT PRIMARY KEY,
///     encoding BLOB NOT NULL,
///     emergency_contact TEXT,
///     enrolled_at INTEGER NOT NULL
/// )
/// ```
///
/// Databases created by older tooling have a `faces(name, encoding,
/// emergency_contact)` table with no key. Those are opened as-is: an
/// `enrolled_at` column is added, rows are listed in insertion order, and
/// writes replace every row with the same name.
///
/// The connection is released when the store is dropped or [`close`](Self::close)d.
#[derive(Debug)]
pub struct SqliteIdentityStore {
    /// Protected by a mutex because `rusqlite::Connection` is not `Sync`.
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteIdentityStore {
    /// Opens (creating if needed) the store at `db_path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the database cannot be opened or
    /// its schema cannot be prepared.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::StoreUnavailable(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let conn = Connection::open(&db_path).map_err(|e| {
            Error::StoreUnavailable(format!("cannot open {}: {e}", db_path.display()))
        })?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates a store backed by a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the database cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::StoreUnavailable(format!("cannot open in-memory db: {e}")))?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Closes the connection, reporting any error `SQLite` raises on close.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the connection does not close cleanly.
    pub fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        conn.close().map_err(|(_, e)| Error::OperationFailed {
            operation: "close_identity_store".to_string(),
            cause: e.to_string(),
        })
    }

    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        configure_connection(&conn).map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS faces (
                name TEXT PRIMARY KEY,
                encoding BLOB NOT NULL,
                emergency_contact TEXT,
                enrolled_at INTEGER NOT NULL
            )",
            [],
        )
        .map_err(|e| Error::StoreUnavailable(format!("cannot create faces table: {e}")))?;

        if !Self::has_column(&conn, "enrolled_at")? {
            tracing::info!("upgrading legacy faces table with enrolled_at column");
            conn.execute("ALTER TABLE faces ADD COLUMN enrolled_at INTEGER", [])
                .map_err(|e| {
                    Error::StoreUnavailable(format!("cannot upgrade faces table: {e}"))
                })?;
        }

        // Legacy tables have no primary key; the index keeps lookups by name cheap.
        if let Err(e) = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_faces_name ON faces(name)",
            [],
        ) {
            tracing::warn!(error = %e, "cannot create faces name index, lookups will scan");
        }

        Ok(())
    }

    fn has_column(conn: &Connection, column: &str) -> Result<bool> {
        let mut stmt = conn
            .prepare("SELECT name FROM pragma_table_info('faces')")
            .map_err(|e| Error::StoreUnavailable(format!("cannot inspect faces table: {e}")))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| Error::StoreUnavailable(format!("cannot inspect faces table: {e}")))?;

        for name in names {
            let name =
                name.map_err(|e| Error::StoreUnavailable(format!("cannot inspect faces table: {e}")))?;
            if name == column {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn query_records(conn: &Connection) -> Result<Vec<IdentityRecord>> {
        let mut stmt = conn
            .prepare(
                "SELECT name, encoding, emergency_contact, enrolled_at
                 FROM faces ORDER BY rowid",
            )
            .map_err(|e| Error::OperationFailed {
                operation: "prepare_list_faces".to_string(),
                cause: e.to_string(),
            })?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, Option<Vec<u8>>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                ))
            })
            .map_err(|e| Error::OperationFailed {
                operation: "list_faces".to_string(),
                cause: e.to_string(),
            })?;

        let mut records = Vec::new();
        for row in rows {
            let (name, encoding, emergency_contact, enrolled_at) =
                row.map_err(|e| Error::OperationFailed {
                    operation: "read_face_row".to_string(),
                    cause: e.to_string(),
                })?;

            let Some(name) = name else {
                tracing::warn!("skipping face row with no name");
                continue;
            };

            records.push(IdentityRecord {
                name,
                encoding: encoding.unwrap_or_default(),
                emergency_contact,
                enrolled_at,
            });
        }
        Ok(records)
    }
}

impl IdentityStore for SqliteIdentityStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    #[instrument(skip(self), fields(operation = "list_all", backend = BACKEND))]
    fn list_all(&self) -> Result<Vec<IdentityRecord>> {
        let start = Instant::now();
        let result = {
            let conn = acquire_lock(&self.conn);
            Self::query_records(&conn)
        };

        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics(BACKEND, "list_all", start, status);
        result
    }

    #[instrument(skip(self, identity), fields(operation = "upsert", backend = BACKEND, identity = %identity.name))]
    fn upsert(&self, identity: &EnrolledIdentity) -> Result<()> {
        let start = Instant::now();
        let enrolled_at = identity
            .enrolled_at
            .unwrap_or_else(chrono::Utc::now)
            .timestamp();
        let record = IdentityRecord::from_identity(identity, enrolled_at);

        let result = (|| {
            let mut conn = acquire_lock(&self.conn);
            let tx = conn.transaction().map_err(|e| Error::OperationFailed {
                operation: "begin_transaction".to_string(),
                cause: e.to_string(),
            })?;

            // Delete-then-insert also collapses duplicate rows in legacy tables.
            tx.execute("DELETE FROM faces WHERE name = ?1", params![record.name])
                .map_err(|e| Error::OperationFailed {
                    operation: "delete_face".to_string(),
                    cause: e.to_string(),
                })?;
            tx.execute(
                "INSERT INTO faces (name, encoding, emergency_contact, enrolled_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.name,
                    record.encoding,
                    record.emergency_contact,
                    record.enrolled_at
                ],
            )
            .map_err(|e| Error::OperationFailed {
                operation: "insert_face".to_string(),
                cause: e.to_string(),
            })?;

            tx.commit().map_err(|e| Error::OperationFailed {
                operation: "commit_transaction".to_string(),
                cause: e.to_string(),
            })
        })();

        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics(BACKEND, "upsert", start, status);
        result
    }

    #[instrument(skip(self), fields(operation = "remove", backend = BACKEND))]
    fn remove(&self, name: &str) -> Result<bool> {
        let start = Instant::now();
        let result = {
            let conn = acquire_lock(&self.conn);
            conn.execute("DELETE FROM faces WHERE name = ?1", params![name])
                .map(|removed| removed > 0)
                .map_err(|e| Error::OperationFailed {
                    operation: "delete_face".to_string(),
                    cause: e.to_string(),
                })
        };

        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics(BACKEND, "remove", start, status);
        result
    }

    #[instrument(skip(self), fields(operation = "get", backend = BACKEND))]
    fn get(&self, name: &str) -> Result<Option<IdentityRecord>> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            let mut stmt = conn
                .prepare(
                    "SELECT encoding, emergency_contact, enrolled_at FROM faces
                     WHERE name = ?1 ORDER BY rowid DESC LIMIT 1",
                )
                .map_err(|e| Error::OperationFailed {
                    operation: "prepare_get_face".to_string(),
                    cause: e.to_string(),
                })?;
            let mut rows = stmt.query(params![name]).map_err(|e| Error::OperationFailed {
                operation: "get_face".to_string(),
                cause: e.to_string(),
            })?;

            let Some(row) = rows.next().map_err(|e| Error::OperationFailed {
                operation: "get_face".to_string(),
                cause: e.to_string(),
            })?
            else {
                return Ok(None);
            };

            let read = |e: rusqlite::Error| Error::OperationFailed {
                operation: "read_face_row".to_string(),
                cause: e.to_string(),
            };
            Ok(Some(IdentityRecord {
                name: name.to_string(),
                encoding: row.get::<_, Option<Vec<u8>>>(0).map_err(read)?.unwrap_or_default(),
                emergency_contact: row.get(1).map_err(read)?,
                enrolled_at: row.get(2).map_err(read)?,
            }))
        })();

        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics(BACKEND, "get", start, status);
        result
    }

    fn count(&self) -> Result<usize> {
        let conn = acquire_lock(&self.conn);
        conn.query_row("SELECT COUNT(DISTINCT name) FROM faces", [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|n| usize::try_from(n).unwrap_or(0))
        .map_err(|e| Error::OperationFailed {
            operation: "count_faces".to_string(),
            cause: e.to_string(),
        })
    }

    fn close(self: Box<Self>) -> Result<()> {
        Self::close(*self)
    }
}
