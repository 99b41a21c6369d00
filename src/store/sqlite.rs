// SQLite implementation of the document index

use crate::error::{Error, Result};
use crate::store::{DocumentIndex, UpsertOutcome};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// Document index persisted in a SQLite database.
///
/// One logical index per `SqliteIndex` value; the schema rows record the
/// mapping/settings definitions the index was provisioned with.
pub struct SqliteIndex {
    index_name: String,
    conn: Mutex<Connection>,
}

impl SqliteIndex {
    /// Open (or create) the database file backing the index.
    pub fn open(db_path: impl AsRef<Path>, index_name: impl Into<String>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        Self::init_tables(&conn)?;
        Ok(Self {
            index_name: index_name.into(),
            conn: Mutex::new(conn),
        })
    }

    /// In-memory index for tests.
    pub fn in_memory(index_name: impl Into<String>) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_tables(&conn)?;
        Ok(Self {
            index_name: index_name.into(),
            conn: Mutex::new(conn),
        })
    }

    fn init_tables(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            -- Provisioned index schemas
            CREATE TABLE IF NOT EXISTS index_schemas (
                index_name TEXT PRIMARY KEY,
                mapping TEXT NOT NULL,
                settings TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            -- Documents, keyed by (index, id)
            CREATE TABLE IF NOT EXISTS documents (
                index_name TEXT NOT NULL,
                id TEXT NOT NULL,
                doc TEXT NOT NULL,
                created_at TEXT NOT NULL,
                modified_at TEXT NOT NULL,
                PRIMARY KEY (index_name, id)
            );
        "#,
        )?;
        Ok(())
    }

    fn is_constraint_violation(err: &rusqlite::Error) -> bool {
        matches!(
            err,
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

impl DocumentIndex for SqliteIndex {
    fn create_schema(&self, mapping: &str, settings: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        let result = conn.execute(
            "INSERT INTO index_schemas (index_name, mapping, settings, created_at)
             VALUES (?, ?, ?, ?)",
            [self.index_name.as_str(), mapping, settings, &now],
        );
        match result {
            Ok(_) => {
                info!(index = %self.index_name, "provisioned index schema");
                Ok(())
            }
            Err(e) if Self::is_constraint_violation(&e) => Err(Error::SchemaExists),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM index_schemas WHERE index_name = ?",
            [self.index_name.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn get_by_id(&self, id: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let doc = conn
            .query_row(
                "SELECT doc FROM documents WHERE index_name = ? AND id = ?",
                [self.index_name.as_str(), id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(doc)
    }

    fn upsert(&self, id: &str, doc: &str) -> Result<UpsertOutcome> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let existing = tx
            .query_row(
                "SELECT doc FROM documents WHERE index_name = ? AND id = ?",
                [self.index_name.as_str(), id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        let now = chrono::Utc::now().to_rfc3339();
        let outcome = match existing {
            None => {
                tx.execute(
                    "INSERT INTO documents (index_name, id, doc, created_at, modified_at)
                     VALUES (?, ?, ?, ?, ?)",
                    [self.index_name.as_str(), id, doc, &now, &now],
                )?;
                UpsertOutcome::Created
            }
            Some(current) if current == doc => UpsertOutcome::Noop,
            Some(_) => {
                tx.execute(
                    "UPDATE documents SET doc = ?, modified_at = ?
                     WHERE index_name = ? AND id = ?",
                    [doc, &now, self.index_name.as_str(), id],
                )?;
                UpsertOutcome::Updated
            }
        };
        tx.commit()?;
        Ok(outcome)
    }
}
