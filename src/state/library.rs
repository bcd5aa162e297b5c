use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use super::cache::Cache;
use super::data::FileRecord;
use crate::error::{ArchiveError, Result};

/// The authoritative registry of managed files.
///
/// Every single call is atomic on persistent storage. Callers holding a
/// [`Cache`] re-apply the same mutation to it after a successful call;
/// the store never reaches into a caller's cache.
pub trait RegistryStore {
    /// Read every record into a fresh in-memory mirror
    fn load_cache(&self) -> Result<Cache>;

    /// Add a new record. Fails with `DuplicateId` if the id is taken.
    fn insert(&mut self, record: &FileRecord) -> Result<()>;

    /// Replace the record at `id` with the mutator's result and return it.
    fn update(
        &mut self,
        id: &str,
        mutator: &mut dyn FnMut(&mut FileRecord),
    ) -> Result<FileRecord>;

    /// Remove a record. Fails with `NotFound` if absent.
    fn delete(&mut self, id: &str) -> Result<()>;

    fn select_by_id(&self, id: &str) -> Result<FileRecord>;

    fn count(&self) -> Result<u64>;
}

/// The Library keeps the registry in a SQLite table `id -> JSON record`.
pub struct Library {
    conn: Connection,
    db_path: PathBuf,
}

impl Library {
    /// Create a new registry at `path`.
    ///
    /// Creating over an existing file is an error, never a silent merge.
    pub fn create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Err(ArchiveError::Storage(format!(
                "registry already exists: {}",
                path.display()
            )));
        }
        let conn = Connection::open(path)?;
        conn.execute(
            "CREATE TABLE files (
                id      TEXT PRIMARY KEY NOT NULL,
                data    TEXT NOT NULL
            )",
            [],
        )?;
        info!(path = %path.display(), "registry created");
        Self::with_connection(conn, path)
    }

    /// Open an existing registry. A missing file is an error, not a create.
    pub fn open(path: &Path) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags).map_err(|e| {
            ArchiveError::Storage(format!("cannot open registry {}: {e}", path.display()))
        })?;

        let has_table: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'files'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        if has_table.is_none() {
            return Err(ArchiveError::Storage(format!(
                "{} is not a file registry",
                path.display()
            )));
        }
        debug!(path = %path.display(), "registry opened");
        Self::with_connection(conn, path)
    }

    fn with_connection(conn: Connection, path: &Path) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(1))?;
        Ok(Library {
            conn,
            db_path: path.to_path_buf(),
        })
    }

    /// Get the path to the database file
    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    fn get_raw(conn: &Connection, id: &str) -> Result<Option<FileRecord>> {
        let data: Option<String> = conn
            .query_row("SELECT data FROM files WHERE id = ?1", [id], |row| row.get(0))
            .optional()?;
        match data {
            Some(json) => Ok(Some(FileRecord::from_json(&json)?)),
            None => Ok(None),
        }
    }
}

impl RegistryStore for Library {
    fn load_cache(&self) -> Result<Cache> {
        let mut stmt = self.conn.prepare("SELECT data FROM files")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut cache = Cache::default();
        for json in rows {
            cache.apply_insert(FileRecord::from_json(&json?)?);
        }
        debug!(records = cache.len(), "cache loaded");
        Ok(cache)
    }

    fn insert(&mut self, record: &FileRecord) -> Result<()> {
        let json = record.to_json()?;
        // Immediate: the write lock is held from the existence check on
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if let Some(existing) = Self::get_raw(&tx, &record.id)? {
            return Err(ArchiveError::DuplicateId {
                id: record.id.clone(),
                filename: existing.filename,
            });
        }

        let result = tx.execute(
            "INSERT INTO files (id, data) VALUES (?1, ?2)",
            params![record.id, json],
        );
        match result {
            Ok(_) => {
                tx.commit()?;
                debug!(id = %record.id, filename = %record.filename, "record inserted");
                Ok(())
            }
            // Check if this is a UNIQUE constraint violation (duplicate id)
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(ArchiveError::DuplicateId {
                    id: record.id.clone(),
                    filename: String::new(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn update(
        &mut self,
        id: &str,
        mutator: &mut dyn FnMut(&mut FileRecord),
    ) -> Result<FileRecord> {
        let tx = self.conn.transaction()?;
        let mut record =
            Self::get_raw(&tx, id)?.ok_or_else(|| ArchiveError::NotFound(id.to_string()))?;

        mutator(&mut record);
        if record.id != id {
            // Changing the key goes through insert + delete (rename)
            return Err(ArchiveError::Config(format!(
                "update of {id} tried to change the id to {}",
                record.id
            )));
        }

        tx.execute(
            "UPDATE files SET data = ?1 WHERE id = ?2",
            params![record.to_json()?, id],
        )?;
        tx.commit()?;
        debug!(id = %id, "record updated");
        Ok(record)
    }

    fn delete(&mut self, id: &str) -> Result<()> {
        let n = self.conn.execute("DELETE FROM files WHERE id = ?1", [id])?;
        if n == 0 {
            return Err(ArchiveError::NotFound(id.to_string()));
        }
        debug!(id = %id, "record deleted");
        Ok(())
    }

    fn select_by_id(&self, id: &str) -> Result<FileRecord> {
        Self::get_raw(&self.conn, id)?.ok_or_else(|| ArchiveError::NotFound(id.to_string()))
    }

    fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("db_path", &self.db_path)
            .finish()
    }
}
