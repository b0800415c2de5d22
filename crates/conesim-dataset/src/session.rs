//! Recorded session databases.
//!
//! A session is a single SQLite file holding one table per message stream.
//! Every stream table has the same layout:
//!
//! | column    | type    | description                                  |
//! |-----------|---------|----------------------------------------------|
//! | id        | INTEGER | Row id, assigned on insert                   |
//! | timestamp | INTEGER | Receive time (nanoseconds since the epoch)   |
//! | data      | BLOB    | Serialised message                           |
//!
//! Stream ids double as table names, so they are restricted to ASCII
//! letters, digits and `_`.
//!
//! # Example
//!
//! ```rust
//! use conesim_dataset::session::SessionDatabase;
//!
//! let db = SessionDatabase::open_in_memory().unwrap();
//! db.record("ground_truth_state", 1_000, b"{}").unwrap();
//! assert_eq!(db.message_count("ground_truth_state").unwrap(), 1);
//! ```

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, OptionalExtension, params};

use crate::DatasetError;

/// Handle to one session database.
pub struct SessionDatabase {
    conn: Connection,
    path: PathBuf,
}

impl SessionDatabase {
    /// Open an existing session read-only.
    ///
    /// Fails if `path` does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Open a session for writing, creating the file if needed.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Open a temporary in-memory session (useful for testing).
    pub fn open_in_memory() -> Result<Self, DatasetError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the table for `stream` if it does not exist yet.
    pub fn ensure_stream(&self, stream: &str) -> Result<(), DatasetError> {
        validate_stream_id(stream)?;
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS \"{stream}\" (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp INTEGER NOT NULL,
                data      BLOB    NOT NULL
            );"
        ))?;
        Ok(())
    }

    /// Append one message to `stream`, creating its table on first use.
    pub fn record(&self, stream: &str, timestamp: i64, data: &[u8]) -> Result<(), DatasetError> {
        self.ensure_stream(stream)?;
        self.conn.execute(
            &format!("INSERT INTO \"{stream}\" (timestamp, data) VALUES (?1, ?2)"),
            params![timestamp, data],
        )?;
        Ok(())
    }

    pub fn has_stream(&self, stream: &str) -> Result<bool, DatasetError> {
        validate_stream_id(stream)?;
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [stream],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Number of messages stored for `stream`.
    ///
    /// Returns [`DatasetError::MissingStream`] if the session has no table
    /// for it.
    pub fn message_count(&self, stream: &str) -> Result<u64, DatasetError> {
        self.require_stream(stream)?;
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM \"{stream}\""), [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn require_stream(&self, stream: &str) -> Result<(), DatasetError> {
        if self.has_stream(stream)? {
            Ok(())
        } else {
            Err(DatasetError::MissingStream(stream.to_string()))
        }
    }
}

/// Reject stream ids that cannot be used verbatim as a table name.
pub fn validate_stream_id(stream: &str) -> Result<(), DatasetError> {
    let valid = !stream.is_empty()
        && stream
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(DatasetError::InvalidStream(stream.to_string()))
    }
}
