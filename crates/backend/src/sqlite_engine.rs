//! SQLite engine adapter.
//!
//! Keys and values live in a `WITHOUT ROWID` table keyed by the raw key
//! bytes. The database runs in WAL mode so readers in other processes keep a
//! consistent snapshot while a writer commits. The busy timeout is zero:
//! `SQLITE_BUSY` and `SQLITE_LOCKED` surface immediately as
//! [`Error::Contention`] and the caller's retry policy decides how long to wait.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};

use crate::{
    engine::KeyValueEngine,
    error::{Error, Result},
    kind::BackendKind,
    options::BackendOptions,
};

const CREATE_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS entries (k BLOB PRIMARY KEY, v BLOB NOT NULL) WITHOUT ROWID";
const SELECT_VALUE: &str = "SELECT v FROM entries WHERE k = ?1";
const UPSERT_VALUE: &str = "INSERT OR REPLACE INTO entries (k, v) VALUES (?1, ?2)";

/// Handle to a SQLite database inside a store directory.
///
/// `rusqlite::Connection` is not `Sync`, so the connection sits behind a
/// mutex. Cloning shares the connection.
#[derive(Clone)]
pub struct SqliteEngine {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteEngine {
    /// Opens (or creates) the SQLite database inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineUnavailable`] if the file cannot be opened or is
    /// locked, [`Error::EngineCorrupt`] if it is not a readable SQLite
    /// database.
    pub fn open(dir: &Path, _options: &BackendOptions) -> Result<Self> {
        let file = BackendKind::Sqlite.data_file(dir);
        let conn = Connection::open(&file).map_err(|err| open_error(dir, err))?;
        conn.busy_timeout(Duration::ZERO).map_err(|err| open_error(dir, err))?;
        // Create the table before switching to WAL so the main file carries
        // the SQLite header that `is_valid` probes for.
        conn.execute_batch(CREATE_TABLE).map_err(|err| open_error(dir, err))?;
        // journal_mode returns the resulting mode as a row.
        conn.query_row("PRAGMA journal_mode=WAL", [], |_row| Ok(()))
            .map_err(|err| open_error(dir, err))?;

        Ok(Self { conn: Arc::new(Mutex::new(conn)), path: dir.to_path_buf() })
    }

    /// Store directory this engine was opened in.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether both handles share one underlying connection.
    pub fn same_handle(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.conn, &other.conn)
    }

    fn classify(&self, err: rusqlite::Error) -> Error {
        classify(&self.path, err)
    }
}

impl KeyValueEngine for SqliteEngine {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(SELECT_VALUE).map_err(|err| self.classify(err))?;
        let value: Option<Vec<u8>> = stmt
            .query_row(params![key], |row| row.get(0))
            .optional()
            .map_err(|err| self.classify(err))?;
        value.ok_or_else(|| Error::key_not_found(key))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(UPSERT_VALUE).map_err(|err| self.classify(err))?;
        stmt.execute(params![key, value]).map_err(|err| self.classify(err))?;
        Ok(())
    }

    fn put_many(&self, entries: &[(&[u8], &[u8])]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(|err| self.classify(err))?;
        {
            let mut stmt = tx.prepare_cached(UPSERT_VALUE).map_err(|err| self.classify(err))?;
            for (key, value) in entries {
                stmt.execute(params![key, value]).map_err(|err| self.classify(err))?;
            }
        }
        tx.commit().map_err(|err| self.classify(err))
    }
}

/// Maps a SQLite error onto the engine error taxonomy.
fn classify(dir: &Path, err: rusqlite::Error) -> Error {
    let code = match &err {
        rusqlite::Error::SqliteFailure(failure, _) => Some(failure.code),
        _ => None,
    };
    let path = dir.display().to_string();
    match code {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
            Error::Contention { kind: BackendKind::Sqlite, reason: err.to_string() }
        }
        Some(ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase) => {
            Error::EngineCorrupt { kind: BackendKind::Sqlite, path, reason: err.to_string() }
        }
        Some(ErrorCode::CannotOpen | ErrorCode::PermissionDenied) => {
            Error::EngineUnavailable { kind: BackendKind::Sqlite, path, reason: err.to_string() }
        }
        _ => Error::Sqlite { source: err },
    }
}

/// Open-time classification: contention while opening means another process
/// holds the database in an incompatible mode.
fn open_error(dir: &Path, err: rusqlite::Error) -> Error {
    match classify(dir, err) {
        Error::Contention { kind, reason } => {
            Error::EngineUnavailable { kind, path: dir.display().to_string(), reason }
        }
        other => other,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use dbarray_test_utils::TestDir;

    use super::*;

    #[test]
    fn test_put_then_get() {
        let dir = TestDir::new();
        let engine = SqliteEngine::open(dir.path(), &BackendOptions::default()).unwrap();

        engine.put(b"dtype", b"float32").unwrap();
        assert_eq!(engine.get(b"dtype").unwrap(), b"float32");
    }

    #[test]
    fn test_get_missing_key() {
        let dir = TestDir::new();
        let engine = SqliteEngine::open(dir.path(), &BackendOptions::default()).unwrap();

        let err = engine.get(&3i64.to_be_bytes()).unwrap_err();
        assert!(err.is_key_not_found(), "got: {err}");
    }

    #[test]
    fn test_put_overwrites_and_empty_value() {
        let dir = TestDir::new();
        let engine = SqliteEngine::open(dir.path(), &BackendOptions::default()).unwrap();

        engine.put(b"k", b"first").unwrap();
        engine.put(b"k", b"").unwrap();
        assert_eq!(engine.get(b"k").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_put_many_writes_all_entries() {
        let dir = TestDir::new();
        let engine = SqliteEngine::open(dir.path(), &BackendOptions::default()).unwrap();

        engine.put_many(&[(b"nrows".as_slice(), b"1".as_slice()), (b"ncols", b"2")]).unwrap();
        assert_eq!(engine.get(b"nrows").unwrap(), b"1");
        assert_eq!(engine.get(b"ncols").unwrap(), b"2");
    }

    #[test]
    fn test_creates_file_detected_as_sqlite() {
        let dir = TestDir::new();
        let _engine = SqliteEngine::open(dir.path(), &BackendOptions::default()).unwrap();

        assert!(BackendKind::Sqlite.is_valid(dir.path()));
        assert!(!BackendKind::Redb.is_valid(dir.path()));
    }

    #[test]
    fn test_data_survives_reopen() {
        let dir = TestDir::new();
        {
            let engine = SqliteEngine::open(dir.path(), &BackendOptions::default()).unwrap();
            engine.put(b"greeting", b"strhello").unwrap();
        }
        let engine = SqliteEngine::open(dir.path(), &BackendOptions::default()).unwrap();
        assert_eq!(engine.get(b"greeting").unwrap(), b"strhello");
    }

    #[test]
    fn test_write_lock_held_elsewhere_is_contention() {
        let dir = TestDir::new();
        let engine = SqliteEngine::open(dir.path(), &BackendOptions::default()).unwrap();
        let locker = Connection::open(BackendKind::Sqlite.data_file(dir.path())).unwrap();
        locker.execute_batch("BEGIN IMMEDIATE").unwrap();

        let err = engine.put(b"nrows", &1i64.to_be_bytes()).unwrap_err();
        assert!(matches!(err, Error::Contention { kind: BackendKind::Sqlite, .. }), "got: {err}");
        assert!(err.is_transient());
        // WAL readers do not wait for the writer.
        assert!(engine.get(b"nrows").unwrap_err().is_key_not_found());

        locker.execute_batch("COMMIT").unwrap();
        engine.put(b"nrows", &1i64.to_be_bytes()).unwrap();
        assert_eq!(engine.get(b"nrows").unwrap(), 1i64.to_be_bytes().to_vec());
    }

    #[test]
    fn test_not_a_database_is_corrupt() {
        let dir = TestDir::new();
        std::fs::write(dir.join(BackendKind::Sqlite.file_name()), vec![0x5A; 4096]).unwrap();

        let result = SqliteEngine::open(dir.path(), &BackendOptions::default());
        assert!(matches!(result, Err(Error::EngineCorrupt { .. })), "got: {:?}", result.err());
    }
}
