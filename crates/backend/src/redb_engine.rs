//! redb engine adapter.
//!
//! All keys and values live in a single `entries` table of raw bytes. Every
//! `put` is its own write transaction committed with redb's default
//! (immediate) durability, so a write is visible to later reads in this or
//! any future process once `put` returns.
//!
//! redb takes an exclusive lock on its file. A second `Database` for the same
//! file in this process fails with `DatabaseAlreadyOpen`, which is why
//! handles are shared through the registry instead of opened per caller.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use redb::{Database, DatabaseError, ReadableTable, StorageError, TableDefinition};
use snafu::ResultExt;

use crate::{
    engine::KeyValueEngine,
    error::{
        Error, RedbCommitSnafu, RedbStorageSnafu, RedbTableSnafu, RedbTransactionSnafu, Result,
    },
    kind::BackendKind,
    options::BackendOptions,
};

/// Key/value table: raw key bytes → raw value bytes.
const ENTRIES: TableDefinition<'static, &'static [u8], &'static [u8]> =
    TableDefinition::new("entries");

/// Handle to a redb database inside a store directory.
///
/// Cloning shares the underlying database.
#[derive(Clone)]
pub struct RedbEngine {
    db: Arc<Database>,
    path: PathBuf,
}

impl RedbEngine {
    /// Opens (or creates) the redb file inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineUnavailable`] if the file is locked by another
    /// handle, [`Error::EngineCorrupt`] if redb cannot read it, or a wrapped
    /// redb error if the entries table cannot be created.
    pub fn open(dir: &Path, options: &BackendOptions) -> Result<Self> {
        let file = BackendKind::Redb.data_file(dir);
        let db = Database::builder()
            .set_cache_size(options.cache_size_bytes)
            .create(&file)
            .map_err(|err| open_error(dir, err))?;

        // Create the table up front so read transactions never see it missing.
        let txn = db.begin_write().context(RedbTransactionSnafu)?;
        txn.open_table(ENTRIES).context(RedbTableSnafu)?;
        txn.commit().context(RedbCommitSnafu)?;

        Ok(Self { db: Arc::new(db), path: dir.to_path_buf() })
    }

    /// Store directory this engine was opened in.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether both handles share one underlying database.
    pub fn same_handle(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.db, &other.db)
    }
}

impl KeyValueEngine for RedbEngine {
    fn kind(&self) -> BackendKind {
        BackendKind::Redb
    }

    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let txn = self.db.begin_read().context(RedbTransactionSnafu)?;
        let table = txn.open_table(ENTRIES).context(RedbTableSnafu)?;
        match table.get(key).context(RedbStorageSnafu)? {
            Some(value) => Ok(value.value().to_vec()),
            None => Err(Error::key_not_found(key)),
        }
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.put_many(&[(key, value)])
    }

    fn put_many(&self, entries: &[(&[u8], &[u8])]) -> Result<()> {
        let txn = self.db.begin_write().context(RedbTransactionSnafu)?;
        {
            let mut table = txn.open_table(ENTRIES).context(RedbTableSnafu)?;
            for (key, value) in entries {
                table.insert(*key, *value).context(RedbStorageSnafu)?;
            }
        }
        txn.commit().context(RedbCommitSnafu)?;
        Ok(())
    }
}

/// Maps a redb open failure onto the engine error taxonomy.
fn open_error(dir: &Path, err: DatabaseError) -> Error {
    let path = dir.display().to_string();
    match err {
        DatabaseError::DatabaseAlreadyOpen => Error::EngineUnavailable {
            kind: BackendKind::Redb,
            path,
            reason: "database file is locked by another handle".to_string(),
        },
        DatabaseError::Storage(StorageError::Io(source)) => Error::Io { source },
        other => Error::EngineCorrupt { kind: BackendKind::Redb, path, reason: other.to_string() },
    }
}
