//! The key-value contract every engine kind implements, and the closed
//! [`Engine`] union over the known kinds.

use std::path::Path;

use crate::{
    error::Result, kind::BackendKind, options::BackendOptions, redb_engine::RedbEngine,
    sqlite_engine::SqliteEngine,
};

/// Minimal get/put contract over one concrete key-value engine.
pub trait KeyValueEngine: Send + Sync {
    /// The kind of engine behind this handle.
    fn kind(&self) -> BackendKind;

    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `Error::KeyNotFound` if no value is stored under `key`, or
    /// `Error::Contention` on transient contention.
    fn get(&self, key: &[u8]) -> Result<Vec<u8>>;

    /// Creates or overwrites the value under `key`. The write is committed
    /// when this returns.
    ///
    /// # Errors
    ///
    /// Returns an engine error if the write cannot be committed.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Writes every entry in one native transaction: either all entries are
    /// committed or none are.
    ///
    /// # Errors
    ///
    /// Returns an engine error if the transaction cannot be committed.
    fn put_many(&self, entries: &[(&[u8], &[u8])]) -> Result<()>;
}

/// An open engine of one of the known kinds.
///
/// Cloning shares the underlying engine handle.
#[derive(Clone)]
pub enum Engine {
    /// redb database.
    Redb(RedbEngine),
    /// SQLite database.
    Sqlite(SqliteEngine),
}

impl Engine {
    /// Opens an engine of `kind` inside `dir`, bypassing the handle registry.
    ///
    /// # Errors
    ///
    /// Returns `Error::EngineUnavailable` or `Error::EngineCorrupt` when the
    /// engine cannot be opened.
    pub fn open(kind: BackendKind, dir: &Path, options: &BackendOptions) -> Result<Self> {
        match kind {
            BackendKind::Redb => RedbEngine::open(dir, options).map(Self::Redb),
            BackendKind::Sqlite => SqliteEngine::open(dir, options).map(Self::Sqlite),
        }
    }

    /// Store directory the engine was opened in.
    pub fn path(&self) -> &Path {
        match self {
            Self::Redb(engine) => engine.path(),
            Self::Sqlite(engine) => engine.path(),
        }
    }

    /// Whether both values refer to the same underlying engine handle.
    pub fn same_handle(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Redb(a), Self::Redb(b)) => a.same_handle(b),
            (Self::Sqlite(a), Self::Sqlite(b)) => a.same_handle(b),
            _ => false,
        }
    }
}

impl KeyValueEngine for Engine {
    fn kind(&self) -> BackendKind {
        match self {
            Self::Redb(engine) => engine.kind(),
            Self::Sqlite(engine) => engine.kind(),
        }
    }

    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Redb(engine) => engine.get(key),
            Self::Sqlite(engine) => engine.get(key),
        }
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        match self {
            Self::Redb(engine) => engine.put(key, value),
            Self::Sqlite(engine) => engine.put(key, value),
        }
    }

    fn put_many(&self, entries: &[(&[u8], &[u8])]) -> Result<()> {
        match self {
            Self::Redb(engine) => engine.put_many(entries),
            Self::Sqlite(engine) => engine.put_many(entries),
        }
    }
}
