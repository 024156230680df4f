//! The closed set of engine kinds and their on-disk probes.
//!
//! A store path is a directory. Each engine keeps its data in one marker file
//! inside that directory, and `is_valid` recognizes a kind by reading the
//! first bytes of that file. Probing never creates, locks, or writes anything.

use std::{
    fmt,
    fs::File,
    io::Read,
    path::{Path, PathBuf},
    str::FromStr,
};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// File name of the redb data file inside a store directory.
pub const REDB_FILE_NAME: &str = "data.redb";

/// File name of the SQLite database inside a store directory.
pub const SQLITE_FILE_NAME: &str = "data.sqlite3";

/// Leading bytes of every redb database file.
pub const REDB_MAGIC_PREFIX: &[u8] = b"redb";

/// The 16-byte header every SQLite 3 database file starts with.
pub const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";

/// A concrete key-value engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Ordered B-tree engine in a single exclusively-locked file.
    Redb,
    /// SQLite database in WAL mode, one `entries` table.
    Sqlite,
}

impl BackendKind {
    /// Every known kind, in probe order.
    pub const ALL: [BackendKind; 2] = [BackendKind::Redb, BackendKind::Sqlite];

    /// Stable lowercase name of this kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Redb => "redb",
            Self::Sqlite => "sqlite",
        }
    }

    /// Name of the data file this kind keeps inside a store directory.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Redb => REDB_FILE_NAME,
            Self::Sqlite => SQLITE_FILE_NAME,
        }
    }

    /// Path of this kind's data file inside `dir`.
    #[must_use]
    pub fn data_file(self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }

    /// Leading bytes that identify a data file written by this kind.
    const fn magic(self) -> &'static [u8] {
        match self {
            Self::Redb => REDB_MAGIC_PREFIX,
            Self::Sqlite => SQLITE_HEADER,
        }
    }

    /// Reports whether `path` holds a store created by this kind.
    ///
    /// Read-only: opens the marker file for reading and compares its first
    /// bytes against the engine's magic. Any I/O failure counts as "no".
    #[must_use]
    pub fn is_valid(self, path: &Path) -> bool {
        if !path.is_dir() {
            return false;
        }
        let magic = self.magic();
        let Ok(mut file) = File::open(self.data_file(path)) else {
            return false;
        };
        let mut head = vec![0u8; magic.len()];
        match file.read_exact(&mut head) {
            Ok(()) => head == magic,
            Err(_) => false,
        }
    }

    /// Every kind whose `is_valid` probe accepts `path`.
    #[must_use]
    pub fn detect(path: &Path) -> Vec<BackendKind> {
        Self::ALL.into_iter().filter(|kind| kind.is_valid(path)).collect()
    }
}

impl Default for BackendKind {
    fn default() -> Self {
        Self::Redb
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown backend name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownBackendKind(pub String);

impl fmt::Display for UnknownBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown backend kind: {}", self.0)
    }
}

impl std::error::Error for UnknownBackendKind {}

impl FromStr for BackendKind {
    type Err = UnknownBackendKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "redb" => Ok(Self::Redb),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            _ => Err(UnknownBackendKind(s.to_string())),
        }
    }
}
