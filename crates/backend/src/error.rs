//! Error types for the key-value backend adapters.

use std::io;

use snafu::Snafu;

use crate::kind::BackendKind;
use crate::options::ConfigError;

/// Result type alias for backend operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while opening or using a backend engine.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// The engine cannot be opened at this path right now (locked by another
    /// process, or already open in this process under a different kind).
    #[snafu(display("{kind} engine unavailable at {path}: {reason}"))]
    EngineUnavailable {
        /// Engine kind that was requested.
        kind: BackendKind,
        /// Path of the store.
        path: String,
        /// Why the engine could not be opened.
        reason: String,
    },

    /// On-disk structures could not be read by the engine.
    #[snafu(display("{kind} engine at {path} is corrupt: {reason}"))]
    EngineCorrupt {
        /// Engine kind that was requested.
        kind: BackendKind,
        /// Path of the store.
        path: String,
        /// What the engine reported.
        reason: String,
    },

    /// No value is stored under the key.
    #[snafu(display("Key not found: {key}"))]
    KeyNotFound {
        /// Printable rendering of the missing key.
        key: String,
    },

    /// Transient contention with another reader or writer; the operation
    /// may succeed if retried.
    #[snafu(display("{kind} engine busy: {reason}"))]
    Contention {
        /// Engine kind reporting contention.
        kind: BackendKind,
        /// What the engine reported.
        reason: String,
    },

    /// I/O error while preparing or probing a store directory.
    #[snafu(display("I/O error: {source}"))]
    Io {
        /// The underlying I/O error.
        source: io::Error,
    },

    /// redb storage error.
    #[snafu(display("redb storage error: {source}"))]
    RedbStorage {
        /// The underlying redb error.
        source: redb::StorageError,
    },

    /// redb table error.
    #[snafu(display("redb table error: {source}"))]
    RedbTable {
        /// The underlying redb error.
        source: redb::TableError,
    },

    /// redb transaction error.
    #[snafu(display("redb transaction error: {source}"))]
    RedbTransaction {
        /// The underlying redb error.
        source: redb::TransactionError,
    },

    /// redb commit error.
    #[snafu(display("redb commit error: {source}"))]
    RedbCommit {
        /// The underlying redb error.
        source: redb::CommitError,
    },

    /// SQLite error that is neither contention nor an open failure.
    #[snafu(display("SQLite error: {source}"))]
    Sqlite {
        /// The underlying rusqlite error.
        source: rusqlite::Error,
    },

    /// Backend options failed validation.
    #[snafu(display("Invalid backend options: {source}"))]
    Config {
        /// The validation failure.
        source: ConfigError,
    },
}

impl Error {
    /// Whether this error is transient contention that a retry may clear.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Contention { .. })
    }

    /// Whether this error reports a missing key.
    #[must_use]
    pub const fn is_key_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound { .. })
    }

    /// Builds a `KeyNotFound` error with a printable rendering of `key`.
    pub(crate) fn key_not_found(key: &[u8]) -> Self {
        Self::KeyNotFound { key: render_key(key) }
    }
}

impl From<io::Error> for Error {
    fn from(source: io::Error) -> Self {
        Error::Io { source }
    }
}

/// Renders a binary key for error messages: UTF-8 text as-is, anything else as hex.
pub(crate) fn render_key(key: &[u8]) -> String {
    match std::str::from_utf8(key) {
        Ok(text) if text.chars().all(|c| !c.is_control()) => text.to_string(),
        _ => {
            let hex: String = key.iter().map(|b| format!("{b:02x}")).collect();
            format!("0x{hex}")
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_engine_unavailable() {
        let err = Error::EngineUnavailable {
            kind: BackendKind::Redb,
            path: "/tmp/a".to_string(),
            reason: "locked".to_string(),
        };
        assert_eq!(format!("{err}"), "redb engine unavailable at /tmp/a: locked");
    }

    #[test]
    fn test_error_display_key_not_found_text() {
        let err = Error::key_not_found(b"nrows");
        assert_eq!(format!("{err}"), "Key not found: nrows");
    }

    #[test]
    fn test_error_display_key_not_found_binary() {
        let err = Error::key_not_found(&7i64.to_be_bytes());
        assert_eq!(format!("{err}"), "Key not found: 0x0000000000000007");
    }

    #[test]
    fn test_contention_is_transient() {
        let err = Error::Contention { kind: BackendKind::Sqlite, reason: "busy".to_string() };
        assert!(err.is_transient());
        assert!(!err.is_key_not_found());
    }

    #[test]
    fn test_key_not_found_is_not_transient() {
        let err = Error::key_not_found(b"dtype");
        assert!(!err.is_transient());
        assert!(err.is_key_not_found());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        match err {
            Error::Io { source } => assert_eq!(source.kind(), io::ErrorKind::PermissionDenied),
            _ => panic!("Expected Io variant"),
        }
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error as StdError;

        let err = Error::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(err.source().is_some(), "Error::Io should have a source");
    }
}
