//! [`Backend`]: the handle the array store talks to.

use std::path::{Path, PathBuf};

use snafu::ResultExt;
use tracing::debug;

use crate::{
    engine::{Engine, KeyValueEngine},
    error::{ConfigSnafu, Result},
    kind::BackendKind,
    options::{BackendOptions, RetryPolicy},
    registry::registry,
    retry::retry_transient,
};

/// A shared engine handle plus the retry policy of the caller that opened it.
///
/// Opening goes through the process-wide registry, so every `Backend` for
/// one path and kind shares one engine. Each `Backend` is one registration
/// and is released by [`close`](Self::close).
pub struct Backend {
    engine: Engine,
    path: PathBuf,
    retry: RetryPolicy,
}

impl Backend {
    /// Opens (or attaches to) the store at `path` with engine `kind`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `options` fail validation, otherwise any
    /// error from [`HandleRegistry::open`](crate::HandleRegistry::open).
    pub fn open(kind: BackendKind, path: &Path, options: &BackendOptions) -> Result<Self> {
        options.validate().context(ConfigSnafu)?;
        let (path, engine) = registry().open(kind, path, options)?;
        Ok(Self { engine, path, retry: options.retry.clone() })
    }

    /// Releases this handle's registration.
    ///
    /// Other handles on the same path keep the engine open. Returns whether
    /// a registration was released.
    pub fn close(self) -> bool {
        registry().close(&self.path)
    }

    /// Engine kind behind this handle.
    pub fn kind(&self) -> BackendKind {
        self.engine.kind()
    }

    /// Canonical path of the store directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether both backends share one engine handle.
    pub fn shares_handle_with(&self, other: &Backend) -> bool {
        self.engine.same_handle(&other.engine)
    }

    /// Reads the value under `key`, retrying transient contention.
    ///
    /// # Errors
    ///
    /// Returns `Error::KeyNotFound` if the key is absent, or the first
    /// non-transient engine error.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        retry_transient(&self.retry, "get", || self.engine.get(key))
    }

    /// Creates or overwrites the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns the first non-transient engine error.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        debug!(kind = %self.kind(), key_len = key.len(), value_len = value.len(), "put");
        retry_transient(&self.retry, "put", || self.engine.put(key, value))
    }

    /// Writes all entries in one native transaction.
    ///
    /// # Errors
    ///
    /// Returns the first non-transient engine error; nothing is written then.
    pub fn put_many(&self, entries: &[(&[u8], &[u8])]) -> Result<()> {
        debug!(kind = %self.kind(), entries = entries.len(), "put_many");
        retry_transient(&self.retry, "put_many", || self.engine.put_many(entries))
    }
}
