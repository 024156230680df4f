//! Scratch directories for store tests.

// Panicking on setup failure is the contract of a test helper.
#![allow(clippy::expect_used)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Scratch directory removed on drop.
///
/// Store paths handed to the array store are usually a subdirectory, so a
/// test can distinguish "missing" from "empty" from "populated".
///
/// # Example
///
/// ```
/// use dbarray_test_utils::TestDir;
///
/// let dir = TestDir::new();
/// let store_path = dir.join("float32.db");
/// assert!(!store_path.exists());
/// ```
pub struct TestDir {
    inner: TempDir,
}

impl TestDir {
    /// Creates a scratch directory under the system temp dir.
    ///
    /// # Panics
    ///
    /// Panics if the system temp dir is not writable.
    #[must_use]
    pub fn new() -> Self {
        Self { inner: TempDir::with_prefix("dbarray-").expect("create scratch directory") }
    }

    /// Root of the scratch directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// `path` resolved under the root. Nothing is created.
    #[must_use]
    pub fn join<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.inner.path().join(path)
    }

    /// Creates `name` (and parents) under the root and returns it.
    ///
    /// # Panics
    ///
    /// Panics if the subdirectory cannot be created.
    #[must_use]
    pub fn subdir<P: AsRef<Path>>(&self, name: P) -> PathBuf {
        let path = self.join(name);
        std::fs::create_dir_all(&path).expect("create store subdirectory");
        path
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}
