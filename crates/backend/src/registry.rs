//! Process-wide registry of open engine handles.
//!
//! One engine handle exists per canonical store path for the lifetime of the
//! process. The first open of a path creates the handle; later opens of the
//! same path and kind attach to it. Engines that hold exclusive file locks
//! (redb) would otherwise refuse the second open.
//!
//! Every successful open counts as one registration. [`HandleRegistry::close`]
//! releases one registration, and the entry is removed only when the last
//! registration for the path is released.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::{
    engine::{Engine, KeyValueEngine},
    error::{Error, Result},
    kind::BackendKind,
    options::BackendOptions,
};

static REGISTRY: LazyLock<HandleRegistry> = LazyLock::new(HandleRegistry::new);

/// Returns the process-wide handle registry.
pub fn registry() -> &'static HandleRegistry {
    &REGISTRY
}

/// A registered engine and the number of opens not yet closed.
struct Registration {
    engine: Engine,
    opens: usize,
}

/// Open engine handles keyed by canonical absolute store path.
pub struct HandleRegistry {
    handles: Mutex<HashMap<PathBuf, Registration>>,
}

impl HandleRegistry {
    fn new() -> Self {
        Self { handles: Mutex::new(HashMap::new()) }
    }

    /// Opens `path` as `kind`, reusing the registered handle if one exists.
    ///
    /// Creates the store directory when missing. Returns the canonical path
    /// together with the shared engine handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineUnavailable`] if the path is already open in
    /// this process under a different kind, [`Error::Io`] if the directory
    /// cannot be created, or the engine's own open error.
    pub fn open(
        &self,
        kind: BackendKind,
        path: &Path,
        options: &BackendOptions,
    ) -> Result<(PathBuf, Engine)> {
        fs::create_dir_all(path)?;
        let canonical = fs::canonicalize(path)?;

        // The lock is held across the engine open so two callers racing on
        // one path cannot both open it.
        let mut handles = self.handles.lock();
        if let Some(registration) = handles.get_mut(&canonical) {
            let open_kind = registration.engine.kind();
            if open_kind != kind {
                return Err(Error::EngineUnavailable {
                    kind,
                    path: canonical.display().to_string(),
                    reason: format!("already open in this process as {open_kind}"),
                });
            }
            registration.opens += 1;
            debug!(
                path = %canonical.display(),
                %kind,
                opens = registration.opens,
                "Reusing open engine handle"
            );
            return Ok((canonical, registration.engine.clone()));
        }

        let engine = Engine::open(kind, &canonical, options)?;
        handles.insert(canonical.clone(), Registration { engine: engine.clone(), opens: 1 });
        info!(path = %canonical.display(), %kind, "Opened engine handle");
        Ok((canonical, engine))
    }

    /// Releases one registration for `path`.
    ///
    /// The entry is removed with its last registration; the engine itself
    /// closes once every clone of the handle is dropped. Returns whether a
    /// registration was released.
    pub fn close(&self, path: &Path) -> bool {
        let Ok(canonical) = fs::canonicalize(path) else {
            return false;
        };
        let mut handles = self.handles.lock();
        let Some(registration) = handles.get_mut(&canonical) else {
            return false;
        };
        registration.opens -= 1;
        if registration.opens == 0 {
            handles.remove(&canonical);
            debug!(path = %canonical.display(), "Released engine handle");
        } else {
            debug!(
                path = %canonical.display(),
                opens = registration.opens,
                "Released one registration"
            );
        }
        true
    }

    /// Number of opens registered for `path` and not yet closed.
    pub fn open_count(&self, path: &Path) -> usize {
        fs::canonicalize(path).map_or(0, |canonical| {
            self.handles.lock().get(&canonical).map_or(0, |registration| registration.opens)
        })
    }

    /// Whether a handle is registered for `path`.
    pub fn is_open(&self, path: &Path) -> bool {
        fs::canonicalize(path).is_ok_and(|canonical| self.handles.lock().contains_key(&canonical))
    }

    /// Kind of the handle registered for `path`, if any.
    pub fn kind_of(&self, path: &Path) -> Option<BackendKind> {
        let canonical = fs::canonicalize(path).ok()?;
        self.handles.lock().get(&canonical).map(|registration| registration.engine.kind())
    }
}
