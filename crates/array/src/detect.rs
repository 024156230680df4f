//! Backend-kind resolution for existing stores.

use std::{fmt, fs, path::Path};

use dbarray_backend::BackendKind;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Whether `path` already holds a store.
///
/// A missing path or an empty directory is a fresh store; anything else
/// (a non-empty directory, or a non-directory) counts as existing.
///
/// # Errors
///
/// Returns [`Error::Io`] if the directory cannot be listed.
pub fn store_exists(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    if !path.is_dir() {
        return Ok(true);
    }
    Ok(fs::read_dir(path)?.next().is_some())
}

/// Decides which backend kind opens `path` when `requested` was asked for.
///
/// A fresh path uses `requested`. An existing path uses `requested` if its
/// probe accepts the path; otherwise every other kind is probed and a
/// single match is used instead, with a warning. Probing is read-only.
///
/// # Errors
///
/// Returns [`Error::UnknownBackendFormat`] when no kind matches and
/// [`Error::AmbiguousBackendFormat`] when several do.
pub fn resolve_backend_kind(path: &Path, requested: BackendKind) -> Result<BackendKind> {
    if !store_exists(path)? {
        debug!(path = %path.display(), kind = %requested, "Fresh store");
        return Ok(requested);
    }
    choose_kind(path, requested, &BackendKind::ALL, |kind| kind.is_valid(path))
}

/// The resolution rule over any closed set of kinds and a probe.
fn choose_kind<K>(path: &Path, requested: K, known: &[K], probe: impl Fn(K) -> bool) -> Result<K>
where
    K: Copy + PartialEq + fmt::Display,
{
    if probe(requested) {
        return Ok(requested);
    }

    warn!(path = %path.display(), %requested, "Store exists but is not the requested kind");
    let matches: Vec<K> = known
        .iter()
        .copied()
        .filter(|&kind| kind != requested)
        .filter(|&kind| {
            let hit = probe(kind);
            debug!(path = %path.display(), %kind, hit, "Probed backend kind");
            hit
        })
        .collect();

    match matches.as_slice() {
        [] => Err(Error::UnknownBackendFormat { path: path.display().to_string() }),
        [resolved] => {
            warn!(
                path = %path.display(),
                %requested,
                resolved = %resolved,
                "Using detected backend kind instead of requested kind"
            );
            Ok(*resolved)
        }
        _ => Err(Error::AmbiguousBackendFormat {
            path: path.display().to_string(),
            matches: matches.iter().map(ToString::to_string).collect(),
        }),
    }
}
