//! dbarray-backend: key-value engine adapters for dbarray.
//!
//! Each adapter maps opaque binary keys to binary values over one concrete
//! embedded engine, and can tell from a directory's contents whether that
//! engine created it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                  Backend                     │
//! │   (get with transient retry, put, put_many)  │
//! └────────────────┬────────────────────────────┘
//!                  │
//! ┌────────────────▼────────────────────────────┐
//! │              HandleRegistry                  │
//! │   (one shared handle per canonical path)     │
//! └────────────────┬────────────────────────────┘
//!                  │
//! ┌────────────────▼────────────────────────────┐
//! │                  Engine                      │
//! │        (RedbEngine / SqliteEngine)           │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use dbarray_backend::{Backend, BackendKind, BackendOptions};
//!
//! let options = BackendOptions::default();
//! let backend = Backend::open(BackendKind::Redb, "/tmp/array".as_ref(), &options)?;
//! backend.put(b"dtype", b"float32")?;
//! assert_eq!(backend.get(b"dtype")?, b"float32");
//!
//! // Discovery is read-only.
//! assert_eq!(BackendKind::detect("/tmp/array".as_ref()), vec![BackendKind::Redb]);
//! # Ok::<(), dbarray_backend::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod engine;
pub mod error;
mod handle;
pub mod kind;
mod options;
mod redb_engine;
mod registry;
mod retry;
mod sqlite_engine;

pub use engine::{Engine, KeyValueEngine};
pub use error::{Error, Result};
pub use handle::Backend;
pub use kind::{BackendKind, UnknownBackendKind};
pub use options::{BackendOptions, ConfigError, RetryPolicy};
pub use redb_engine::RedbEngine;
pub use registry::{HandleRegistry, registry};
pub use retry::retry_transient;
pub use sqlite_engine::SqliteEngine;
