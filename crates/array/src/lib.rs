//! dbarray: two-dimensional numeric arrays stored row-by-row in an embedded
//! key-value store.
//!
//! A [`DbArray`] keeps its shape and element type as durable metadata and
//! each row as one value, so arrays larger than memory can be read and
//! written by row, by row range, or by arbitrary row/column selection.
//! Named, typed attributes live beside the rows in the same key space.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                   DbArray                    │
//! │  (metadata, selections, rows, attributes)    │
//! └───────┬──────────────────────────┬──────────┘
//!         │ keys / AttrValue         │ detect
//! ┌───────▼──────────────────────────▼──────────┐
//! │          dbarray_backend::Backend            │
//! │        (redb or SQLite, shared handle)       │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use dbarray::{BackendKind, DbArray, Elements, Matrix};
//!
//! let mut array = DbArray::open("/tmp/features", BackendKind::Redb)?;
//! array.set_dtype("float32")?;
//! array.set_shape((100, 256))?;
//! array.set_row(0, &Elements::from_slice(&[0.5f32; 256]))?;
//!
//! // Rows 1..10, all columns; then rows 1, 2 and 5, columns 0..4.
//! let block: Matrix = array.get(1..10)?;
//! let corner = array.get((vec![1, 2, 5], 0..4))?;
//!
//! array.set_db_attr("label", "imagenet-val")?;
//! array.set_db_attr("mean", vec![0.485f32, 0.456, 0.406])?;
//! # Ok::<(), dbarray::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod array;
pub mod attr;
mod buffer;
mod config;
pub mod detect;
pub mod dtype;
pub mod error;
pub mod keys;
pub mod selection;

pub use array::DbArray;
pub use attr::AttrValue;
pub use buffer::{Elements, Matrix};
pub use config::ArrayConfig;
pub use dbarray_backend::{BackendKind, BackendOptions, RetryPolicy};
pub use dtype::{ByteOrder, DtypeSpec, Element, ElementKind, ElementType};
pub use error::{Error, Result};
pub use selection::{Index, ResolvedSelection, Selection};
