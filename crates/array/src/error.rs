//! Error types for the logical array store.

use std::{convert::Infallible, io};

use snafu::Snafu;

use crate::dtype::ElementType;

/// Result type alias for array store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while opening or using an array store.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// The backend engine failed (unavailable, corrupt, or an engine error).
    #[snafu(display("Backend error: {source}"))]
    Backend {
        /// The underlying backend error.
        source: dbarray_backend::Error,
    },

    /// No value is stored under the key. Reading a row that was never
    /// written, or that lies beyond the declared shape, reports this.
    #[snafu(display("Key not found: {key}"))]
    KeyNotFound {
        /// Printable rendering of the missing key.
        key: String,
    },

    /// The path holds data that no known backend kind recognizes.
    #[snafu(display("{path} exists but matches no known backend format"))]
    UnknownBackendFormat {
        /// Path of the store.
        path: String,
    },

    /// The path holds data that more than one backend kind recognizes.
    #[snafu(display(
        "{path} exists but matches several backend formats: {}",
        matches.join(", ")
    ))]
    AmbiguousBackendFormat {
        /// Path of the store.
        path: String,
        /// Names of every kind whose probe matched.
        matches: Vec<String>,
    },

    /// The store exists but one of the reserved metadata keys is absent.
    #[snafu(display("Store is missing metadata key `{key}`"))]
    MissingMetadata {
        /// The absent reserved key.
        key: &'static str,
    },

    /// A reserved metadata value could not be decoded.
    #[snafu(display("Invalid metadata under `{key}`: {reason}"))]
    InvalidMetadata {
        /// The reserved key whose value is malformed.
        key: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A row id cannot be addressed.
    #[snafu(display("Row {row_id} out of range ({reason})"))]
    RowOutOfRange {
        /// The offending row id.
        row_id: u64,
        /// Why it is out of range.
        reason: String,
    },

    /// A selection is malformed or addresses columns outside the array.
    #[snafu(display("Invalid selection: {reason}"))]
    InvalidSelection {
        /// What is wrong with the selection.
        reason: String,
    },

    /// The attribute value's type has no tagged encoding.
    #[snafu(display("Unsupported attribute type: {type_name}"))]
    UnsupportedAttributeType {
        /// Name of the rejected type.
        type_name: &'static str,
    },

    /// A stored attribute starts with a tag no decoder recognizes.
    #[snafu(display("Unknown attribute type for `{name}`: tag {tag:?}"))]
    UnknownAttributeType {
        /// Attribute name.
        name: String,
        /// The leading bytes of the stored value.
        tag: Vec<u8>,
    },

    /// The attribute name would collide with reserved or row keys.
    #[snafu(display("Attribute name `{name}` is reserved: {reason}"))]
    ReservedAttributeName {
        /// The rejected name.
        name: String,
        /// Which part of the key space it collides with.
        reason: String,
    },

    /// An element type name or descriptor could not be resolved.
    #[snafu(display("Invalid element type: {name}"))]
    InvalidElementType {
        /// The unrecognized name.
        name: String,
    },

    /// Elements have a different type than the array or buffer expects.
    #[snafu(display("Element type mismatch: expected {expected}, got {actual}"))]
    ElementTypeMismatch {
        /// Type required by the array.
        expected: ElementType,
        /// Type supplied.
        actual: ElementType,
    },

    /// A buffer holds the wrong number of elements or bytes.
    #[snafu(display("Length mismatch for {what}: expected {expected}, got {actual}"))]
    LengthMismatch {
        /// What was being measured.
        what: &'static str,
        /// Required length.
        expected: usize,
        /// Supplied length.
        actual: usize,
    },

    /// A shape's byte size does not fit in memory addresses.
    #[snafu(display("Shape ({nrows}, {ncols}) of {dtype} is too large to address"))]
    ShapeOverflow {
        /// Row count.
        nrows: usize,
        /// Column count.
        ncols: usize,
        /// Element type.
        dtype: ElementType,
    },

    /// The operation needs a shape and none has been set.
    #[snafu(display("Array shape has not been set"))]
    ShapeUnset,

    /// The operation needs an element type and none has been set.
    #[snafu(display("Array element type has not been set"))]
    DtypeUnset,

    /// I/O error while inspecting the store path.
    #[snafu(display("I/O error: {source}"))]
    Io {
        /// The underlying I/O error.
        source: io::Error,
    },

    /// Array configuration failed validation.
    #[snafu(display("Invalid array config: {source}"))]
    Config {
        /// The validation failure.
        source: dbarray_backend::ConfigError,
    },
}

impl Error {
    /// Whether this error reports a missing key.
    #[must_use]
    pub const fn is_key_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound { .. })
    }
}

// Missing keys are lifted out of the backend so callers can match on them
// directly; every other engine failure stays wrapped.
impl From<dbarray_backend::Error> for Error {
    fn from(source: dbarray_backend::Error) -> Self {
        match source {
            dbarray_backend::Error::KeyNotFound { key } => Error::KeyNotFound { key },
            source => Error::Backend { source },
        }
    }
}

impl From<io::Error> for Error {
    fn from(source: io::Error) -> Self {
        Error::Io { source }
    }
}

impl From<Infallible> for Error {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use dbarray_backend::BackendKind;

    use super::*;

    #[test]
    fn test_backend_key_not_found_is_lifted() {
        let backend = dbarray_backend::Error::KeyNotFound { key: "nrows".to_string() };
        let err = Error::from(backend);
        assert!(err.is_key_not_found());
        assert_eq!(format!("{err}"), "Key not found: nrows");
    }

    #[test]
    fn test_other_backend_errors_stay_wrapped() {
        let backend = dbarray_backend::Error::EngineUnavailable {
            kind: BackendKind::Redb,
            path: "/data".to_string(),
            reason: "locked".to_string(),
        };
        let err = Error::from(backend);
        assert!(matches!(
            err,
            Error::Backend { source: dbarray_backend::Error::EngineUnavailable { .. } }
        ));
    }

    #[test]
    fn test_error_display_ambiguous() {
        let err = Error::AmbiguousBackendFormat {
            path: "/data".to_string(),
            matches: vec!["redb".to_string(), "sqlite".to_string()],
        };
        assert_eq!(
            format!("{err}"),
            "/data exists but matches several backend formats: redb, sqlite"
        );
    }

    #[test]
    fn test_error_display_missing_metadata() {
        let err = Error::MissingMetadata { key: "dtype" };
        assert_eq!(format!("{err}"), "Store is missing metadata key `dtype`");
    }

    #[test]
    fn test_error_display_unsupported_attribute_type() {
        let err = Error::UnsupportedAttributeType { type_name: "f64" };
        assert_eq!(format!("{err}"), "Unsupported attribute type: f64");
    }

    #[test]
    fn test_error_display_length_mismatch() {
        let err = Error::LengthMismatch { what: "row", expected: 256, actual: 255 };
        assert_eq!(format!("{err}"), "Length mismatch for row: expected 256, got 255");
    }

    #[test]
    fn test_error_display_shape_overflow() {
        let err = Error::ShapeOverflow { nrows: 0, ncols: 1 << 62, dtype: ElementType::FLOAT64 };
        let expected = format!("Shape (0, {}) of float64 is too large to address", 1usize << 62);
        assert_eq!(format!("{err}"), expected);
    }
}
