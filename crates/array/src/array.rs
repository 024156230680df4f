//! [`DbArray`]: a two-dimensional array stored row-by-row in a key-value engine.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use dbarray_backend::{Backend, BackendKind};
use snafu::ResultExt;
use tracing::{debug, info, instrument};

use crate::{
    attr::AttrValue,
    buffer::{Elements, Matrix, row_byte_len},
    config::ArrayConfig,
    detect::{resolve_backend_kind, store_exists},
    dtype::{DtypeSpec, ElementType},
    error::{ConfigSnafu, Error, Result},
    keys::{
        self, DTYPE_KEY, NCOLS_KEY, NROWS_KEY, UNSET_DTYPE, companion_name, decode_i64,
        encode_i64, validate_attr_name, validate_buffer_attr_name,
    },
    selection::Selection,
};

/// Sentinel persisted for an unset row or column count.
const UNSET_DIMENSION: i64 = -1;

/// A logical 2-D array over a key-value store.
///
/// Shape and element type are persisted under the reserved keys `nrows`,
/// `ncols` and `dtype` and change only through [`set_shape`](Self::set_shape)
/// and [`set_dtype`](Self::set_dtype). Rows are whole-row values under 8-byte
/// big-endian row-id keys. Writing a row does not grow the shape.
///
/// Multi-row writes are a sequence of independent single-row commits: the
/// first failure stops the sequence and earlier rows stay written.
pub struct DbArray {
    backend: Backend,
    path: PathBuf,
    shape: Option<(usize, usize)>,
    dtype: Option<ElementType>,
    rows_written: bool,
}

impl DbArray {
    /// Opens the store at `path`, requesting backend `kind` with default options.
    ///
    /// # Errors
    ///
    /// See [`open_with_config`](Self::open_with_config).
    pub fn open(path: impl AsRef<Path>, kind: BackendKind) -> Result<Self> {
        let config = ArrayConfig { backend: kind, ..ArrayConfig::default() };
        Self::open_with_config(path.as_ref(), &config)
    }

    /// Opens the store at `path` with `config`.
    ///
    /// An existing store keeps whichever backend kind created it (a fallback
    /// is logged at warn level) and loads its persisted shape and element
    /// type. A fresh store persists unset metadata (`-1`, `-1`, `None`) in
    /// one transaction. Nothing is written before the backend kind resolves.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `config` fails validation
    /// - [`Error::UnknownBackendFormat`] / [`Error::AmbiguousBackendFormat`]
    ///   if the existing data cannot be attributed to exactly one kind
    /// - [`Error::MissingMetadata`] if an existing store lacks a reserved key
    /// - [`Error::Backend`] if the engine is unavailable or corrupt
    #[instrument(skip(path, config), fields(path = %path.display(), requested = %config.backend))]
    pub fn open_with_config(path: &Path, config: &ArrayConfig) -> Result<Self> {
        config.validate().context(ConfigSnafu)?;
        let exists = store_exists(path)?;
        let kind = resolve_backend_kind(path, config.backend)?;
        let backend = Backend::open(kind, path, &config.options)?;

        let mut array = Self {
            path: backend.path().to_path_buf(),
            backend,
            shape: None,
            dtype: None,
            rows_written: false,
        };
        let metadata = if exists { array.load_metadata() } else { array.initialize_metadata() };
        match metadata {
            Ok(()) => Ok(array),
            Err(err) => {
                array.close();
                Err(err)
            }
        }
    }

    /// Creates a store at `path` holding `matrix`: element type, shape, then
    /// every row.
    ///
    /// # Errors
    ///
    /// Returns any open or write error; rows written before a failure stay.
    pub fn from_matrix(path: impl AsRef<Path>, kind: BackendKind, matrix: &Matrix) -> Result<Self> {
        let mut array = Self::open(path, kind)?;
        array.set_dtype(matrix.dtype())?;
        array.set_shape(matrix.shape())?;
        let row_ids: Vec<usize> = (0..matrix.nrows()).collect();
        array.set_rows(&row_ids, matrix)?;
        Ok(array)
    }

    fn initialize_metadata(&mut self) -> Result<()> {
        let unset = encode_i64(UNSET_DIMENSION);
        self.backend.put_many(&[
            (NROWS_KEY.as_bytes(), unset.as_slice()),
            (NCOLS_KEY.as_bytes(), unset.as_slice()),
            (DTYPE_KEY.as_bytes(), UNSET_DTYPE.as_bytes()),
        ])?;
        info!(path = %self.path.display(), kind = %self.backend_kind(), "Initialized array store");
        Ok(())
    }

    fn load_metadata(&mut self) -> Result<()> {
        let nrows = decode_i64(NROWS_KEY, &self.read_metadata(NROWS_KEY)?)?;
        let ncols = decode_i64(NCOLS_KEY, &self.read_metadata(NCOLS_KEY)?)?;
        self.shape = decode_shape(nrows, ncols)?;

        let dtype = String::from_utf8(self.read_metadata(DTYPE_KEY)?).map_err(|err| {
            Error::InvalidMetadata { key: DTYPE_KEY.to_string(), reason: err.to_string() }
        })?;
        self.dtype = DtypeSpec::from(dtype).resolve().map_err(|err| Error::InvalidMetadata {
            key: DTYPE_KEY.to_string(),
            reason: err.to_string(),
        })?;
        if let (Some(dtype), Some(shape)) = (self.dtype, self.shape) {
            check_row_width(dtype, shape).map_err(|err| Error::InvalidMetadata {
                key: NCOLS_KEY.to_string(),
                reason: err.to_string(),
            })?;
        }

        info!(
            path = %self.path.display(),
            kind = %self.backend_kind(),
            nrows,
            ncols,
            dtype = %self.dtype.map_or_else(|| UNSET_DTYPE.to_string(), ElementType::name),
            "Loaded array store"
        );
        Ok(())
    }

    fn read_metadata(&self, key: &'static str) -> Result<Vec<u8>> {
        self.backend.get(key.as_bytes()).map_err(|err| match Error::from(err) {
            Error::KeyNotFound { .. } => Error::MissingMetadata { key },
            other => other,
        })
    }

    /// Releases this array's registration of the shared engine handle.
    ///
    /// Other arrays open on the same path keep using the engine, and later
    /// opens attach to it. The engine closes with the last registration.
    /// Returns whether a registration was released.
    pub fn close(self) -> bool {
        self.backend.close()
    }

    /// Backend kind actually in use.
    #[must_use]
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Whether both arrays use one engine handle.
    #[must_use]
    pub fn shares_handle_with(&self, other: &DbArray) -> bool {
        self.backend.shares_handle_with(&other.backend)
    }

    /// Canonical path of the store.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `(nrows, ncols)`, or `None` before a shape is set.
    #[must_use]
    pub fn shape(&self) -> Option<(usize, usize)> {
        self.shape
    }

    /// Declared row count.
    #[must_use]
    pub fn nrows(&self) -> Option<usize> {
        self.shape.map(|(rows, _)| rows)
    }

    /// Declared column count.
    #[must_use]
    pub fn ncols(&self) -> Option<usize> {
        self.shape.map(|(_, cols)| cols)
    }

    /// Declared row count, or 0 before a shape is set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nrows().unwrap_or(0)
    }

    /// Whether the declared row count is zero or unset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element type, or `None` before one is set.
    #[must_use]
    pub fn dtype(&self) -> Option<ElementType> {
        self.dtype
    }

    /// Sets and persists the shape.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMetadata`] if a dimension exceeds `i64::MAX`,
    /// [`Error::ShapeOverflow`] if a row of the element type would not fit in
    /// memory addresses, or the backend's write error.
    pub fn set_shape(&mut self, shape: (usize, usize)) -> Result<()> {
        let (rows, cols) = shape;
        if let Some(dtype) = self.dtype {
            check_row_width(dtype, shape)?;
        }
        let nrows = encode_i64(dimension(NROWS_KEY, rows)?);
        let ncols = encode_i64(dimension(NCOLS_KEY, cols)?);
        self.backend.put_many(&[
            (NROWS_KEY.as_bytes(), nrows.as_slice()),
            (NCOLS_KEY.as_bytes(), ncols.as_slice()),
        ])?;
        self.shape = Some(shape);
        debug!(path = %self.path.display(), rows, cols, "Set shape");
        Ok(())
    }

    /// Sets and persists the element type.
    ///
    /// Accepts an [`ElementType`], a name or typestr, or `None`. Unset
    /// persists `None`, which is only allowed before this array writes a row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidElementType`] for an unknown name,
    /// [`Error::InvalidMetadata`] when clearing after a row write,
    /// [`Error::ShapeOverflow`] if a row of the current shape would not fit
    /// in memory addresses, or the backend's write error.
    pub fn set_dtype(&mut self, dtype: impl Into<DtypeSpec>) -> Result<()> {
        let dtype = dtype.into().resolve()?;
        if dtype.is_none() && self.rows_written {
            return Err(Error::InvalidMetadata {
                key: DTYPE_KEY.to_string(),
                reason: "element type cannot be cleared after rows are written".to_string(),
            });
        }
        if let (Some(dtype), Some(shape)) = (dtype, self.shape) {
            check_row_width(dtype, shape)?;
        }
        let name = dtype.map_or_else(|| UNSET_DTYPE.to_string(), ElementType::name);
        self.backend.put(DTYPE_KEY.as_bytes(), name.as_bytes())?;
        self.dtype = dtype;
        debug!(path = %self.path.display(), dtype = %name, "Set element type");
        Ok(())
    }

    fn layout(&self) -> Result<(ElementType, usize)> {
        let dtype = self.dtype.ok_or(Error::DtypeUnset)?;
        let ncols = self.ncols().ok_or(Error::ShapeUnset)?;
        row_byte_len(dtype, ncols)?;
        Ok((dtype, ncols))
    }

    /// Checks that `row_id` lies within the declared row count.
    ///
    /// Row reads do not check this themselves; a row past the declared
    /// count reads as [`Error::KeyNotFound`] unless it was written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeUnset`] or [`Error::RowOutOfRange`].
    pub fn check_row(&self, row_id: usize) -> Result<()> {
        let nrows = self.nrows().ok_or(Error::ShapeUnset)?;
        if row_id >= nrows {
            return Err(Error::RowOutOfRange {
                row_id: row_id as u64,
                reason: format!("array has {nrows} rows"),
            });
        }
        Ok(())
    }

    /// Reads row `row_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyNotFound`] if the row was never written,
    /// [`Error::DtypeUnset`] / [`Error::ShapeUnset`] before metadata is set,
    /// or [`Error::LengthMismatch`] if the stored row has the wrong size.
    pub fn get_row(&self, row_id: usize) -> Result<Elements> {
        let (dtype, ncols) = self.layout()?;
        let bytes = self.read_row(row_id, dtype, ncols)?;
        Elements::from_bytes(dtype, bytes)
    }

    fn read_row(&self, row_id: usize, dtype: ElementType, ncols: usize) -> Result<Vec<u8>> {
        let key = keys::row_key(row_id as u64)?;
        let bytes = self.backend.get(&key)?;
        let expected = row_byte_len(dtype, ncols)?;
        if bytes.len() != expected {
            return Err(Error::LengthMismatch {
                what: "stored row bytes",
                expected,
                actual: bytes.len(),
            });
        }
        Ok(bytes)
    }

    /// Overwrites row `row_id`.
    ///
    /// `row` must hold exactly `ncols` elements of the array's kind and
    /// width; elements in the other byte order are converted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LengthMismatch`], [`Error::ElementTypeMismatch`],
    /// [`Error::RowOutOfRange`] for ids beyond `i64::MAX`, or the backend's
    /// write error.
    pub fn set_row(&mut self, row_id: usize, row: &Elements) -> Result<()> {
        let (dtype, ncols) = self.layout()?;
        if row.len() != ncols {
            return Err(Error::LengthMismatch { what: "row", expected: ncols, actual: row.len() });
        }
        if !dtype.is_compatible(row.dtype()) {
            return Err(Error::ElementTypeMismatch { expected: dtype, actual: row.dtype() });
        }
        let row = row.to_byte_order(dtype.byte_order());
        self.write_row(row_id, row.as_bytes())
    }

    fn write_row(&mut self, row_id: usize, bytes: &[u8]) -> Result<()> {
        let key = keys::row_key(row_id as u64)?;
        self.backend.put(&key, bytes)?;
        self.rows_written = true;
        Ok(())
    }

    /// Reads rows in the given order, repeats included.
    ///
    /// # Errors
    ///
    /// Returns the first row's read error.
    pub fn get_rows(&self, row_ids: &[usize]) -> Result<Matrix> {
        let (dtype, ncols) = self.layout()?;
        let rows = row_ids
            .iter()
            .map(|&row_id| self.read_row(row_id, dtype, ncols))
            .collect::<Result<Vec<_>>>()?;
        Matrix::from_rows(dtype, ncols, rows)
    }

    /// Writes row `row_ids[i]` from row `i` of `rows`, in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LengthMismatch`] or [`Error::ElementTypeMismatch`]
    /// before anything is written, otherwise the first row's write error.
    pub fn set_rows(&mut self, row_ids: &[usize], rows: &Matrix) -> Result<()> {
        let (dtype, ncols) = self.layout()?;
        if rows.nrows() != row_ids.len() {
            return Err(Error::LengthMismatch {
                what: "rows",
                expected: row_ids.len(),
                actual: rows.nrows(),
            });
        }
        if rows.ncols() != ncols {
            return Err(Error::LengthMismatch {
                what: "columns",
                expected: ncols,
                actual: rows.ncols(),
            });
        }
        let rows = rows.conform_to(dtype)?;
        for (&row_id, bytes) in row_ids.iter().zip(rows.rows()) {
            self.write_row(row_id, bytes)?;
        }
        debug!(path = %self.path.display(), rows = row_ids.len(), "Wrote rows");
        Ok(())
    }

    /// Reads a selection of rows and, optionally, columns.
    ///
    /// Rows are read in selection order; a column selection is applied to
    /// the assembled rows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSelection`] for a malformed selection (before
    /// any read), or the first row's read error.
    pub fn get(&self, selection: impl Into<Selection>) -> Result<Matrix> {
        let (nrows, ncols) = self.shape.ok_or(Error::ShapeUnset)?;
        let resolved = selection.into().resolve(nrows, ncols)?;
        let rows = self.get_rows(&resolved.rows)?;
        match resolved.columns {
            Some(columns) => rows.select_columns(&columns),
            None => Ok(rows),
        }
    }

    /// Writes `values` to a selection of rows and, optionally, columns.
    ///
    /// `values` has one row per selected row and one column per selected
    /// column. With a column selection the target rows are read first,
    /// the columns replaced in memory, and each row written back whole.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSelection`] or a shape/type mismatch before
    /// anything is written, otherwise the first read or write error.
    pub fn set(&mut self, selection: impl Into<Selection>, values: &Matrix) -> Result<()> {
        let (nrows, ncols) = self.shape.ok_or(Error::ShapeUnset)?;
        let resolved = selection.into().resolve(nrows, ncols)?;
        let Some(columns) = resolved.columns else {
            return self.set_rows(&resolved.rows, values);
        };

        let (dtype, _) = self.layout()?;
        if !dtype.is_compatible(values.dtype()) {
            return Err(Error::ElementTypeMismatch { expected: dtype, actual: values.dtype() });
        }
        if values.shape() != (resolved.rows.len(), columns.len()) {
            return Err(Error::LengthMismatch {
                what: "selected elements",
                expected: resolved.rows.len().saturating_mul(columns.len()),
                actual: values.nrows() * values.ncols(),
            });
        }
        let mut rows = self.get_rows(&resolved.rows)?;
        rows.assign_columns(&columns, values)?;
        self.set_rows(&resolved.rows, &rows)
    }

    /// Reads every declared row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeUnset`] or the first row's read error.
    pub fn to_matrix(&self) -> Result<Matrix> {
        let nrows = self.nrows().ok_or(Error::ShapeUnset)?;
        let (dtype, ncols) = self.layout()?;
        // Rows are read lazily; the declared count may far exceed what is stored.
        let rows = (0..nrows)
            .map(|row_id| self.read_row(row_id, dtype, ncols))
            .collect::<Result<Vec<_>>>()?;
        Matrix::from_rows(dtype, ncols, rows)
    }

    /// Stores a named attribute.
    ///
    /// Integers, text and numeric buffers are accepted; other types fail
    /// with [`Error::UnsupportedAttributeType`] before anything is written.
    /// A numeric buffer's element type is written under `<name>_dtype` in
    /// the same transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedAttributeType`],
    /// [`Error::ReservedAttributeName`], or the backend's write error.
    pub fn set_db_attr<V>(&self, name: &str, value: V) -> Result<()>
    where
        V: TryInto<AttrValue>,
        Error: From<V::Error>,
    {
        let value: AttrValue = value.try_into()?;
        let encoded = value.encode();
        match &value {
            AttrValue::NumericBuffer(elements) => {
                validate_buffer_attr_name(name)?;
                let companion = companion_name(name);
                let dtype = AttrValue::Text(elements.dtype().name()).encode();
                self.backend.put_many(&[
                    (companion.as_bytes(), dtype.as_slice()),
                    (name.as_bytes(), encoded.as_slice()),
                ])?;
            }
            AttrValue::Integer(_) | AttrValue::Text(_) => {
                validate_attr_name(name)?;
                self.backend.put(name.as_bytes(), &encoded)?;
            }
        }
        debug!(
            path = %self.path.display(),
            name,
            tag = %String::from_utf8_lossy(value.tag()),
            "Set attribute"
        );
        Ok(())
    }

    /// Reads a named attribute.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyNotFound`] if the attribute (or a numeric
    /// buffer's companion) is absent, [`Error::UnknownAttributeType`] for
    /// an unrecognized tag, or [`Error::ReservedAttributeName`].
    pub fn get_db_attr(&self, name: &str) -> Result<AttrValue> {
        validate_attr_name(name)?;
        let bytes = self.backend.get(name.as_bytes())?;
        AttrValue::decode(name, &bytes, || self.companion_dtype(name))
    }

    fn companion_dtype(&self, name: &str) -> Result<ElementType> {
        let companion = companion_name(name);
        match self.get_db_attr(&companion)? {
            AttrValue::Text(dtype) => ElementType::parse(&dtype),
            other => Err(Error::InvalidMetadata {
                key: companion,
                reason: format!(
                    "expected a text attribute, found tag {}",
                    String::from_utf8_lossy(other.tag())
                ),
            }),
        }
    }
}

impl fmt::Debug for DbArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbArray")
            .field("path", &self.path)
            .field("kind", &self.backend_kind())
            .field("shape", &self.shape)
            .field("dtype", &self.dtype)
            .finish_non_exhaustive()
    }
}

fn dimension(key: &str, value: usize) -> Result<i64> {
    i64::try_from(value).map_err(|_| Error::InvalidMetadata {
        key: key.to_string(),
        reason: format!("{value} does not fit a signed 64-bit integer"),
    })
}

/// Rejects shapes whose rows of `dtype` cannot be addressed.
fn check_row_width(dtype: ElementType, (nrows, ncols): (usize, usize)) -> Result<()> {
    row_byte_len(dtype, ncols).map(drop).map_err(|_| Error::ShapeOverflow { nrows, ncols, dtype })
}

fn decode_shape(nrows: i64, ncols: i64) -> Result<Option<(usize, usize)>> {
    if nrows == UNSET_DIMENSION && ncols == UNSET_DIMENSION {
        return Ok(None);
    }
    let rows = usize::try_from(nrows).map_err(|_| Error::InvalidMetadata {
        key: NROWS_KEY.to_string(),
        reason: format!("invalid row count {nrows} with column count {ncols}"),
    })?;
    let cols = usize::try_from(ncols).map_err(|_| Error::InvalidMetadata {
        key: NCOLS_KEY.to_string(),
        reason: format!("invalid column count {ncols} with row count {nrows}"),
    })?;
    Ok(Some((rows, cols)))
}
