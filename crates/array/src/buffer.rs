//! Typed byte buffers exchanged with the array store.
//!
//! [`Elements`] is a one-dimensional run of elements (one row, or a
//! numeric-buffer attribute). [`Matrix`] is a row-major two-dimensional
//! buffer. Both keep raw bytes plus an [`ElementType`], so row bytes move
//! between the engine and the caller without per-element conversion.

use crate::{
    dtype::{ByteOrder, Element, ElementType, swap_byte_order},
    error::{Error, Result},
};

/// A one-dimensional typed element buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Elements {
    dtype: ElementType,
    data: Vec<u8>,
}

impl Elements {
    /// Copies `values` into a buffer of their canonical element type.
    #[must_use]
    pub fn from_slice<T: Element>(values: &[T]) -> Self {
        let mut data = Vec::with_capacity(values.len() * T::TYPE.width());
        for value in values {
            value.write_le(&mut data);
        }
        Self { dtype: T::TYPE, data }
    }

    /// Wraps raw bytes of type `dtype`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LengthMismatch`] if `data` is not a whole number of
    /// elements.
    pub fn from_bytes(dtype: ElementType, data: Vec<u8>) -> Result<Self> {
        let remainder = data.len() % dtype.width();
        if remainder != 0 {
            return Err(Error::LengthMismatch {
                what: "element bytes",
                expected: data.len() - remainder + dtype.width(),
                actual: data.len(),
            });
        }
        Ok(Self { dtype, data })
    }

    /// Element type of the buffer.
    #[must_use]
    pub fn dtype(&self) -> ElementType {
        self.dtype
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len() / self.dtype.width()
    }

    /// Whether the buffer holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw element bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the buffer, returning its raw bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// The same values stored in `byte_order`.
    #[must_use]
    pub fn to_byte_order(&self, byte_order: ByteOrder) -> Self {
        convert(self.dtype, &self.data, byte_order, |dtype, data| Self { dtype, data })
    }

    /// Decodes the elements as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ElementTypeMismatch`] if `T` has a different kind
    /// or width than the buffer.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        decode(self.dtype, &self.data)
    }
}

impl<T: Element> From<&[T]> for Elements {
    fn from(values: &[T]) -> Self {
        Self::from_slice(values)
    }
}

impl<T: Element> From<Vec<T>> for Elements {
    fn from(values: Vec<T>) -> Self {
        Self::from_slice(&values)
    }
}

/// A row-major two-dimensional typed buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix {
    dtype: ElementType,
    nrows: usize,
    ncols: usize,
    data: Vec<u8>,
}

impl Matrix {
    /// Wraps row-major bytes of shape `(nrows, ncols)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LengthMismatch`] if `data` is not exactly
    /// `nrows * ncols` elements long.
    pub fn new(dtype: ElementType, nrows: usize, ncols: usize, data: Vec<u8>) -> Result<Self> {
        let expected = byte_len(dtype, nrows, ncols)?;
        if data.len() != expected {
            return Err(Error::LengthMismatch {
                what: "matrix bytes",
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { dtype, nrows, ncols, data })
    }

    /// Builds a matrix from row-major values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LengthMismatch`] if `values` does not hold exactly
    /// `nrows * ncols` elements, or [`Error::ShapeOverflow`] if that count
    /// cannot be addressed.
    pub fn from_slice<T: Element>(nrows: usize, ncols: usize, values: &[T]) -> Result<Self> {
        let expected = byte_len(T::TYPE, nrows, ncols)? / T::TYPE.width();
        if values.len() != expected {
            return Err(Error::LengthMismatch {
                what: "matrix elements",
                expected,
                actual: values.len(),
            });
        }
        let elements = Elements::from_slice(values);
        Ok(Self { dtype: T::TYPE, nrows, ncols, data: elements.into_bytes() })
    }

    /// Stacks whole-row buffers of `ncols` elements each.
    pub(crate) fn from_rows(dtype: ElementType, ncols: usize, rows: Vec<Vec<u8>>) -> Result<Self> {
        let row_len = row_byte_len(dtype, ncols)?;
        let mut data = Vec::with_capacity(byte_len(dtype, rows.len(), ncols)?);
        for row in &rows {
            if row.len() != row_len {
                return Err(Error::LengthMismatch {
                    what: "row bytes",
                    expected: row_len,
                    actual: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self { dtype, nrows: rows.len(), ncols, data })
    }

    /// Element type of the matrix.
    #[must_use]
    pub fn dtype(&self) -> ElementType {
        self.dtype
    }

    /// `(nrows, ncols)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    /// Number of rows.
    #[must_use]
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns.
    #[must_use]
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Row-major bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn row_len(&self) -> usize {
        self.ncols * self.dtype.width()
    }

    /// Bytes of row `index`, if it exists.
    #[must_use]
    pub fn row_bytes(&self, index: usize) -> Option<&[u8]> {
        if index >= self.nrows {
            return None;
        }
        let row_len = self.row_len();
        self.data.get(index * row_len..(index + 1) * row_len)
    }

    /// Row `index` as an element buffer, if it exists.
    #[must_use]
    pub fn row(&self, index: usize) -> Option<Elements> {
        self.row_bytes(index).map(|bytes| Elements { dtype: self.dtype, data: bytes.to_vec() })
    }

    /// Iterates over the rows as byte slices.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        (0..self.nrows).filter_map(|index| self.row_bytes(index))
    }

    /// A new matrix holding only `columns`, in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSelection`] if a column is out of range.
    pub fn select_columns(&self, columns: &[usize]) -> Result<Self> {
        self.check_columns(columns)?;
        let width = self.dtype.width();
        let mut data = Vec::with_capacity(self.nrows * columns.len() * width);
        for row in self.rows() {
            for &column in columns {
                data.extend_from_slice(&row[column * width..(column + 1) * width]);
            }
        }
        Ok(Self { dtype: self.dtype, nrows: self.nrows, ncols: columns.len(), data })
    }

    /// Overwrites `columns` of every row with the columns of `values`.
    ///
    /// `values` must have the same rows as `self`, one column per entry in
    /// `columns`, and a type compatible with `self`; its bytes are reordered
    /// to this matrix's byte order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSelection`] for out-of-range columns,
    /// [`Error::LengthMismatch`] for a shape mismatch, or
    /// [`Error::ElementTypeMismatch`] for an incompatible type.
    pub fn assign_columns(&mut self, columns: &[usize], values: &Matrix) -> Result<()> {
        self.check_columns(columns)?;
        if values.nrows != self.nrows {
            return Err(Error::LengthMismatch {
                what: "assigned rows",
                expected: self.nrows,
                actual: values.nrows,
            });
        }
        if values.ncols != columns.len() {
            return Err(Error::LengthMismatch {
                what: "assigned columns",
                expected: columns.len(),
                actual: values.ncols,
            });
        }
        let values = values.conform_to(self.dtype)?;
        let width = self.dtype.width();
        let row_len = self.row_len();
        for (index, source) in values.rows().enumerate() {
            let target = &mut self.data[index * row_len..(index + 1) * row_len];
            for (slot, &column) in columns.iter().enumerate() {
                target[column * width..(column + 1) * width]
                    .copy_from_slice(&source[slot * width..(slot + 1) * width]);
            }
        }
        Ok(())
    }

    /// The same values with element type `dtype`, reordering bytes if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ElementTypeMismatch`] if the kinds or widths differ.
    pub fn conform_to(&self, dtype: ElementType) -> Result<Self> {
        if !dtype.is_compatible(self.dtype) {
            return Err(Error::ElementTypeMismatch { expected: dtype, actual: self.dtype });
        }
        let (nrows, ncols) = (self.nrows, self.ncols);
        Ok(convert(self.dtype, &self.data, dtype.byte_order(), |dtype, data| Self {
            dtype,
            nrows,
            ncols,
            data,
        }))
    }

    /// Decodes every element, row-major, as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ElementTypeMismatch`] if `T` has a different kind
    /// or width than the matrix.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        decode(self.dtype, &self.data)
    }

    fn check_columns(&self, columns: &[usize]) -> Result<()> {
        match columns.iter().find(|&&column| column >= self.ncols) {
            Some(column) => Err(Error::InvalidSelection {
                reason: format!("column {column} out of range for {} columns", self.ncols),
            }),
            None => Ok(()),
        }
    }
}

fn convert<B>(
    dtype: ElementType,
    data: &[u8],
    byte_order: ByteOrder,
    build: impl FnOnce(ElementType, Vec<u8>) -> B,
) -> B {
    let target = dtype.with_byte_order(byte_order);
    let mut data = data.to_vec();
    if target != dtype {
        swap_byte_order(&mut data, dtype.width());
    }
    build(target, data)
}

fn decode<T: Element>(dtype: ElementType, data: &[u8]) -> Result<Vec<T>> {
    if !T::TYPE.is_compatible(dtype) {
        return Err(Error::ElementTypeMismatch { expected: T::TYPE, actual: dtype });
    }
    let width = dtype.width();
    if dtype.byte_order() == T::TYPE.byte_order() {
        return Ok(data.chunks_exact(width).map(T::read_le).collect());
    }
    let mut swapped = data.to_vec();
    swap_byte_order(&mut swapped, width);
    Ok(swapped.chunks_exact(width).map(T::read_le).collect())
}

/// Bytes in one row of `ncols` elements.
///
/// # Errors
///
/// Returns [`Error::ShapeOverflow`] if the size does not fit in `usize`.
pub(crate) fn row_byte_len(dtype: ElementType, ncols: usize) -> Result<usize> {
    byte_len(dtype, 1, ncols)
}

/// Bytes in a row-major block of shape `(nrows, ncols)`.
///
/// The row length is checked on its own so an empty block of impossibly wide
/// rows is still rejected.
pub(crate) fn byte_len(dtype: ElementType, nrows: usize, ncols: usize) -> Result<usize> {
    ncols
        .checked_mul(dtype.width())
        .and_then(|row_len| row_len.checked_mul(nrows))
        .ok_or(Error::ShapeOverflow { nrows, ncols, dtype })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    fn grid() -> Matrix {
        // 3 x 4 of i32, value = 10 * row + col
        let values: Vec<i32> = (0..3).flat_map(|r| (0..4).map(move |c| 10 * r + c)).collect();
        Matrix::from_slice(3, 4, &values).unwrap()
    }

    #[test]
    fn test_elements_round_trip() {
        let elements = Elements::from_slice(&[1.5f32, -0.0, f32::INFINITY]);
        assert_eq!(elements.dtype(), ElementType::FLOAT32);
        assert_eq!(elements.len(), 3);
        assert_eq!(elements.as_bytes().len(), 12);
        let back: Vec<f32> = elements.to_vec().unwrap();
        assert_eq!(back[0], 1.5);
        assert!(back[1].is_sign_negative());
        assert!(back[2].is_infinite());
    }

    #[test]
    fn test_elements_reject_partial_element() {
        let result = Elements::from_bytes(ElementType::INT32, vec![0; 6]);
        assert!(matches!(result, Err(Error::LengthMismatch { expected: 8, actual: 6, .. })));
    }

    #[test]
    fn test_elements_to_vec_checks_type() {
        let elements = Elements::from_slice(&[1i64, 2]);
        assert!(matches!(elements.to_vec::<u64>(), Err(Error::ElementTypeMismatch { .. })));
        assert!(matches!(elements.to_vec::<i32>(), Err(Error::ElementTypeMismatch { .. })));
    }

    #[test]
    fn test_big_endian_decodes_to_same_values() {
        let elements = Elements::from_slice(&[1u16, 0x0203]);
        let big = elements.to_byte_order(ByteOrder::Big);
        assert_eq!(big.as_bytes(), &[0, 1, 2, 3]);
        assert_eq!(big.to_vec::<u16>().unwrap(), vec![1, 0x0203]);
        assert_eq!(big.to_byte_order(ByteOrder::Little), elements);
    }

    #[test]
    fn test_matrix_rejects_wrong_length() {
        assert!(Matrix::from_slice(2, 3, &[1u8; 5]).is_err());
        assert!(Matrix::new(ElementType::FLOAT64, 2, 2, vec![0; 31]).is_err());
        let empty = Matrix::new(ElementType::FLOAT64, 0, 5, Vec::new()).unwrap();
        assert_eq!(empty.rows().count(), 0);
    }

    #[test]
    fn test_oversized_shapes_are_rejected() {
        let wide = 1usize << 62;
        let result = Matrix::new(ElementType::FLOAT64, 0, wide, Vec::new());
        assert!(matches!(result, Err(Error::ShapeOverflow { nrows: 0, .. })));
        let result = Matrix::from_rows(ElementType::FLOAT64, wide, Vec::new());
        assert!(matches!(result, Err(Error::ShapeOverflow { .. })));
        let result = Matrix::from_slice::<u8>(usize::MAX, 2, &[]);
        assert!(matches!(result, Err(Error::ShapeOverflow { .. })));

        assert_eq!(byte_len(ElementType::INT16, 3, 5).unwrap(), 30);
        assert_eq!(row_byte_len(ElementType::UINT8, usize::MAX).unwrap(), usize::MAX);
        assert!(row_byte_len(ElementType::UINT16, usize::MAX).is_err());
    }

    #[test]
    fn test_matrix_rows() {
        let matrix = grid();
        assert_eq!(matrix.shape(), (3, 4));
        assert_eq!(matrix.row(1).unwrap().to_vec::<i32>().unwrap(), vec![10, 11, 12, 13]);
        assert!(matrix.row(3).is_none());
        assert_eq!(matrix.rows().count(), 3);
    }

    #[test]
    fn test_select_columns_keeps_order() {
        let selected = grid().select_columns(&[3, 0, 3]).unwrap();
        assert_eq!(selected.shape(), (3, 3));
        assert_eq!(selected.to_vec::<i32>().unwrap(), vec![3, 0, 3, 13, 10, 13, 23, 20, 23]);
    }

    #[test]
    fn test_select_columns_out_of_range() {
        assert!(matches!(grid().select_columns(&[4]), Err(Error::InvalidSelection { .. })));
    }

    #[test]
    fn test_assign_columns() {
        let mut matrix = grid();
        let values = Matrix::from_slice(3, 2, &[-1i32, -2, -3, -4, -5, -6]).unwrap();
        matrix.assign_columns(&[2, 0], &values).unwrap();
        assert_eq!(
            matrix.to_vec::<i32>().unwrap(),
            vec![-2, 1, -1, 3, -4, 11, -3, 13, -6, 21, -5, 23]
        );
    }

    #[test]
    fn test_assign_columns_converts_byte_order() {
        let mut matrix = grid();
        let values = Matrix::from_slice(3, 1, &[7i32, 8, 9]).unwrap();
        let big = values.conform_to(ElementType::INT32.with_byte_order(ByteOrder::Big)).unwrap();
        matrix.assign_columns(&[1], &big).unwrap();
        assert_eq!(matrix.dtype(), ElementType::INT32);
        assert_eq!(matrix.to_vec::<i32>().unwrap()[1], 7);
        assert_eq!(matrix.to_vec::<i32>().unwrap()[9], 9);
    }

    #[test]
    fn test_assign_columns_rejects_mismatch() {
        let mut matrix = grid();
        let wrong_rows = Matrix::from_slice(2, 1, &[1i32, 2]).unwrap();
        assert!(matches!(
            matrix.assign_columns(&[0], &wrong_rows),
            Err(Error::LengthMismatch { what: "assigned rows", .. })
        ));
        let wrong_type = Matrix::from_slice(3, 1, &[1.0f32, 2.0, 3.0]).unwrap();
        assert!(matches!(
            matrix.assign_columns(&[0], &wrong_type),
            Err(Error::ElementTypeMismatch { .. })
        ));
        assert_eq!(matrix, grid());
    }
}
