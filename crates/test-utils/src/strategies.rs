//! Proptest strategies for array-shaped test data.
//!
//! Strategies produce plain Rust values (shapes, element vectors, names) so
//! that crates under test can build their own buffer types from them.
//!
//! # Usage
//!
//! ```no_run
//! use dbarray_test_utils::strategies;
//! use proptest::prelude::*;
//!
//! proptest! {
//!     #[test]
//!     fn my_property((rows, cols, data) in strategies::arb_f32_matrix(8, 16)) {
//!         assert_eq!(data.len(), rows * cols);
//!     }
//! }
//! ```

use proptest::prelude::*;

/// Generates a shape `(rows, cols)` with `1..=max_rows` rows and `1..=max_cols` columns.
pub fn arb_shape(max_rows: usize, max_cols: usize) -> impl Strategy<Value = (usize, usize)> {
    (1..=max_rows, 1..=max_cols)
}

/// Generates a row-major `f32` matrix as `(rows, cols, data)`.
///
/// Values include NaN and infinities; compare bit patterns, not values.
pub fn arb_f32_matrix(
    max_rows: usize,
    max_cols: usize,
) -> impl Strategy<Value = (usize, usize, Vec<f32>)> {
    arb_shape(max_rows, max_cols).prop_flat_map(|(rows, cols)| {
        proptest::collection::vec(any::<f32>(), rows * cols)
            .prop_map(move |data| (rows, cols, data))
    })
}

/// Generates a row-major `i64` matrix as `(rows, cols, data)`.
pub fn arb_i64_matrix(
    max_rows: usize,
    max_cols: usize,
) -> impl Strategy<Value = (usize, usize, Vec<i64>)> {
    arb_shape(max_rows, max_cols).prop_flat_map(|(rows, cols)| {
        proptest::collection::vec(any::<i64>(), rows * cols)
            .prop_map(move |data| (rows, cols, data))
    })
}

/// Generates a raw row of `1..=max_width` bytes, for element-type-agnostic tests.
pub fn arb_row_bytes(max_width: usize) -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), 1..=max_width)
}

/// Generates an attribute name of 1-20 characters matching `[a-z][a-z0-9_]{0,19}`.
pub fn arb_attr_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,19}"
}

/// Generates a selection of row ids in `0..bound`, possibly with repeats.
pub fn arb_row_ids(bound: usize, max_len: usize) -> impl Strategy<Value = Vec<usize>> {
    proptest::collection::vec(0..bound, 1..=max_len)
}
