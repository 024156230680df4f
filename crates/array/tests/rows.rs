//! Row storage: round trips, metadata persistence and selections.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]

use dbarray::{BackendKind, DbArray, Elements, ElementType, Index, Matrix, Selection};
use dbarray_test_utils::{TestDir, strategies};
use proptest::prelude::*;

fn populated(dir: &TestDir, kind: BackendKind, rows: usize, cols: usize) -> DbArray {
    let values: Vec<f32> = (0..rows * cols).map(|i| i as f32 * 0.5).collect();
    let matrix = Matrix::from_slice(rows, cols, &values).unwrap();
    DbArray::from_matrix(dir.join("array"), kind, &matrix).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_f32_rows_round_trip_bit_identical(
        (rows, cols, data) in strategies::arb_f32_matrix(6, 32)
    ) {
        for kind in BackendKind::ALL {
            let dir = TestDir::new();
            let mut array = DbArray::open(dir.join("array"), kind).unwrap();
            array.set_dtype(ElementType::FLOAT32).unwrap();
            array.set_shape((rows, cols)).unwrap();

            for (row_id, row) in data.chunks(cols).enumerate() {
                array.set_row(row_id, &Elements::from_slice(row)).unwrap();
            }
            for (row_id, row) in data.chunks(cols).enumerate() {
                let stored = array.get_row(row_id).unwrap();
                let expected = Elements::from_slice(row);
                prop_assert_eq!(stored.as_bytes(), expected.as_bytes());
            }
            array.close();
        }
    }

    #[test]
    fn prop_raw_byte_rows_round_trip(row in strategies::arb_row_bytes(64)) {
        for kind in BackendKind::ALL {
            let dir = TestDir::new();
            let mut array = DbArray::open(dir.join("array"), kind).unwrap();
            array.set_dtype(ElementType::UINT8).unwrap();
            array.set_shape((3, row.len())).unwrap();

            let elements = Elements::from_bytes(ElementType::UINT8, row.clone()).unwrap();
            array.set_row(2, &elements).unwrap();
            let stored = array.get_row(2).unwrap();
            prop_assert_eq!(stored.as_bytes(), row.as_slice());
            prop_assert!(array.get_row(1).unwrap_err().is_key_not_found());
            array.close();
        }
    }

    #[test]
    fn prop_i64_matrix_round_trip((rows, cols, data) in strategies::arb_i64_matrix(5, 12)) {
        let dir = TestDir::new();
        let matrix = Matrix::from_slice(rows, cols, &data).unwrap();
        let array = DbArray::from_matrix(dir.join("array"), BackendKind::Sqlite, &matrix).unwrap();
        prop_assert_eq!(array.to_matrix().unwrap(), matrix);
        array.close();
    }

    #[test]
    fn prop_row_lists_read_in_order(ids in strategies::arb_row_ids(8, 10)) {
        let dir = TestDir::new();
        let array = populated(&dir, BackendKind::Redb, 8, 4);
        let selected = array.get(ids.clone()).unwrap();
        let expected = array.get_rows(&ids).unwrap();
        prop_assert_eq!(selected.shape(), (ids.len(), 4));
        prop_assert_eq!(selected, expected);
        array.close();
    }
}

#[test]
fn test_shape_and_dtype_survive_reopen() {
    for kind in BackendKind::ALL {
        let dir = TestDir::new();
        let path = dir.join("float32.db");

        let mut array = DbArray::open(&path, kind).unwrap();
        array.set_shape((100, 256)).unwrap();
        array.set_dtype("float32").unwrap();
        array.close();

        let reopened = DbArray::open(&path, kind).unwrap();
        assert_eq!(reopened.nrows(), Some(100));
        assert_eq!(reopened.ncols(), Some(256));
        assert_eq!(reopened.len(), 100);
        assert_eq!(reopened.dtype(), Some(ElementType::FLOAT32));
        assert_eq!(reopened.dtype().unwrap().name(), "float32");
        reopened.close();
    }
}

#[test]
fn test_rows_survive_reopen() {
    let dir = TestDir::new();
    let array = populated(&dir, BackendKind::Redb, 10, 6);
    let before = array.to_matrix().unwrap();
    array.close();

    let reopened = DbArray::open(dir.join("array"), BackendKind::Redb).unwrap();
    assert_eq!(reopened.to_matrix().unwrap(), before);
    reopened.close();
}

#[test]
fn test_range_selection_equals_individual_rows() {
    for kind in BackendKind::ALL {
        let dir = TestDir::new();
        let array = populated(&dir, kind, 20, 8);

        let range = array.get(1..10).unwrap();
        let mut expected = Vec::new();
        for row_id in 1..10 {
            expected.extend_from_slice(array.get_row(row_id).unwrap().as_bytes());
        }
        assert_eq!(range.shape(), (9, 8));
        assert_eq!(range.as_bytes(), expected.as_slice());
        array.close();
    }
}

#[test]
fn test_list_selection_keeps_order() {
    let dir = TestDir::new();
    let array = populated(&dir, BackendKind::Sqlite, 20, 8);

    let listed = array.get(vec![1, 2, 5]).unwrap();
    for (slot, row_id) in [1, 2, 5].into_iter().enumerate() {
        assert_eq!(listed.row(slot).unwrap(), array.get_row(row_id).unwrap());
    }

    let reversed = array.get(vec![5, 2, 1]).unwrap();
    assert_eq!(reversed.row(0).unwrap(), array.get_row(5).unwrap());
    array.close();
}

#[test]
fn test_column_selection_slices_rows() {
    let dir = TestDir::new();
    let array = populated(&dir, BackendKind::Redb, 5, 4);

    let column = array.get((.., 3)).unwrap();
    assert_eq!(column.shape(), (5, 1));
    assert_eq!(column.to_vec::<f32>().unwrap(), vec![1.5, 3.5, 5.5, 7.5, 9.5]);

    let block = array.get(Selection::from((Index::stepped(0, 5, 2), vec![2, 0]))).unwrap();
    assert_eq!(block.to_vec::<f32>().unwrap(), vec![1.0, 0.0, 5.0, 4.0, 9.0, 8.0]);
    array.close();
}

#[test]
fn test_column_write_is_read_modify_write() {
    let dir = TestDir::new();
    let mut array = populated(&dir, BackendKind::Sqlite, 4, 3);
    let untouched = array.get_row(0).unwrap();

    let values = Matrix::from_slice(3, 2, &[-1.0f32, -2.0, -3.0, -4.0, -5.0, -6.0]).unwrap();
    array.set((1..4, vec![0, 2]), &values).unwrap();

    assert_eq!(array.get_row(0).unwrap(), untouched);
    assert_eq!(array.get_row(1).unwrap().to_vec::<f32>().unwrap(), vec![-1.0, 2.0, -2.0]);
    assert_eq!(array.get_row(3).unwrap().to_vec::<f32>().unwrap(), vec![-5.0, 5.0, -6.0]);
    array.close();
}

#[test]
fn test_column_write_reads_every_row_before_writing() {
    let dir = TestDir::new();
    let mut array = populated(&dir, BackendKind::Redb, 3, 2);

    // Row 7 was never written, so the read fails before row 2 is touched.
    let values = Matrix::from_slice(2, 1, &[42.0f32, 43.0]).unwrap();
    let err = array.set((vec![2, 7], 0), &values).unwrap_err();
    assert!(err.is_key_not_found());
    assert_eq!(array.get_row(2).unwrap().to_vec::<f32>().unwrap(), vec![2.0, 2.5]);
    array.close();
}

#[test]
fn test_shared_handle_between_arrays() {
    for kind in BackendKind::ALL {
        let dir = TestDir::new();
        let path = dir.join("shared");
        let mut writer = DbArray::open(&path, kind).unwrap();
        writer.set_dtype("int64").unwrap();
        writer.set_shape((2, 2)).unwrap();

        let reader = DbArray::open(&path, kind).unwrap();
        assert_eq!(reader.shape(), Some((2, 2)));
        writer.set_row(1, &Elements::from_slice(&[7i64, 8])).unwrap();
        assert_eq!(reader.get_row(1).unwrap().to_vec::<i64>().unwrap(), vec![7, 8]);

        reader.close();
        writer.close();
    }
}

#[test]
fn test_closing_one_array_keeps_the_shared_handle_for_others() {
    for kind in BackendKind::ALL {
        let dir = TestDir::new();
        let path = dir.join("shared");
        let mut first = DbArray::open(&path, kind).unwrap();
        first.set_dtype("float64").unwrap();
        first.set_shape((1, 2)).unwrap();
        let second = DbArray::open(&path, kind).unwrap();

        assert!(first.close());
        let third = DbArray::open(&path, kind).unwrap();
        assert!(third.shares_handle_with(&second));
        assert_eq!(third.shape(), Some((1, 2)));

        second.close();
        third.close();
        let reopened = DbArray::open(&path, kind).unwrap();
        assert_eq!(reopened.dtype(), Some(ElementType::FLOAT64));
        reopened.close();
    }
}
