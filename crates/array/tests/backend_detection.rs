//! Backend-kind resolution when opening existing stores.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]

use std::{fs, path::Path};

use dbarray::{BackendKind, DbArray, Elements, Error};
use dbarray_backend::{Backend, BackendOptions, registry};
use dbarray_test_utils::TestDir;

fn listing(path: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(path)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn other(kind: BackendKind) -> BackendKind {
    match kind {
        BackendKind::Redb => BackendKind::Sqlite,
        BackendKind::Sqlite => BackendKind::Redb,
    }
}

#[test]
fn test_existing_store_keeps_its_kind() {
    for written in BackendKind::ALL {
        let dir = TestDir::new();
        let path = dir.join("array");

        let mut array = DbArray::open(&path, written).unwrap();
        array.set_dtype("int16").unwrap();
        array.set_shape((2, 3)).unwrap();
        array.set_row(1, &Elements::from_slice(&[1i16, 2, 3])).unwrap();
        array.close();

        let reopened = DbArray::open(&path, other(written)).unwrap();
        assert_eq!(reopened.backend_kind(), written);
        assert_eq!(reopened.shape(), Some((2, 3)));
        assert_eq!(reopened.get_row(1).unwrap().to_vec::<i16>().unwrap(), vec![1, 2, 3]);
        reopened.close();
    }
}

#[test]
fn test_detection_while_the_writer_is_still_open() {
    let dir = TestDir::new();
    let path = dir.join("array");
    let writer = DbArray::open(&path, BackendKind::Sqlite).unwrap();

    let reader = DbArray::open(&path, BackendKind::Redb).unwrap();
    assert_eq!(reader.backend_kind(), BackendKind::Sqlite);
    reader.close();
    writer.close();
}

#[test]
fn test_unknown_format_fails_without_writing() {
    for requested in BackendKind::ALL {
        let dir = TestDir::new();
        let path = dir.subdir("array");
        fs::write(path.join("README"), b"plain files only").unwrap();

        let err = DbArray::open(&path, requested).unwrap_err();
        assert!(matches!(err, Error::UnknownBackendFormat { .. }), "got {err:?}");
        assert_eq!(listing(&path), vec!["README".to_string()]);
        assert!(!registry().is_open(&path));
    }
}

#[test]
fn test_plain_file_path_is_unknown() {
    let dir = TestDir::new();
    let path = dir.join("array.bin");
    fs::write(&path, b"not a directory").unwrap();

    let err = DbArray::open(&path, BackendKind::Redb).unwrap_err();
    assert!(matches!(err, Error::UnknownBackendFormat { .. }));
    assert_eq!(fs::read(&path).unwrap(), b"not a directory");
}

#[test]
fn test_both_markers_prefer_the_requested_kind() {
    let dir = TestDir::new();
    let path = dir.join("array");
    let mut array = DbArray::open(&path, BackendKind::Redb).unwrap();
    array.set_shape((1, 1)).unwrap();
    array.close();

    // A second engine written into the same directory behind the store's back.
    let sqlite = Backend::open(BackendKind::Sqlite, &path, &BackendOptions::default()).unwrap();
    sqlite
        .put_many(&[
            (b"nrows".as_slice(), (-1i64).to_be_bytes().as_slice()),
            (b"ncols".as_slice(), (-1i64).to_be_bytes().as_slice()),
            (b"dtype".as_slice(), b"None".as_slice()),
        ])
        .unwrap();
    assert!(sqlite.close());
    assert!(!registry().is_open(&path));
    assert_eq!(BackendKind::detect(&path).len(), 2);

    let redb = DbArray::open(&path, BackendKind::Redb).unwrap();
    assert_eq!(redb.backend_kind(), BackendKind::Redb);
    assert_eq!(redb.shape(), Some((1, 1)));
    redb.close();

    let sqlite = DbArray::open(&path, BackendKind::Sqlite).unwrap();
    assert_eq!(sqlite.backend_kind(), BackendKind::Sqlite);
    assert_eq!(sqlite.shape(), None);
    sqlite.close();
}

#[test]
fn test_partially_initialized_store_is_missing_metadata() {
    let dir = TestDir::new();
    let path = dir.join("array");
    let backend = Backend::open(BackendKind::Redb, &path, &BackendOptions::default()).unwrap();
    backend.put(b"nrows", &10i64.to_be_bytes()).unwrap();
    backend.put(b"ncols", &4i64.to_be_bytes()).unwrap();

    let err = DbArray::open(&path, BackendKind::Redb).unwrap_err();
    assert!(matches!(err, Error::MissingMetadata { key: "dtype" }), "got {err:?}");
    assert_eq!(registry().open_count(&path), 1);
    assert!(backend.close());
    assert!(!registry().is_open(&path));
}
