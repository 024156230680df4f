//! Key derivation for the shared key space.
//!
//! Rows, reserved metadata and attributes all live in one engine key space:
//!
//! | key | value |
//! |---|---|
//! | `nrows`, `ncols` | 8-byte big-endian `i64` |
//! | `dtype` | canonical element-type name, or `None` |
//! | 8-byte big-endian row id | one packed row |
//! | attribute name | 3-byte tag + payload |
//! | `<name>_dtype` | element-type name of a numeric-buffer attribute |
//!
//! Row keys are exactly [`ROW_KEY_WIDTH`] bytes and reserved keys are five
//! bytes, so attribute names are rejected when they are reserved or when
//! they (or their `_dtype` companion) are exactly eight bytes long.

use crate::error::{Error, Result};

/// Key of the persisted row count.
pub const NROWS_KEY: &str = "nrows";

/// Key of the persisted column count.
pub const NCOLS_KEY: &str = "ncols";

/// Key of the persisted element-type name.
pub const DTYPE_KEY: &str = "dtype";

/// Keys owned by the store's own metadata.
pub const RESERVED_KEYS: [&str; 3] = [NROWS_KEY, NCOLS_KEY, DTYPE_KEY];

/// Persisted `dtype` value when no element type is set.
pub const UNSET_DTYPE: &str = "None";

/// Suffix of the companion attribute naming a numeric buffer's element type.
pub const DTYPE_SUFFIX: &str = "_dtype";

/// Byte width of a row key and of every persisted integer.
pub const ROW_KEY_WIDTH: usize = 8;

/// Largest addressable row id.
pub const MAX_ROW_ID: u64 = i64::MAX as u64;

/// Engine key of row `row_id`.
///
/// # Errors
///
/// Returns [`Error::RowOutOfRange`] if `row_id` does not fit a signed
/// 64-bit integer.
pub fn row_key(row_id: u64) -> Result<[u8; ROW_KEY_WIDTH]> {
    let id = i64::try_from(row_id).map_err(|_| Error::RowOutOfRange {
        row_id,
        reason: format!("row ids must be <= {MAX_ROW_ID}"),
    })?;
    Ok(encode_i64(id))
}

/// Fixed-width encoding shared by row keys, shape metadata and `int` attributes.
#[must_use]
pub fn encode_i64(value: i64) -> [u8; ROW_KEY_WIDTH] {
    value.to_be_bytes()
}

/// Decodes an 8-byte integer stored under `key`.
///
/// # Errors
///
/// Returns [`Error::InvalidMetadata`] if `bytes` is not exactly 8 bytes.
pub fn decode_i64(key: &str, bytes: &[u8]) -> Result<i64> {
    let array: [u8; ROW_KEY_WIDTH] = bytes.try_into().map_err(|_| Error::InvalidMetadata {
        key: key.to_string(),
        reason: format!("expected {ROW_KEY_WIDTH} bytes, got {}", bytes.len()),
    })?;
    Ok(i64::from_be_bytes(array))
}

/// Name of the companion attribute holding `name`'s element type.
#[must_use]
pub fn companion_name(name: &str) -> String {
    format!("{name}{DTYPE_SUFFIX}")
}

/// Checks that an attribute key cannot collide with reserved or row keys.
///
/// # Errors
///
/// Returns [`Error::ReservedAttributeName`] if `name` is empty, reserved,
/// or exactly as long as a row key.
pub fn validate_attr_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "attribute names must not be empty"
    } else if RESERVED_KEYS.contains(&name) {
        "name is a reserved metadata key"
    } else if name.len() == ROW_KEY_WIDTH {
        "8-byte names share the row key space"
    } else {
        return Ok(());
    };
    Err(Error::ReservedAttributeName { name: name.to_string(), reason: reason.to_string() })
}

/// Checks a numeric-buffer attribute name together with its companion.
///
/// # Errors
///
/// Returns [`Error::ReservedAttributeName`] if either key is unusable.
pub fn validate_buffer_attr_name(name: &str) -> Result<()> {
    validate_attr_name(name)?;
    validate_attr_name(&companion_name(name)).map_err(|_| Error::ReservedAttributeName {
        name: name.to_string(),
        reason: format!("companion key `{}` shares the row key space", companion_name(name)),
    })
}
