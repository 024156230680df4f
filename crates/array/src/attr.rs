//! Tagged attribute values.
//!
//! An attribute's stored bytes are a 3-byte tag followed by the payload:
//!
//! - `nda` + raw element bytes (type name stored under `<name>_dtype`)
//! - `int` + 8-byte big-endian `i64`
//! - `str` + UTF-8 text
//!
//! Tags are fixed-width and distinct, so decode dispatches on the first
//! three bytes alone.

use crate::{
    buffer::Elements,
    dtype::{Element, ElementType},
    error::{Error, Result},
    keys::{ROW_KEY_WIDTH, decode_i64, encode_i64},
};

/// Width of every attribute type tag.
pub const TAG_LEN: usize = 3;

/// Tag of a numeric-buffer attribute.
pub const NUMERIC_BUFFER_TAG: &[u8; TAG_LEN] = b"nda";

/// Tag of an integer attribute.
pub const INTEGER_TAG: &[u8; TAG_LEN] = b"int";

/// Tag of a text attribute.
pub const TEXT_TAG: &[u8; TAG_LEN] = b"str";

/// A value that can be stored as a named attribute.
///
/// Floating-point scalars have no encoding; wrap them in a one-element
/// [`Elements`] buffer instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    /// A typed element buffer.
    NumericBuffer(Elements),
    /// A signed 64-bit integer.
    Integer(i64),
    /// UTF-8 text.
    Text(String),
}

impl AttrValue {
    /// Type tag written before the payload.
    #[must_use]
    pub fn tag(&self) -> &'static [u8; TAG_LEN] {
        match self {
            Self::NumericBuffer(_) => NUMERIC_BUFFER_TAG,
            Self::Integer(_) => INTEGER_TAG,
            Self::Text(_) => TEXT_TAG,
        }
    }

    /// Tag plus payload, as stored under the attribute's name.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::from(self.tag().as_slice());
        match self {
            Self::NumericBuffer(elements) => out.extend_from_slice(elements.as_bytes()),
            Self::Integer(value) => out.extend_from_slice(&encode_i64(*value)),
            Self::Text(text) => out.extend_from_slice(text.as_bytes()),
        }
        out
    }

    /// Decodes the bytes stored under attribute `name`.
    ///
    /// `companion_dtype` is only called for numeric buffers, to fetch the
    /// element type from the `<name>_dtype` companion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownAttributeType`] for an unrecognized tag,
    /// [`Error::InvalidMetadata`] for a malformed payload, or the
    /// companion lookup's error.
    pub fn decode(
        name: &str,
        bytes: &[u8],
        companion_dtype: impl FnOnce() -> Result<ElementType>,
    ) -> Result<Self> {
        let Some((tag, payload)) = bytes.split_first_chunk::<TAG_LEN>() else {
            return Err(Error::UnknownAttributeType { name: name.to_string(), tag: bytes.to_vec() });
        };
        match tag {
            NUMERIC_BUFFER_TAG => {
                let dtype = companion_dtype()?;
                Elements::from_bytes(dtype, payload.to_vec()).map(Self::NumericBuffer)
            }
            INTEGER_TAG => decode_i64(name, payload).map(Self::Integer),
            TEXT_TAG => String::from_utf8(payload.to_vec()).map(Self::Text).map_err(|err| {
                Error::InvalidMetadata { key: name.to_string(), reason: err.to_string() }
            }),
            _ => Err(Error::UnknownAttributeType {
                name: name.to_string(),
                tag: bytes.iter().take(ROW_KEY_WIDTH).copied().collect(),
            }),
        }
    }

    /// The integer, if this is an integer attribute.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// The text, if this is a text attribute.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The buffer, if this is a numeric-buffer attribute.
    #[must_use]
    pub fn as_elements(&self) -> Option<&Elements> {
        match self {
            Self::NumericBuffer(elements) => Some(elements),
            _ => None,
        }
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for AttrValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Elements> for AttrValue {
    fn from(value: Elements) -> Self {
        Self::NumericBuffer(value)
    }
}

impl<T: Element> From<Vec<T>> for AttrValue {
    fn from(values: Vec<T>) -> Self {
        Self::NumericBuffer(Elements::from_slice(&values))
    }
}

macro_rules! reject_attribute_type {
    ($($t:ty),* $(,)?) => {
        $(
            impl TryFrom<$t> for AttrValue {
                type Error = Error;

                fn try_from(_: $t) -> Result<Self> {
                    Err(Error::UnsupportedAttributeType { type_name: stringify!($t) })
                }
            }
        )*
    };
}

reject_attribute_type!(f32, f64, bool, char);
