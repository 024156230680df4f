//! Element types: the fixed-width scalar kinds an array can hold.
//!
//! An [`ElementType`] is a numeric category, a byte width and a byte order.
//! Little-endian types carry numpy-style canonical names (`float32`,
//! `int64`, ...); big-endian types use the typestr form (`>f4`). Both forms
//! parse back to the same value, which is how the `dtype` metadata key and
//! `<name>_dtype` attribute companions are stored.

use std::{fmt, str::FromStr};

use crate::error::{Error, Result};

/// Numeric category of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Signed two's-complement integer.
    Int,
    /// Unsigned integer.
    UInt,
    /// IEEE 754 binary floating point.
    Float,
}

impl ElementKind {
    const fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Float => "float",
        }
    }

    const fn typestr_char(self) -> char {
        match self {
            Self::Int => 'i',
            Self::UInt => 'u',
            Self::Float => 'f',
        }
    }
}

/// Byte order of multi-byte elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// Least significant byte first.
    Little,
    /// Most significant byte first.
    Big,
}

impl ByteOrder {
    /// Byte order of the running platform.
    pub const NATIVE: ByteOrder =
        if cfg!(target_endian = "big") { ByteOrder::Big } else { ByteOrder::Little };
}

/// A fixed-width scalar element type.
///
/// Single-byte types have no byte order; they are always normalized to
/// [`ByteOrder::Little`] so that equality ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementType {
    kind: ElementKind,
    width: u8,
    byte_order: ByteOrder,
}

impl ElementType {
    /// 8-bit signed integer.
    pub const INT8: Self = Self::little(ElementKind::Int, 1);
    /// 16-bit signed integer.
    pub const INT16: Self = Self::little(ElementKind::Int, 2);
    /// 32-bit signed integer.
    pub const INT32: Self = Self::little(ElementKind::Int, 4);
    /// 64-bit signed integer.
    pub const INT64: Self = Self::little(ElementKind::Int, 8);
    /// 8-bit unsigned integer.
    pub const UINT8: Self = Self::little(ElementKind::UInt, 1);
    /// 16-bit unsigned integer.
    pub const UINT16: Self = Self::little(ElementKind::UInt, 2);
    /// 32-bit unsigned integer.
    pub const UINT32: Self = Self::little(ElementKind::UInt, 4);
    /// 64-bit unsigned integer.
    pub const UINT64: Self = Self::little(ElementKind::UInt, 8);
    /// 32-bit float.
    pub const FLOAT32: Self = Self::little(ElementKind::Float, 4);
    /// 64-bit float.
    pub const FLOAT64: Self = Self::little(ElementKind::Float, 8);

    const fn little(kind: ElementKind, width: u8) -> Self {
        Self { kind, width, byte_order: ByteOrder::Little }
    }

    /// Builds an element type, checking that the width suits the kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidElementType`] for widths other than 1, 2, 4
    /// or 8, or float widths other than 4 or 8.
    pub fn new(kind: ElementKind, width: u8, byte_order: ByteOrder) -> Result<Self> {
        let valid = match kind {
            ElementKind::Float => matches!(width, 4 | 8),
            ElementKind::Int | ElementKind::UInt => matches!(width, 1 | 2 | 4 | 8),
        };
        if !valid {
            let name = format!("{}{}", kind.name(), u32::from(width) * 8);
            return Err(Error::InvalidElementType { name });
        }
        let byte_order = if width == 1 { ByteOrder::Little } else { byte_order };
        Ok(Self { kind, width, byte_order })
    }

    /// The canonical element type of a Rust scalar.
    #[must_use]
    pub const fn of<T: Element>() -> Self {
        T::TYPE
    }

    /// Numeric category.
    #[must_use]
    pub const fn kind(self) -> ElementKind {
        self.kind
    }

    /// Width of one element in bytes.
    #[must_use]
    pub const fn width(self) -> usize {
        self.width as usize
    }

    /// Byte order of one element.
    #[must_use]
    pub const fn byte_order(self) -> ByteOrder {
        self.byte_order
    }

    /// The same kind and width in another byte order.
    #[must_use]
    pub fn with_byte_order(self, byte_order: ByteOrder) -> Self {
        let byte_order = if self.width == 1 { ByteOrder::Little } else { byte_order };
        Self { byte_order, ..self }
    }

    /// Whether values of `other` can be stored as `self` by reordering bytes.
    #[must_use]
    pub fn is_compatible(self, other: ElementType) -> bool {
        self.kind == other.kind && self.width == other.width
    }

    /// Canonical name used for persistence.
    #[must_use]
    pub fn name(self) -> String {
        match self.byte_order {
            ByteOrder::Little => format!("{}{}", self.kind.name(), u32::from(self.width) * 8),
            ByteOrder::Big => format!(">{}{}", self.kind.typestr_char(), self.width),
        }
    }

    /// Parses a canonical name (`float32`) or a typestr (`<f4`, `>i8`, `f8`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidElementType`] if `name` is neither.
    pub fn parse(name: &str) -> Result<Self> {
        parse_canonical(name)
            .or_else(|| parse_typestr(name))
            .ok_or_else(|| Error::InvalidElementType { name: name.to_string() })
    }
}

fn parse_canonical(name: &str) -> Option<ElementType> {
    let (kind, bits) = if let Some(bits) = name.strip_prefix("uint") {
        (ElementKind::UInt, bits)
    } else if let Some(bits) = name.strip_prefix("int") {
        (ElementKind::Int, bits)
    } else if let Some(bits) = name.strip_prefix("float") {
        (ElementKind::Float, bits)
    } else {
        return None;
    };
    let width = match bits {
        "8" => 1,
        "16" => 2,
        "32" => 4,
        "64" => 8,
        _ => return None,
    };
    ElementType::new(kind, width, ByteOrder::Little).ok()
}

fn parse_typestr(name: &str) -> Option<ElementType> {
    let mut chars = name.chars().peekable();
    let byte_order = match chars.peek() {
        Some('<') => Some(ByteOrder::Little),
        Some('>') => Some(ByteOrder::Big),
        Some('=' | '|') => Some(ByteOrder::NATIVE),
        _ => None,
    };
    if byte_order.is_some() {
        chars.next();
    }
    let kind = match chars.next()? {
        'i' => ElementKind::Int,
        'u' => ElementKind::UInt,
        'f' => ElementKind::Float,
        _ => return None,
    };
    let width: u8 = chars.collect::<String>().parse().ok()?;
    ElementType::new(kind, width, byte_order.unwrap_or(ByteOrder::NATIVE)).ok()
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for ElementType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

mod sealed {
    pub trait Sealed {}
}

/// A Rust scalar that can be stored as an array element.
///
/// Implemented for the fixed-width integers and `f32`/`f64`. Values are
/// encoded little-endian, matching [`Element::TYPE`].
pub trait Element: sealed::Sealed + Copy + Send + Sync + 'static {
    /// Canonical element type of this scalar.
    const TYPE: ElementType;

    /// Appends the little-endian bytes of `self`.
    fn write_le(self, out: &mut Vec<u8>);

    /// Decodes one value from exactly `TYPE.width()` little-endian bytes.
    ///
    /// Callers pass chunks produced by `chunks_exact(TYPE.width())`.
    fn read_le(chunk: &[u8]) -> Self;
}

macro_rules! impl_element {
    ($($t:ty => $ty:expr),* $(,)?) => {
        $(
            impl sealed::Sealed for $t {}

            impl Element for $t {
                const TYPE: ElementType = $ty;

                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn read_le(chunk: &[u8]) -> Self {
                    let mut bytes = [0u8; std::mem::size_of::<$t>()];
                    bytes.copy_from_slice(chunk);
                    <$t>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_element! {
    i8 => ElementType::INT8,
    i16 => ElementType::INT16,
    i32 => ElementType::INT32,
    i64 => ElementType::INT64,
    u8 => ElementType::UINT8,
    u16 => ElementType::UINT16,
    u32 => ElementType::UINT32,
    u64 => ElementType::UINT64,
    f32 => ElementType::FLOAT32,
    f64 => ElementType::FLOAT64,
}

/// Reverses the byte order of every `width`-byte element in `data`.
pub(crate) fn swap_byte_order(data: &mut [u8], width: usize) {
    if width > 1 {
        for element in data.chunks_exact_mut(width) {
            element.reverse();
        }
    }
}

/// Any representation accepted by [`DbArray::set_dtype`](crate::DbArray::set_dtype).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DtypeSpec {
    /// An explicit element type.
    Descriptor(ElementType),
    /// A canonical name or typestr, resolved on use.
    Name(String),
    /// No element type; persisted as `None`.
    Unset,
}

impl DtypeSpec {
    /// Normalizes to an element type, or `None` when unset.
    ///
    /// The literal name `None` resolves to unset, matching what is stored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidElementType`] for unparseable names.
    pub fn resolve(self) -> Result<Option<ElementType>> {
        match self {
            Self::Descriptor(dtype) => Ok(Some(dtype)),
            Self::Name(name) if name == crate::keys::UNSET_DTYPE => Ok(None),
            Self::Name(name) => ElementType::parse(&name).map(Some),
            Self::Unset => Ok(None),
        }
    }
}

impl From<ElementType> for DtypeSpec {
    fn from(dtype: ElementType) -> Self {
        Self::Descriptor(dtype)
    }
}

impl From<Option<ElementType>> for DtypeSpec {
    fn from(dtype: Option<ElementType>) -> Self {
        dtype.map_or(Self::Unset, Self::Descriptor)
    }
}

impl From<&str> for DtypeSpec {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for DtypeSpec {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}
