use std::fmt::{self, Display};

/// Wire type identifier of a value.
pub type Oid = u32;

/// Well known type identifiers, numbered like the PostgreSQL catalog.
pub mod oid {
    use super::Oid;

    /// Let the server infer the type.
    pub const UNKNOWN: Oid = 0;
    pub const BOOL: Oid = 16;
    pub const BYTEA: Oid = 17;
    pub const INT8: Oid = 20;
    pub const INT2: Oid = 21;
    pub const INT4: Oid = 23;
    pub const TEXT: Oid = 25;
    pub const FLOAT4: Oid = 700;
    pub const FLOAT8: Oid = 701;
    pub const VARCHAR: Oid = 1043;
    pub const DATE: Oid = 1082;
    pub const TIME: Oid = 1083;
    pub const TIMESTAMP: Oid = 1114;
    pub const NUMERIC: Oid = 1700;
    pub const UUID: Oid = 2950;

    pub const fn is_integer(oid: Oid) -> bool {
        matches!(oid, BOOL | INT2 | INT4 | INT8)
    }

    pub const fn is_float(oid: Oid) -> bool {
        matches!(oid, FLOAT4 | FLOAT8)
    }
}

/// Encoding of the bytes of a [`Value`].
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    #[default]
    Text,
    Binary,
}

/// A value in its wire representation: a bound parameter or a field of a result row.
///
/// `data` is `None` for SQL `NULL`. Text values hold UTF-8, binary values hold the
/// type-specific encoding (big-endian for numbers).
#[derive(Default, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Value {
    pub type_id: Oid,
    pub format: Format,
    pub data: Option<Vec<u8>>,
}

impl Value {
    pub fn new(type_id: Oid, format: Format, data: Option<Vec<u8>>) -> Self {
        Self {
            type_id,
            format,
            data,
        }
    }
    pub fn null(type_id: Oid) -> Self {
        Self::new(type_id, Format::Text, None)
    }
    pub fn text(type_id: Oid, data: impl Into<Vec<u8>>) -> Self {
        Self::new(type_id, Format::Text, Some(data.into()))
    }
    pub fn binary(type_id: Oid, data: impl Into<Vec<u8>>) -> Self {
        Self::new(type_id, Format::Binary, Some(data.into()))
    }
    pub fn is_null(&self) -> bool {
        self.data.is_none()
    }
    /// Length in bytes, zero for `NULL`.
    pub fn len(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn bytes(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.data, self.format) {
            (None, ..) => f.write_str("NULL"),
            (Some(data), Format::Text) => write!(f, "'{}'", String::from_utf8_lossy(data)),
            (Some(data), Format::Binary) => write!(f, "\\x{}", hex::encode(data)),
        }
    }
}
