//! Field types and values: the closed `{INT, STRING}` type enumeration.

use crate::error::{DbError, DbErrorKind};

/// Fixed width of a STRING field on disk: a 4-byte length prefix followed by
/// 128 bytes of (zero-padded) UTF-8 payload.
pub const STRING_MAX_LEN: usize = 128;
pub const STRING_FIELD_LEN: usize = 4 + STRING_MAX_LEN;
pub const INT_FIELD_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    String,
}

impl Type {
    /// On-disk width in bytes of a field of this type.
    pub fn len(&self) -> usize {
        match self {
            Type::Int => INT_FIELD_LEN,
            Type::String => STRING_FIELD_LEN,
        }
    }
}

/// A single field value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Int(i32),
    Str(String),
}

impl Field {
    pub fn field_type(&self) -> Type {
        match self {
            Field::Int(_) => Type::Int,
            Field::Str(_) => Type::String,
        }
    }

    /// Append the on-disk encoding of this field to `buf`.
    pub fn serialize(&self, buf: &mut Vec<u8>) {
        match self {
            Field::Int(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Field::Str(s) => {
                let bytes = s.as_bytes();
                debug_assert!(bytes.len() <= STRING_MAX_LEN);
                let len = bytes.len().min(STRING_MAX_LEN) as u32;
                buf.extend_from_slice(&len.to_be_bytes());
                buf.extend_from_slice(&bytes[..len as usize]);
                buf.resize(buf.len() + (STRING_MAX_LEN - len as usize), 0);
            }
        }
    }

    /// Decode a field of the given type from the front of `bytes`, which
    /// must be at least `ty.len()` bytes long.
    pub fn deserialize(ty: Type, bytes: &[u8]) -> Result<Field, DbError> {
        match ty {
            Type::Int => {
                let arr: [u8; 4] = bytes[..4].try_into().map_err(|_| {
                    DbError::new(DbErrorKind::IoError, "truncated int field")
                })?;
                Ok(Field::Int(i32::from_be_bytes(arr)))
            }
            Type::String => {
                let len_bytes: [u8; 4] = bytes[..4].try_into().map_err(|_| {
                    DbError::new(DbErrorKind::IoError, "truncated string length")
                })?;
                let len = u32::from_be_bytes(len_bytes) as usize;
                let len = len.min(STRING_MAX_LEN);
                let payload = &bytes[4..4 + len];
                let s = String::from_utf8_lossy(payload).into_owned();
                Ok(Field::Str(s))
            }
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{}", v),
            Field::Str(s) => write!(f, "{}", s),
        }
    }
}
