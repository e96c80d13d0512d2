//! Field values and their on-disk encoding.
//!
//! Fields are polymorphic over integers and strings, modeled as sum types
//! and dispatched at pattern-match sites. All multi-byte quantities are
//! big-endian.

use crate::error::{DbError, DbResult};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Type of a single tuple field.
///
/// String fields are fixed-width on disk: a 4-byte length prefix followed
/// by `cap` bytes of payload, zero-padded past the length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Int,
    Str(usize),
}

impl FieldType {
    /// Serialized width of a field of this type in bytes.
    pub fn byte_len(&self) -> usize {
        match self {
            FieldType::Int => 4,
            FieldType::Str(cap) => 4 + cap,
        }
    }
}

/// A single typed field value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Int(i32),
    Str(String),
}

impl Field {
    /// Checks that this value can be stored under the given type.
    pub fn matches(&self, ty: FieldType) -> bool {
        match (self, ty) {
            (Field::Int(_), FieldType::Int) => true,
            (Field::Str(s), FieldType::Str(cap)) => s.len() <= cap,
            _ => false,
        }
    }

    /// Writes the field in its fixed-width encoding.
    pub fn write_to(&self, ty: FieldType, w: &mut impl Write) -> DbResult<()> {
        match (self, ty) {
            (Field::Int(v), FieldType::Int) => {
                w.write_i32::<BigEndian>(*v)?;
                Ok(())
            }
            (Field::Str(s), FieldType::Str(cap)) => {
                if s.len() > cap {
                    return Err(DbError::SchemaMismatch(format!(
                        "string of length {} exceeds declared cap {}",
                        s.len(),
                        cap
                    )));
                }
                w.write_u32::<BigEndian>(s.len() as u32)?;
                w.write_all(s.as_bytes())?;
                let padding = vec![0u8; cap - s.len()];
                w.write_all(&padding)?;
                Ok(())
            }
            (field, ty) => Err(DbError::SchemaMismatch(format!(
                "field {:?} does not fit type {:?}",
                field, ty
            ))),
        }
    }

    /// Reads a field of the given type from its fixed-width encoding.
    pub fn read_from(ty: FieldType, r: &mut impl Read) -> DbResult<Field> {
        match ty {
            FieldType::Int => Ok(Field::Int(r.read_i32::<BigEndian>()?)),
            FieldType::Str(cap) => {
                let len = r.read_u32::<BigEndian>()? as usize;
                let mut buf = vec![0u8; cap];
                r.read_exact(&mut buf)?;
                let len = len.min(cap);
                let s = String::from_utf8_lossy(&buf[..len]).into_owned();
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
