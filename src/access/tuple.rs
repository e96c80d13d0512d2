//! Tuples, schemas, and record identity.

use crate::access::value::{Field, FieldType};
use crate::error::{DbError, DbResult};
use crate::storage::page::PageId;
use std::io::{Read, Write};
use std::sync::Arc;

/// Schema of a tuple: arity, per-field types, total byte width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleDesc {
    types: Vec<FieldType>,
}

impl TupleDesc {
    pub fn new(types: Vec<FieldType>) -> Self {
        Self { types }
    }

    pub fn arity(&self) -> usize {
        self.types.len()
    }

    pub fn field_type(&self, i: usize) -> FieldType {
        self.types[i]
    }

    pub fn types(&self) -> &[FieldType] {
        &self.types
    }

    /// Serialized width of one tuple in bytes.
    pub fn tuple_size(&self) -> usize {
        self.types.iter().map(FieldType::byte_len).sum()
    }
}

/// Location of a stored tuple: owning page plus slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub pid: PageId,
    pub slot: u16,
}

impl RecordId {
    pub fn new(pid: PageId, slot: u16) -> Self {
        Self { pid, slot }
    }
}

/// An ordered sequence of typed fields conforming to a [`TupleDesc`].
/// A tuple acquires a [`RecordId`] once it is stored on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    desc: Arc<TupleDesc>,
    fields: Vec<Field>,
    rid: Option<RecordId>,
}

impl Tuple {
    pub fn new(desc: Arc<TupleDesc>, fields: Vec<Field>) -> DbResult<Self> {
        if fields.len() != desc.arity() {
            return Err(DbError::SchemaMismatch(format!(
                "expected {} fields, got {}",
                desc.arity(),
                fields.len()
            )));
        }
        for (i, field) in fields.iter().enumerate() {
            if !field.matches(desc.field_type(i)) {
                return Err(DbError::SchemaMismatch(format!(
                    "field {} ({:?}) does not fit type {:?}",
                    i,
                    field,
                    desc.field_type(i)
                )));
            }
        }
        Ok(Self {
            desc,
            fields,
            rid: None,
        })
    }

    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn field(&self, i: usize) -> &Field {
        &self.fields[i]
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.rid
    }

    pub fn set_record_id(&mut self, rid: Option<RecordId>) {
        self.rid = rid;
    }

    /// Writes the tuple in its fixed-width encoding.
    pub fn write_to(&self, w: &mut impl Write) -> DbResult<()> {
        for (i, field) in self.fields.iter().enumerate() {
            field.write_to(self.desc.field_type(i), w)?;
        }
        Ok(())
    }

    /// Reads one tuple of the given schema.
    pub fn read_from(desc: Arc<TupleDesc>, r: &mut impl Read) -> DbResult<Self> {
        let mut fields = Vec::with_capacity(desc.arity());
        for i in 0..desc.arity() {
            fields.push(Field::read_from(desc.field_type(i), r)?);
        }
        Ok(Self {
            desc,
            fields,
            rid: None,
        })
    }
}

impl std::fmt::Display for Tuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        write!(f, "(")?;
        for field in &self.fields {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}", field)?;
            first = false;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn int_pair_desc() -> Arc<TupleDesc> {
        Arc::new(TupleDesc::new(vec![FieldType::Int, FieldType::Int]))
    }

    #[test]
    fn test_tuple_size() {
        let desc = TupleDesc::new(vec![FieldType::Int, FieldType::Str(16), FieldType::Int]);
        assert_eq!(desc.arity(), 3);
        assert_eq!(desc.tuple_size(), 4 + 20 + 4);
    }

    #[test]
    fn test_arity_mismatch() {
        let result = Tuple::new(int_pair_desc(), vec![Field::Int(1)]);
        assert!(matches!(result, Err(DbError::SchemaMismatch(_))));
    }

    #[test]
    fn test_round_trip() {
        let desc = Arc::new(TupleDesc::new(vec![FieldType::Int, FieldType::Str(8)]));
        let tuple = Tuple::new(desc.clone(), vec![Field::Int(7), Field::Str("hi".into())]).unwrap();

        let mut buf = Vec::new();
        tuple.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), desc.tuple_size());

        let read = Tuple::read_from(desc, &mut Cursor::new(&buf)).unwrap();
        assert_eq!(read.fields(), tuple.fields());
    }

    #[test]
    fn test_record_id_assignment() {
        let mut tuple = Tuple::new(int_pair_desc(), vec![Field::Int(1), Field::Int(2)]).unwrap();
        assert!(tuple.record_id().is_none());

        let rid = RecordId::new(PageId::new(3, 0), 5);
        tuple.set_record_id(Some(rid));
        assert_eq!(tuple.record_id(), Some(rid));
    }

    #[test]
    fn test_display() {
        let tuple = Tuple::new(int_pair_desc(), vec![Field::Int(1), Field::Int(10)]).unwrap();
        assert_eq!(format!("{}", tuple), "(1, 10)");
    }
}
