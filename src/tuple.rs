//! Tuple: a schema plus a value per field, plus an optional RecordId.

use crate::error::{DbError, DbErrorKind};
use crate::field::Field;
use crate::page_id::RecordId;
use crate::schema::TupleDesc;

#[derive(Debug, Clone)]
pub struct Tuple {
    schema: TupleDesc,
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Build a tuple from field values. Fails with `SchemaMismatch` if the
    /// number of values or their types disagree with `schema`.
    pub fn new(schema: TupleDesc, fields: Vec<Field>) -> Result<Tuple, DbError> {
        if fields.len() != schema.num_fields() {
            return Err(DbError::new(
                DbErrorKind::SchemaMismatch,
                format!(
                    "expected {} fields, got {}",
                    schema.num_fields(),
                    fields.len()
                ),
            ));
        }
        for (i, field) in fields.iter().enumerate() {
            if field.field_type() != schema.field_type(i) {
                return Err(DbError::new(
                    DbErrorKind::SchemaMismatch,
                    format!("field {} has the wrong type", i),
                ));
            }
        }
        Ok(Tuple {
            schema,
            fields,
            record_id: None,
        })
    }

    pub fn schema(&self) -> &TupleDesc {
        &self.schema
    }

    pub fn field(&self, i: usize) -> &Field {
        &self.fields[i]
    }

    pub fn set_field(&mut self, i: usize, value: Field) {
        self.fields[i] = value;
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, rid: Option<RecordId>) {
        self.record_id = rid;
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.schema.size());
        for field in &self.fields {
            field.serialize(&mut buf);
        }
        buf
    }

    /// Decode a tuple from exactly `schema.size()` bytes. The returned tuple
    /// has no RecordId; the caller (HeapPage) assigns one.
    pub fn deserialize(schema: &TupleDesc, bytes: &[u8]) -> Result<Tuple, DbError> {
        let mut fields = Vec::with_capacity(schema.num_fields());
        let mut offset = 0;
        for i in 0..schema.num_fields() {
            let ty = schema.field_type(i);
            let field = Field::deserialize(ty, &bytes[offset..])?;
            offset += ty.len();
            fields.push(field);
        }
        Ok(Tuple {
            schema: schema.clone(),
            fields,
            record_id: None,
        })
    }
}

impl std::fmt::Display for Tuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", field)?;
        }
        write!(f, ")")
    }
}
