//! TupleDesc: an ordered, non-empty sequence of `(type, optional name)`
//! pairs describing the fields of every tuple in a table.

use crate::error::{DbError, DbErrorKind};
use crate::field::Type;

#[derive(Debug, Clone)]
struct FieldSpec {
    ty: Type,
    name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TupleDesc {
    fields: Vec<FieldSpec>,
}

impl TupleDesc {
    /// Build a schema from `(type, name)` pairs. Fails with `SchemaMismatch`
    /// if given no fields.
    pub fn new(fields: Vec<(Type, Option<String>)>) -> Result<TupleDesc, DbError> {
        if fields.is_empty() {
            return Err(DbError::new(
                DbErrorKind::SchemaMismatch,
                "a schema must have at least one field",
            ));
        }
        Ok(TupleDesc {
            fields: fields
                .into_iter()
                .map(|(ty, name)| FieldSpec { ty, name })
                .collect(),
        })
    }

    /// Convenience constructor for schemas where every field is named.
    pub fn named(fields: Vec<(Type, &str)>) -> Result<TupleDesc, DbError> {
        TupleDesc::new(
            fields
                .into_iter()
                .map(|(ty, name)| (ty, Some(name.to_string())))
                .collect(),
        )
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    /// Sum of the on-disk widths of every field.
    pub fn size(&self) -> usize {
        self.fields.iter().map(|f| f.ty.len()).sum()
    }

    pub fn field_type(&self, i: usize) -> Type {
        self.fields[i].ty
    }

    pub fn field_name(&self, i: usize) -> Option<&str> {
        self.fields[i].name.as_deref()
    }

    /// Look up a field's index by name. Fails with `NoSuchField`.
    pub fn index_of(&self, name: &str) -> Result<usize, DbError> {
        self.fields
            .iter()
            .position(|f| f.name.as_deref() == Some(name))
            .ok_or_else(|| {
                DbError::new(DbErrorKind::NoSuchField, format!("no field named {}", name))
            })
    }
}

/// Equality ignores field names; only the type sequence matters.
impl PartialEq for TupleDesc {
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(other.fields.iter())
                .all(|(a, b)| a.ty == b.ty)
    }
}
impl Eq for TupleDesc {}
