//! Schema: a named, ordered list of fields a measurement stream is
//! declared against (spec §3).

use crate::error::{OmlError, OmlResult};
use std::collections::HashSet;

/// Semantic type drawn from the set spec.md §3 enumerates. Vector
/// variants are homogeneous and map to a JSON array in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FieldType {
    Int32,
    Int64,
    UInt32,
    UInt64,
    Double,
    Bool,
    String,
    Blob,
    Guid,
    VectorInt32,
    VectorUInt32,
    VectorInt64,
    VectorUInt64,
    VectorDouble,
    VectorBool,
}

impl FieldType {
    /// True for the homogeneous vector variants, which always map to a
    /// JSON-array TEXT column regardless of backend (spec §4.3).
    pub fn is_vector(self) -> bool {
        matches!(
            self,
            FieldType::VectorInt32
                | FieldType::VectorUInt32
                | FieldType::VectorInt64
                | FieldType::VectorUInt64
                | FieldType::VectorDouble
                | FieldType::VectorBool
        )
    }
}

/// One named, typed column of a `Schema`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Field {
    pub name: String,
    pub kind: FieldType,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// An immutable, ordered list of fields for one measurement stream.
/// Immutability is enforced structurally: there is no mutation API
/// once a `Schema` is constructed, matching spec.md §3 invariant (i)
/// and the "immutable once registered" rule.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Schema {
    pub name: String,
    fields: Vec<Field>,
    /// When set, `table_create` prepends a `SERIAL PRIMARY KEY` column
    /// ahead of the metadata columns (spec §6 "a SERIAL primary key
    /// prepended if the schema's first field is the primary-key
    /// sentinel"). Kept out of `fields` so the N+4 bound-parameter
    /// invariant holds for every schema regardless of this flag.
    #[serde(default)]
    serial_primary_key: bool,
}

impl Schema {
    /// Builds a schema, rejecting duplicate field names (invariant i).
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> OmlResult<Self> {
        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(OmlError::Protocol(format!(
                    "duplicate field name `{}` in schema",
                    field.name
                )));
            }
        }
        Ok(Self {
            name: name.into(),
            fields,
            serial_primary_key: false,
        })
    }

    /// Same as `new`, but the persisted table gets an additional
    /// `SERIAL PRIMARY KEY` column ahead of the metadata columns.
    pub fn with_serial_primary_key(name: impl Into<String>, fields: Vec<Field>) -> OmlResult<Self> {
        let mut schema = Self::new(name, fields)?;
        schema.serial_primary_key = true;
        Ok(schema)
    }

    pub fn has_serial_primary_key(&self) -> bool {
        self.serial_primary_key
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Total bound parameter count for a prepared INSERT: the four
    /// implicit metadata columns plus the schema's own fields (spec §3
    /// "Table handle").
    pub fn param_count(&self) -> usize {
        self.fields.len() + 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_field_names() {
        let fields = vec![
            Field::new("v", FieldType::Double),
            Field::new("v", FieldType::Bool),
        ];
        assert!(Schema::new("power", fields).is_err());
    }

    #[test]
    fn accepts_unique_field_names() {
        let fields = vec![
            Field::new("v", FieldType::Double),
            Field::new("ok", FieldType::Bool),
        ];
        let schema = Schema::new("power", fields).expect("valid schema");
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.param_count(), 6);
    }
}
