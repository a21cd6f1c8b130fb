//! The PostgreSQL type map (spec §4.3 "Type map", §4.4): each semantic
//! `FieldType` gets a DDL spelling. Unsigned types are widened to the
//! next signed size since PostgreSQL has no unsigned integer types;
//! the range loss on the `UInt32 -> INT8` / `UInt64 -> BIGINT` paths is
//! accepted, not worked around (spec §9 Open Question (a)).

use crate::schema::FieldType;

/// The column DDL spelling for `kind`. Vector types all collapse to
/// `TEXT` holding a JSON array (spec §3, §4.3).
pub(crate) fn ddl_for(kind: FieldType) -> &'static str {
    match kind {
        FieldType::Int32 => "INT4",
        FieldType::Int64 => "INT8",
        FieldType::UInt32 => "INT8",
        FieldType::UInt64 => "BIGINT",
        FieldType::Double => "FLOAT8",
        FieldType::Bool => "BOOLEAN",
        FieldType::String => "TEXT",
        FieldType::Blob => "BYTEA",
        FieldType::Guid => "INT8",
        FieldType::VectorInt32
        | FieldType::VectorUInt32
        | FieldType::VectorInt64
        | FieldType::VectorUInt64
        | FieldType::VectorDouble
        | FieldType::VectorBool => "TEXT",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_types_widen_to_signed_ddl() {
        assert_eq!(ddl_for(FieldType::UInt32), "INT8");
        assert_eq!(ddl_for(FieldType::UInt64), "BIGINT");
    }

    #[test]
    fn vectors_collapse_to_text() {
        assert_eq!(ddl_for(FieldType::VectorDouble), "TEXT");
        assert_eq!(ddl_for(FieldType::VectorBool), "TEXT");
    }
}
