//! A registered table's handle: its schema, the prepared insert
//! statement name, and a per-parameter scratch buffer reused across
//! inserts (spec §3 "Table handle", §9 "Scratch buffers per column").

use crate::schema::Schema;
use crate::util::MString;

pub struct TableHandle {
    pub schema: Schema,
    pub insert_stmt_name: String,
    scratch: Vec<MString>,
}

impl TableHandle {
    pub fn new(schema: Schema) -> Self {
        let insert_stmt_name = format!("OMLInsert-{}", schema.name);
        let scratch = (0..schema.param_count())
            .map(|_| MString::with_capacity(16))
            .collect();
        Self {
            schema,
            insert_stmt_name,
            scratch,
        }
    }

    /// The scratch buffer backing bound parameter `index` (0-based,
    /// including the four implicit metadata columns).
    pub fn scratch_mut(&mut self, index: usize) -> &mut MString {
        &mut self.scratch[index]
    }

    /// Total bound parameter count: the schema's own `param_count`
    /// (field count plus the four implicit metadata columns).
    pub fn param_count(&self) -> usize {
        self.schema.param_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, FieldType};

    #[test]
    fn allocates_one_scratch_buffer_per_bound_parameter() {
        let schema = Schema::new(
            "power",
            vec![Field::new("v", FieldType::Double), Field::new("ok", FieldType::Bool)],
        )
        .unwrap();
        let mut handle = TableHandle::new(schema);
        assert_eq!(handle.insert_stmt_name, "OMLInsert-power");
        handle.scratch_mut(5).set(b"true");
        assert_eq!(handle.scratch_mut(5).as_slice(), b"true");
    }
}
