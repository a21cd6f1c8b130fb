//! `Database`: the generic row-insert algorithm of spec §4.3, driving
//! a `Backend` without knowing which one it is.

use super::backend::Backend;
use crate::error::{OmlError, OmlResult};
use crate::schema::Schema;
use crate::value::OmlValue;
use std::collections::HashMap;
use std::time::Instant;

pub struct Database {
    backend: Box<dyn Backend>,
    pub name: String,
    start_time: Instant,
    tables: HashMap<String, Schema>,
    sender_ids: HashMap<String, i32>,
}

impl Database {
    pub fn new(backend: Box<dyn Backend>, name: impl Into<String>) -> Self {
        Self {
            backend,
            name: name.into(),
            start_time: Instant::now(),
            tables: HashMap::new(),
            sender_ids: HashMap::new(),
        }
    }

    pub fn get_uri(&self) -> String {
        self.backend.get_uri()
    }

    /// Issues DDL for a new measurement stream and records its schema
    /// in `_experiment_metadata` so a later reconnect can rediscover
    /// it (spec §4.3 "Table-list rediscovery").
    pub async fn register_table(&mut self, schema: Schema) -> OmlResult<()> {
        self.backend.table_create(&schema).await?;
        let serialised = serde_json::to_string(&schema)
            .map_err(|e| OmlError::Protocol(format!("schema serialisation failed: {}", e)))?;
        self.backend
            .set_metadata(&format!("table_{}", schema.name), &serialised)
            .await?;
        self.tables.insert(schema.name.clone(), schema);
        Ok(())
    }

    async fn sender_id(&mut self, name: &str) -> OmlResult<i32> {
        if let Some(id) = self.sender_ids.get(name) {
            return Ok(*id);
        }
        let id = self.backend.add_sender_id(name).await?;
        self.sender_ids.insert(name.to_string(), id);
        Ok(id)
    }

    /// The per-row insert algorithm (spec §4.3): validate arity and
    /// per-field type against the registered schema, resolve the
    /// sender id, stamp the server timestamp relative to `start_time`,
    /// and delegate encoding and execution to the backend. `ts_client`
    /// is whatever the (out-of-scope) wire protocol parser read off the
    /// measurement tuple; it is not recomputed here.
    pub async fn insert(
        &mut self,
        table: &str,
        sender_name: &str,
        seq: i32,
        ts_client: f64,
        values: &[OmlValue],
    ) -> OmlResult<()> {
        let schema = self
            .tables
            .get(table)
            .ok_or_else(|| OmlError::Protocol(format!("unknown table `{}`", table)))?;

        if values.len() != schema.len() {
            return Err(OmlError::Protocol(format!(
                "table `{}` expects {} values, got {}",
                table,
                schema.len(),
                values.len()
            )));
        }
        for (value, field) in values.iter().zip(schema.fields()) {
            if value.type_of() != field.kind {
                return Err(OmlError::TypeMismatch {
                    field: field.name.clone(),
                    expected: field.kind,
                    found: value.type_of(),
                });
            }
        }

        let sender_id = self.sender_id(sender_name).await?;
        let ts_server = self.start_time.elapsed().as_secs_f64();
        self.backend
            .insert(table, sender_id, seq, ts_client, ts_server, values)
            .await
    }

    /// Rebuilds the in-memory table registry from the backend after a
    /// reconnect (spec §4.3 "Table-list rediscovery").
    pub async fn rediscover_tables(&mut self) -> OmlResult<()> {
        for descriptor in self.backend.get_table_list().await? {
            if let Some(schema) = descriptor.schema {
                self.tables.insert(descriptor.name, schema);
            }
        }
        Ok(())
    }

    pub async fn get_key_value(&mut self, key: &str) -> OmlResult<Option<String>> {
        self.backend.get_key_value(key).await
    }

    pub async fn set_key_value(&mut self, key: &str, value: &str) -> OmlResult<()> {
        self.backend.set_key_value(key, value).await
    }

    pub async fn release(mut self) -> OmlResult<()> {
        self.backend.release().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, FieldType};
    use crate::server::backend::tests::MockBackend;

    fn power_schema() -> Schema {
        Schema::new(
            "power",
            vec![Field::new("v", FieldType::Double), Field::new("ok", FieldType::Bool)],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn rejects_a_value_whose_type_does_not_match_the_schema() {
        let mut db = Database::new(Box::new(MockBackend::default()), "exp0");
        db.register_table(power_schema()).await.unwrap();
        let err = db
            .insert(
                "power",
                "node0",
                0,
                1.5,
                &[OmlValue::Int32(1), OmlValue::Bool(true)],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OmlError::TypeMismatch { .. }));
    }

    #[tokio::test]
    async fn rejects_wrong_arity() {
        let mut db = Database::new(Box::new(MockBackend::default()), "exp0");
        db.register_table(power_schema()).await.unwrap();
        let err = db
            .insert("power", "node0", 0, 1.5, &[OmlValue::Double(1.0)])
            .await
            .unwrap_err();
        assert!(matches!(err, OmlError::Protocol(_)));
    }

    #[tokio::test]
    async fn caches_sender_ids_across_inserts() {
        let mut db = Database::new(Box::new(MockBackend::default()), "exp0");
        db.register_table(power_schema()).await.unwrap();
        db.insert(
            "power",
            "node0",
            0,
            1.5,
            &[OmlValue::Double(1.0), OmlValue::Bool(true)],
        )
        .await
        .unwrap();
        db.insert(
            "power",
            "node0",
            1,
            1.6,
            &[OmlValue::Double(2.0), OmlValue::Bool(false)],
        )
        .await
        .unwrap();
        assert_eq!(db.sender_ids.len(), 1);
    }

    #[tokio::test]
    async fn rediscovers_tables_registered_by_a_prior_session() {
        let mut first = Database::new(Box::new(MockBackend::default()), "exp0");
        first.register_table(power_schema()).await.unwrap();

        // A fresh session against a backend that already has the
        // schema recorded should rediscover it without re-registering.
        let mut backend = MockBackend::default();
        backend.tables.insert("power".to_string(), power_schema());
        let mut second = Database::new(Box::new(backend), "exp0");
        second.rediscover_tables().await.unwrap();
        second
            .insert(
                "power",
                "node0",
                0,
                1.5,
                &[OmlValue::Double(1.0), OmlValue::Bool(true)],
            )
            .await
            .unwrap();
    }
}
