//! `Session`: the per-connection front door a server process drives.
//! Wraps a `Database` with the "never abort on a bad row" propagation
//! policy of spec §7 — type mismatches and backend hiccups are logged
//! and the session keeps going.

use super::database::Database;
use crate::error::OmlResult;
use crate::schema::Schema;
use crate::value::OmlValue;

pub struct Session {
    database: Database,
}

impl Session {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub async fn register_table(&mut self, schema: Schema) -> OmlResult<()> {
        self.database.register_table(schema).await
    }

    /// Inserts one row, returning whether it was committed. A failure
    /// is logged and the row dropped; the session is never aborted by
    /// it (spec §7 "Propagation policy"). `ts_client` comes from the
    /// (out-of-scope) wire protocol parser's reading of the measurement
    /// tuple.
    pub async fn insert(
        &mut self,
        table: &str,
        sender_name: &str,
        seq: i32,
        ts_client: f64,
        values: &[OmlValue],
    ) -> bool {
        match self
            .database
            .insert(table, sender_name, seq, ts_client, values)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                log::error!("insert into `{}` dropped: {}", table, e);
                false
            }
        }
    }

    pub async fn rediscover_tables(&mut self) -> OmlResult<()> {
        self.database.rediscover_tables().await
    }

    pub fn get_uri(&self) -> String {
        self.database.get_uri()
    }

    pub async fn release(self) -> OmlResult<()> {
        self.database.release().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, FieldType};
    use crate::server::backend::tests::MockBackend;

    #[tokio::test]
    async fn a_dropped_row_does_not_end_the_session() {
        let database = Database::new(Box::new(MockBackend::default()), "exp0");
        let mut session = Session::new(database);
        session
            .register_table(
                Schema::new("power", vec![Field::new("v", FieldType::Double)]).unwrap(),
            )
            .await
            .unwrap();

        assert!(!session.insert("power", "node0", 0, 1.5, &[OmlValue::Bool(true)]).await);
        assert!(session.insert("power", "node0", 1, 1.6, &[OmlValue::Double(1.0)]).await);
    }
}
