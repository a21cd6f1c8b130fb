//! The backend-neutral façade every storage engine implements (spec
//! §4.3). `Database` drives an experiment entirely through this trait;
//! nothing above this layer knows it is talking to PostgreSQL.

use crate::error::OmlResult;
use crate::schema::Schema;
use crate::value::OmlValue;

/// One table discovered on reconnect: `schema` is `None` only for the
/// backend-internal `_senders` table, which carries no user schema.
#[derive(Debug, Clone)]
pub struct TableDescriptor {
    pub name: String,
    pub schema: Option<Schema>,
}

/// A connected, backend-neutral persistence session. Implementations
/// own a single connection and assume a single caller (spec §5
/// "Database instances assume a single calling thread").
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// The placeholder syntax for bound parameter `order` (1-based):
    /// PostgreSQL's `$k`, SQLite's positional `?`.
    fn prepared_var(&self, order: usize) -> String;

    /// A loggable rendering of the connection target (spec §6
    /// "Database URI").
    fn get_uri(&self) -> String;

    /// Issues the DDL for `schema` if absent and prepares its insert
    /// statement. Idempotent: calling twice for the same table name is
    /// a no-op on the second call.
    async fn table_create(&mut self, schema: &Schema) -> OmlResult<()>;

    /// Drops a table and forgets its prepared statement.
    async fn table_free(&mut self, table: &str) -> OmlResult<()>;

    /// Inserts one row. `sender_id`/`seq`/`ts_client`/`ts_server` are
    /// the four implicit metadata columns; `values` must already be
    /// type-checked against the table's schema by the caller.
    async fn insert(
        &mut self,
        table: &str,
        sender_id: i32,
        seq: i32,
        ts_client: f64,
        ts_server: f64,
        values: &[OmlValue],
    ) -> OmlResult<()>;

    /// Resolves a sender name to its stable id, allocating a new one
    /// on first encounter (spec §4.3 "Sender id allocation").
    async fn add_sender_id(&mut self, name: &str) -> OmlResult<i32>;

    async fn get_key_value(&mut self, key: &str) -> OmlResult<Option<String>>;
    async fn set_key_value(&mut self, key: &str, value: &str) -> OmlResult<()>;

    async fn get_metadata(&mut self, key: &str) -> OmlResult<Option<String>>;
    async fn set_metadata(&mut self, key: &str, value: &str) -> OmlResult<()>;

    /// Enumerates user tables plus `_senders`, resolving each table's
    /// schema from `_experiment_metadata` (spec §4.3 "Table-list
    /// rediscovery").
    async fn get_table_list(&mut self) -> OmlResult<Vec<TableDescriptor>>;

    /// Executes arbitrary SQL outside the row-insert path, returning
    /// the affected row count.
    async fn stmt(&mut self, sql: &str) -> OmlResult<u64>;

    /// Final commit and disconnect.
    async fn release(&mut self) -> OmlResult<()>;
}
