//! The PostgreSQL `Backend` (spec §4.4): two-phase connection bootstrap,
//! prepared-insert construction and execution, sender-id allocation,
//! the generic key/value and experiment-metadata stores, table-list
//! rediscovery, and the commit-interval transaction manager.

use super::encode::{encode_into, RawParam};
use super::notice::spawn_connection;
use super::types::ddl_for;
use crate::error::{OmlError, OmlResult};
use crate::schema::Schema;
use crate::server::backend::{Backend, TableDescriptor};
use crate::server::table::TableHandle;
use crate::value::OmlValue;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Statement};

/// How often `insert` commits and reopens the transaction in the
/// absence of an error (spec §4.4 "Transaction manager", §9
/// "Transaction heartbeat").
const COMMIT_INTERVAL: Duration = Duration::from_secs(1);

/// Connection parameters for the PostgreSQL backend (spec §6
/// "Environment variables"). `get_uri` renders these for logging, never
/// including the password.
#[derive(Debug, Clone)]
pub struct PgConnectConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub dbname: String,
}

impl PgConnectConfig {
    /// `postgresql://<user>@<host>:<port>/<dbname>` (spec §6 "Database
    /// URI (server)").
    pub fn get_uri(&self) -> String {
        format!(
            "postgresql://{}@{}:{}/{}",
            self.user, self.host, self.port, self.dbname
        )
    }

    fn tokio_postgres_config(&self, dbname: &str) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .user(&self.user)
            .dbname(dbname);
        if let Some(password) = &self.password {
            config.password(password);
        }
        config
    }
}

/// Two-phase open (spec §4.4 "Connection"): connect to the admin `postgres`
/// database, verify `CREATEDB`, create the target database if
/// `pg_database` doesn't list it yet, then reconnect to the target.
pub async fn connect(cfg: &PgConnectConfig) -> OmlResult<PgBackend> {
    let admin_config = cfg.tokio_postgres_config("postgres");
    let (admin_client, admin_connection) = admin_config
        .connect(NoTls)
        .await
        .map_err(connect_err)?;
    let admin_task = spawn_connection(admin_connection);

    let can_create_db: bool = admin_client
        .query_one(
            "SELECT rolcreatedb FROM pg_roles WHERE rolname = current_user",
            &[],
        )
        .await
        .map_err(fatal_err)?
        .get(0);
    if !can_create_db {
        return Err(OmlError::ConfigInvalid(format!(
            "postgres role `{}` lacks the CREATEDB privilege",
            cfg.user
        )));
    }

    let already_exists = admin_client
        .query_opt("SELECT 1 FROM pg_database WHERE datname = $1", &[&cfg.dbname])
        .await
        .map_err(fatal_err)?
        .is_some();
    if !already_exists {
        validate_identifier(&cfg.dbname)?;
        admin_client
            .batch_execute(&format!("CREATE DATABASE \"{}\"", cfg.dbname))
            .await
            .map_err(fatal_err)?;
    }
    admin_task.abort();

    let target_config = cfg.tokio_postgres_config(&cfg.dbname);
    let (client, connection) = target_config.connect(NoTls).await.map_err(connect_err)?;
    let conn_task = spawn_connection(connection);
    client.batch_execute("BEGIN;").await.map_err(fatal_err)?;

    Ok(PgBackend {
        client,
        conn_task,
        uri: cfg.get_uri(),
        tables: HashMap::new(),
        statements: HashMap::new(),
        bootstrapped: false,
        last_commit: Instant::now(),
        poisoned: false,
    })
}

fn validate_identifier(name: &str) -> OmlResult<()> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(OmlError::ConfigInvalid(format!(
            "refusing to CREATE DATABASE with unsafe name `{}`",
            name
        )));
    }
    Ok(())
}

fn fatal_err(e: tokio_postgres::Error) -> OmlError {
    OmlError::BackendFatal(e.to_string())
}

fn connect_err(e: tokio_postgres::Error) -> OmlError {
    OmlError::ConfigInvalid(format!("postgres connection failed: {}", e))
}

pub struct PgBackend {
    client: Client,
    conn_task: tokio::task::JoinHandle<()>,
    uri: String,
    tables: HashMap<String, TableHandle>,
    statements: HashMap<String, Statement>,
    bootstrapped: bool,
    last_commit: Instant,
    /// Set when a row's `execute` fails: PostgreSQL poisons the whole
    /// transaction until `ROLLBACK`, so the next `insert` must reopen
    /// it before doing anything else (spec §7 "Transactions never reset
    /// automatically on error inside `insert`").
    poisoned: bool,
}

impl PgBackend {
    /// Creates `_senders` and `_experiment_metadata` on first use.
    /// Deliberately not called at connect time: `get_table_list` on a
    /// never-bootstrapped database needs to observe that absence and
    /// return an empty list rather than erroring (spec §8 "Boundary
    /// behaviors").
    async fn ensure_bootstrap(&mut self) -> OmlResult<()> {
        if self.bootstrapped {
            return Ok(());
        }
        self.client
            .batch_execute(
                "CREATE TABLE IF NOT EXISTS _senders (id INT4 PRIMARY KEY, name TEXT UNIQUE); \
                 CREATE TABLE IF NOT EXISTS _experiment_metadata (key TEXT UNIQUE, value TEXT);",
            )
            .await
            .map_err(fatal_err)?;
        self.bootstrapped = true;
        Ok(())
    }

    /// Reopens the transaction before each insert: a `ROLLBACK; BEGIN;`
    /// if the prior one was poisoned by a failed statement, otherwise a
    /// `COMMIT; BEGIN;` once `COMMIT_INTERVAL` has elapsed (spec §4.4
    /// "Transaction manager", §9 "Transaction heartbeat").
    async fn reopen_transaction(&mut self) -> OmlResult<()> {
        if self.poisoned {
            self.client
                .batch_execute("ROLLBACK; BEGIN;")
                .await
                .map_err(fatal_err)?;
            self.poisoned = false;
            self.last_commit = Instant::now();
        } else if self.last_commit.elapsed() >= COMMIT_INTERVAL {
            self.client
                .batch_execute("COMMIT; BEGIN;")
                .await
                .map_err(fatal_err)?;
            self.last_commit = Instant::now();
        }
        Ok(())
    }

    fn insert_sql(schema: &Schema) -> String {
        let mut columns = vec![
            "oml_sender_id".to_string(),
            "oml_seq".to_string(),
            "oml_ts_client".to_string(),
            "oml_ts_server".to_string(),
        ];
        columns.extend(schema.fields().iter().map(|f| format!("\"{}\"", f.name)));
        let placeholders: Vec<String> = (1..=schema.param_count()).map(|k| format!("${}", k)).collect();
        format!(
            "INSERT INTO \"{}\" ({}) VALUES ({});",
            schema.name,
            columns.join(", "),
            placeholders.join(", ")
        )
    }

    fn create_ddl(schema: &Schema) -> String {
        let mut columns = Vec::new();
        if schema.has_serial_primary_key() {
            columns.push("\"id\" SERIAL PRIMARY KEY".to_string());
        }
        columns.push("oml_sender_id INT4".to_string());
        columns.push("oml_seq INT4".to_string());
        columns.push("oml_ts_client FLOAT8".to_string());
        columns.push("oml_ts_server FLOAT8".to_string());
        for field in schema.fields() {
            columns.push(format!("\"{}\" {}", field.name, ddl_for(field.kind)));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" ({});",
            schema.name,
            columns.join(", ")
        )
    }
}

#[async_trait::async_trait]
impl Backend for PgBackend {
    fn prepared_var(&self, order: usize) -> String {
        format!("${}", order)
    }

    fn get_uri(&self) -> String {
        self.uri.clone()
    }

    async fn table_create(&mut self, schema: &Schema) -> OmlResult<()> {
        // Idempotent: a schema already registered this session is a
        // no-op, matching the "describe before create" rule (spec
        // §4.3 "The backend additionally describes the prepared
        // statement before creating it; if already present ... no
        // re-prepare occurs").
        if self.statements.contains_key(&schema.name) {
            return Ok(());
        }
        self.ensure_bootstrap().await?;
        self.client
            .batch_execute(&Self::create_ddl(schema))
            .await
            .map_err(fatal_err)?;
        let stmt = self
            .client
            .prepare(&Self::insert_sql(schema))
            .await
            .map_err(fatal_err)?;
        self.statements.insert(schema.name.clone(), stmt);
        self.tables
            .insert(schema.name.clone(), TableHandle::new(schema.clone()));
        Ok(())
    }

    async fn table_free(&mut self, table: &str) -> OmlResult<()> {
        self.client
            .batch_execute(&format!("DROP TABLE IF EXISTS \"{}\";", table))
            .await
            .map_err(fatal_err)?;
        self.statements.remove(table);
        self.tables.remove(table);
        Ok(())
    }

    async fn insert(
        &mut self,
        table: &str,
        sender_id: i32,
        seq: i32,
        ts_client: f64,
        ts_server: f64,
        values: &[OmlValue],
    ) -> OmlResult<()> {
        self.reopen_transaction().await?;

        let stmt = self
            .statements
            .get(table)
            .ok_or_else(|| OmlError::Protocol(format!("no prepared insert for table `{}`", table)))?
            .clone();
        let handle = self
            .tables
            .get_mut(table)
            .ok_or_else(|| OmlError::Protocol(format!("unknown table `{}`", table)))?;

        encode_into(&OmlValue::Int32(sender_id), handle.scratch_mut(0));
        encode_into(&OmlValue::Int32(seq), handle.scratch_mut(1));
        encode_into(&OmlValue::Double(ts_client), handle.scratch_mut(2));
        encode_into(&OmlValue::Double(ts_server), handle.scratch_mut(3));
        for (k, value) in values.iter().enumerate() {
            encode_into(value, handle.scratch_mut(4 + k));
        }

        let params: Vec<RawParam> = (0..handle.param_count())
            .map(|i| RawParam::new(handle.scratch_mut(i).as_slice()))
            .collect();
        let param_refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        match self.client.execute(&stmt, &param_refs).await {
            Ok(_) => Ok(()),
            Err(e) => {
                self.poisoned = true;
                Err(OmlError::BackendFatal(format!(
                    "insert into `{}` failed: {}",
                    table, e
                )))
            }
        }
    }

    async fn add_sender_id(&mut self, name: &str) -> OmlResult<i32> {
        self.ensure_bootstrap().await?;
        if let Some(row) = self
            .client
            .query_opt("SELECT id FROM _senders WHERE name = $1", &[&name])
            .await
            .map_err(fatal_err)?
        {
            return Ok(row.get(0));
        }
        let next: i32 = self
            .client
            .query_one("SELECT COALESCE(MAX(id) + 1, 0) FROM _senders", &[])
            .await
            .map_err(fatal_err)?
            .get(0);
        self.client
            .execute("INSERT INTO _senders (id, name) VALUES ($1, $2)", &[&next, &name])
            .await
            .map_err(fatal_err)?;
        Ok(next)
    }

    async fn get_key_value(&mut self, key: &str) -> OmlResult<Option<String>> {
        self.ensure_bootstrap().await?;
        let row = self
            .client
            .query_opt("SELECT value FROM _experiment_metadata WHERE key = $1", &[&key])
            .await
            .map_err(fatal_err)?;
        Ok(row.map(|r| r.get(0)))
    }

    async fn set_key_value(&mut self, key: &str, value: &str) -> OmlResult<()> {
        self.ensure_bootstrap().await?;
        self.client
            .execute(
                "INSERT INTO _experiment_metadata (key, value) VALUES ($1, $2) \
                 ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
                &[&key, &value],
            )
            .await
            .map_err(fatal_err)?;
        Ok(())
    }

    async fn get_metadata(&mut self, key: &str) -> OmlResult<Option<String>> {
        self.get_key_value(key).await
    }

    async fn set_metadata(&mut self, key: &str, value: &str) -> OmlResult<()> {
        self.set_key_value(key, value).await
    }

    async fn get_table_list(&mut self) -> OmlResult<Vec<TableDescriptor>> {
        let metadata_table_exists = self
            .client
            .query_opt(
                "SELECT 1 FROM information_schema.tables \
                 WHERE table_schema = 'public' AND table_name = '_experiment_metadata'",
                &[],
            )
            .await
            .map_err(fatal_err)?
            .is_some();
        if !metadata_table_exists {
            return Ok(Vec::new());
        }

        let rows = self
            .client
            .query(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = 'public' AND table_type = 'BASE TABLE' \
                 AND table_name NOT IN ('_senders', '_experiment_metadata')",
                &[],
            )
            .await
            .map_err(fatal_err)?;

        let mut descriptors = Vec::with_capacity(rows.len() + 1);
        descriptors.push(TableDescriptor {
            name: "_senders".to_string(),
            schema: None,
        });
        for row in rows {
            let name: String = row.get(0);
            match self.get_metadata(&format!("table_{}", name)).await? {
                Some(serialised) => match serde_json::from_str::<Schema>(&serialised) {
                    Ok(schema) => descriptors.push(TableDescriptor {
                        name,
                        schema: Some(schema),
                    }),
                    Err(e) => log::warn!(
                        "get_table_list: skipping `{}`, unparsable schema metadata: {}",
                        name,
                        e
                    ),
                },
                None => log::warn!(
                    "get_table_list: skipping `{}`, no schema metadata recorded",
                    name
                ),
            }
        }
        Ok(descriptors)
    }

    async fn stmt(&mut self, sql: &str) -> OmlResult<u64> {
        self.client.execute(sql, &[]).await.map_err(fatal_err)
    }

    async fn release(&mut self) -> OmlResult<()> {
        self.client.batch_execute("COMMIT;").await.map_err(fatal_err)?;
        self.conn_task.abort();
        Ok(())
    }
}
