//! A thin demonstration server binary wiring the PostgreSQL backend,
//! `Database`, and `Session` together. The textual measurement wire
//! protocol and socket accept loop that would feed real rows into
//! `Session::insert` are external collaborators (see `oml_collector`'s
//! crate docs) and are not reimplemented here: this binary registers
//! one experiment, rediscovers its tables on a second connection, and
//! exits, demonstrating the collector core end to end.

use clap::Parser;
use oml_collector::config::{init_logging, resolve, PgCliArgs};
use oml_collector::server::postgres::connect;
use oml_collector::server::{Database, Session};
use oml_collector::{Field, FieldType, Schema};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;
    let cli = PgCliArgs::parse();
    let pg_config = resolve(&cli)?;
    log::info!("connecting to {}", pg_config.get_uri());

    let backend = connect(&pg_config).await?;
    let database = Database::new(Box::new(backend), "demo-experiment");
    let mut session = Session::new(database);
    log::info!("session open against {}", session.get_uri());

    session
        .register_table(Schema::new(
            "power",
            vec![Field::new("volts", FieldType::Double), Field::new("label", FieldType::String)],
        )?)
        .await?;

    let accepted = session
        .insert(
            "power",
            "node0",
            0,
            1.0,
            &[
                oml_collector::OmlValue::Double(3.3),
                oml_collector::OmlValue::String("demo".to_string()),
            ],
        )
        .await;
    log::info!("row accepted: {}", accepted);

    session.release().await?;
    Ok(())
}
