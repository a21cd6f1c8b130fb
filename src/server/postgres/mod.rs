//! The PostgreSQL-specific `Backend` implementation (spec §4.4): the
//! type map, binary parameter encoders, the notice handler, and the
//! connection/transaction machinery that glues them into the
//! backend-neutral façade of `server::backend`.

mod backend;
mod encode;
mod notice;
mod types;

pub use backend::{connect, PgBackend, PgConnectConfig};
