//! Backend-neutral persistence core (spec §4.3) plus the PostgreSQL
//! implementation of it (spec §4.4). The textual measurement wire
//! protocol and the socket accept loop that feed `Session::insert`
//! are external collaborators, not part of this crate.

pub mod backend;
pub mod database;
pub mod postgres;
pub mod session;
pub mod table;

pub use backend::{Backend, TableDescriptor};
pub use database::Database;
pub use session::Session;
pub use table::TableHandle;
