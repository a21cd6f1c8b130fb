//! `oml-collector` is the core of a measurement collection service: a
//! bounded, back-pressure-aware client writer that shields measurement
//! producers from a slow or absent collector, and a backend-neutral
//! server-side database adapter that turns a streaming schema
//! description into prepared, parameterised inserts.
//!
//! The wire protocol that decodes measurement tuples off the network,
//! the socket event loop that accepts injection points, and the
//! command-line glue that launches a full collector daemon are treated
//! as external collaborators and are not implemented here; this crate
//! is the engine the rest of that system is built around.

pub mod error;
pub mod schema;
pub mod uri;
pub mod util;
pub mod value;

#[cfg(feature = "client")]
pub mod client;

#[cfg(feature = "postgres")]
pub mod server;

#[cfg(feature = "cli")]
pub mod config;

pub use error::OmlError;
pub use schema::{Field, FieldType, Schema};
pub use value::OmlValue;
