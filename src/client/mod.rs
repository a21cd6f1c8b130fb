//! The producer-side `BufferedWriter`: a bounded queue decoupling
//! measurement producers from a possibly slow or intermittently
//! reachable collection sink (spec §3, §4.1, §5).

mod buffer;
mod chunk;
mod drain;
pub mod outstream;

pub use buffer::{BufferedWriter, WriteBufGuard};
pub use outstream::{FileStream, OutStream, TcpStream, WriteError, ZlibStream};
