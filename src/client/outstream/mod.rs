//! `OutStream`: the sink abstraction the drain task writes through.
//! Implementations decide how to frame and deliver a chunk's bytes —
//! a plain file, a reconnecting TCP socket, or a zlib/gzip wrapper
//! around either (spec §4.1, §9 "OutStream abstraction").

mod file;
mod tcp;
mod zlib;

pub use file::FileStream;
pub use tcp::TcpStream;
pub use zlib::ZlibStream;

use std::fmt;

/// A write either succeeds, fails in a way the caller should retry
/// after reconnecting (the peer dropped the connection, a transient
/// disk error), or fails in a way retrying cannot fix (permission
/// denied, disk full on a local file sink).
#[derive(Debug)]
pub enum WriteError {
    Recoverable(std::io::Error),
    Fatal(std::io::Error),
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::Recoverable(e) => write!(f, "recoverable: {}", e),
            WriteError::Fatal(e) => write!(f, "fatal: {}", e),
        }
    }
}

impl std::error::Error for WriteError {}

/// Implemented by every collection sink. `header` is `Some` only when
/// the drain task needs the metadata prologue replayed — the very
/// first write of a fresh connection after a reconnect.
pub trait OutStream {
    /// Writes `header` (if present) followed by `body`, returning the
    /// number of body bytes accepted.
    fn write(&mut self, body: &[u8], header: Option<&[u8]>) -> Result<usize, WriteError>;

    /// Best-effort flush and release of the underlying resource.
    /// Never called more than once.
    fn close(&mut self);
}

/// An in-memory sink used by the `client` module's own unit tests —
/// never part of the public surface.
#[cfg(test)]
pub(crate) struct MemoryStream {
    sink: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
}

#[cfg(test)]
impl MemoryStream {
    pub(crate) fn new(sink: std::sync::Arc<std::sync::Mutex<Vec<u8>>>) -> Self {
        Self { sink }
    }
}

#[cfg(test)]
impl OutStream for MemoryStream {
    fn write(&mut self, body: &[u8], header: Option<&[u8]>) -> Result<usize, WriteError> {
        let mut guard = self.sink.lock().unwrap();
        if let Some(header) = header {
            guard.extend_from_slice(header);
        }
        guard.extend_from_slice(body);
        Ok(body.len())
    }

    fn close(&mut self) {}
}
