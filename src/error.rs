use crate::schema::FieldType;

/// Error taxonomy for the collection core (spec §7).
///
/// `TransientIo` is retried with backoff by the drain task; `Protocol`
/// and `TypeMismatch` drop the offending row and let the session
/// continue; `BackendFatal` means the connection is gone and the
/// caller should release the `Database` and let its supervisor
/// recreate it; `ConfigInvalid` is fatal at startup; `ResourceExhausted`
/// aborts the affected session but not the process.
#[derive(Debug, thiserror::Error)]
pub enum OmlError {
    #[error("transient I/O error: {0}")]
    TransientIo(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("type mismatch on field `{field}`: expected {expected:?}, found {found:?}")]
    TypeMismatch {
        field: String,
        expected: FieldType,
        found: FieldType,
    },

    #[error("backend fatal: {0}")]
    BackendFatal(String),

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
}

pub type OmlResult<T> = Result<T, OmlError>;
