use thiserror::Error;

/// Error type shared across dbforge crates.
///
/// A database that is merely absent is never an error: probes resolve it to
/// `false` and lifecycle operations treat it as a no-op.
#[derive(Debug, Error)]
pub enum Error {
    /// The server could not be reached or refused the session (network, TLS,
    /// authentication, pool timeout).
    #[error("connectivity failure: {0}")]
    ConnectivityFailure(String),
    /// Existing tables do not match the schema definition.
    #[error("schema conflict: {0}")]
    SchemaConflict(String),
    /// The caller cancelled the operation.
    #[error("operation canceled")]
    OperationCanceled,
    /// The schema definition violates its invariants.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// The connection string or path cannot be turned into a database handle.
    #[error("invalid database handle: {0}")]
    InvalidHandle(String),
    /// A requested feature is not supported by the engine.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// The requested database object does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The async runtime could not be built or was used incorrectly.
    #[error("runtime error: {0}")]
    Runtime(String),
    /// Database error reported by the engine.
    #[error("database error: {0}")]
    Db(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true for failures that mean the server was unreachable.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Error::ConnectivityFailure(_))
    }
}

/// Convenience alias for results returned by dbforge crates.
pub type Result<T> = std::result::Result<T, Error>;
