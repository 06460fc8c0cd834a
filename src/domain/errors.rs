//! Domain errors for the texguard engine.

use thiserror::Error;

/// Domain-level errors raised at configuration and data boundaries.
///
/// Per-chunk and per-file failures are not represented here: those are
/// recorded on the corresponding result value and never abort a batch.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Chunk list failed validation.
    #[error("Invalid chunk list: {0}")]
    InvalidChunk(String),

    /// Unknown severity name.
    #[error("Invalid severity: {0:?}. Must be one of: INFO, WARNING, CRITICAL")]
    InvalidSeverity(String),

    /// Issue record missing a field or carrying a bad value.
    #[error("Malformed issue record: {0}")]
    MalformedIssue(String),

    /// Family name not in the catalog.
    #[error("Unknown family: {0}")]
    UnknownFamily(String),

    /// Phase change the state machine forbids.
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Coordination failure.
    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    /// File system failure on `path`.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Rule pattern failed to compile.
    #[error("Invalid rule pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Include or exclude glob failed to compile.
    #[error("Invalid file pattern: {0}")]
    InvalidGlob(String),

    /// `EngineContext::init_global` called twice.
    #[error("Engine context already initialized")]
    ContextAlreadyInitialized,
}

/// Result alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

/// Coordination failures from the resource manager.
///
/// These are recoverable: callers may retry, back off, or surface them to
/// an operator. The manager never retries on its own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// Lock not acquired within the timeout.
    #[error("Timed out after {waited_ms}ms waiting for '{resource}' (agent {agent})")]
    Timeout {
        resource: String,
        agent: String,
        waited_ms: u64,
    },

    /// Release of a resource nobody holds.
    #[error("Resource '{0}' is not locked")]
    NotLocked(String),

    /// Release by an agent that does not hold the lock.
    #[error("Resource '{resource}' is owned by {owner}, not {agent}")]
    NotOwner {
        resource: String,
        owner: String,
        agent: String,
    },
}
