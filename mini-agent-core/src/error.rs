//! Error types for each protocol boundary.

use thiserror::Error;

/// Loading a session's log from the store failed.
///
/// Raised at session-actor creation; fails `get_or_create`. Absence of a log
/// is not an error — only corruption or I/O failure is.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LoadError {
    /// The underlying storage medium failed.
    #[error("load failed for session {name}: {cause}")]
    Io {
        /// Session the load was for.
        name: String,
        /// Description of the failure.
        cause: String,
    },

    /// The stored log could not be decoded (corruption, or an unknown tag).
    #[error("corrupt log for session {name}: {cause}")]
    Corrupt {
        /// Session the load was for.
        name: String,
        /// Description of the decode failure.
        cause: String,
    },

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Appending events to the store failed. The caller's event is not applied
/// in memory.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SaveError {
    /// The underlying storage medium failed.
    #[error("save failed for session {name}: {cause}")]
    Io {
        /// Session the append was for.
        name: String,
        /// Description of the failure.
        cause: String,
    },

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// An unknown event variant was encountered. Fatal for that ingest; not
/// retried. In this implementation the codec rejects unknown tags before
/// the reducer ever sees them, so this variant exists for completeness of
/// the error taxonomy rather than as a reachable runtime path.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ReducerError {
    /// An event tag with no known reduction was encountered.
    #[error("unknown event variant: {0}")]
    UnknownVariant(String),
}

/// A language-model turn failed after the turn service's own retries.
/// Converted to a `TurnFailed` event by the session actor; never bubbles out
/// of the actor itself.
#[derive(Debug, Clone, Error)]
#[error("turn failed ({provider}): {cause}")]
pub struct TurnError {
    /// Name of the backing provider/oracle.
    pub provider: String,
    /// Description of the failure.
    pub cause: String,
}

impl TurnError {
    /// Construct a turn error.
    pub fn new(provider: impl Into<String>, cause: impl Into<String>) -> Self {
        Self { provider: provider.into(), cause: cause.into() }
    }
}

/// `get` was called for a session that does not exist in the registry.
#[derive(Debug, Clone, Error)]
#[error("session not found: {0}")]
pub struct NotFound(pub String);

/// Creating a session actor failed (propagated from [`LoadError`]).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CreationError {
    /// Loading the session's log failed.
    #[error("creation failed while loading session: {0}")]
    Load(#[from] LoadError),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl Clone for CreationError {
    fn clone(&self) -> Self {
        // LoadError and the boxed error are not Clone; preserve the message
        // so registry waiters observe an equivalent failure.
        match self {
            CreationError::Load(e) => {
                CreationError::Other(format!("{e}").into())
            }
            CreationError::Other(e) => CreationError::Other(format!("{e}").into()),
        }
    }
}

/// Facade-level wrapper for any runtime error, preserving its cause.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A session could not be found.
    #[error("{0}")]
    NotFound(#[from] NotFound),

    /// A session could not be created.
    #[error("{0}")]
    Creation(#[from] CreationError),

    /// An event failed to persist.
    #[error("{0}")]
    Save(#[from] SaveError),

    /// The requested operation timed out.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Catch-all, carrying a human-readable message and optional cause.
    #[error("{message}")]
    Other {
        /// Human-readable description.
        message: String,
        /// Underlying cause, if any.
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ServiceError {
    /// Wrap an arbitrary message with no structured cause.
    pub fn message(message: impl Into<String>) -> Self {
        Self::Other { message: message.into(), cause: None }
    }
}
