//! Hub error types
//!
//! Defines the errors surfaced by the registry, the transports and the
//! per-message transforms. Routing misses are not errors and have no variant.

use thiserror::Error;

/// Caller errors raised by the registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    /// Group key was empty
    #[error("Invalid group: group key must not be empty")]
    InvalidGroup,

    /// Identifier was empty
    #[error("Invalid identifier: identifier must not be empty")]
    InvalidIdentifier,

    /// Identifier is already held by a live session in the group
    #[error("Identifier {id} is already registered in group {group}")]
    DuplicateIdentifier { group: String, id: String },

    /// The teardown coordinator is gone, so admitted sessions could never be removed
    #[error("Registry {0} is no longer accepting sessions")]
    RegistryClosed(String),
}

/// Result type alias for registry operations
pub type HubResult<T> = Result<T, HubError>;

/// Failures of the physical connection under a session
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Peer or protocol closed the connection
    #[error("Connection closed (code: {code:?}, reason: {reason})")]
    Closed { code: Option<u16>, reason: String },

    /// I/O failure on the underlying socket
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error reported by the transport library
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Close codes that count as an orderly shutdown (normal closure, going away)
const ORDERLY_CLOSE_CODES: [u16; 2] = [1000, 1001];

impl ConnectionError {
    /// Whether this termination should be reported as a fault
    ///
    /// Orderly close frames are routine; everything else (abnormal close
    /// codes, I/O and transport failures) is reported.
    pub fn is_abnormal(&self) -> bool {
        match self {
            ConnectionError::Closed { code: None, .. } => false,
            ConnectionError::Closed { code: Some(code), .. } => {
                !ORDERLY_CLOSE_CODES.contains(code)
            }
            ConnectionError::Io(_) | ConnectionError::Transport(_) => true,
        }
    }
}

/// Errors a transform may return for one inbound frame
///
/// A transform error is local to the frame that caused it: it is logged and
/// the session keeps running.
#[derive(Error, Debug)]
pub enum TransformError {
    /// The transform refused the frame
    #[error("Frame rejected: {0}")]
    Rejected(String),

    /// The frame could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Any other failure inside a caller-supplied transform
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TransformError {
    /// Shorthand for a `Rejected` error
    pub fn rejected(reason: impl Into<String>) -> Self {
        TransformError::Rejected(reason.into())
    }
}
