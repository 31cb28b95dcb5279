//! Server Error Types

use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised while starting or running the HTTP listener
#[derive(Error, Debug)]
pub enum ServerError {
    /// Binding or accepting failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for server operations
pub type ServerResult<T> = Result<T, ServerError>;
