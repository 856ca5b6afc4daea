//! Error types for tidefs
//!
//! This module defines the common error type used throughout the system.

use thiserror::Error;

/// Common result type for tidefs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for tidefs
#[derive(Debug, Error)]
pub enum Error {
    // Metadata errors
    #[error("file already exists: {0}")]
    FileAlreadyExists(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // Storage errors
    #[error("block not found: {block_id}")]
    BlockNotFound { block_id: String },

    #[error("storage node not found: {0}")]
    NodeNotFound(String),

    #[error("remote failure: {0}")]
    Remote(String),

    // Network/RPC errors
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("request timeout")]
    Timeout,

    // Internal errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a remote failure error
    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Check if this is a transport-level error worth one more attempt
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::ConnectionFailed(_))
    }

    /// Check if this is a not found error
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::FileNotFound(_) | Self::BlockNotFound { .. } | Self::NodeNotFound(_)
        )
    }

    /// HTTP status code used when this error crosses an RPC boundary
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidArgument(_) | Self::Serialization(_) => 400,
            Self::FileNotFound(_) | Self::BlockNotFound { .. } | Self::NodeNotFound(_) => 404,
            Self::FileAlreadyExists(_) => 409,
            Self::Remote(_) | Self::ConnectionFailed(_) => 502,
            Self::Timeout => 504,
            Self::Configuration(_) | Self::Internal(_) | Self::Io(_) => 500,
        }
    }

    /// Rebuild an error from the status code and message of an RPC reply.
    ///
    /// Not-found and conflict replies carry no subject on the wire, so the
    /// callers map 404 and 409 themselves before falling back to this.
    #[must_use]
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            400 => Self::InvalidArgument(message),
            504 => Self::Timeout,
            _ => Self::Remote(message),
        }
    }
}
