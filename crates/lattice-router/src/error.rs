//! Error types for routing.

use std::path::PathBuf;

use thiserror::Error;

/// Router-specific errors.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The handler source root does not exist. Fatal at startup.
    #[error("handler source root not found: {0}")]
    SourceRootMissing(PathBuf),

    /// A path template compiled to an invalid expression.
    #[error("invalid path template: {0}")]
    InvalidPattern(String),

    /// Filesystem failure while scanning or caching.
    #[error("i/o error at {path}: {source}")]
    Io {
        /// The offending path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A middleware reference did not resolve to a middleware instance.
    #[error("invalid middleware reference: {0}")]
    InvalidMiddleware(String),

    /// Cache record serialization failed.
    #[error("cache serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Dependency resolution or handler invocation failed.
    #[error(transparent)]
    Container(#[from] lattice_container::ContainerError),
}

/// Result type alias for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;
