//! Error types for dependency resolution.

use thiserror::Error;

/// A failure raised by user handler or factory code, carrying the
/// error-type identifier that error-handler tables are keyed by.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct Fault {
    /// The error-type identifier (e.g. `app::NotFoundError`).
    pub kind: String,
    /// Human-readable message.
    pub message: String,
}

impl Fault {
    /// Creates a fault with the given type identifier and message.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Container-specific errors.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// The target type is registered but cannot be constructed
    /// (interface-like descriptor without a constructor).
    #[error("type {0} is not instantiable")]
    NotInstantiable(String),

    /// No descriptor is registered for the target type.
    #[error("type {0} is not registered")]
    NotFound(String),

    /// A declared parameter could not be satisfied by any resolution tier.
    #[error("cannot resolve parameter `{name}` of type {} for {target}", .type_name.as_deref().unwrap_or("<untyped>"))]
    UnresolvableParameter {
        /// The type or callable being resolved.
        target: String,
        /// The parameter name.
        name: String,
        /// The parameter's declared type, if any.
        type_name: Option<String>,
    },

    /// The callable reference does not name a registered method, or a
    /// non-static method was invoked without a receiver.
    #[error("invalid callable {class}::{method}")]
    InvalidCallable {
        /// The class identifier.
        class: String,
        /// The method name.
        method: String,
    },

    /// A handler or factory failed.
    #[error(transparent)]
    Fault(#[from] Fault),
}

/// Result type alias for container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;
