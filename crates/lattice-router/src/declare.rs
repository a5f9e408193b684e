//! Declarative route and error metadata.
//!
//! Each handler class ships one JSON declaration unit under the source
//! root; discovery reads the units and compiles them into the route
//! table, the named-route index, and the error-handler table.

use serde::Deserialize;

use crate::table::ErrorKey;

/// A field accepting either one value or a list of values.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    /// A single value.
    One(T),
    /// A list of values.
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Flattens into a list.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

/// One route declaration attached to a handler class or method.
///
/// On a class it contributes the shared path prefix, shared name prefix,
/// and shared middleware list; on a method it declares the route itself.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteMeta {
    /// Path template (class level: shared prefix).
    #[serde(default)]
    pub path: String,
    /// One or more HTTP verbs; defaults to GET.
    #[serde(default)]
    pub method: Option<OneOrMany<String>>,
    /// Optional route name (class level: shared name prefix).
    #[serde(default)]
    pub name: Option<String>,
    /// Zero or more middleware type identifiers.
    #[serde(default)]
    pub middleware: OneOrMany<String>,
}

impl RouteMeta {
    /// Returns the declared verbs, defaulting to GET.
    #[must_use]
    pub fn verbs(&self) -> Vec<String> {
        match &self.method {
            Some(m) => m.clone().into_vec(),
            None => vec!["GET".to_string()],
        }
    }

    /// Returns the declared middleware identifiers.
    #[must_use]
    pub fn middleware(&self) -> Vec<String> {
        self.middleware.clone().into_vec()
    }
}

/// One error declaration attached to a handler method.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorMeta {
    /// Status code or error-type identifier; defaults to 404.
    #[serde(default = "default_error_code")]
    pub code: ErrorCode,
}

fn default_error_code() -> ErrorCode {
    ErrorCode::Status(404)
}

/// An error key as written in a declaration: integer status or type name.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ErrorCode {
    /// An HTTP status code.
    Status(u16),
    /// An error-type identifier.
    Kind(String),
}

impl From<ErrorCode> for ErrorKey {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::Status(status) => Self::Status(status),
            ErrorCode::Kind(kind) => Self::Fault(kind),
        }
    }
}

/// Route and error declarations for one public handler method.
#[derive(Debug, Clone, Deserialize)]
pub struct MethodDecl {
    /// Method name, must match a registered method descriptor.
    pub name: String,
    /// Zero or more route declarations.
    #[serde(default)]
    pub routes: Vec<RouteMeta>,
    /// Zero or more error declarations.
    #[serde(default)]
    pub errors: Vec<ErrorMeta>,
}

/// One declaration unit: the metadata of one handler class.
#[derive(Debug, Clone, Deserialize)]
pub struct HandlerUnit {
    /// Class name; a unit without one is skipped.
    #[serde(default)]
    pub class: Option<String>,
    /// Namespace path under the discovery prefix.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Class-level route metadata shared by every method.
    #[serde(default)]
    pub route: Option<RouteMeta>,
    /// Method declarations.
    #[serde(default)]
    pub methods: Vec<MethodDecl>,
}
