//! The compiled route table, named-route index, and error-handler table.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::path::PathPattern;
use crate::request::Method;

/// Reference to a handler method on a registered class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerRef {
    /// Fully qualified class identifier.
    pub class: String,
    /// Method name.
    pub method: String,
}

impl HandlerRef {
    /// Creates a handler reference.
    pub fn new(class: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            method: method.into(),
        }
    }
}

impl fmt::Display for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.class, self.method)
    }
}

/// One compiled (verb, template, handler, middleware) tuple in the
/// dispatch table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteEntry {
    /// HTTP verb.
    pub method: Method,
    /// Declared path template.
    pub path: String,
    /// Handler reference.
    pub handler: HandlerRef,
    /// Optional route name.
    pub name: Option<String>,
    /// Middleware type identifiers, class-level entries first.
    pub middleware: Vec<String>,
    /// Compiled matcher, rebuilt after deserialization.
    #[serde(skip)]
    pattern: Option<PathPattern>,
}

impl RouteEntry {
    /// Creates and compiles a route entry.
    ///
    /// # Errors
    ///
    /// Returns an error when the path template does not compile.
    pub fn new(
        method: Method,
        path: impl Into<String>,
        handler: HandlerRef,
        name: Option<String>,
        middleware: Vec<String>,
    ) -> Result<Self> {
        let path = path.into();
        let pattern = PathPattern::new(&path)?;
        Ok(Self {
            method,
            path,
            handler,
            name,
            middleware,
            pattern: Some(pattern),
        })
    }

    /// Recompiles the matcher from the declared path.
    ///
    /// # Errors
    ///
    /// Returns an error when the path template does not compile.
    pub fn compile(&mut self) -> Result<()> {
        self.pattern = Some(PathPattern::new(&self.path)?);
        Ok(())
    }

    /// Matches a request path against the compiled template.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<HashMap<String, String>> {
        self.pattern.as_ref()?.match_path(path)
    }
}

/// A named route projection for reverse URL generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedRoute {
    /// Route name.
    pub name: String,
    /// Declared path template.
    pub path: String,
    /// Handler reference.
    pub handler: HandlerRef,
}

impl NamedRoute {
    /// Generates a URL by substituting `{param}` placeholders.
    ///
    /// Returns `None` when a placeholder has no supplied value.
    #[must_use]
    pub fn url(&self, params: &HashMap<String, String>) -> Option<String> {
        PathPattern::new(&self.path).ok()?.reverse(params)
    }
}

/// Key of the error-handler table: a status code or an error-type
/// identifier. Serialized as a string so cache records stay plain JSON.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKey {
    /// An HTTP status code.
    Status(u16),
    /// An error-type identifier (e.g. `app::NotFoundError`).
    Fault(String),
}

impl ErrorKey {
    /// Parses a key from its string form: numeric strings become status
    /// codes, everything else an error-type identifier.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        s.parse::<u16>().map_or_else(|_| Self::Fault(s.to_string()), Self::Status)
    }
}

impl fmt::Display for ErrorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "{code}"),
            Self::Fault(kind) => write!(f, "{kind}"),
        }
    }
}

impl Serialize for ErrorKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ErrorKey {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// The complete output of route discovery: the ordered route table, the
/// named-route index, and the error-handler table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteSet {
    /// Route entries in discovery order; first structural match wins.
    pub routes: Vec<RouteEntry>,
    /// Named routes; the last registration for a name wins.
    pub named: BTreeMap<String, NamedRoute>,
    /// Error handlers; the last registration for a key wins.
    pub errors: BTreeMap<ErrorKey, HandlerRef>,
}

impl RouteSet {
    /// Creates an empty route set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a route entry, recording the named-route projection when a
    /// name was declared.
    ///
    /// # Errors
    ///
    /// Returns an error when the path template does not compile.
    pub fn add_route(
        &mut self,
        method: Method,
        path: impl Into<String>,
        handler: HandlerRef,
        name: Option<String>,
        middleware: Vec<String>,
    ) -> Result<()> {
        let entry = RouteEntry::new(method, path, handler.clone(), name.clone(), middleware)?;
        debug!(method = %entry.method, path = %entry.path, handler = %handler, "registering route");

        if let Some(name) = name {
            self.named.insert(
                name.clone(),
                NamedRoute {
                    name,
                    path: entry.path.clone(),
                    handler,
                },
            );
        }

        self.routes.push(entry);
        Ok(())
    }

    /// Registers an error handler, overwriting any prior entry for the key.
    pub fn add_error(&mut self, key: ErrorKey, handler: HandlerRef) {
        debug!(key = %key, handler = %handler, "registering error handler");
        self.errors.insert(key, handler);
    }

    /// Recompiles every entry's matcher (after deserialization).
    ///
    /// # Errors
    ///
    /// Returns an error when any path template does not compile.
    pub fn compile(&mut self) -> Result<()> {
        for entry in &mut self.routes {
            entry.compile()?;
        }
        Ok(())
    }

    /// Finds the first entry whose verb and template both match.
    #[must_use]
    pub fn find(&self, method: Method, path: &str) -> Option<(&RouteEntry, HashMap<String, String>)> {
        self.routes.iter().find_map(|entry| {
            if entry.method != method {
                return None;
            }
            entry.match_path(path).map(|params| (entry, params))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler(n: &str) -> HandlerRef {
        HandlerRef::new("app::Ctl", n)
    }

    #[test]
    fn test_first_match_wins_over_later_more_specific() {
        let mut set = RouteSet::new();
        set.add_route(Method::Get, "/users/{id}", handler("show"), None, vec![])
            .unwrap();
        set.add_route(Method::Get, "/users/new", handler("create"), None, vec![])
            .unwrap();

        let (entry, params) = set.find(Method::Get, "/users/new").unwrap();
        assert_eq!(entry.handler.method, "show");
        assert_eq!(params.get("id").map(String::as_str), Some("new"));
    }

    #[test]
    fn test_method_must_match() {
        let mut set = RouteSet::new();
        set.add_route(Method::Get, "/users", handler("index"), None, vec![])
            .unwrap();

        assert!(set.find(Method::Post, "/users").is_none());
        assert!(set.find(Method::Get, "/users").is_some());
    }

    #[test]
    fn test_named_route_last_wins() {
        let mut set = RouteSet::new();
        set.add_route(
            Method::Get,
            "/a",
            handler("a"),
            Some("home".to_string()),
            vec![],
        )
        .unwrap();
        set.add_route(
            Method::Get,
            "/b",
            handler("b"),
            Some("home".to_string()),
            vec![],
        )
        .unwrap();

        assert_eq!(set.named.get("home").map(|r| r.path.as_str()), Some("/b"));
    }

    #[test]
    fn test_named_route_url() {
        let route = NamedRoute {
            name: "user.show".to_string(),
            path: "/users/{id}".to_string(),
            handler: handler("show"),
        };
        let params: HashMap<String, String> =
            [("id".to_string(), "9".to_string())].into_iter().collect();
        assert_eq!(route.url(&params), Some("/users/9".to_string()));
    }

    #[test]
    fn test_error_key_parse_and_roundtrip() {
        assert_eq!(ErrorKey::parse("404"), ErrorKey::Status(404));
        assert_eq!(
            ErrorKey::parse("app::Boom"),
            ErrorKey::Fault("app::Boom".to_string())
        );

        let json = serde_json::to_string(&ErrorKey::Status(500)).unwrap();
        assert_eq!(json, "\"500\"");
        let back: ErrorKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ErrorKey::Status(500));
    }

    #[test]
    fn test_route_set_roundtrips_through_json() {
        let mut set = RouteSet::new();
        set.add_route(
            Method::Get,
            "/users/{id}",
            handler("show"),
            Some("user.show".to_string()),
            vec!["app::AuthGuard".to_string()],
        )
        .unwrap();
        set.add_error(ErrorKey::Status(404), handler("missing"));

        let json = serde_json::to_string(&set).unwrap();
        let mut back: RouteSet = serde_json::from_str(&json).unwrap();

        // Matchers are not serialized; recompile before matching.
        assert!(back.find(Method::Get, "/users/1").is_none());
        back.compile().unwrap();
        assert!(back.find(Method::Get, "/users/1").is_some());
    }
}
