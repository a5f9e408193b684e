//! # lattice-router
//!
//! A declaration-driven request dispatcher backed by the
//! [`lattice-container`](lattice_container) dependency container.
//!
//! This crate provides:
//! - Route discovery from JSON declaration units under a source root
//! - Path pattern matching with `{name}` parameters
//! - A cursor-based middleware pipeline, global and per-route
//! - A fingerprinted, TTL-bound route cache
//! - Error dispatch keyed by status code or error-type identifier
//! - Named routes for reverse URL lookup
//!
//! ## Quick Start
//!
//! Handler classes register type and method descriptors with the
//! container; each class ships one JSON declaration unit under the source
//! root describing its routes:
//!
//! ```json
//! {
//!     "class": "UserController",
//!     "methods": [
//!         {"name": "show", "routes": [{"path": "/users/{id}", "name": "user.show"}]},
//!         {"name": "missing", "errors": [{"code": 404}]}
//!     ]
//! }
//! ```
//!
//! ```ignore
//! use std::sync::Arc;
//! use lattice_container::Container;
//! use lattice_router::{Request, Router};
//!
//! let container = Arc::new(Container::new());
//! // ... register type and method descriptors ...
//!
//! let mut router = Router::new("app/controllers", "app", container)
//!     .cache_dir("var/cache");
//! let response = router.run(Request::get("/users/123"))?;
//! ```
//!
//! ## Path Parameters
//!
//! Path templates capture `{name}` segments; captured values are bound as
//! request attributes and passed to the handler as named arguments:
//!
//! ```ignore
//! // "/posts/{post_id}/comments/{comment_id}"
//! let post_id = request.attribute("post_id");
//! ```
//!
//! ## Middleware
//!
//! Global middleware wraps every request; route middleware is declared by
//! type identifier and constructed through the container at dispatch time:
//!
//! ```ignore
//! let router = Router::new(source_root, "app", container)
//!     .middleware(LoggingMiddleware);
//! ```
//!
//! ## Named Routes
//!
//! ```ignore
//! let url = router.url_for("user.show", &[("id".into(), "123".into())].into());
//! assert_eq!(url, Some("/users/123".to_string()));
//! ```

mod cache;
mod declare;
mod discover;
mod error;
mod middleware;
mod path;
mod request;
mod response;
mod router;
mod table;

pub use cache::{CacheRecord, RouteCache};
pub use declare::{ErrorCode, ErrorMeta, HandlerUnit, MethodDecl, OneOrMany, RouteMeta};
pub use discover::{discover, scan_units};
pub use error::{Result, RouterError};
pub use middleware::{middleware_value, Chain, Handler, LoggingMiddleware, Middleware, MiddlewareRef};
pub use path::PathPattern;
pub use request::{Method, Request};
pub use response::Response;
pub use router::Router;
pub use table::{ErrorKey, HandlerRef, NamedRoute, RouteEntry, RouteSet};
