//! The router: route loading, request dispatch, and error dispatch.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use lattice_container::{Args, Callable, Container, ContainerError, Fault, Value};
use tracing::{debug, trace, warn};

use crate::cache::RouteCache;
use crate::discover::discover;
use crate::error::{Result, RouterError};
use crate::middleware::{Chain, Handler, Middleware, MiddlewareRef};
use crate::request::Request;
use crate::response::Response;
use crate::table::{ErrorKey, HandlerRef, NamedRoute, RouteEntry, RouteSet};

/// The request dispatcher.
///
/// Discovers handler declarations under a source root, compiles them into
/// a matchable route table (optionally through the route cache), and
/// executes a per-request middleware pipeline terminating in the matched
/// handler. Every terminal outcome is a normalized [`Response`]; uncaught
/// failures flow through error dispatch.
pub struct Router {
    source_root: PathBuf,
    namespace_prefix: String,
    container: Arc<Container>,
    cache: Option<RouteCache>,
    middleware: Vec<MiddlewareRef>,
    routes: RouteSet,
}

impl Router {
    /// Creates a router over the given handler source root.
    pub fn new(
        source_root: impl Into<PathBuf>,
        namespace_prefix: impl Into<String>,
        container: Arc<Container>,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            namespace_prefix: namespace_prefix.into(),
            container,
            cache: None,
            middleware: Vec::new(),
            routes: RouteSet::new(),
        }
    }

    /// Enables the route cache in the given directory.
    #[must_use]
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache = Some(RouteCache::new(dir.into()));
        self
    }

    /// Adds a global middleware, run on every request before dispatch.
    #[must_use]
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middleware.push(MiddlewareRef::of(middleware));
        self
    }

    /// Returns the loaded route set.
    #[must_use]
    pub fn routes(&self) -> &RouteSet {
        &self.routes
    }

    /// Returns the container backing handler resolution.
    #[must_use]
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Looks up a named route.
    #[must_use]
    pub fn named_route(&self, name: &str) -> Option<&NamedRoute> {
        self.routes.named.get(name)
    }

    /// Generates a URL for a named route.
    #[must_use]
    pub fn url_for(&self, name: &str, params: &HashMap<String, String>) -> Option<String> {
        self.named_route(name).and_then(|route| route.url(params))
    }

    /// Loads the route table: from a valid cache record when one exists,
    /// otherwise by discovery, writing the cache back afterwards.
    ///
    /// # Errors
    ///
    /// Returns a fatal error when the source root is missing or discovery
    /// fails; cache write failures are logged and ignored.
    pub fn load_routes(&mut self) -> Result<()> {
        if let Some(cache) = &self.cache {
            if let Some(routes) = cache.load(&self.source_root) {
                self.routes = routes;
                return Ok(());
            }
        }

        self.routes = discover(&self.source_root, &self.namespace_prefix, &self.container)?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.save(&self.source_root, &self.routes) {
                warn!(error = %e, "failed to write route cache");
            }
        }

        Ok(())
    }

    /// Removes the cache file, if caching is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be removed.
    pub fn clear_cache(&self) -> Result<()> {
        match &self.cache {
            Some(cache) => cache.clear(),
            None => Ok(()),
        }
    }

    /// Loads routes and handles one request end to end.
    ///
    /// # Errors
    ///
    /// Returns a fatal error only for startup failures (missing source
    /// root); request failures become normalized error responses.
    pub fn run(&mut self, request: Request) -> Result<Response> {
        self.load_routes()?;
        Ok(self.handle(request))
    }

    /// Handles a request: global middleware chain, then dispatch.
    ///
    /// Uncaught failures are routed through error dispatch, so every
    /// outcome is a normalized response.
    #[must_use]
    pub fn handle(&self, request: Request) -> Response {
        let result = if self.middleware.is_empty() {
            self.dispatch(request)
        } else {
            let mut terminal = DispatchEndpoint { router: self };
            let mut chain = Chain::new(&self.middleware, &mut terminal, self.container.as_ref());
            chain.handle(request)
        };

        result.unwrap_or_else(|error| self.dispatch_failure(&error))
    }

    /// Matches the request against the route table and invokes the
    /// handler, walking the dispatch states explicitly.
    fn dispatch(&self, request: Request) -> Result<Response> {
        let mut state = DispatchState::Matching;

        loop {
            state = match state {
                DispatchState::Matching => {
                    trace!(method = %request.method, path = %request.path, "matching request");
                    match self.routes.find(request.method, &request.path) {
                        Some((entry, params)) => DispatchState::Matched { entry, params },
                        None => DispatchState::Unmatched,
                    }
                }

                DispatchState::Unmatched => {
                    debug!(method = %request.method, path = %request.path, "no matching route");
                    return Ok(self.error_response(&ErrorKey::Status(404), None));
                }

                DispatchState::Matched { entry, params } => {
                    trace!(path = %entry.path, handler = %entry.handler, "route matched");
                    let mut bound = request.clone();
                    for (key, value) in &params {
                        bound = bound.with_attribute(key.clone(), value.clone());
                    }

                    if entry.middleware.is_empty() {
                        DispatchState::Resolving {
                            entry,
                            request: bound,
                            params,
                        }
                    } else {
                        // Fresh chain per request over the route's own
                        // middleware, terminating in the handler endpoint.
                        let refs: Vec<MiddlewareRef> = entry
                            .middleware
                            .iter()
                            .map(|name| MiddlewareRef::type_id(name.clone()))
                            .collect();
                        let mut terminal = RouteEndpoint {
                            container: self.container.as_ref(),
                            handler: entry.handler.clone(),
                            params,
                        };
                        let mut chain =
                            Chain::new(&refs, &mut terminal, self.container.as_ref());
                        return chain.handle(bound);
                    }
                }

                DispatchState::Resolving {
                    entry,
                    request,
                    params,
                } => {
                    trace!(class = %entry.handler.class, "resolving handler class");
                    let controller = self.container.resolve(&entry.handler.class, &Args::new())?;
                    DispatchState::Invoking {
                        entry,
                        controller,
                        request,
                        params,
                    }
                }

                DispatchState::Invoking {
                    entry,
                    controller,
                    request,
                    params,
                } => {
                    trace!(handler = %entry.handler, "invoking handler");
                    let value = invoke_handler(
                        &self.container,
                        controller,
                        &entry.handler,
                        request,
                        &params,
                    )?;
                    DispatchState::Responding { value }
                }

                DispatchState::Responding { value } => {
                    return Ok(normalize(&value, 200));
                }
            };
        }
    }

    /// Converts an uncaught dispatch failure into a normalized response,
    /// keyed by the fault's type identifier when one was thrown.
    fn dispatch_failure(&self, error: &RouterError) -> Response {
        match error {
            RouterError::Container(ContainerError::Fault(fault)) => {
                let key = ErrorKey::Fault(fault.kind.clone());
                if self.routes.errors.contains_key(&key) {
                    self.error_response(&key, Some(fault))
                } else {
                    self.error_response(&ErrorKey::Status(500), Some(fault))
                }
            }
            error => {
                warn!(%error, "unhandled dispatch failure");
                self.error_response(&ErrorKey::Status(500), None)
            }
        }
    }

    /// Produces the response for an error key: the registered handler when
    /// one exists, else a minimal default body.
    fn error_response(&self, key: &ErrorKey, fault: Option<&Fault>) -> Response {
        let status = match key {
            ErrorKey::Status(code) => *code,
            ErrorKey::Fault(_) => 500,
        };

        if let Some(handler) = self.routes.errors.get(key) {
            match self.invoke_error_handler(handler, fault, status) {
                Ok(response) => return response,
                Err(error) => {
                    warn!(handler = %handler, %error, "error handler failed; using default response");
                }
            }
        }

        default_error_body(status)
    }

    /// Invokes a registered error handler with the fault as sole argument.
    /// Static handlers are invoked directly; instance handlers construct
    /// the owning class through the container first.
    fn invoke_error_handler(
        &self,
        handler: &HandlerRef,
        fault: Option<&Fault>,
        status: u16,
    ) -> Result<Response> {
        let spec = self
            .container
            .method_spec(&handler.class, &handler.method)
            .ok_or_else(|| {
                RouterError::Container(ContainerError::InvalidCallable {
                    class: handler.class.clone(),
                    method: handler.method.clone(),
                })
            })?;

        let fault_value = fault.map_or(Value::Null, |f| Value::instance(f.clone()));
        let args = Args::new().positional(fault_value);

        let callable = if spec.is_static {
            Callable::new(handler.class.clone(), handler.method.clone())
        } else {
            let controller = self.container.resolve(&handler.class, &Args::new())?;
            Callable::bound(controller, handler.class.clone(), handler.method.clone())
        };

        let value = self.container.invoke(&callable, &args)?;
        Ok(normalize(&value, status))
    }
}

/// States of one dispatch pass.
enum DispatchState<'a> {
    Matching,
    Matched {
        entry: &'a RouteEntry,
        params: HashMap<String, String>,
    },
    Unmatched,
    Resolving {
        entry: &'a RouteEntry,
        request: Request,
        params: HashMap<String, String>,
    },
    Invoking {
        entry: &'a RouteEntry,
        controller: Value,
        request: Request,
        params: HashMap<String, String>,
    },
    Responding {
        value: Value,
    },
}

/// Terminal handler of a route-middleware chain: resolves the handler
/// class and invokes the method with the request and path parameters.
struct RouteEndpoint<'a> {
    container: &'a Container,
    handler: HandlerRef,
    params: HashMap<String, String>,
}

impl Handler for RouteEndpoint<'_> {
    fn handle(&mut self, request: Request) -> Result<Response> {
        let controller = self.container.resolve(&self.handler.class, &Args::new())?;
        let value = invoke_handler(
            self.container,
            controller,
            &self.handler,
            request,
            &self.params,
        )?;
        Ok(normalize(&value, 200))
    }
}

/// Terminal handler of the global middleware chain.
struct DispatchEndpoint<'a> {
    router: &'a Router,
}

impl Handler for DispatchEndpoint<'_> {
    fn handle(&mut self, request: Request) -> Result<Response> {
        self.router.dispatch(request)
    }
}

/// Invokes a handler method with `{request}` plus the captured path
/// parameters as named arguments.
fn invoke_handler(
    container: &Container,
    controller: Value,
    handler: &HandlerRef,
    request: Request,
    params: &HashMap<String, String>,
) -> Result<Value> {
    let mut args = Args::new().named("request", Value::instance(request));
    for (key, value) in params {
        args = args.named(key.clone(), value.clone());
    }

    let callable = Callable::bound(controller, handler.class.clone(), handler.method.clone());
    container.invoke(&callable, &args).map_err(RouterError::from)
}

/// Normalizes a handler's return value into a response: responses pass
/// through unchanged, JSON values serialize with a JSON content type,
/// everything else stringifies as plain text with the default status.
fn normalize(value: &Value, default_status: u16) -> Response {
    if let Some(response) = value.downcast_ref::<Response>() {
        return response.clone();
    }

    match value {
        Value::Json(json) => Response::json(json).status(default_status),
        other => Response::text(other.to_string()).status(default_status),
    }
}

/// Default minimal bodies for the fixed status table.
fn default_error_body(status: u16) -> Response {
    let message = match status {
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        403 => "403 Forbidden",
        _ => "Error",
    };
    Response::text(message).status(status)
}
