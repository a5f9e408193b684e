//! The per-request middleware chain.

use std::sync::Arc;

use lattice_container::{Args, Container, Value};
use tracing::{debug, trace};

use crate::error::{Result, RouterError};
use crate::request::Request;
use crate::response::Response;

/// A request handler: the continuation a middleware delegates to, and the
/// terminal step of a chain.
pub trait Handler {
    /// Handles a request, producing a response or an error for the
    /// dispatcher's error path.
    fn handle(&mut self, request: Request) -> Result<Response>;
}

/// A middleware wraps a request and its continuation.
///
/// It may short-circuit by returning without calling `next`, call `next`
/// once, or call it repeatedly; a repeat call observes the chain's
/// already-advanced cursor and falls through to the terminal handler.
pub trait Middleware: Send + Sync {
    /// Processes the request, optionally delegating to the continuation.
    fn process(&self, request: Request, next: &mut dyn Handler) -> Result<Response>;
}

/// Reference to a middleware: an already-constructed instance, or a type
/// identifier constructed through the container at invocation time.
#[derive(Clone)]
pub enum MiddlewareRef {
    /// A constructed middleware.
    Instance(Arc<dyn Middleware>),
    /// A type identifier resolved through the container.
    TypeId(String),
}

impl MiddlewareRef {
    /// Wraps a constructed middleware.
    pub fn of(middleware: impl Middleware + 'static) -> Self {
        Self::Instance(Arc::new(middleware))
    }

    /// References a middleware by its registered type identifier.
    pub fn type_id(name: impl Into<String>) -> Self {
        Self::TypeId(name.into())
    }
}

/// Wraps a middleware as a container [`Value`], for type constructors that
/// produce middleware instances.
pub fn middleware_value(middleware: impl Middleware + 'static) -> Value {
    let boxed: Arc<dyn Middleware> = Arc::new(middleware);
    Value::instance(boxed)
}

/// A single-use, cursor-based middleware pipeline over one request.
///
/// The cursor advances monotonically; once it passes the end, every
/// further call reaches the terminal handler directly. A chain instance
/// must be built fresh per dispatched request and never shared.
pub struct Chain<'a> {
    middlewares: &'a [MiddlewareRef],
    terminal: &'a mut dyn Handler,
    container: &'a Container,
    cursor: usize,
}

impl<'a> Chain<'a> {
    /// Builds a chain over the given middleware list and terminal handler.
    pub fn new(
        middlewares: &'a [MiddlewareRef],
        terminal: &'a mut dyn Handler,
        container: &'a Container,
    ) -> Self {
        Self {
            middlewares,
            terminal,
            container,
            cursor: 0,
        }
    }

    /// Constructs a referenced middleware through the container.
    fn materialize(&self, name: &str) -> Result<Arc<dyn Middleware>> {
        let value = self.container.resolve(name, &Args::new())?;
        value
            .downcast_ref::<Arc<dyn Middleware>>()
            .cloned()
            .ok_or_else(|| RouterError::InvalidMiddleware(name.to_string()))
    }
}

impl Handler for Chain<'_> {
    fn handle(&mut self, request: Request) -> Result<Response> {
        let Some(entry) = self.middlewares.get(self.cursor).cloned() else {
            trace!(cursor = self.cursor, "chain exhausted; calling terminal handler");
            return self.terminal.handle(request);
        };
        self.cursor += 1;

        match entry {
            MiddlewareRef::Instance(middleware) => middleware.process(request, self),
            MiddlewareRef::TypeId(name) => {
                trace!(middleware = %name, "constructing middleware through container");
                let middleware = self.materialize(&name)?;
                middleware.process(request, self)
            }
        }
    }
}

/// Middleware that logs each request and the status of its response.
pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
    fn process(&self, request: Request, next: &mut dyn Handler) -> Result<Response> {
        let method = request.method;
        let path = request.path.clone();
        let response = next.handle(request)?;
        debug!(%method, %path, status = response.status, "handled request");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder(Arc<Mutex<Vec<&'static str>>>);

    impl Handler for Recorder {
        fn handle(&mut self, _request: Request) -> Result<Response> {
            self.0.lock().unwrap().push("T");
            Ok(Response::text("terminal"))
        }
    }

    struct Tag {
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Middleware for Tag {
        fn process(&self, request: Request, next: &mut dyn Handler) -> Result<Response> {
            self.log.lock().unwrap().push(self.label);
            next.handle(request)
        }
    }

    struct ShortCircuit;

    impl Middleware for ShortCircuit {
        fn process(&self, _request: Request, _next: &mut dyn Handler) -> Result<Response> {
            Ok(Response::text("stopped").status(403))
        }
    }

    struct DoubleCall;

    impl Middleware for DoubleCall {
        fn process(&self, request: Request, next: &mut dyn Handler) -> Result<Response> {
            next.handle(request.clone())?;
            next.handle(request)
        }
    }

    #[test]
    fn test_chain_runs_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let middlewares = vec![
            MiddlewareRef::of(Tag {
                label: "A",
                log: log.clone(),
            }),
            MiddlewareRef::of(Tag {
                label: "B",
                log: log.clone(),
            }),
        ];
        let container = Container::new();
        let mut terminal = Recorder(log.clone());
        let mut chain = Chain::new(&middlewares, &mut terminal, &container);

        let response = chain.handle(Request::get("/")).unwrap();
        assert_eq!(response.body_string(), Some("terminal".to_string()));
        assert_eq!(*log.lock().unwrap(), vec!["A", "B", "T"]);
    }

    #[test]
    fn test_short_circuit_skips_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let middlewares = vec![
            MiddlewareRef::of(ShortCircuit),
            MiddlewareRef::of(Tag {
                label: "B",
                log: log.clone(),
            }),
        ];
        let container = Container::new();
        let mut terminal = Recorder(log.clone());
        let mut chain = Chain::new(&middlewares, &mut terminal, &container);

        let response = chain.handle(Request::get("/")).unwrap();
        assert_eq!(response.status, 403);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_double_continuation_reaches_terminal_twice() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let middlewares = vec![MiddlewareRef::of(DoubleCall)];
        let container = Container::new();
        let mut terminal = Recorder(log.clone());
        let mut chain = Chain::new(&middlewares, &mut terminal, &container);

        chain.handle(Request::get("/")).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["T", "T"]);
    }

    #[test]
    fn test_type_id_is_constructed_through_container() {
        use lattice_container::TypeSpec;

        let container = Container::new();
        container.register_type(TypeSpec::new("app::Stopper", |_| {
            Ok(middleware_value(ShortCircuit))
        }));

        let middlewares = vec![MiddlewareRef::type_id("app::Stopper")];
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut terminal = Recorder(log.clone());
        let mut chain = Chain::new(&middlewares, &mut terminal, &container);

        let response = chain.handle(Request::get("/")).unwrap();
        assert_eq!(response.status, 403);
    }

    #[test]
    fn test_unknown_type_id_is_an_error() {
        let container = Container::new();
        let middlewares = vec![MiddlewareRef::type_id("app::Nope")];
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut terminal = Recorder(log);
        let mut chain = Chain::new(&middlewares, &mut terminal, &container);

        assert!(chain.handle(Request::get("/")).is_err());
    }
}
