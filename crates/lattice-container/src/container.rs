//! The dependency container: bindings, object-graph construction, memoization.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, trace};

use crate::args::{Args, ArgsFingerprint};
use crate::error::{ContainerError, Result};
use crate::registry::{DescriptorRegistry, MethodSpec, ParamSpec};
use crate::value::{Value, ValueKey};

/// Factory closure invoked with the container to produce a value.
pub type FactoryFn = Arc<dyn Fn(&Container) -> Result<Value> + Send + Sync>;

/// How a binding produces its value, decided at bind time.
#[derive(Clone)]
pub enum Concrete {
    /// A literal value returned as-is.
    Value(Value),
    /// A factory invoked with the container.
    Factory(FactoryFn),
    /// The identifier of a constructible type to build.
    TypeRef(String),
}

impl Concrete {
    /// Creates a factory concrete from a closure.
    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn(&Container) -> Result<Value> + Send + Sync + 'static,
    {
        Self::Factory(Arc::new(factory))
    }

    /// Creates a type-reference concrete.
    pub fn type_ref(name: impl Into<String>) -> Self {
        Self::TypeRef(name.into())
    }

    /// Creates a literal-value concrete.
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }
}

/// A registered binding for an abstract identifier.
#[derive(Clone)]
struct Binding {
    concrete: Concrete,
    shared: bool,
}

/// A reference to an invokable method, optionally bound to a receiver.
#[derive(Clone)]
pub struct Callable {
    /// Owning class identifier.
    pub class: String,
    /// Method name.
    pub method: String,
    /// Receiver instance, absent for static invocation.
    pub target: Option<Value>,
}

impl Callable {
    /// Creates an unbound (static) callable reference.
    pub fn new(class: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            method: method.into(),
            target: None,
        }
    }

    /// Creates a callable bound to a receiver instance.
    pub fn bound(target: Value, class: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            method: method.into(),
            target: Some(target),
        }
    }
}

/// Key of one memoized resolution or invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ResolutionKey {
    Type {
        target: String,
        args: ArgsFingerprint,
    },
    Call {
        class: String,
        method: String,
        receiver: Option<ValueKey>,
        args: ArgsFingerprint,
    },
}

#[derive(Default)]
struct State {
    bindings: HashMap<String, Binding>,
    instances: HashMap<String, Value>,
    resolved: HashMap<ResolutionKey, Value>,
}

/// The dependency container.
///
/// Holds the binding registry, the singleton instance cache, the
/// resolution cache, and the typed descriptors driving construction. All
/// of it is process-wide state that outlives any single request; mutation
/// goes through interior locks so one container can back every worker.
/// Locks are never held across user closures or recursive resolution.
#[derive(Default)]
pub struct Container {
    registry: RwLock<DescriptorRegistry>,
    state: Mutex<State>,
}

impl Container {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry(&self) -> RwLockReadGuard<'_, DescriptorRegistry> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn registry_mut(&self) -> RwLockWriteGuard<'_, DescriptorRegistry> {
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a type descriptor.
    pub fn register_type(&self, spec: crate::registry::TypeSpec) {
        self.registry_mut().register_type(spec);
    }

    /// Registers a method descriptor.
    pub fn register_method(&self, spec: MethodSpec) {
        self.registry_mut().register_method(spec);
    }

    /// Returns whether a type descriptor is registered.
    #[must_use]
    pub fn has_type(&self, name: &str) -> bool {
        self.registry().contains_type(name)
    }

    /// Looks up a method descriptor.
    #[must_use]
    pub fn method_spec(&self, class: &str, method: &str) -> Option<Arc<MethodSpec>> {
        self.registry().method_spec(class, method)
    }

    /// Registers a binding, overwriting any prior binding for the key.
    pub fn bind(&self, key: impl Into<String>, concrete: Concrete, shared: bool) {
        let key = key.into();
        debug!(key = %key, shared, "registering binding");
        self.state().bindings.insert(key, Binding { concrete, shared });
    }

    /// Registers a shared (singleton) binding.
    pub fn singleton(&self, key: impl Into<String>, concrete: Concrete) {
        self.bind(key, concrete, true);
    }

    /// Returns whether a binding exists for the key.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.state().bindings.contains_key(key)
    }

    /// Returns the already-constructed singleton for a key, if any.
    #[must_use]
    pub fn instance(&self, key: &str) -> Option<Value> {
        self.state().instances.get(key).cloned()
    }

    /// Drops all bindings, singleton instances, and memoized resolutions.
    pub fn flush(&self) {
        debug!("flushing container state");
        let mut state = self.state();
        state.bindings.clear();
        state.instances.clear();
        state.resolved.clear();
    }

    /// Resolves a value for the target identifier.
    ///
    /// A binding for the target takes precedence: a shared binding returns
    /// the cached singleton regardless of the supplied arguments; a factory
    /// is invoked with the container; a type reference is constructed; a
    /// literal value passes through. Without a binding the target itself is
    /// constructed as a concrete type.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::NotFound`] for an unregistered target,
    /// [`ContainerError::NotInstantiable`] for an interface-like target
    /// without a binding, or a parameter-resolution failure. Failures leave
    /// the container state untouched.
    pub fn resolve(&self, target: &str, args: &Args) -> Result<Value> {
        let key = ResolutionKey::Type {
            target: target.to_string(),
            args: args.fingerprint(),
        };

        if let Some(value) = self.state().resolved.get(&key) {
            trace!(target, "resolution cache hit");
            return Ok(value.clone());
        }

        let binding = self.state().bindings.get(target).cloned();

        let value = if let Some(binding) = binding {
            if binding.shared {
                if let Some(existing) = self.state().instances.get(target) {
                    trace!(target, "returning shared instance");
                    return Ok(existing.clone());
                }
            }

            let value = match &binding.concrete {
                Concrete::Factory(factory) => factory(self)?,
                Concrete::TypeRef(name) => self.build(name, args)?,
                Concrete::Value(value) => value.clone(),
            };

            if binding.shared {
                self.state()
                    .instances
                    .insert(target.to_string(), value.clone());
            }
            value
        } else {
            self.build(target, args)?
        };

        self.state().resolved.insert(key, value.clone());
        Ok(value)
    }

    /// Invokes a method through its registered descriptor, resolving its
    /// parameters with the same policy as construction.
    ///
    /// Results are memoized by the callable, receiver identity, and the
    /// canonical argument fingerprint: the identical invocation never
    /// executes the method body twice.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::InvalidCallable`] when no descriptor is
    /// registered or a non-static method has no receiver; propagates
    /// parameter-resolution failures and handler [`Fault`]s.
    ///
    /// [`Fault`]: crate::Fault
    pub fn invoke(&self, callable: &Callable, args: &Args) -> Result<Value> {
        let key = ResolutionKey::Call {
            class: callable.class.clone(),
            method: callable.method.clone(),
            receiver: callable.target.as_ref().map(Value::key),
            args: args.fingerprint(),
        };

        if let Some(value) = self.state().resolved.get(&key) {
            trace!(class = %callable.class, method = %callable.method, "invocation cache hit");
            return Ok(value.clone());
        }

        let spec = self
            .registry()
            .method_spec(&callable.class, &callable.method)
            .ok_or_else(|| ContainerError::InvalidCallable {
                class: callable.class.clone(),
                method: callable.method.clone(),
            })?;

        if !spec.is_static && callable.target.is_none() {
            return Err(ContainerError::InvalidCallable {
                class: callable.class.clone(),
                method: callable.method.clone(),
            });
        }

        let target = format!("{}::{}", spec.class, spec.method);
        let params = self.resolve_params(&target, &spec.params, args)?;
        let result = (spec.invoke)(callable.target.as_ref(), &params)?;

        self.state().resolved.insert(key, result.clone());
        Ok(result)
    }

    /// Constructs a type through its descriptor.
    fn build(&self, name: &str, args: &Args) -> Result<Value> {
        let spec = self
            .registry()
            .type_spec(name)
            .ok_or_else(|| ContainerError::NotFound(name.to_string()))?;

        let Some(construct) = spec.construct.clone() else {
            return Err(ContainerError::NotInstantiable(name.to_string()));
        };

        let params = self.resolve_params(&spec.name, &spec.params, args)?;
        construct(&params)
    }

    /// Applies the parameter resolution policy to a declared parameter
    /// list, in declaration order: exact-name argument, next positional
    /// argument, recursive type resolution, default value, null for
    /// nullable parameters, then failure.
    fn resolve_params(
        &self,
        target: &str,
        params: &[ParamSpec],
        args: &Args,
    ) -> Result<Vec<Value>> {
        let mut positionals = args.positionals().iter();
        let mut resolved = Vec::with_capacity(params.len());

        for param in params {
            if let Some(value) = args.get(&param.name) {
                resolved.push(value.clone());
                continue;
            }

            if let Some(value) = positionals.next() {
                resolved.push(value.clone());
                continue;
            }

            if let Some(type_name) = &param.type_name {
                if self.is_resolvable(type_name) {
                    resolved.push(self.resolve(type_name, &Args::new())?);
                    continue;
                }
            }

            if let Some(default) = &param.default {
                resolved.push(default.clone());
                continue;
            }

            if param.nullable {
                resolved.push(Value::Null);
                continue;
            }

            return Err(ContainerError::UnresolvableParameter {
                target: target.to_string(),
                name: param.name.clone(),
                type_name: param.type_name.clone(),
            });
        }

        Ok(resolved)
    }

    /// A type identifier supports recursive parameter resolution when it
    /// is bound or names an instantiable descriptor.
    fn is_resolvable(&self, type_name: &str) -> bool {
        if self.has(type_name) {
            return true;
        }
        self.registry()
            .type_spec(type_name)
            .is_some_and(|spec| spec.is_instantiable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TypeSpec;

    struct Greeter {
        prefix: String,
    }

    fn container_with_greeter() -> Container {
        let container = Container::new();
        container.register_type(
            TypeSpec::new("app::Greeter", |params| {
                let prefix = params[0].as_str().unwrap_or_default().to_string();
                Ok(Value::instance(Greeter { prefix }))
            })
            .param(ParamSpec::new("prefix").default_value("hello")),
        );
        container
    }

    #[test]
    fn test_direct_construction_without_binding() {
        let container = container_with_greeter();
        let value = container.resolve("app::Greeter", &Args::new()).unwrap();
        assert_eq!(
            value.downcast_ref::<Greeter>().map(|g| g.prefix.as_str()),
            Some("hello")
        );
    }

    #[test]
    fn test_shared_binding_returns_identical_instance() {
        let container = container_with_greeter();
        container.singleton("app::Greeter", Concrete::type_ref("app::Greeter"));

        let first = container.resolve("app::Greeter", &Args::new()).unwrap();
        let second = container
            .resolve("app::Greeter", &Args::new().named("prefix", "other"))
            .unwrap();

        assert!(first.instance_eq(&second));
    }

    #[test]
    fn test_unshared_binding_may_construct_independently() {
        let container = container_with_greeter();
        container.bind(
            "greeter",
            Concrete::factory(|_| Ok(Value::instance(Greeter { prefix: String::new() }))),
            false,
        );

        let first = container.resolve("greeter", &Args::new()).unwrap();
        let second = container
            .resolve("greeter", &Args::new().named("x", 1_i64))
            .unwrap();
        assert!(!first.instance_eq(&second));
    }

    #[test]
    fn test_literal_value_binding() {
        let container = Container::new();
        container.bind("config.name", Concrete::value("lattice"), false);
        let value = container.resolve("config.name", &Args::new()).unwrap();
        assert_eq!(value.as_str(), Some("lattice"));
    }

    #[test]
    fn test_factory_receives_container() {
        let container = container_with_greeter();
        container.bind(
            "greeter",
            Concrete::factory(|c| c.resolve("app::Greeter", &Args::new())),
            false,
        );
        let value = container.resolve("greeter", &Args::new()).unwrap();
        assert!(value.downcast_ref::<Greeter>().is_some());
    }

    #[test]
    fn test_parameter_resolution_precedence() {
        // Four parameters, each satisfied by a different tier.
        struct Quad {
            named: String,
            positional: i64,
            typed: bool,
            defaulted: String,
            nulled: Value,
        }

        let container = Container::new();
        container.register_type(TypeSpec::new("app::Dep", |_| Ok(Value::instance(42_u8))));
        container.register_type(
            TypeSpec::new("app::Quad", |params| {
                Ok(Value::instance(Quad {
                    named: params[0].as_str().unwrap_or_default().to_string(),
                    positional: match params[1] {
                        Value::Int(i) => i,
                        _ => 0,
                    },
                    typed: params[2].downcast_ref::<u8>().is_some(),
                    defaulted: params[3].as_str().unwrap_or_default().to_string(),
                    nulled: params[4].clone(),
                }))
            })
            .param(ParamSpec::new("named"))
            .param(ParamSpec::new("positional"))
            .param(ParamSpec::new("typed").of_type("app::Dep"))
            .param(ParamSpec::new("defaulted").default_value("fallback"))
            .param(ParamSpec::new("nulled").nullable()),
        );

        let args = Args::new().named("named", "from-name").positional(7_i64);
        let value = container.resolve("app::Quad", &args).unwrap();
        let quad = value.downcast_ref::<Quad>().unwrap();

        assert_eq!(quad.named, "from-name");
        assert_eq!(quad.positional, 7);
        assert!(quad.typed);
        assert_eq!(quad.defaulted, "fallback");
        assert!(quad.nulled.is_null());
    }

    #[test]
    fn test_unresolvable_parameter_error() {
        let container = Container::new();
        container.register_type(
            TypeSpec::new("app::Needy", |_| Ok(Value::Null))
                .param(ParamSpec::new("dep").of_type("app::Missing")),
        );

        let err = container.resolve("app::Needy", &Args::new()).unwrap_err();
        match err {
            ContainerError::UnresolvableParameter { name, type_name, .. } => {
                assert_eq!(name, "dep");
                assert_eq!(type_name.as_deref(), Some("app::Missing"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_not_instantiable_and_not_found() {
        let container = Container::new();
        container.register_type(TypeSpec::interface("app::Repo"));

        assert!(matches!(
            container.resolve("app::Repo", &Args::new()),
            Err(ContainerError::NotInstantiable(_))
        ));
        assert!(matches!(
            container.resolve("app::Nope", &Args::new()),
            Err(ContainerError::NotFound(_))
        ));
    }

    #[test]
    fn test_binding_for_interface_resolves() {
        let container = container_with_greeter();
        container.register_type(TypeSpec::interface("app::GreeterLike"));
        container.singleton("app::GreeterLike", Concrete::type_ref("app::Greeter"));

        let value = container.resolve("app::GreeterLike", &Args::new()).unwrap();
        assert!(value.downcast_ref::<Greeter>().is_some());
    }

    #[test]
    fn test_invoke_memoizes_identical_calls() {
        use std::sync::atomic::{AtomicU32, Ordering};

        static CALLS: AtomicU32 = AtomicU32::new(0);

        let container = Container::new();
        container.register_method(
            MethodSpec::new("app::Ctl", "show", |_, params| {
                CALLS.fetch_add(1, Ordering::SeqCst);
                Ok(params[0].clone())
            })
            .param(ParamSpec::new("id"))
            .static_method(),
        );

        let callable = Callable::new("app::Ctl", "show");
        let args = Args::new().named("id", "42");
        let first = container.invoke(&callable, &args).unwrap();
        let second = container.invoke(&callable, &args).unwrap();

        assert_eq!(first.as_str(), Some("42"));
        assert_eq!(second.as_str(), Some("42"));
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropped_instance_arguments_never_alias() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let calls = Arc::new(AtomicU32::new(0));
        let container = Container::new();
        {
            let calls = calls.clone();
            container.register_method(
                MethodSpec::new("app::Ctl", "echo", move |_, params| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let n = params[0].downcast_ref::<u32>().copied().unwrap_or_default();
                    Ok(Value::Int(i64::from(n)))
                })
                .param(ParamSpec::new("payload"))
                .static_method(),
            );
        }

        let callable = Callable::new("app::Ctl", "echo");
        let args = Args::new().named("payload", Value::instance(1_u32));
        let first = container.invoke(&callable, &args).unwrap();
        assert!(matches!(first, Value::Int(1)));
        drop(args);

        // Fresh payload instances after the first argument bag is gone:
        // even when the allocator hands back a previously used address,
        // each distinct instance must run the method body, never be
        // served a stale memo entry.
        for _ in 0..64 {
            let args = Args::new().named("payload", Value::instance(2_u32));
            let value = container.invoke(&callable, &args).unwrap();
            assert!(matches!(value, Value::Int(2)));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 65);
    }

    #[test]
    fn test_invoke_requires_receiver_for_instance_methods() {
        let container = Container::new();
        container.register_method(MethodSpec::new("app::Ctl", "show", |_, _| Ok(Value::Null)));

        let err = container
            .invoke(&Callable::new("app::Ctl", "show"), &Args::new())
            .unwrap_err();
        assert!(matches!(err, ContainerError::InvalidCallable { .. }));
    }

    #[test]
    fn test_invoke_unknown_method_is_invalid_callable() {
        let container = Container::new();
        let err = container
            .invoke(&Callable::new("app::Ctl", "nope"), &Args::new())
            .unwrap_err();
        assert!(matches!(err, ContainerError::InvalidCallable { .. }));
    }

    #[test]
    fn test_flush_clears_everything() {
        let container = container_with_greeter();
        container.singleton("app::Greeter", Concrete::type_ref("app::Greeter"));
        let before = container.resolve("app::Greeter", &Args::new()).unwrap();

        container.flush();

        assert!(!container.has("app::Greeter"));
        assert!(container.instance("app::Greeter").is_none());
        let after = container.resolve("app::Greeter", &Args::new()).unwrap();
        assert!(!before.instance_eq(&after));
    }

    #[test]
    fn test_failure_leaves_no_partial_state() {
        let container = Container::new();
        container.register_type(
            TypeSpec::new("app::Fails", |_| {
                Err(ContainerError::Fault(crate::Fault::new(
                    "app::Boom",
                    "constructor failed",
                )))
            }),
        );
        container.singleton("app::Fails", Concrete::type_ref("app::Fails"));

        assert!(container.resolve("app::Fails", &Args::new()).is_err());
        assert!(container.instance("app::Fails").is_none());
    }
}
