//! Typed descriptors standing in for runtime reflection.
//!
//! Every constructible type and every invokable method registers one
//! descriptor at startup; resolution reads the descriptor's parameter
//! list instead of introspecting anything at call time.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Fault, Result};
use crate::value::Value;

/// Constructor closure: receives fully resolved parameters in declaration
/// order and produces the constructed value.
pub type ConstructFn = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// Method closure: receives the receiver (absent for static methods) and
/// the resolved parameters in declaration order.
pub type InvokeFn =
    Arc<dyn Fn(Option<&Value>, &[Value]) -> std::result::Result<Value, Fault> + Send + Sync>;

/// A declared parameter of a constructor or method.
#[derive(Clone)]
pub struct ParamSpec {
    /// Parameter name, matched against named arguments.
    pub name: String,
    /// Declared type identifier, if the parameter is type-hinted.
    pub type_name: Option<String>,
    /// Default value, if one is declared.
    pub default: Option<Value>,
    /// Whether the parameter accepts an absent value.
    pub nullable: bool,
}

impl ParamSpec {
    /// Creates an untyped, required parameter.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: None,
            default: None,
            nullable: false,
        }
    }

    /// Declares the parameter's type identifier.
    #[must_use]
    pub fn of_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Declares a default value.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Marks the parameter as accepting null.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// Descriptor of a constructible (or interface-like) type.
#[derive(Clone)]
pub struct TypeSpec {
    /// Fully qualified type identifier.
    pub name: String,
    /// Constructor parameters in declaration order.
    pub params: Vec<ParamSpec>,
    /// Constructor, absent for interface-like entries.
    pub construct: Option<ConstructFn>,
}

impl TypeSpec {
    /// Creates a constructible type descriptor.
    pub fn new<F>(name: impl Into<String>, construct: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            params: Vec::new(),
            construct: Some(Arc::new(construct)),
        }
    }

    /// Creates an interface-like descriptor that cannot be constructed
    /// directly and only resolves through a binding.
    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            construct: None,
        }
    }

    /// Appends a constructor parameter.
    #[must_use]
    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// Returns whether the type can be constructed directly.
    #[must_use]
    pub fn is_instantiable(&self) -> bool {
        self.construct.is_some()
    }
}

/// Descriptor of an invokable method on a handler class.
#[derive(Clone)]
pub struct MethodSpec {
    /// Owning class identifier.
    pub class: String,
    /// Method name.
    pub method: String,
    /// Whether the method is invoked without a receiver.
    pub is_static: bool,
    /// Parameters in declaration order.
    pub params: Vec<ParamSpec>,
    /// The invocation closure.
    pub invoke: InvokeFn,
}

impl MethodSpec {
    /// Creates an instance-method descriptor.
    pub fn new<F>(class: impl Into<String>, method: impl Into<String>, invoke: F) -> Self
    where
        F: Fn(Option<&Value>, &[Value]) -> std::result::Result<Value, Fault>
            + Send
            + Sync
            + 'static,
    {
        Self {
            class: class.into(),
            method: method.into(),
            is_static: false,
            params: Vec::new(),
            invoke: Arc::new(invoke),
        }
    }

    /// Appends a declared parameter.
    #[must_use]
    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// Marks the method as static (invoked without a receiver).
    #[must_use]
    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }
}

/// Registry of type and method descriptors, populated once at startup.
#[derive(Default)]
pub struct DescriptorRegistry {
    types: HashMap<String, Arc<TypeSpec>>,
    methods: HashMap<(String, String), Arc<MethodSpec>>,
}

impl DescriptorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type descriptor, overwriting any prior entry.
    pub fn register_type(&mut self, spec: TypeSpec) {
        self.types.insert(spec.name.clone(), Arc::new(spec));
    }

    /// Registers a method descriptor, overwriting any prior entry.
    pub fn register_method(&mut self, spec: MethodSpec) {
        self.methods
            .insert((spec.class.clone(), spec.method.clone()), Arc::new(spec));
    }

    /// Looks up a type descriptor.
    #[must_use]
    pub fn type_spec(&self, name: &str) -> Option<Arc<TypeSpec>> {
        self.types.get(name).cloned()
    }

    /// Looks up a method descriptor.
    #[must_use]
    pub fn method_spec(&self, class: &str, method: &str) -> Option<Arc<MethodSpec>> {
        self.methods
            .get(&(class.to_string(), method.to_string()))
            .cloned()
    }

    /// Returns whether a type descriptor exists.
    #[must_use]
    pub fn contains_type(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_registration_overwrites() {
        let mut registry = DescriptorRegistry::new();
        registry.register_type(TypeSpec::new("app::Svc", |_| Ok(Value::Int(1))));
        registry.register_type(TypeSpec::new("app::Svc", |_| Ok(Value::Int(2))));

        let spec = registry.type_spec("app::Svc").unwrap();
        let construct = spec.construct.as_ref().unwrap();
        assert!(matches!(construct(&[]), Ok(Value::Int(2))));
    }

    #[test]
    fn test_interface_is_not_instantiable() {
        let spec = TypeSpec::interface("app::Repo");
        assert!(!spec.is_instantiable());
    }

    #[test]
    fn test_method_lookup() {
        let mut registry = DescriptorRegistry::new();
        registry.register_method(
            MethodSpec::new("app::Ctl", "show", |_, _| Ok(Value::Null))
                .param(ParamSpec::new("id")),
        );

        assert!(registry.method_spec("app::Ctl", "show").is_some());
        assert!(registry.method_spec("app::Ctl", "missing").is_none());
    }
}
