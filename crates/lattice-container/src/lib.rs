//! # lattice-container
//!
//! A dependency container for request-dispatch layers.
//!
//! This crate provides:
//! - A binding registry mapping abstract identifiers to literal values,
//!   factories, or constructible type references
//! - Singleton (shared) bindings with instance caching
//! - Object-graph construction driven by typed descriptors registered at
//!   startup instead of runtime reflection
//! - A parameter resolution policy shared between construction and method
//!   invocation: named argument, positional argument, recursive type
//!   resolution, default value, nullable null
//! - Memoization of resolutions and invocations under canonical cache keys
//!
//! ## Quick Start
//!
//! ```
//! use lattice_container::{Args, Concrete, Container, ParamSpec, TypeSpec, Value};
//!
//! struct Clock;
//! struct Reporter {
//!     label: String,
//! }
//!
//! let container = Container::new();
//! container.register_type(TypeSpec::new("app::Clock", |_| Ok(Value::instance(Clock))));
//! container.register_type(
//!     TypeSpec::new("app::Reporter", |params| {
//!         Ok(Value::instance(Reporter {
//!             label: params[0].as_str().unwrap_or_default().to_string(),
//!         }))
//!     })
//!     .param(ParamSpec::new("label").default_value("default")),
//! );
//!
//! // Singleton: every resolve returns the same instance.
//! container.singleton("app::Clock", Concrete::type_ref("app::Clock"));
//! let a = container.resolve("app::Clock", &Args::new()).unwrap();
//! let b = container.resolve("app::Clock", &Args::new()).unwrap();
//! assert!(a.instance_eq(&b));
//!
//! // Direct construction with a named argument.
//! let reporter = container
//!     .resolve("app::Reporter", &Args::new().named("label", "requests"))
//!     .unwrap();
//! assert_eq!(
//!     reporter.downcast_ref::<Reporter>().map(|r| r.label.as_str()),
//!     Some("requests")
//! );
//! ```

mod args;
mod container;
mod error;
mod registry;
mod value;

pub use args::{Args, ArgsFingerprint};
pub use container::{Callable, Concrete, Container, FactoryFn};
pub use error::{ContainerError, Fault, Result};
pub use registry::{ConstructFn, DescriptorRegistry, InvokeFn, MethodSpec, ParamSpec, TypeSpec};
pub use value::{Instance, InstanceKey, Value, ValueKey};
