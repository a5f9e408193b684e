//! Dynamically typed values flowing through the container.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A shared, type-erased object instance.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// A value the container can store, inject, or return.
///
/// Primitives and JSON are held by value; constructed objects are held
/// behind a shared [`Instance`] so that singleton resolution can hand the
/// same object to every caller.
#[derive(Clone)]
pub enum Value {
    /// The absent/null value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A string.
    Str(String),
    /// A structured JSON value.
    Json(serde_json::Value),
    /// A constructed object.
    Instance(Instance),
}

impl Value {
    /// Wraps a concrete object as a shared instance.
    pub fn instance<T: Any + Send + Sync>(value: T) -> Self {
        Self::Instance(Arc::new(value))
    }

    /// Returns whether this is [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrows the wrapped object if this is an instance of `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Instance(inner) => inner.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Returns the string content if this is a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Compares two values for instance identity.
    ///
    /// Only instances can be identical; primitives always compare `false`.
    #[must_use]
    pub fn instance_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Instance(a), Self::Instance(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Produces the canonical cache-key component for this value.
    ///
    /// Primitives key by content, JSON by its canonical serialization,
    /// instances by pointer identity. An instance key holds the instance
    /// alive, so a freed allocation can never be recycled into a colliding
    /// key. Structurally different inputs never collide the way
    /// serialized-bag hashing would.
    #[must_use]
    pub fn key(&self) -> ValueKey {
        match self {
            Self::Null => ValueKey::Null,
            Self::Bool(b) => ValueKey::Bool(*b),
            Self::Int(i) => ValueKey::Int(*i),
            Self::Float(f) => ValueKey::Float(f.to_bits()),
            Self::Str(s) => ValueKey::Str(s.clone()),
            Self::Json(j) => ValueKey::Json(j.to_string()),
            Self::Instance(a) => ValueKey::Instance(InstanceKey(Arc::clone(a))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(s) => write!(f, "{s}"),
            Self::Json(j) => write!(f, "{j}"),
            Self::Instance(_) => write!(f, "[object]"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Int(i) => write!(f, "Int({i})"),
            Self::Float(v) => write!(f, "Float({v})"),
            Self::Str(s) => write!(f, "Str({s:?})"),
            Self::Json(j) => write!(f, "Json({j})"),
            Self::Instance(_) => write!(f, "Instance(..)"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

/// Canonical, hashable identity of a [`Value`] used in resolution-cache keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    /// Null marker.
    Null,
    /// Boolean content.
    Bool(bool),
    /// Integer content.
    Int(i64),
    /// Float content as raw bits.
    Float(u64),
    /// String content.
    Str(String),
    /// Canonical JSON serialization.
    Json(String),
    /// Instance pointer identity; holds the instance alive.
    Instance(InstanceKey),
}

/// Pointer identity of an instance, pinning the instance it refers to.
///
/// The key owns a clone of the `Arc`, so the allocation outlives every
/// cache entry keyed by it and its address cannot be reused by a later,
/// structurally different instance.
#[derive(Clone)]
pub struct InstanceKey(Instance);

impl InstanceKey {
    fn address(&self) -> usize {
        Arc::as_ptr(&self.0).cast::<()>() as usize
    }
}

impl PartialEq for InstanceKey {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl Eq for InstanceKey {}

impl Hash for InstanceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

impl fmt::Debug for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceKey({:#x})", self.address())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_identity() {
        let a = Value::instance(42_u32);
        let b = a.clone();
        let c = Value::instance(42_u32);

        assert!(a.instance_eq(&b));
        assert!(!a.instance_eq(&c));
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn test_primitive_keys_are_structural() {
        assert_eq!(Value::from("id").key(), Value::from("id").key());
        assert_eq!(Value::from(7_i64).key(), Value::Int(7).key());
        assert_ne!(Value::from(7_i64).key(), Value::from("7").key());
    }

    #[test]
    fn test_json_key_is_canonical() {
        let a = Value::Json(serde_json::json!({"a": 1, "b": 2}));
        let b = Value::Json(serde_json::json!({"b": 2, "a": 1}));
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_key_pins_the_instance() {
        let value = Value::instance(5_u8);
        let _key = value.key();

        let Value::Instance(inner) = &value else {
            panic!("expected instance");
        };
        // The key holds its own clone of the allocation.
        assert_eq!(Arc::strong_count(inner), 2);
    }

    #[test]
    fn test_downcast() {
        struct Marker(&'static str);
        let v = Value::instance(Marker("hello"));
        assert_eq!(v.downcast_ref::<Marker>().map(|m| m.0), Some("hello"));
        assert!(v.downcast_ref::<String>().is_none());
    }
}
