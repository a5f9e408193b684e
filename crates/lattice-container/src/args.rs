//! Named and positional argument bags supplied to resolution and invocation.

use crate::value::{Value, ValueKey};

/// Arguments supplied to [`Container::resolve`](crate::Container::resolve)
/// or [`Container::invoke`](crate::Container::invoke).
///
/// Entries keep their supply order: named arguments are matched to
/// parameters by exact name, positional arguments are consumed in order by
/// parameters that no named argument covers.
#[derive(Debug, Clone, Default)]
pub struct Args {
    named: Vec<(String, Value)>,
    positional: Vec<Value>,
}

impl Args {
    /// Creates an empty argument bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a named argument.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.push((name.into(), value.into()));
        self
    }

    /// Adds a positional argument.
    #[must_use]
    pub fn positional(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Returns whether the bag carries no arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.named.is_empty() && self.positional.is_empty()
    }

    /// Looks up a named argument by exact name.
    ///
    /// The last value supplied under a name wins.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.named
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Returns the positional arguments in supply order.
    #[must_use]
    pub fn positionals(&self) -> &[Value] {
        &self.positional
    }

    /// Produces the canonical fingerprint of this bag.
    ///
    /// Positional entries keep their order; named entries are sorted by
    /// name so that supply order never changes the cache key.
    #[must_use]
    pub fn fingerprint(&self) -> ArgsFingerprint {
        let mut entries: Vec<(Option<String>, ValueKey)> = self
            .positional
            .iter()
            .map(|v| (None, v.key()))
            .collect();

        let mut named: Vec<(Option<String>, ValueKey)> = self
            .named
            .iter()
            .map(|(n, v)| (Some(n.clone()), v.key()))
            .collect();
        named.sort_by(|a, b| a.0.cmp(&b.0));
        entries.extend(named);

        ArgsFingerprint(entries)
    }
}

/// Canonically ordered identity of an argument bag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArgsFingerprint(Vec<(Option<String>, ValueKey)>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_lookup() {
        let args = Args::new().named("id", "42").named("name", "bob");
        assert_eq!(args.get("id").and_then(Value::as_str), Some("42"));
        assert!(args.get("missing").is_none());
    }

    #[test]
    fn test_last_named_wins() {
        let args = Args::new().named("id", "1").named("id", "2");
        assert_eq!(args.get("id").and_then(Value::as_str), Some("2"));
    }

    #[test]
    fn test_fingerprint_ignores_named_order() {
        let a = Args::new().named("x", 1_i64).named("y", 2_i64);
        let b = Args::new().named("y", 2_i64).named("x", 1_i64);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_keeps_positional_order() {
        let a = Args::new().positional(1_i64).positional(2_i64);
        let b = Args::new().positional(2_i64).positional(1_i64);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
