//! Core domain types for live trace injection.

use std::fmt;

/// Identity of one instrumentable function: its absolute module path plus
/// the dotted qualified name inside that module.
///
/// Traces are grouped by this key during reconciliation, and the original
/// code body of a mutated function is recorded against it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BindingKey {
    pub module: String,
    pub function: String,
}

impl BindingKey {
    #[must_use]
    pub fn new(module: impl Into<String>, function: impl Into<String>) -> Self {
        BindingKey { module: module.into(), function: function.into() }
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.function)
    }
}

/// One log statement to synthesize into a function body.
///
/// Directives handed to the synthesizer are already ordered by ascending
/// line, then by arrival order for ties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceDirective {
    pub trace_id: String,
    pub line: u32,
    pub statement: String,
}

/// A desired trace after resolution: the wire identity plus the binding it
/// landed on. The engine's active state is a set of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTrace {
    pub id: String,
    pub key: BindingKey,
    pub statement: String,
    pub line: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_key_display() {
        let key = BindingKey::new("app.orders", "Cart.total");
        assert_eq!(key.to_string(), "app.orders:Cart.total");
    }

    #[test]
    fn test_binding_key_ordering_is_module_then_function() {
        let mut keys = vec![
            BindingKey::new("b", "a"),
            BindingKey::new("a", "z"),
            BindingKey::new("a", "b"),
        ];
        keys.sort();
        assert_eq!(keys[0], BindingKey::new("a", "b"));
        assert_eq!(keys[2], BindingKey::new("b", "a"));
    }
}
