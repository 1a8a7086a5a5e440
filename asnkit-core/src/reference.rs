//! Lazy references

use serde::{Deserialize, Serialize};
use std::fmt;

/// A reference that is either still a name or already a handle
///
/// A `Ref` never resolves itself. Resolution goes through a scope, which
/// returns the handle without writing it back into the reference, so a
/// reference is never partially resolved and carries no hidden state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ref<T> {
    /// Name to be looked up through the scope chain
    Unresolved(String),
    /// Handle known at construction time
    Resolved(T),
}

impl<T> Ref<T> {
    pub fn named(name: impl Into<String>) -> Self {
        Ref::Unresolved(name.into())
    }

    pub fn to(handle: T) -> Self {
        Ref::Resolved(handle)
    }

    /// The referenced name, if the reference is still symbolic
    pub fn name(&self) -> Option<&str> {
        match self {
            Ref::Unresolved(name) => Some(name),
            Ref::Resolved(_) => None,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ref::Unresolved(name) => f.write_str(name),
            Ref::Resolved(handle) => write!(f, "{}", handle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name() {
        let by_name: Ref<u32> = Ref::named("Foo");
        assert_eq!(by_name.name(), Some("Foo"));
        assert_eq!(Ref::to(7u32).name(), None);
        assert_eq!(Ref::to(7u32).to_string(), "7");
    }
}
