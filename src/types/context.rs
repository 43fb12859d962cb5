use std::collections::BTreeMap;
use std::sync::Arc;

use super::Value;

/// Identifier of a data context registered with one tree's builder.
///
/// Ids are only meaningful within the tree whose builder issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CtxId(pub(crate) usize);

/// A registered data context: a name plus the value it was declared with,
/// if any. Contexts declared without data must be supplied through
/// [`Overrides`] at evaluation time.
#[derive(Debug, Clone)]
pub(crate) struct ContextEntry {
    pub(crate) name: Arc<str>,
    pub(crate) value: Option<Value>,
}

/// Per-evaluation replacement data, keyed by context name.
///
/// An override replaces the whole backing value of the named context for
/// that evaluation only; the tree itself is never mutated.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    entries: BTreeMap<String, Value>,
}

impl Overrides {
    /// Create an empty override set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the named context's backing value. Chainable.
    #[must_use]
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value.into());
        self
    }

    /// Replace the named context's backing value (mutable reference version).
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.entries.insert(name.into(), value);
    }

    /// Look up the replacement for a context name, if one was given.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    /// Whether no replacements were given.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The number of replaced contexts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
