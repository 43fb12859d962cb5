use std::fmt;

/// The slot a child occupies under its parent node.
///
/// A boolean parent routes through `True`, `False` and `Else`; a value-typed
/// parent delegates through a single `Auto` child; `Unconditional` marks the
/// lone child of a root, taken without inspecting the root's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Condition {
    /// Followed without evaluating the parent. Only legal under a root.
    Unconditional,
    /// Pass-through edge of a value-typed (non-boolean) parent.
    Auto,
    /// Taken when the parent's value is truthy.
    True,
    /// Taken when the parent's value is falsy.
    False,
    /// Fallback taken when neither branch slot matches; lowest priority.
    Else,
}

impl Condition {
    /// Whether a parent may carry more than one child on this kind of edge.
    /// Branch slots coexist; `Auto` and `Unconditional` must stand alone.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        matches!(self, Condition::True | Condition::False | Condition::Else)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Unconditional => write!(f, "unconditional"),
            Condition::Auto => write!(f, "auto"),
            Condition::True => write!(f, "true"),
            Condition::False => write!(f, "false"),
            Condition::Else => write!(f, "else"),
        }
    }
}
