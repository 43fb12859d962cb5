use std::fmt;

use super::node::{Action, NodeId};

/// The outcome of one evaluation pass: the leaf reached, the action it
/// carries (if it is an action node), and the nodes visited on the way.
///
/// The path lists every node evaluation passed through in order, including
/// breakpoints, but never the delegating root.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Resolution {
    pub(crate) leaf: NodeId,
    pub(crate) action: Option<Action>,
    pub(crate) label: String,
    pub(crate) path: Vec<NodeId>,
}

impl Resolution {
    /// The node evaluation stopped at.
    #[must_use]
    pub fn leaf(&self) -> NodeId {
        self.leaf
    }

    /// The action carried by the leaf, if it is an action node.
    #[must_use]
    pub fn action(&self) -> Option<Action> {
        self.action
    }

    /// The label of the leaf.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Every node visited, in order, breakpoints included, root excluded.
    #[must_use]
    pub fn path(&self) -> &[NodeId] {
        &self.path
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Resolution({}, {} node{})",
            self.label,
            self.path.len(),
            if self.path.len() == 1 { "" } else { "s" }
        )
    }
}
