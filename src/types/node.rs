use std::fmt;
use std::sync::Arc;

use super::condition::Condition;
use super::expr::Expr;
use super::value::DType;

/// Handle to a node in its tree's arena.
///
/// Ids are only meaningful within the tree (or builder) that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Positional index of this node in construction order.
    #[must_use]
    pub fn index(&self) -> usize {
        self.0
    }
}

/// The action a terminal node instructs the caller to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Action {
    /// Keep the current position.
    Hold,
    /// Open or keep a long position.
    Long,
    /// Open or keep a short position.
    Short,
}

/// What role a node plays in its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum NodeKind {
    /// An ordinary decision node carrying an expression.
    Plain,
    /// A delegating entry node; never part of an evaluation path.
    Root,
    /// A deferred continuation site awaiting a linked subtree.
    Breakpoint,
    /// A terminal carrying an [`Action`].
    Action(Action),
}

/// One node record in the arena. Children are kept in attachment order,
/// which fixes both walk order and snapshot order.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) label: String,
    pub(crate) kind: NodeKind,
    pub(crate) expr: Option<Expr>,
    pub(crate) dtype: DType,
    pub(crate) children: Vec<(Condition, NodeId)>,
    pub(crate) parent: Option<NodeId>,
    /// Labels of the enclosing groups at construction time, innermost first.
    pub(crate) groups: Vec<Arc<str>>,
    /// Set on nodes added by consolidation rather than by the caller.
    pub(crate) autogen: bool,
    /// For breakpoints only: the continuation evaluation jumps to.
    pub(crate) link: Option<NodeId>,
}

impl Node {
    pub(crate) fn new(
        label: String,
        kind: NodeKind,
        expr: Option<Expr>,
        dtype: DType,
        groups: Vec<Arc<str>>,
    ) -> Node {
        Node {
            label,
            kind,
            expr,
            dtype,
            children: Vec::new(),
            parent: None,
            groups,
            autogen: false,
            link: None,
        }
    }

    /// The child occupying the given edge, if any.
    pub(crate) fn child_under(&self, condition: Condition) -> Option<NodeId> {
        self.children
            .iter()
            .find(|(c, _)| *c == condition)
            .map(|(_, id)| *id)
    }

    /// Whether evaluation stops here. Roots delegate and breakpoints either
    /// pass through or fail, so only plain and action nodes can be leaves.
    pub(crate) fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Plain | NodeKind::Action(_)) && self.children.is_empty()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Hold => write!(f, "hold"),
            Action::Long => write!(f, "long"),
            Action::Short => write!(f, "short"),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Plain => write!(f, "plain"),
            NodeKind::Root => write!(f, "root"),
            NodeKind::Breakpoint => write!(f, "breakpoint"),
            NodeKind::Action(a) => write!(f, "action({a})"),
        }
    }
}
