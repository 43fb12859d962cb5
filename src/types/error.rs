use thiserror::Error;

use super::condition::Condition;

/// Errors raised while constructing or evaluating a decision tree.
#[derive(Debug, Error)]
pub enum TreeError {
    /// A child was offered to a node whose matching edge is already taken,
    /// or whose kind admits no further children.
    #[error("too many children under node '{label}': edge {condition} is not available")]
    TooManyChildren { label: String, condition: Condition },

    /// Evaluation or a child lookup reached a node with no child to follow.
    #[error("too few children under node '{label}': no child to follow")]
    TooFewChildren { label: String },

    /// An expression produced a value that violates its declared type, or
    /// arithmetic on the resolved values failed.
    #[error("value error at '{expr}': {detail}")]
    NodeValue { expr: String, detail: String },

    /// A child was attached on an edge its parent's kind forbids.
    #[error("edge {condition} is not legal under node '{label}'")]
    EdgeValue { label: String, condition: Condition },

    /// A node's value matched none of its outgoing edges.
    #[error("cannot resolve a branch from node '{label}' with value {value}")]
    Resolution { label: String, value: String },

    /// A key lookup was requested with no enclosing data context.
    #[error("no enclosing data context for key '{key}'")]
    ContextsNotFound { key: String },

    /// A lookup by label, id, group, key, or index matched nothing.
    #[error("node not found: {what}")]
    NodeNotFound { what: String },

    /// A user-provided closure reported a failure.
    #[error("{message}")]
    Raised { message: String },
}
