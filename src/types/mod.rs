mod condition;
mod context;
mod error;
mod expr;
mod node;
mod resolution;
mod snapshot;
mod tree;
mod value;

pub use condition::Condition;
pub use context::{CtxId, Overrides};
pub use error::TreeError;
pub use expr::{ArithOp, CompareOp, Expr, Key, LogicOp};
pub use node::{Action, NodeId, NodeKind};
pub use resolution::Resolution;
pub use snapshot::{EdgeView, NodeView, TreeSnapshot};
pub use tree::Tree;
pub use value::{DType, Value};

pub(crate) use context::ContextEntry;
pub(crate) use expr::ExprKind;
pub(crate) use node::Node;
