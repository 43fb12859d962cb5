mod builder;
mod consolidate;
mod evaluate;
mod scope;
mod types;

pub use builder::{MappingCtx, SequenceCtx, TreeBuilder};
pub use scope::Group;
pub use types::{
    Action, ArithOp, CompareOp, Condition, CtxId, DType, EdgeView, Expr, Key, LogicOp, NodeId,
    NodeKind, NodeView, Overrides, Resolution, Tree, TreeError, TreeSnapshot, Value,
};
