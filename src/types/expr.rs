use std::fmt;
use std::sync::Arc;

use super::context::CtxId;
use super::error::TreeError;
use super::value::{DType, Value};

/// Comparison operators supported in node expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Binary arithmetic operators supported in node expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    /// True division; always yields a float.
    Div,
    /// Floored division; stays integral on two ints.
    FloorDiv,
    Pow,
}

/// Short-circuiting logical connectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

/// One step of a lookup path into a map or list value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Name(String),
    Index(usize),
}

pub(crate) type ThunkFn = Arc<dyn Fn() -> Result<Value, String> + Send + Sync>;

/// A lazily evaluated expression attached to a node.
///
/// Expressions are immutable and cheap to clone; sharing one between several
/// nodes re-evaluates it independently at each. They compose through ordinary
/// Rust operators (`+`, `-`, `*`, `/`, `&`, `|`, `!`) and the comparison
/// methods below, with plain values lifting to literals automatically.
#[derive(Clone)]
pub struct Expr {
    node: Arc<ExprNode>,
}

pub(crate) struct ExprNode {
    pub(crate) kind: ExprKind,
    pub(crate) dtype: Option<DType>,
    pub(crate) display: String,
}

#[derive(Clone)]
pub(crate) enum ExprKind {
    Literal(Value),
    /// Calls out to user code at evaluation time.
    Thunk(ThunkFn),
    /// Always fails with the given message when evaluated.
    Fail(String),
    /// The whole backing value of a registered data context.
    Source(CtxId),
    /// A path lookup applied to a base expression.
    Lookup { base: Expr, path: Vec<Key> },
    Arith(ArithOp, Expr, Expr),
    Neg(Expr),
    Compare(CompareOp, Expr, Expr),
    Logic(LogicOp, Expr, Expr),
    Not(Expr),
}

impl Expr {
    fn new(kind: ExprKind, dtype: Option<DType>, display: String) -> Expr {
        Expr {
            node: Arc::new(ExprNode {
                kind,
                dtype,
                display,
            }),
        }
    }

    /// Wrap a plain value as a constant expression.
    pub fn literal(value: impl Into<Value>) -> Expr {
        let value = value.into();
        let dtype = value.dtype();
        let display = value.to_string();
        Expr::new(ExprKind::Literal(value), dtype, display)
    }

    /// Defer to a closure at evaluation time. A closure failure surfaces as
    /// [`TreeError::Raised`] carrying the returned message.
    ///
    /// The resulting expression carries no declared type; use [`Expr::cast`]
    /// to declare one.
    pub fn thunk<F>(f: F) -> Expr
    where
        F: Fn() -> Result<Value, String> + Send + Sync + 'static,
    {
        Expr::new(ExprKind::Thunk(Arc::new(f)), None, "<fn>".to_owned())
    }

    /// An expression that fails with the given message whenever evaluated.
    /// Useful as a sentinel on branches that must never be reached.
    pub fn fail(message: impl Into<String>) -> Expr {
        Expr::new(ExprKind::Fail(message.into()), None, "<fail>".to_owned())
    }

    /// The whole backing value of a data context. Handed out by the builder;
    /// the id must come from its context registry.
    pub(crate) fn source(id: CtxId, name: &str) -> Expr {
        Expr::new(ExprKind::Source(id), None, name.to_owned())
    }

    /// Look up a nested entry by key. Dots split into one lookup per
    /// segment, so `"quote.bid"` descends two levels.
    #[must_use]
    pub fn key(&self, name: &str) -> Expr {
        let keys: Vec<Key> = name.split('.').map(|s| Key::Name(s.to_owned())).collect();
        self.extend_path(keys)
    }

    /// Look up a list element by position.
    #[must_use]
    pub fn at(&self, index: usize) -> Expr {
        self.extend_path(vec![Key::Index(index)])
    }

    fn extend_path(&self, keys: Vec<Key>) -> Expr {
        let (base, mut path) = match &self.node.kind {
            ExprKind::Lookup { base, path } => (base.clone(), path.clone()),
            _ => (self.clone(), Vec::new()),
        };
        path.extend(keys);
        let mut display = base.node.display.clone();
        for key in &path {
            match key {
                Key::Name(name) => {
                    display.push('.');
                    display.push_str(name);
                }
                Key::Index(i) => {
                    display.push('[');
                    display.push_str(&i.to_string());
                    display.push(']');
                }
            }
        }
        Expr::new(ExprKind::Lookup { base, path }, None, display)
    }

    /// Re-declare the type this expression must resolve to.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NodeValue`] if the expression is a literal whose
    /// value cannot satisfy the target type.
    pub fn cast(&self, dtype: DType) -> Result<Expr, TreeError> {
        if let ExprKind::Literal(value) = &self.node.kind {
            if !dtype.accepts(value) {
                return Err(TreeError::NodeValue {
                    expr: self.node.display.clone(),
                    detail: format!("cannot cast {value} to {dtype}"),
                });
            }
        }
        Ok(Expr::new(
            self.node.kind.clone(),
            Some(dtype),
            self.node.display.clone(),
        ))
    }

    fn compare(&self, op: CompareOp, other: impl Into<Expr>) -> Expr {
        let other = other.into();
        let display = format!("{} {op} {}", self.node.display, other.node.display);
        Expr::new(
            ExprKind::Compare(op, self.clone(), other),
            Some(DType::Bool),
            display,
        )
    }

    /// `self == other`
    #[must_use]
    pub fn eq(&self, other: impl Into<Expr>) -> Expr {
        self.compare(CompareOp::Eq, other)
    }

    /// `self != other`
    #[must_use]
    pub fn neq(&self, other: impl Into<Expr>) -> Expr {
        self.compare(CompareOp::Neq, other)
    }

    /// `self > other`
    #[must_use]
    pub fn gt(&self, other: impl Into<Expr>) -> Expr {
        self.compare(CompareOp::Gt, other)
    }

    /// `self >= other`
    #[must_use]
    pub fn gte(&self, other: impl Into<Expr>) -> Expr {
        self.compare(CompareOp::Gte, other)
    }

    /// `self < other`
    #[must_use]
    pub fn lt(&self, other: impl Into<Expr>) -> Expr {
        self.compare(CompareOp::Lt, other)
    }

    /// `self <= other`
    #[must_use]
    pub fn lte(&self, other: impl Into<Expr>) -> Expr {
        self.compare(CompareOp::Lte, other)
    }

    fn logic(&self, op: LogicOp, other: impl Into<Expr>) -> Expr {
        let other = other.into();
        let symbol = match op {
            LogicOp::And => "&",
            LogicOp::Or => "|",
        };
        let display = format!("{} {symbol} {}", self.node.display, other.node.display);
        Expr::new(
            ExprKind::Logic(op, self.clone(), other),
            Some(DType::Bool),
            display,
        )
    }

    /// Logical conjunction, short-circuiting on a falsy left side.
    /// Also available as the `&` operator.
    #[must_use]
    pub fn and(&self, other: impl Into<Expr>) -> Expr {
        self.logic(LogicOp::And, other)
    }

    /// Logical disjunction, short-circuiting on a truthy left side.
    /// Also available as the `|` operator.
    #[must_use]
    pub fn or(&self, other: impl Into<Expr>) -> Expr {
        self.logic(LogicOp::Or, other)
    }

    fn arith(&self, op: ArithOp, other: impl Into<Expr>) -> Expr {
        let other = other.into();
        let display = format!("{} {op} {}", self.node.display, other.node.display);
        Expr::new(
            ExprKind::Arith(op, self.clone(), other),
            Some(DType::Float),
            display,
        )
    }

    /// Floored division (`//`); stays integral on two ints.
    #[must_use]
    pub fn floor_div(&self, other: impl Into<Expr>) -> Expr {
        self.arith(ArithOp::FloorDiv, other)
    }

    /// Exponentiation (`**`).
    #[must_use]
    pub fn pow(&self, other: impl Into<Expr>) -> Expr {
        self.arith(ArithOp::Pow, other)
    }

    /// The declared result type, if any.
    #[must_use]
    pub fn dtype(&self) -> Option<DType> {
        self.node.dtype
    }

    pub(crate) fn kind(&self) -> &ExprKind {
        &self.node.kind
    }

    pub(crate) fn display(&self) -> &str {
        &self.node.display
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expr({})", self.node.display)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.node.display)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "=="),
            CompareOp::Neq => write!(f, "!="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Gte => write!(f, ">="),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Lte => write!(f, "<="),
        }
    }
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArithOp::Add => write!(f, "+"),
            ArithOp::Sub => write!(f, "-"),
            ArithOp::Mul => write!(f, "*"),
            ArithOp::Div => write!(f, "/"),
            ArithOp::FloorDiv => write!(f, "//"),
            ArithOp::Pow => write!(f, "**"),
        }
    }
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::literal(v)
    }
}

impl From<i64> for Expr {
    fn from(v: i64) -> Self {
        Expr::literal(v)
    }
}

impl From<f64> for Expr {
    fn from(v: f64) -> Self {
        Expr::literal(v)
    }
}

impl From<bool> for Expr {
    fn from(v: bool) -> Self {
        Expr::literal(v)
    }
}

impl From<&str> for Expr {
    fn from(v: &str) -> Self {
        Expr::literal(v)
    }
}

impl From<String> for Expr {
    fn from(v: String) -> Self {
        Expr::literal(v)
    }
}

impl<R: Into<Expr>> std::ops::Add<R> for Expr {
    type Output = Expr;

    fn add(self, rhs: R) -> Expr {
        self.arith(ArithOp::Add, rhs)
    }
}

impl<R: Into<Expr>> std::ops::Sub<R> for Expr {
    type Output = Expr;

    fn sub(self, rhs: R) -> Expr {
        self.arith(ArithOp::Sub, rhs)
    }
}

impl<R: Into<Expr>> std::ops::Mul<R> for Expr {
    type Output = Expr;

    fn mul(self, rhs: R) -> Expr {
        self.arith(ArithOp::Mul, rhs)
    }
}

impl<R: Into<Expr>> std::ops::Div<R> for Expr {
    type Output = Expr;

    fn div(self, rhs: R) -> Expr {
        self.arith(ArithOp::Div, rhs)
    }
}

impl std::ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        let display = format!("-{}", self.node.display);
        Expr::new(ExprKind::Neg(self), Some(DType::Float), display)
    }
}

impl<R: Into<Expr>> std::ops::BitAnd<R> for Expr {
    type Output = Expr;

    fn bitand(self, rhs: R) -> Expr {
        self.logic(LogicOp::And, rhs)
    }
}

impl<R: Into<Expr>> std::ops::BitOr<R> for Expr {
    type Output = Expr;

    fn bitor(self, rhs: R) -> Expr {
        self.logic(LogicOp::Or, rhs)
    }
}

impl std::ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        let display = format!("!{}", self.node.display);
        Expr::new(ExprKind::Not(self), Some(DType::Bool), display)
    }
}
