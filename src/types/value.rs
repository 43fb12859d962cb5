use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use super::expr::{ArithOp, CompareOp};

/// Runtime values flowing through data contexts and expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A 64-bit signed integer.
    Int(i64),
    /// A 64-bit floating-point number.
    Float(f64),
    /// A boolean value.
    Bool(bool),
    /// A UTF-8 string.
    String(String),
    /// An ordered string-keyed mapping, for nested lookups.
    Map(BTreeMap<String, Value>),
    /// A sequence of values, indexed by position.
    List(Vec<Value>),
}

/// Declared data type a node or expression may enforce on its resolved value.
///
/// `Float` accepts integer values as well; the other types are exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    Bool,
    Int,
    Float,
    Str,
}

impl Value {
    /// Build a map value from key/value pairs, preserving nothing but the keys'
    /// natural order.
    pub fn map<K, V, I>(entries: I) -> Value
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a list value from items.
    pub fn list<V, I>(items: I) -> Value
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    /// Truthiness, following the conventions of dynamic languages: zero and
    /// empty collections are falsy, everything else is truthy.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Value::Bool(v) => *v,
            Value::Int(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::String(v) => !v.is_empty(),
            Value::Map(v) => !v.is_empty(),
            Value::List(v) => !v.is_empty(),
        }
    }

    /// The declared type this value satisfies exactly, if any.
    /// Maps and lists carry no scalar dtype.
    #[must_use]
    pub fn dtype(&self) -> Option<DType> {
        match self {
            Value::Bool(_) => Some(DType::Bool),
            Value::Int(_) => Some(DType::Int),
            Value::Float(_) => Some(DType::Float),
            Value::String(_) => Some(DType::Str),
            Value::Map(_) | Value::List(_) => None,
        }
    }

    /// Compare this value to another using the given operator.
    /// Returns `None` for incompatible types (e.g. string vs. int, or any map/list).
    #[must_use]
    pub fn compare(&self, op: CompareOp, other: &Value) -> Option<bool> {
        let ord = self.partial_cmp_value(other)?;
        Some(match op {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Neq => ord != Ordering::Equal,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Gte => ord != Ordering::Less,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Lte => ord != Ordering::Greater,
        })
    }

    #[allow(clippy::cast_precision_loss)]
    fn partial_cmp_value(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Bool(a), Value::Bool(b)) => {
                // Only equality comparisons are meaningful for bools
                Some(a.cmp(b))
            }
            (Value::String(a), Value::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }

    /// Apply a binary arithmetic operator. Integers stay integral where the
    /// operator allows it; mixing with a float promotes to float; true
    /// division always yields a float. `Add` also concatenates strings.
    ///
    /// On failure the returned string describes the violation.
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn arith(&self, op: ArithOp, other: &Value) -> Result<Value, String> {
        if let (Value::String(a), Value::String(b)) = (self, other) {
            if op == ArithOp::Add {
                return Ok(Value::String(format!("{a}{b}")));
            }
        }
        let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) else {
            return Err(format!("cannot apply '{op}' to {self} and {other}"));
        };
        let both_int = matches!((self, other), (Value::Int(_), Value::Int(_)));
        match op {
            ArithOp::Add | ArithOp::Sub | ArithOp::Mul => {
                if both_int {
                    let (x, y) = (self.as_i64(), other.as_i64());
                    let r = match op {
                        ArithOp::Add => x.checked_add(y),
                        ArithOp::Sub => x.checked_sub(y),
                        _ => x.checked_mul(y),
                    };
                    // Overflow promotes to float rather than wrapping.
                    return Ok(r.map_or_else(
                        || {
                            Value::Float(match op {
                                ArithOp::Add => a + b,
                                ArithOp::Sub => a - b,
                                _ => a * b,
                            })
                        },
                        Value::Int,
                    ));
                }
                Ok(Value::Float(match op {
                    ArithOp::Add => a + b,
                    ArithOp::Sub => a - b,
                    _ => a * b,
                }))
            }
            ArithOp::Div => {
                if b == 0.0 {
                    return Err("division by zero".to_owned());
                }
                Ok(Value::Float(a / b))
            }
            ArithOp::FloorDiv => {
                if b == 0.0 {
                    return Err("division by zero".to_owned());
                }
                if both_int {
                    Ok(Value::Int(floor_div(self.as_i64(), other.as_i64())))
                } else {
                    Ok(Value::Float((a / b).floor()))
                }
            }
            ArithOp::Pow => {
                if both_int {
                    let exp = other.as_i64();
                    if let Ok(exp) = u32::try_from(exp) {
                        if let Some(r) = self.as_i64().checked_pow(exp) {
                            return Ok(Value::Int(r));
                        }
                    }
                }
                Ok(Value::Float(a.powf(b)))
            }
        }
    }

    /// Numeric negation. Fails on non-numeric values.
    pub(crate) fn negate(&self) -> Result<Value, String> {
        match self {
            Value::Int(v) => Ok(Value::Int(-v)),
            Value::Float(v) => Ok(Value::Float(-v)),
            other => Err(format!("cannot negate {other}")),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Only meaningful after `as_f64` confirmed a numeric; ints only.
    fn as_i64(&self) -> i64 {
        match self {
            Value::Int(v) => *v,
            _ => 0,
        }
    }
}

/// Floor division matching the floored-quotient convention (rounds toward
/// negative infinity, unlike Rust's truncating `/`).
fn floor_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

impl DType {
    /// Whether a resolved value satisfies this declared type.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            DType::Bool => matches!(value, Value::Bool(_)),
            DType::Int => matches!(value, Value::Int(_)),
            DType::Float => matches!(value, Value::Float(_) | Value::Int(_)),
            DType::Str => matches!(value, Value::String(_)),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Map(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "\"{v}\""),
            Value::Map(v) => {
                write!(f, "{{")?;
                for (i, (k, val)) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {val}")?;
                }
                write!(f, "}}")
            }
            Value::List(v) => {
                write!(f, "[")?;
                for (i, val) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{val}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::Bool => write!(f, "bool"),
            DType::Int => write!(f, "int"),
            DType::Float => write!(f, "float"),
            DType::Str => write!(f, "str"),
        }
    }
}
