use crate::types::{
    Condition, ContextEntry, Expr, ExprKind, Key, LogicOp, NodeKind, Overrides, Resolution, Tree,
    TreeError, Value,
};

/// Walk the tree from the root's child down to a leaf, recording the path.
/// The delegating root never evaluates and never appears on the path;
/// breakpoints pass through to their linked continuation and do.
pub(crate) fn resolve(tree: &Tree, overrides: &Overrides) -> Result<Resolution, TreeError> {
    let mut path = Vec::new();
    let mut current = tree.root();
    loop {
        let node = tree.node(current);
        match node.kind {
            NodeKind::Root => {
                current = match node.children.first() {
                    Some((_, id)) => *id,
                    None => {
                        return Err(TreeError::TooFewChildren {
                            label: node.label.clone(),
                        })
                    }
                };
            }
            NodeKind::Breakpoint => {
                path.push(current);
                tracing::trace!(node = %node.label, "following breakpoint link");
                current = node.link.ok_or_else(|| TreeError::TooFewChildren {
                    label: node.label.clone(),
                })?;
            }
            NodeKind::Action(action) => {
                path.push(current);
                tracing::debug!(leaf = %node.label, steps = path.len(), "resolved to action");
                return Ok(Resolution {
                    leaf: current,
                    action: Some(action),
                    label: node.label.clone(),
                    path,
                });
            }
            NodeKind::Plain => {
                path.push(current);
                let Some(expr) = &node.expr else {
                    return Err(TreeError::NodeValue {
                        expr: node.label.clone(),
                        detail: "node carries no expression".to_owned(),
                    });
                };
                let value = eval_expr(expr, tree.contexts(), overrides)?;
                if !node.dtype.accepts(&value) {
                    return Err(TreeError::NodeValue {
                        expr: expr.display().to_owned(),
                        detail: format!("expected {}, got {value}", node.dtype),
                    });
                }
                tracing::trace!(node = %node.label, value = %value, "evaluated node");
                if let Some(next) = node
                    .child_under(Condition::Unconditional)
                    .or_else(|| node.child_under(Condition::Auto))
                {
                    current = next;
                } else if node.children.is_empty() {
                    tracing::debug!(leaf = %node.label, steps = path.len(), "resolved to leaf");
                    return Ok(Resolution {
                        leaf: current,
                        action: None,
                        label: node.label.clone(),
                        path,
                    });
                } else {
                    let slot = if value.truthy() {
                        Condition::True
                    } else {
                        Condition::False
                    };
                    current = node
                        .child_under(slot)
                        .or_else(|| node.child_under(Condition::Else))
                        .ok_or_else(|| TreeError::Resolution {
                            label: node.label.clone(),
                            value: value.to_string(),
                        })?;
                }
            }
        }
    }
}

/// Evaluate one expression against the registered contexts, with overrides
/// taking precedence over declared backing data.
pub(crate) fn eval_expr(
    expr: &Expr,
    contexts: &[ContextEntry],
    overrides: &Overrides,
) -> Result<Value, TreeError> {
    match expr.kind() {
        ExprKind::Literal(v) => Ok(v.clone()),
        ExprKind::Thunk(f) => f().map_err(|message| TreeError::Raised { message }),
        ExprKind::Fail(message) => Err(TreeError::Raised {
            message: message.clone(),
        }),
        ExprKind::Source(id) => {
            let entry = &contexts[id.0];
            if let Some(v) = overrides.get(&entry.name) {
                return Ok(v.clone());
            }
            entry.value.clone().ok_or_else(|| TreeError::NodeValue {
                expr: expr.display().to_owned(),
                detail: format!("context '{}' has no backing data", entry.name),
            })
        }
        ExprKind::Lookup { base, path } => {
            let mut value = eval_expr(base, contexts, overrides)?;
            for key in path {
                value = step(value, key, expr.display())?;
            }
            Ok(value)
        }
        ExprKind::Arith(op, a, b) => {
            let a = eval_expr(a, contexts, overrides)?;
            let b = eval_expr(b, contexts, overrides)?;
            a.arith(*op, &b).map_err(|detail| TreeError::NodeValue {
                expr: expr.display().to_owned(),
                detail,
            })
        }
        ExprKind::Neg(inner) => eval_expr(inner, contexts, overrides)?
            .negate()
            .map_err(|detail| TreeError::NodeValue {
                expr: expr.display().to_owned(),
                detail,
            }),
        ExprKind::Compare(op, a, b) => {
            let a = eval_expr(a, contexts, overrides)?;
            let b = eval_expr(b, contexts, overrides)?;
            a.compare(*op, &b)
                .map(Value::Bool)
                .ok_or_else(|| TreeError::NodeValue {
                    expr: expr.display().to_owned(),
                    detail: format!("cannot compare {a} and {b}"),
                })
        }
        ExprKind::Logic(op, a, b) => {
            let a = eval_expr(a, contexts, overrides)?;
            match op {
                LogicOp::And => {
                    if a.truthy() {
                        Ok(Value::Bool(eval_expr(b, contexts, overrides)?.truthy()))
                    } else {
                        Ok(Value::Bool(false))
                    }
                }
                LogicOp::Or => {
                    if a.truthy() {
                        Ok(Value::Bool(true))
                    } else {
                        Ok(Value::Bool(eval_expr(b, contexts, overrides)?.truthy()))
                    }
                }
            }
        }
        ExprKind::Not(inner) => Ok(Value::Bool(
            !eval_expr(inner, contexts, overrides)?.truthy(),
        )),
    }
}

fn step(value: Value, key: &Key, display: &str) -> Result<Value, TreeError> {
    match (value, key) {
        (Value::Map(mut entries), Key::Name(name)) => {
            entries.remove(name).ok_or_else(|| TreeError::NodeNotFound {
                what: format!("key '{name}' at '{display}'"),
            })
        }
        (Value::List(mut items), Key::Index(i)) => {
            if *i < items.len() {
                Ok(items.swap_remove(*i))
            } else {
                Err(TreeError::NodeNotFound {
                    what: format!(
                        "index {i} out of bounds at '{display}' ({} items)",
                        items.len()
                    ),
                })
            }
        }
        (other, Key::Name(name)) => Err(TreeError::NodeValue {
            expr: display.to_owned(),
            detail: format!("cannot index {other} with key '{name}'"),
        }),
        (other, Key::Index(i)) => Err(TreeError::NodeValue {
            expr: display.to_owned(),
            detail: format!("cannot index {other} at position {i}"),
        }),
    }
}
