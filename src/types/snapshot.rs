use std::collections::BTreeMap;
use std::fmt;

use super::condition::Condition;
use super::node::{NodeId, NodeKind};
use super::resolution::Resolution;
use super::tree::Tree;

/// A static view of a tree's structure, detached from the arena.
///
/// Nodes appear in preorder walk order from the root. The `Display` form
/// renders an indented outline, one edge per line; with the `serde` feature
/// the whole snapshot serializes as-is.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TreeSnapshot {
    /// The root's label.
    pub label: String,
    /// One view per reachable node, preorder.
    pub nodes: Vec<NodeView>,
}

/// One node of a [`TreeSnapshot`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NodeView {
    pub id: NodeId,
    pub label: String,
    pub kind: NodeKind,
    /// Display form of the node's expression, if it carries one.
    pub expr: Option<String>,
    /// Enclosing group labels at construction, innermost first.
    pub groups: Vec<String>,
    pub autogen: bool,
    pub children: Vec<EdgeView>,
    /// For breakpoints: the bound continuation.
    pub link: Option<NodeId>,
    /// Whether the captured resolution passed through this node.
    pub visited: bool,
}

/// One outgoing edge of a [`NodeView`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EdgeView {
    pub condition: Condition,
    pub child: NodeId,
}

impl TreeSnapshot {
    pub(crate) fn capture(tree: &Tree, resolution: Option<&Resolution>) -> TreeSnapshot {
        let root = tree.root();
        let order = tree.walk(root).unwrap_or_default();
        let mut nodes = Vec::with_capacity(order.len());
        for id in order {
            let node = tree.node(id);
            nodes.push(NodeView {
                id,
                label: node.label.clone(),
                kind: node.kind,
                expr: node.expr.as_ref().map(|e| e.display().to_owned()),
                groups: node.groups.iter().map(|g| g.to_string()).collect(),
                autogen: node.autogen,
                children: node
                    .children
                    .iter()
                    .map(|(condition, child)| EdgeView {
                        condition: *condition,
                        child: *child,
                    })
                    .collect(),
                link: node.link,
                visited: resolution.is_some_and(|r| r.path().contains(&id)),
            });
        }
        TreeSnapshot {
            label: tree.node(root).label.clone(),
            nodes,
        }
    }

    fn fmt_children(
        f: &mut fmt::Formatter<'_>,
        by_id: &BTreeMap<NodeId, &NodeView>,
        view: &NodeView,
        depth: usize,
    ) -> fmt::Result {
        for edge in &view.children {
            let Some(child) = by_id.get(&edge.child) else {
                continue;
            };
            write!(f, "{:width$}{} -> ", "", edge.condition, width = depth * 2)?;
            if child.visited {
                write!(f, "*")?;
            }
            write!(f, "{}", child.label)?;
            if let Some(expr) = &child.expr {
                write!(f, " [{expr}]")?;
            }
            if child.autogen {
                write!(f, " (auto)")?;
            }
            if let Some(link) = child.link {
                // An owned continuation already renders as a child edge.
                if !child.children.iter().any(|e| e.child == link) {
                    let target = by_id.get(&link).map_or("?", |v| v.label.as_str());
                    write!(f, " ~> {target}")?;
                }
            }
            writeln!(f)?;
            Self::fmt_children(f, by_id, child, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for TreeSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let by_id: BTreeMap<NodeId, &NodeView> = self.nodes.iter().map(|v| (v.id, v)).collect();
        let Some(root) = self.nodes.first() else {
            return Ok(());
        };
        writeln!(f, "{}", root.label)?;
        Self::fmt_children(f, &by_id, root, 1)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Expr, Overrides, Tree, Value};

    #[test]
    fn renders_indented_outline() {
        let tree = Tree::build_named("entry", |b| {
            b.node("gate", Expr::literal(true), |b| {
                b.long()?;
                b.short()?;
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();
        assert_eq!(
            tree.snapshot().to_string(),
            "entry\n  unconditional -> gate [true]\n    true -> long\n    false -> short\n"
        );
    }

    #[test]
    fn marks_consolidation_fills() {
        let tree = Tree::build(|b| {
            b.node("gate", Expr::literal(true), |b| {
                b.long()?;
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();
        let text = tree.snapshot().to_string();
        assert!(text.contains("false -> hold (auto)"));
    }

    #[test]
    fn snapshot_with_marks_visited_path() {
        let tree = Tree::build(|b| {
            b.mapping("market", Value::map([("volatility", 0.2)]), |b, m| {
                b.node("calm", m.key("volatility").lt(0.5), |b| {
                    b.long()?;
                    b.short()?;
                    Ok(())
                })?;
                Ok(())
            })
        })
        .unwrap();
        let resolution = tree.resolve(&Overrides::new()).unwrap();
        let snap = tree.snapshot_with(&resolution);
        let calm = snap.nodes.iter().find(|v| v.label == "calm").unwrap();
        let long = snap.nodes.iter().find(|v| v.label == "long").unwrap();
        let short = snap.nodes.iter().find(|v| v.label == "short").unwrap();
        assert!(calm.visited);
        assert!(long.visited);
        assert!(!short.visited);
        assert!(snap.to_string().contains("true -> *long"));
    }

    #[test]
    fn captures_groups_and_exprs() {
        let tree = Tree::build(|b| {
            b.mapping("market", Value::map([("volatility", 0.2)]), |b, m| {
                b.node("calm", m.key("volatility").lt(0.5), |b| {
                    b.long()?;
                    b.short()?;
                    Ok(())
                })?;
                Ok(())
            })
        })
        .unwrap();
        let snap = tree.snapshot();
        let calm = snap.nodes.iter().find(|v| v.label == "calm").unwrap();
        assert_eq!(calm.expr.as_deref(), Some("market.volatility < 0.5"));
        assert_eq!(calm.groups, vec!["market".to_owned()]);
    }
}
