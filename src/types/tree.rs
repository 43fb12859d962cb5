use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::builder::TreeBuilder;
use crate::evaluate;

use super::condition::Condition;
use super::context::{ContextEntry, Overrides};
use super::error::TreeError;
use super::node::{Action, Node, NodeId, NodeKind};
use super::resolution::Resolution;
use super::snapshot::TreeSnapshot;
use super::value::{DType, Value};

/// A sealed decision tree: immutable, cheap to share, and safe to evaluate
/// from many threads at once.
///
/// Built through [`Tree::build`], which hands a [`TreeBuilder`] to a
/// closure; once the closure returns, vacant branches are consolidated and
/// the structure is frozen.
#[derive(Debug)]
pub struct Tree {
    nodes: Vec<Node>,
    contexts: Vec<ContextEntry>,
    root: NodeId,
    group_labels: Vec<Arc<str>>,
    labels: BTreeMap<String, Vec<NodeId>>,
}

impl Tree {
    /// Build a tree under a root labeled `root`.
    ///
    /// # Errors
    ///
    /// Fails when the builder closure fails.
    ///
    /// # Example
    ///
    /// ```
    /// use ramify::{Action, Tree, Value};
    ///
    /// let tree = Tree::build(|b| {
    ///     b.mapping("market", Value::map([("volatility", 0.3)]), |b, m| {
    ///         b.node("calm", m.key("volatility").lt(0.5), |b| {
    ///             b.long()?;
    ///             b.short()?;
    ///             Ok(())
    ///         })?;
    ///         Ok(())
    ///     })
    /// })?;
    ///
    /// assert_eq!(tree.evaluate()?, Some(Action::Long));
    /// # Ok::<(), ramify::TreeError>(())
    /// ```
    pub fn build<F>(body: F) -> Result<Tree, TreeError>
    where
        F: FnOnce(&mut TreeBuilder) -> Result<(), TreeError>,
    {
        Tree::build_named("root", body)
    }

    /// Build a tree under a root with the given label.
    ///
    /// # Errors
    ///
    /// Fails when the builder closure fails.
    pub fn build_named<F>(label: &str, body: F) -> Result<Tree, TreeError>
    where
        F: FnOnce(&mut TreeBuilder) -> Result<(), TreeError>,
    {
        let mut builder = TreeBuilder::new(label);
        body(&mut builder)?;
        Ok(builder.finish())
    }

    pub(crate) fn seal(
        nodes: Vec<Node>,
        contexts: Vec<ContextEntry>,
        root: NodeId,
        group_labels: Vec<Arc<str>>,
    ) -> Tree {
        let mut labels: BTreeMap<String, Vec<NodeId>> = BTreeMap::new();
        for (i, node) in nodes.iter().enumerate() {
            labels
                .entry(node.label.clone())
                .or_default()
                .push(NodeId(i));
        }
        Tree {
            nodes,
            contexts,
            root,
            group_labels,
            labels,
        }
    }

    /// Evaluate against the declared context data.
    ///
    /// # Errors
    ///
    /// Fails when any visited expression fails, violates its node's declared
    /// type, or routing reaches a dead end.
    pub fn evaluate(&self) -> Result<Option<Action>, TreeError> {
        self.resolve(&Overrides::new()).map(|r| r.action())
    }

    /// Evaluate with some context data replaced.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`evaluate`](Self::evaluate).
    pub fn evaluate_with(&self, overrides: &Overrides) -> Result<Option<Action>, TreeError> {
        self.resolve(overrides).map(|r| r.action())
    }

    /// Evaluate and return the full [`Resolution`], with the leaf reached
    /// and the path taken.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`evaluate`](Self::evaluate).
    pub fn resolve(&self, overrides: &Overrides) -> Result<Resolution, TreeError> {
        evaluate::resolve(self, overrides)
    }

    /// The delegating root node.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Total number of nodes, consolidation fills included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All node ids in construction order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// The first node carrying the given label, in construction order.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NodeNotFound`] when no node carries the label.
    pub fn find(&self, label: &str) -> Result<NodeId, TreeError> {
        self.labels
            .get(label)
            .and_then(|ids| ids.first())
            .copied()
            .ok_or_else(|| TreeError::NodeNotFound {
                what: format!("label '{label}'"),
            })
    }

    /// Every node carrying the given label, in construction order.
    #[must_use]
    pub fn all_labeled(&self, label: &str) -> &[NodeId] {
        self.labels.get(label).map_or(&[], Vec::as_slice)
    }

    /// The node's label.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NodeNotFound`] for a foreign id.
    pub fn label(&self, id: NodeId) -> Result<&str, TreeError> {
        Ok(&self.get(id)?.label)
    }

    /// The node's kind.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NodeNotFound`] for a foreign id.
    pub fn kind(&self, id: NodeId) -> Result<NodeKind, TreeError> {
        Ok(self.get(id)?.kind)
    }

    /// The node's declared type.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NodeNotFound`] for a foreign id.
    pub fn dtype(&self, id: NodeId) -> Result<DType, TreeError> {
        Ok(self.get(id)?.dtype)
    }

    /// The display form of the node's expression, if it carries one.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NodeNotFound`] for a foreign id.
    pub fn expr_display(&self, id: NodeId) -> Result<Option<&str>, TreeError> {
        Ok(self.get(id)?.expr.as_ref().map(super::expr::Expr::display))
    }

    /// The action the node carries, for action nodes.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NodeNotFound`] for a foreign id.
    pub fn action(&self, id: NodeId) -> Result<Option<Action>, TreeError> {
        Ok(match self.get(id)?.kind {
            NodeKind::Action(a) => Some(a),
            _ => None,
        })
    }

    /// Labels of the groups enclosing the node at construction, innermost
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NodeNotFound`] for a foreign id.
    pub fn groups(&self, id: NodeId) -> Result<Vec<String>, TreeError> {
        Ok(self.get(id)?.groups.iter().map(|g| g.to_string()).collect())
    }

    /// Whether the node was added by consolidation rather than authored.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NodeNotFound`] for a foreign id.
    pub fn autogen(&self, id: NodeId) -> Result<bool, TreeError> {
        Ok(self.get(id)?.autogen)
    }

    /// The node's outgoing edges in attachment order.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NodeNotFound`] for a foreign id.
    pub fn children(&self, id: NodeId) -> Result<&[(Condition, NodeId)], TreeError> {
        Ok(&self.get(id)?.children)
    }

    /// The child on the given edge, if taken.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NodeNotFound`] for a foreign id.
    pub fn child_under(
        &self,
        id: NodeId,
        condition: Condition,
    ) -> Result<Option<NodeId>, TreeError> {
        Ok(self.get(id)?.child_under(condition))
    }

    /// The node's first child in attachment order.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NodeNotFound`] for a foreign id and
    /// [`TreeError::TooFewChildren`] for a childless node.
    pub fn child(&self, id: NodeId) -> Result<NodeId, TreeError> {
        let node = self.get(id)?;
        node.children
            .first()
            .map(|(_, id)| *id)
            .ok_or_else(|| TreeError::TooFewChildren {
                label: node.label.clone(),
            })
    }

    /// A breakpoint's continuation, once bound or extended.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NodeNotFound`] for a foreign id.
    pub fn link_target(&self, id: NodeId) -> Result<Option<NodeId>, TreeError> {
        Ok(self.get(id)?.link)
    }

    /// The node's parent, absent only on roots.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NodeNotFound`] for a foreign id.
    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, TreeError> {
        Ok(self.get(id)?.parent)
    }

    /// Whether evaluation would stop at this node.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NodeNotFound`] for a foreign id.
    pub fn is_leaf(&self, id: NodeId) -> Result<bool, TreeError> {
        Ok(self.get(id)?.is_leaf())
    }

    /// Every leaf in construction order.
    #[must_use]
    pub fn leaves(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_leaf())
            .map(|(i, _)| NodeId(i))
            .collect()
    }

    /// Labels of all closed groups, innermost scopes first.
    #[must_use]
    pub fn group_labels(&self) -> Vec<&str> {
        self.group_labels.iter().map(AsRef::as_ref).collect()
    }

    /// The declared backing data of a named context, if any was given.
    #[must_use]
    pub fn context(&self, name: &str) -> Option<&Value> {
        self.contexts
            .iter()
            .find(|c| &*c.name == name)
            .and_then(|c| c.value.as_ref())
    }

    /// Names of all registered data contexts, in declaration order.
    #[must_use]
    pub fn context_names(&self) -> Vec<&str> {
        self.contexts.iter().map(|c| &*c.name).collect()
    }

    /// Preorder walk of the subtree under `from`, following structural
    /// edges in attachment order. Breakpoint links to nodes owned elsewhere
    /// are not followed; those nodes appear under their own parent.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NodeNotFound`] for a foreign id.
    pub fn walk(&self, from: NodeId) -> Result<Vec<NodeId>, TreeError> {
        self.get(from)?;
        let mut order = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            order.push(id);
            for (_, child) in self.nodes[id.0].children.iter().rev() {
                stack.push(*child);
            }
        }
        Ok(order)
    }

    /// A serializable view of the whole tree.
    #[must_use]
    pub fn snapshot(&self) -> TreeSnapshot {
        TreeSnapshot::capture(self, None)
    }

    /// A serializable view with the nodes visited by `resolution` marked.
    #[must_use]
    pub fn snapshot_with(&self, resolution: &Resolution) -> TreeSnapshot {
        TreeSnapshot::capture(self, Some(resolution))
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn contexts(&self) -> &[ContextEntry] {
        &self.contexts
    }

    fn get(&self, id: NodeId) -> Result<&Node, TreeError> {
        self.nodes.get(id.0).ok_or_else(|| TreeError::NodeNotFound {
            what: format!("node id {}", id.0),
        })
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tree({}, {} nodes, {} groups)",
            self.nodes[self.root.0].label,
            self.nodes.len(),
            self.group_labels.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Expr;

    fn market_tree() -> Tree {
        Tree::build_named("entry", |b| {
            b.mapping(
                "market",
                Value::map([("volatility", 0.3), ("down_prob", 0.2)]),
                |b, m| {
                    b.node("calm", m.key("volatility").lt(0.5), |b| {
                        b.node("rising", m.key("down_prob").lt(0.4), |b| {
                            b.long()?;
                            b.short()?;
                            Ok(())
                        })?;
                        b.hold()?;
                        Ok(())
                    })?;
                    Ok(())
                },
            )
        })
        .unwrap()
    }

    #[test]
    fn build_named_labels_root() {
        let tree = market_tree();
        assert_eq!(tree.label(tree.root()).unwrap(), "entry");
        assert_eq!(tree.kind(tree.root()).unwrap(), NodeKind::Root);
    }

    #[test]
    fn display_summary() {
        let tree = market_tree();
        assert_eq!(tree.to_string(), "Tree(entry, 6 nodes, 1 groups)");
    }

    #[test]
    fn evaluate_routes_to_long() {
        let tree = market_tree();
        assert_eq!(tree.evaluate().unwrap(), Some(Action::Long));
    }

    #[test]
    fn evaluate_with_overrides_flips_branch() {
        let tree = market_tree();
        let ov = Overrides::new().set(
            "market",
            Value::map([("volatility", 0.3), ("down_prob", 0.9)]),
        );
        assert_eq!(tree.evaluate_with(&ov).unwrap(), Some(Action::Short));
    }

    #[test]
    fn resolve_path_excludes_root() {
        let tree = market_tree();
        let resolution = tree.resolve(&Overrides::new()).unwrap();
        let calm = tree.find("calm").unwrap();
        let rising = tree.find("rising").unwrap();
        let long = tree.find("long").unwrap();
        assert_eq!(resolution.path(), &[calm, rising, long]);
        assert!(!resolution.path().contains(&tree.root()));
    }

    #[test]
    fn find_by_label() {
        let tree = market_tree();
        assert!(tree.find("calm").is_ok());
        let err = tree.find("missing").unwrap_err();
        assert_eq!(err.to_string(), "node not found: label 'missing'");
    }

    #[test]
    fn child_accessors() {
        let tree = market_tree();
        let calm = tree.find("calm").unwrap();
        let rising = tree.find("rising").unwrap();
        assert_eq!(tree.child(calm).unwrap(), rising);
        assert_eq!(tree.child_under(calm, Condition::True).unwrap(), Some(rising));
        assert_eq!(tree.parent(rising).unwrap(), Some(calm));
        let long = tree.find("long").unwrap();
        let err = tree.child(long).unwrap_err();
        assert!(matches!(err, TreeError::TooFewChildren { .. }));
    }

    #[test]
    fn leaves_and_is_leaf() {
        let tree = market_tree();
        let long = tree.find("long").unwrap();
        let short = tree.find("short").unwrap();
        let hold = tree.find("hold").unwrap();
        assert!(tree.is_leaf(long).unwrap());
        assert!(!tree.is_leaf(tree.find("calm").unwrap()).unwrap());
        assert_eq!(tree.leaves(), vec![long, short, hold]);
    }

    #[test]
    fn walk_is_preorder_in_attachment_order() {
        let tree = market_tree();
        let order = tree.walk(tree.root()).unwrap();
        let labels: Vec<&str> = order
            .iter()
            .map(|id| tree.label(*id).unwrap())
            .collect();
        assert_eq!(
            labels,
            vec!["entry", "calm", "rising", "long", "short", "hold"]
        );
    }

    #[test]
    fn group_labels_close_innermost_first() {
        let tree = Tree::build(|b| {
            b.group("outer", |b, _| {
                b.group("inner", |b, _| {
                    b.node("gate", Expr::literal(true), |b| {
                        b.long()?;
                        b.short()?;
                        Ok(())
                    })?;
                    Ok(())
                })
            })
        })
        .unwrap();
        assert_eq!(tree.group_labels(), vec!["inner", "outer"]);
        let gate = tree.find("gate").unwrap();
        assert_eq!(
            tree.groups(gate).unwrap(),
            vec!["inner".to_owned(), "outer".to_owned()]
        );
    }

    #[test]
    fn context_accessors() {
        let tree = market_tree();
        assert_eq!(tree.context_names(), vec!["market"]);
        assert_eq!(
            tree.context("market"),
            Some(&Value::map([("volatility", 0.3), ("down_prob", 0.2)]))
        );
        assert_eq!(tree.context("signals"), None);
    }

    #[test]
    fn foreign_id_is_rejected() {
        let tree = market_tree();
        let err = tree.label(NodeId(999)).unwrap_err();
        assert!(matches!(err, TreeError::NodeNotFound { .. }));
    }

    #[test]
    fn expr_display_surfaces_source_paths() {
        let tree = market_tree();
        let calm = tree.find("calm").unwrap();
        assert_eq!(
            tree.expr_display(calm).unwrap(),
            Some("market.volatility < 0.5")
        );
        let long = tree.find("long").unwrap();
        assert_eq!(tree.expr_display(long).unwrap(), None);
    }
}
