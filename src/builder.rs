use std::sync::Arc;

use crate::evaluate;
use crate::scope::{Group, ScopeManager};
use crate::types::{
    Action, Condition, ContextEntry, CtxId, DType, Expr, Node, NodeId, NodeKind, Overrides, Tree,
    TreeError, Value,
};

/// Incremental constructor for a [`Tree`], driven through nested closures.
///
/// Obtained from [`Tree::build`] or [`Tree::build_named`]; nodes attach
/// themselves under the innermost enclosing node automatically, taking the
/// first vacant edge their parent offers (`true`, then `false`, then `else`
/// for boolean parents; a single pass-through edge otherwise).
#[derive(Debug)]
pub struct TreeBuilder {
    nodes: Vec<Node>,
    contexts: Vec<ContextEntry>,
    scopes: ScopeManager,
    group_labels: Vec<Arc<str>>,
    root: NodeId,
}

/// Handle to an open mapping context, giving expressions access to its
/// entries by key.
#[derive(Debug, Clone)]
pub struct MappingCtx {
    ctx: CtxId,
    name: Arc<str>,
    group: Group,
}

impl MappingCtx {
    /// An expression reading the named entry. Dots descend into nested maps.
    #[must_use]
    pub fn key(&self, key: &str) -> Expr {
        Expr::source(self.ctx, &self.name).key(key)
    }

    /// An expression reading the whole backing map.
    #[must_use]
    pub fn source(&self) -> Expr {
        Expr::source(self.ctx, &self.name)
    }

    /// The group scope this context opened.
    #[must_use]
    pub fn group(&self) -> &Group {
        &self.group
    }

    /// The context's name, as used by [`Overrides`].
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Handle to an open sequence context, giving expressions access to its
/// items by position.
#[derive(Debug, Clone)]
pub struct SequenceCtx {
    ctx: CtxId,
    name: Arc<str>,
    group: Group,
}

impl SequenceCtx {
    /// An expression reading the item at `index`.
    #[must_use]
    pub fn at(&self, index: usize) -> Expr {
        Expr::source(self.ctx, &self.name).at(index)
    }

    /// An expression reading the whole backing list.
    #[must_use]
    pub fn source(&self) -> Expr {
        Expr::source(self.ctx, &self.name)
    }

    /// The group scope this context opened.
    #[must_use]
    pub fn group(&self) -> &Group {
        &self.group
    }

    /// The context's name, as used by [`Overrides`].
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl TreeBuilder {
    pub(crate) fn new(label: &str) -> TreeBuilder {
        let root = Node::new(
            label.to_owned(),
            NodeKind::Root,
            None,
            DType::Bool,
            Vec::new(),
        );
        TreeBuilder {
            nodes: vec![root],
            contexts: Vec::new(),
            scopes: ScopeManager::new(NodeId(0)),
            group_labels: Vec::new(),
            root: NodeId(0),
        }
    }

    /// Add a labeled decision node under the active node and run `body`
    /// with it active. The node's declared type comes from the expression,
    /// defaulting to bool.
    ///
    /// # Errors
    ///
    /// Fails when the active node has no vacant edge left, or when `body`
    /// fails.
    pub fn node<F>(&mut self, label: &str, expr: Expr, body: F) -> Result<NodeId, TreeError>
    where
        F: FnOnce(&mut TreeBuilder) -> Result<(), TreeError>,
    {
        let dtype = expr.dtype().unwrap_or(DType::Bool);
        let id = self.construct(label.to_owned(), NodeKind::Plain, Some(expr), dtype);
        self.append_auto(id)?;
        self.bind_awaiting(id);
        self.scopes.enter_node(id);
        let result = body(self);
        self.scopes.exit_node();
        result?;
        Ok(id)
    }

    /// Like [`node`](Self::node) with a generated label.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`node`](Self::node).
    pub fn branch<F>(&mut self, expr: Expr, body: F) -> Result<NodeId, TreeError>
    where
        F: FnOnce(&mut TreeBuilder) -> Result<(), TreeError>,
    {
        let label = format!("node{}", self.nodes.len());
        self.node(&label, expr, body)
    }

    /// Conditionally constructed branch. With inspection on (the default)
    /// this is [`branch`](Self::branch); with inspection off the expression
    /// is evaluated against the registered context data right away, and a
    /// falsy result skips `body` entirely, returning `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Fails when the eager evaluation fails, when no edge is vacant, or
    /// when `body` fails.
    pub fn when<F>(&mut self, expr: Expr, body: F) -> Result<Option<NodeId>, TreeError>
    where
        F: FnOnce(&mut TreeBuilder) -> Result<(), TreeError>,
    {
        if !self.scopes.inspection() {
            let value = evaluate::eval_expr(&expr, &self.contexts, &Overrides::new())?;
            if !value.truthy() {
                return Ok(None);
            }
        }
        self.branch(expr, body).map(Some)
    }

    /// Add a terminal action node under the active node.
    ///
    /// # Errors
    ///
    /// Fails when the active node has no vacant edge left.
    pub fn action(&mut self, action: Action) -> Result<NodeId, TreeError> {
        let id = self.construct(
            action.to_string(),
            NodeKind::Action(action),
            None,
            DType::Bool,
        );
        self.append_auto(id)?;
        self.bind_awaiting(id);
        Ok(id)
    }

    /// Shorthand for [`action`](Self::action) with [`Action::Hold`].
    ///
    /// # Errors
    ///
    /// Fails when the active node has no vacant edge left.
    pub fn hold(&mut self) -> Result<NodeId, TreeError> {
        self.action(Action::Hold)
    }

    /// Shorthand for [`action`](Self::action) with [`Action::Long`].
    ///
    /// # Errors
    ///
    /// Fails when the active node has no vacant edge left.
    pub fn long(&mut self) -> Result<NodeId, TreeError> {
        self.action(Action::Long)
    }

    /// Shorthand for [`action`](Self::action) with [`Action::Short`].
    ///
    /// # Errors
    ///
    /// Fails when the active node has no vacant edge left.
    pub fn short(&mut self) -> Result<NodeId, TreeError> {
        self.action(Action::Short)
    }

    /// Open a named group scope for the duration of `body`. Groups leave
    /// the node structure untouched; they label the nodes built inside and
    /// collect the breakpoints broken from them.
    ///
    /// # Errors
    ///
    /// Fails when `body` fails.
    pub fn group<F>(&mut self, name: &str, body: F) -> Result<(), TreeError>
    where
        F: FnOnce(&mut TreeBuilder, &Group) -> Result<(), TreeError>,
    {
        let handle = self.scopes.open_group(Arc::from(name), None);
        let result = body(self, &handle);
        self.finish_group();
        result
    }

    /// Open a group scope backed by mapping data. Keys resolve through
    /// [`MappingCtx::key`] or, implicitly innermost, [`key`](Self::key).
    ///
    /// # Errors
    ///
    /// Fails when `body` fails.
    pub fn mapping<F>(
        &mut self,
        name: &str,
        data: impl Into<Value>,
        body: F,
    ) -> Result<(), TreeError>
    where
        F: FnOnce(&mut TreeBuilder, &MappingCtx) -> Result<(), TreeError>,
    {
        self.mapping_inner(name, Some(data.into()), body)
    }

    /// Open a mapping context without backing data. Every evaluation must
    /// then supply the data through [`Overrides`].
    ///
    /// # Errors
    ///
    /// Fails when `body` fails.
    pub fn mapping_deferred<F>(&mut self, name: &str, body: F) -> Result<(), TreeError>
    where
        F: FnOnce(&mut TreeBuilder, &MappingCtx) -> Result<(), TreeError>,
    {
        self.mapping_inner(name, None, body)
    }

    fn mapping_inner<F>(
        &mut self,
        name: &str,
        value: Option<Value>,
        body: F,
    ) -> Result<(), TreeError>
    where
        F: FnOnce(&mut TreeBuilder, &MappingCtx) -> Result<(), TreeError>,
    {
        let name: Arc<str> = Arc::from(name);
        let ctx = CtxId(self.contexts.len());
        self.contexts.push(ContextEntry {
            name: Arc::clone(&name),
            value,
        });
        let group = self.scopes.open_group(Arc::clone(&name), Some(ctx));
        let handle = MappingCtx { ctx, name, group };
        let result = body(self, &handle);
        self.finish_group();
        result
    }

    /// Open a group scope backed by a list of items.
    ///
    /// # Errors
    ///
    /// Fails when `body` fails.
    pub fn sequence<I, F>(&mut self, name: &str, items: I, body: F) -> Result<(), TreeError>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
        F: FnOnce(&mut TreeBuilder, &SequenceCtx) -> Result<(), TreeError>,
    {
        let name: Arc<str> = Arc::from(name);
        let ctx = CtxId(self.contexts.len());
        self.contexts.push(ContextEntry {
            name: Arc::clone(&name),
            value: Some(Value::list(items)),
        });
        let group = self.scopes.open_group(Arc::clone(&name), Some(ctx));
        let handle = SequenceCtx { ctx, name, group };
        let result = body(self, &handle);
        self.finish_group();
        result
    }

    /// An expression reading the named entry of the innermost enclosing
    /// data context.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::ContextsNotFound`] when no enclosing group
    /// carries data.
    pub fn key(&self, name: &str) -> Result<Expr, TreeError> {
        match self.scopes.innermost_ctx() {
            Some(ctx) => {
                let entry = &self.contexts[ctx.0];
                Ok(Expr::source(ctx, &entry.name).key(name))
            }
            None => Err(TreeError::ContextsNotFound {
                key: name.to_owned(),
            }),
        }
    }

    /// Break out of `group`: a breakpoint node takes the vacant edge here,
    /// and once the group closes it binds to the next plain or action node
    /// constructed, resuming evaluation there.
    ///
    /// # Errors
    ///
    /// Fails when the active node has no vacant edge left, or when `group`
    /// has already closed.
    pub fn break_from(&mut self, group: &Group) -> Result<NodeId, TreeError> {
        let id = self.construct_breakpoint()?;
        if !self.scopes.register_pending(group.token, id) {
            return Err(TreeError::NodeNotFound {
                what: format!("open group '{}'", group.name()),
            });
        }
        Ok(id)
    }

    /// A breakpoint with no group to bind it; the continuation must be
    /// supplied through [`extend`](Self::extend).
    ///
    /// # Errors
    ///
    /// Fails when the active node has no vacant edge left.
    pub fn breakpoint(&mut self) -> Result<NodeId, TreeError> {
        self.construct_breakpoint()
    }

    fn construct_breakpoint(&mut self) -> Result<NodeId, TreeError> {
        // Breakpoints neither bind awaiting breakpoints nor become active.
        let id = self.construct(
            "breakpoint".to_owned(),
            NodeKind::Breakpoint,
            None,
            DType::Bool,
        );
        self.append_auto(id)?;
        Ok(id)
    }

    /// Continue construction under a breakpoint. Entry appends nothing, so
    /// this is legal even where every edge is taken; the first node built
    /// inside becomes the breakpoint's continuation.
    ///
    /// # Errors
    ///
    /// Fails when `bp` is not a breakpoint of this builder, or when `body`
    /// fails.
    pub fn extend<F>(&mut self, bp: NodeId, body: F) -> Result<(), TreeError>
    where
        F: FnOnce(&mut TreeBuilder) -> Result<(), TreeError>,
    {
        match self.nodes.get(bp.0) {
            Some(node) if node.kind == NodeKind::Breakpoint => {}
            Some(node) => {
                return Err(TreeError::NodeNotFound {
                    what: format!("breakpoint at node '{}'", node.label),
                })
            }
            None => {
                return Err(TreeError::NodeNotFound {
                    what: format!("node id {}", bp.0),
                })
            }
        }
        self.scopes.enter_node(bp);
        let result = body(self);
        self.scopes.exit_node();
        result
    }

    /// Build a detached subtree under a fresh root, fully isolated from the
    /// enclosing scopes, and restore them afterwards. The subtree shares the
    /// arena and is reachable through [`Tree::walk`] from the returned id.
    ///
    /// # Errors
    ///
    /// Fails when `body` fails.
    pub fn root<F>(&mut self, label: &str, body: F) -> Result<NodeId, TreeError>
    where
        F: FnOnce(&mut TreeBuilder) -> Result<(), TreeError>,
    {
        let id = self.construct(label.to_owned(), NodeKind::Root, None, DType::Bool);
        let shelved = self.scopes.shelve(id);
        let result = body(self);
        self.scopes.restore(shelved);
        result?;
        Ok(id)
    }

    /// Attach a decision node on an explicit edge of an explicit parent,
    /// bypassing the active-node stack.
    ///
    /// # Errors
    ///
    /// Fails when the parent does not exist, forbids the edge, or already
    /// has it taken.
    pub fn attach(
        &mut self,
        parent: NodeId,
        condition: Condition,
        label: &str,
        expr: Expr,
    ) -> Result<NodeId, TreeError> {
        let stored = self.check_explicit(parent, condition)?;
        let dtype = expr.dtype().unwrap_or(DType::Bool);
        let id = self.construct(label.to_owned(), NodeKind::Plain, Some(expr), dtype);
        self.attach_edge(parent, stored, id);
        self.bind_awaiting(id);
        Ok(id)
    }

    /// Attach a terminal action node on an explicit edge of an explicit
    /// parent.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`attach`](Self::attach).
    pub fn attach_action(
        &mut self,
        parent: NodeId,
        condition: Condition,
        action: Action,
    ) -> Result<NodeId, TreeError> {
        let stored = self.check_explicit(parent, condition)?;
        let id = self.construct(
            action.to_string(),
            NodeKind::Action(action),
            None,
            DType::Bool,
        );
        self.attach_edge(parent, stored, id);
        self.bind_awaiting(id);
        Ok(id)
    }

    /// Turn eager gating of [`when`](Self::when) on or off. Inspection is
    /// on by default: every branch is constructed regardless of data.
    pub fn set_inspection(&mut self, on: bool) {
        self.scopes.set_inspection(on);
    }

    /// Whether [`when`](Self::when) currently constructs unconditionally.
    #[must_use]
    pub fn inspection(&self) -> bool {
        self.scopes.inspection()
    }

    /// The node new children currently attach under.
    #[must_use]
    pub fn active_node(&self) -> NodeId {
        self.scopes.active()
    }

    fn construct(
        &mut self,
        label: String,
        kind: NodeKind,
        expr: Option<Expr>,
        dtype: DType,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        let groups = self.scopes.group_names();
        self.nodes.push(Node::new(label, kind, expr, dtype, groups));
        id
    }

    /// Link every breakpoint whose group has closed to `target`, skipping
    /// any already extended by hand.
    fn bind_awaiting(&mut self, target: NodeId) {
        if !self.scopes.has_awaiting() {
            return;
        }
        for bp in self.scopes.take_awaiting() {
            if self.nodes[bp.0].link.is_none() {
                tracing::trace!(
                    breakpoint = bp.0,
                    to = %self.nodes[target.0].label,
                    "binding breakpoint"
                );
                self.nodes[bp.0].link = Some(target);
            }
        }
    }

    fn append_auto(&mut self, child: NodeId) -> Result<(), TreeError> {
        let parent = self.scopes.active();
        let condition = self.vacant_slot(parent)?;
        self.attach_edge(parent, condition, child);
        Ok(())
    }

    /// The first edge the parent still offers, in slot order.
    fn vacant_slot(&self, parent: NodeId) -> Result<Condition, TreeError> {
        let p = &self.nodes[parent.0];
        match p.kind {
            NodeKind::Root => {
                if p.children.is_empty() {
                    Ok(Condition::Unconditional)
                } else {
                    Err(TreeError::TooManyChildren {
                        label: p.label.clone(),
                        condition: Condition::Unconditional,
                    })
                }
            }
            NodeKind::Action(_) => Err(TreeError::TooManyChildren {
                label: p.label.clone(),
                condition: Condition::Auto,
            }),
            NodeKind::Breakpoint => {
                if p.link.is_none() {
                    Ok(Condition::Auto)
                } else {
                    Err(TreeError::TooManyChildren {
                        label: p.label.clone(),
                        condition: Condition::Auto,
                    })
                }
            }
            NodeKind::Plain => {
                if p.dtype == DType::Bool {
                    for slot in [Condition::True, Condition::False, Condition::Else] {
                        if p.child_under(slot).is_none() {
                            return Ok(slot);
                        }
                    }
                    Err(TreeError::TooManyChildren {
                        label: p.label.clone(),
                        condition: Condition::Else,
                    })
                } else if p.child_under(Condition::Auto).is_none() {
                    Ok(Condition::Auto)
                } else {
                    Err(TreeError::TooManyChildren {
                        label: p.label.clone(),
                        condition: Condition::Auto,
                    })
                }
            }
        }
    }

    /// Validate an explicitly requested edge against the parent's kind,
    /// returning the condition actually stored.
    fn check_explicit(
        &self,
        parent: NodeId,
        condition: Condition,
    ) -> Result<Condition, TreeError> {
        let p = self
            .nodes
            .get(parent.0)
            .ok_or_else(|| TreeError::NodeNotFound {
                what: format!("node id {}", parent.0),
            })?;
        let label = p.label.clone();
        match p.kind {
            NodeKind::Root => match condition {
                // A root stores its child unconditioned either way.
                Condition::Unconditional | Condition::Auto => {
                    if p.children.is_empty() {
                        Ok(Condition::Unconditional)
                    } else {
                        Err(TreeError::TooManyChildren {
                            label,
                            condition: Condition::Unconditional,
                        })
                    }
                }
                other => Err(TreeError::EdgeValue {
                    label,
                    condition: other,
                }),
            },
            NodeKind::Action(_) => Err(TreeError::TooManyChildren { label, condition }),
            NodeKind::Breakpoint => match condition {
                Condition::Auto => {
                    if p.link.is_none() {
                        Ok(Condition::Auto)
                    } else {
                        Err(TreeError::TooManyChildren {
                            label,
                            condition: Condition::Auto,
                        })
                    }
                }
                other => Err(TreeError::EdgeValue {
                    label,
                    condition: other,
                }),
            },
            NodeKind::Plain => {
                if p.dtype == DType::Bool {
                    if condition.is_branch() {
                        if p.child_under(condition).is_none() {
                            Ok(condition)
                        } else {
                            Err(TreeError::TooManyChildren { label, condition })
                        }
                    } else {
                        Err(TreeError::EdgeValue { label, condition })
                    }
                } else if condition == Condition::Auto {
                    if p.child_under(Condition::Auto).is_none() {
                        Ok(Condition::Auto)
                    } else {
                        Err(TreeError::TooManyChildren { label, condition })
                    }
                } else {
                    Err(TreeError::EdgeValue { label, condition })
                }
            }
        }
    }

    fn attach_edge(&mut self, parent: NodeId, condition: Condition, child: NodeId) {
        self.nodes[parent.0].children.push((condition, child));
        self.nodes[child.0].parent = Some(parent);
        if self.nodes[parent.0].kind == NodeKind::Breakpoint {
            self.nodes[parent.0].link = Some(child);
        }
    }

    fn finish_group(&mut self) {
        if let Some(frame) = self.scopes.close_group() {
            if !frame.pending.is_empty() {
                tracing::trace!(
                    group = %frame.name,
                    pending = frame.pending.len(),
                    "group closed with breakpoints awaiting a target"
                );
            }
            self.group_labels.push(frame.name);
            self.scopes.push_awaiting(frame.pending);
        }
    }

    pub(crate) fn finish(mut self) -> Tree {
        crate::consolidate::consolidate(&mut self.nodes);
        Tree::seal(self.nodes, self.contexts, self.root, self.group_labels)
    }
}
