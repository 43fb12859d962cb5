use std::sync::Arc;

use crate::types::{CtxId, NodeId};

/// Handle to an open group scope. Needed to register a breakpoint against
/// the group with [`TreeBuilder::break_from`](crate::TreeBuilder::break_from).
#[derive(Debug, Clone)]
pub struct Group {
    pub(crate) name: Arc<str>,
    pub(crate) token: usize,
}

impl Group {
    /// The group's label.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One open group scope. `pending` collects breakpoints declared inside;
/// they only start looking for a continuation once the group closes.
#[derive(Debug)]
pub(crate) struct GroupFrame {
    pub(crate) name: Arc<str>,
    pub(crate) token: usize,
    pub(crate) ctx: Option<CtxId>,
    pub(crate) pending: Vec<NodeId>,
}

/// Scope state that gets swapped out wholesale when an embedded root opens,
/// so nothing inside it can see or touch the enclosing scopes.
#[derive(Debug)]
pub(crate) struct Shelved {
    actives: Vec<NodeId>,
    frames: Vec<GroupFrame>,
    awaiting: Vec<NodeId>,
}

/// Tracks where in the tree construction currently is: the stack of active
/// nodes, the open group scopes, and breakpoints waiting for a continuation.
#[derive(Debug)]
pub(crate) struct ScopeManager {
    /// Active node stack; the first entry is the current root.
    actives: Vec<NodeId>,
    frames: Vec<GroupFrame>,
    /// Breakpoints whose group has closed and which bind to the next
    /// plain or action node constructed.
    awaiting: Vec<NodeId>,
    inspection: bool,
    next_token: usize,
}

impl ScopeManager {
    pub(crate) fn new(root: NodeId) -> ScopeManager {
        ScopeManager {
            actives: vec![root],
            frames: Vec::new(),
            awaiting: Vec::new(),
            // Construction always happens under a root, where full
            // structure is wanted regardless of what data would say.
            inspection: true,
            next_token: 0,
        }
    }

    pub(crate) fn active(&self) -> NodeId {
        // The stack is never empty: the root goes in at construction and
        // only `shelve` may replace it, with another root.
        self.actives[self.actives.len() - 1]
    }

    pub(crate) fn enter_node(&mut self, id: NodeId) {
        self.actives.push(id);
    }

    pub(crate) fn exit_node(&mut self) {
        if self.actives.len() > 1 {
            self.actives.pop();
        }
    }

    pub(crate) fn open_group(&mut self, name: Arc<str>, ctx: Option<CtxId>) -> Group {
        let token = self.next_token;
        self.next_token += 1;
        self.frames.push(GroupFrame {
            name: Arc::clone(&name),
            token,
            ctx,
            pending: Vec::new(),
        });
        Group { name, token }
    }

    pub(crate) fn close_group(&mut self) -> Option<GroupFrame> {
        self.frames.pop()
    }

    /// The innermost open group carrying a data context.
    pub(crate) fn innermost_ctx(&self) -> Option<CtxId> {
        self.frames.iter().rev().find_map(|f| f.ctx)
    }

    /// Labels of all open groups, innermost first.
    pub(crate) fn group_names(&self) -> Vec<Arc<str>> {
        self.frames.iter().rev().map(|f| Arc::clone(&f.name)).collect()
    }

    /// Register a breakpoint with the open group the handle refers to.
    /// Fails when that group has already closed.
    pub(crate) fn register_pending(&mut self, token: usize, bp: NodeId) -> bool {
        match self.frames.iter_mut().find(|f| f.token == token) {
            Some(frame) => {
                frame.pending.push(bp);
                true
            }
            None => false,
        }
    }

    pub(crate) fn push_awaiting(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        self.awaiting.extend(ids);
    }

    pub(crate) fn take_awaiting(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.awaiting)
    }

    pub(crate) fn has_awaiting(&self) -> bool {
        !self.awaiting.is_empty()
    }

    pub(crate) fn inspection(&self) -> bool {
        self.inspection
    }

    pub(crate) fn set_inspection(&mut self, on: bool) {
        self.inspection = on;
    }

    /// Swap in a fresh scope rooted at `root`, returning the current one.
    pub(crate) fn shelve(&mut self, root: NodeId) -> Shelved {
        Shelved {
            actives: std::mem::replace(&mut self.actives, vec![root]),
            frames: std::mem::take(&mut self.frames),
            awaiting: std::mem::take(&mut self.awaiting),
        }
    }

    pub(crate) fn restore(&mut self, shelved: Shelved) {
        self.actives = shelved.actives;
        self.frames = shelved.frames;
        self.awaiting = shelved.awaiting;
    }
}
