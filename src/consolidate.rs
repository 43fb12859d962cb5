use crate::types::{Action, Condition, DType, Node, NodeId, NodeKind};

/// Final pass before sealing: every boolean node carrying exactly one of its
/// `true`/`false` branches and no `else` gets the missing branch filled with
/// an auto-generated hold action, so partial routing still terminates.
///
/// Everything else is left as authored: childless nodes stay leaves, an
/// `else` branch already catches the vacant side, and unlinked breakpoints
/// are tolerated until evaluation actually reaches one.
pub(crate) fn consolidate(nodes: &mut Vec<Node>) {
    let count = nodes.len();
    for i in 0..count {
        if nodes[i].kind != NodeKind::Plain || nodes[i].dtype != DType::Bool {
            continue;
        }
        let has_true = nodes[i].child_under(Condition::True).is_some();
        let has_false = nodes[i].child_under(Condition::False).is_some();
        let has_else = nodes[i].child_under(Condition::Else).is_some();
        if has_else || has_true == has_false {
            continue;
        }
        let missing = if has_true {
            Condition::False
        } else {
            Condition::True
        };
        tracing::debug!(node = %nodes[i].label, slot = %missing, "filling vacant branch with hold");
        let fill = NodeId(nodes.len());
        let mut hold = Node::new(
            "hold".to_owned(),
            NodeKind::Action(Action::Hold),
            None,
            DType::Bool,
            nodes[i].groups.clone(),
        );
        hold.parent = Some(NodeId(i));
        hold.autogen = true;
        nodes.push(hold);
        nodes[i].children.push((missing, fill));
    }
}
