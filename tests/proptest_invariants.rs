
use proptest::prelude::*;
use ramify::{Action, Condition, DType, NodeId, NodeKind, Tree};
use strategies::{arb_market, arb_tree};

// ---------------------------------------------------------------------------
// Invariant 1: Determinism
//
// The same tree + overrides must always produce the same resolution, and
// rebuilding the same configuration must not change it.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn determinism_repeated(gen in arb_tree(), market in arb_market()) {
        let tree = gen.build();
        let ov = market.overrides();
        let first = tree.resolve(&ov).unwrap();
        for _ in 0..5 {
            let again = tree.resolve(&ov).unwrap();
            prop_assert_eq!(&first, &again, "determinism violated on repeated evaluation");
        }
    }

    #[test]
    fn determinism_rebuild(gen in arb_tree(), market in arb_market()) {
        let ov = market.overrides();
        let first = gen.build().resolve(&ov).unwrap();
        let second = gen.build().resolve(&ov).unwrap();
        prop_assert_eq!(first, second, "determinism violated across rebuild");
    }
}

// ---------------------------------------------------------------------------
// Invariant 2: Routing agrees with the reference model
//
// The engine's action must match an independent evaluation of the generated
// configuration, including the rule that a missing false branch holds.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn routing_matches_reference(gen in arb_tree(), market in arb_market()) {
        let tree = gen.build();
        let got = tree.evaluate_with(&market.overrides()).unwrap();
        let want = gen.predict(&market);
        prop_assert_eq!(got, want, "engine disagrees with reference model");
    }

    #[test]
    fn evaluate_agrees_with_resolve(gen in arb_tree(), market in arb_market()) {
        let tree = gen.build();
        let ov = market.overrides();
        let simple = tree.evaluate_with(&ov).unwrap();
        let resolution = tree.resolve(&ov).unwrap();
        prop_assert_eq!(simple, resolution.action(), "evaluate and resolve disagree");
    }
}

// ---------------------------------------------------------------------------
// Invariant 3: Path validity
//
// The resolved path starts at the root's child, follows parent-to-child
// edges, never revisits a node, and ends at the reported leaf.
// ---------------------------------------------------------------------------

fn is_edge(tree: &Tree, from: NodeId, to: NodeId) -> bool {
    let structural = tree
        .children(from)
        .map(|children| children.iter().any(|(_, id)| *id == to))
        .unwrap_or(false);
    structural || matches!(tree.link_target(from), Ok(Some(id)) if id == to)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn path_is_wellformed(gen in arb_tree(), market in arb_market()) {
        let tree = gen.build();
        let resolution = tree.resolve(&market.overrides()).unwrap();
        let path = resolution.path();

        prop_assert!(!path.is_empty());
        prop_assert!(!path.contains(&tree.root()));
        prop_assert_eq!(tree.child(tree.root()).unwrap(), path[0]);
        prop_assert_eq!(*path.last().unwrap(), resolution.leaf());
        prop_assert!(tree.is_leaf(resolution.leaf()).unwrap());

        for pair in path.windows(2) {
            prop_assert!(
                is_edge(&tree, pair[0], pair[1]),
                "path step {:?} -> {:?} is not an edge",
                pair[0],
                pair[1],
            );
            // Edges always point at later nodes.
            prop_assert!(pair[0] < pair[1], "path went backwards");
        }
    }
}

// ---------------------------------------------------------------------------
// Invariant 4: Consolidation completeness
//
// After building, no boolean decision node is left with exactly one of its
// true/false edges and no else edge, and every generated fill is a hold.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn consolidation_leaves_no_half_gates(gen in arb_tree()) {
        let tree = gen.build();
        for id in tree.node_ids() {
            if tree.kind(id).unwrap() != NodeKind::Plain
                || tree.dtype(id).unwrap() != DType::Bool
            {
                continue;
            }
            let has_true = tree.child_under(id, Condition::True).unwrap().is_some();
            let has_false = tree.child_under(id, Condition::False).unwrap().is_some();
            let has_else = tree.child_under(id, Condition::Else).unwrap().is_some();
            prop_assert!(
                !(has_true != has_false && !has_else),
                "node '{}' kept a half-filled gate",
                tree.label(id).unwrap(),
            );
        }
    }

    #[test]
    fn fills_are_hold_actions(gen in arb_tree()) {
        let tree = gen.build();
        for id in tree.node_ids() {
            if tree.autogen(id).unwrap() {
                prop_assert_eq!(tree.action(id).unwrap(), Some(Action::Hold));
                prop_assert!(tree.is_leaf(id).unwrap());
            }
        }
    }
}
