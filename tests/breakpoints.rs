use ramify::{Action, Condition, Expr, Overrides, Tree, Value};

/// Resolve and return the labels along the path.
fn path_labels(tree: &Tree, overrides: &Overrides) -> Vec<String> {
    tree.resolve(overrides)
        .unwrap()
        .path()
        .iter()
        .map(|id| tree.label(*id).unwrap().to_owned())
        .collect()
}

#[test]
fn break_from_group_resumes_at_next_node() {
    let tree = Tree::build_named("entry", |b| {
        b.mapping(
            "market",
            Value::map([("volatility", 0.8), ("down_prob", 0.2)]),
            |b, m| {
                b.node("session", Expr::literal(true), |b| {
                    b.group("risk", |b, risk| {
                        b.node("calm", m.key("volatility").lt(0.5), |b| {
                            b.long()?;
                            b.break_from(risk)?;
                            Ok(())
                        })?;
                        Ok(())
                    })?;
                    // First node after the group closes: the broken path
                    // resumes here.
                    b.node("hedged", m.key("down_prob").lt(0.4), |b| {
                        b.hold()?;
                        b.short()?;
                        Ok(())
                    })?;
                    Ok(())
                })?;
                Ok(())
            },
        )
    })
    .unwrap();

    let bp = tree.find("breakpoint").unwrap();
    let hedged = tree.find("hedged").unwrap();
    assert_eq!(tree.link_target(bp).unwrap(), Some(hedged));
    assert_eq!(tree.parent(bp).unwrap(), Some(tree.find("calm").unwrap()));

    // Stormy market: calm is false, the break jumps to hedged.
    assert_eq!(
        path_labels(&tree, &Overrides::new()),
        vec!["session", "calm", "breakpoint", "hedged", "hold"]
    );
    assert_eq!(tree.evaluate().unwrap(), Some(Action::Hold));

    // Calm market: the breakpoint is never reached.
    let calm = Overrides::new().set(
        "market",
        Value::map([("volatility", 0.2), ("down_prob", 0.2)]),
    );
    assert_eq!(path_labels(&tree, &calm), vec!["session", "calm", "long"]);

    // Stormy and falling: the resumed branch goes the other way.
    let falling = Overrides::new().set(
        "market",
        Value::map([("volatility", 0.8), ("down_prob", 0.9)]),
    );
    assert_eq!(tree.evaluate_with(&falling).unwrap(), Some(Action::Short));
}

#[test]
fn all_pending_breakpoints_bind_to_one_target() {
    let tree = Tree::build(|b| {
        b.mapping(
            "signals",
            Value::map([("fast", 5_i64), ("slow", 0_i64)]),
            |b, m| {
                b.node("session", Expr::literal(true), |b| {
                    b.group("risk", |b, risk| {
                        b.node("fast_entry", m.key("fast").lt(1_i64), |b| {
                            b.long()?;
                            b.break_from(risk)?;
                            Ok(())
                        })?;
                        b.node("slow_entry", m.key("slow").lt(1_i64), |b| {
                            b.short()?;
                            b.break_from(risk)?;
                            Ok(())
                        })?;
                        Ok(())
                    })?;
                    b.node("recovery", m.key("slow").lt(1_i64), |b| {
                        b.hold()?;
                        b.short()?;
                        Ok(())
                    })?;
                    Ok(())
                })?;
                Ok(())
            },
        )
    })
    .unwrap();

    let recovery = tree.find("recovery").unwrap();
    let bps = tree.all_labeled("breakpoint");
    assert_eq!(bps.len(), 2);
    for &bp in bps {
        assert_eq!(tree.link_target(bp).unwrap(), Some(recovery));
    }

    // fast = 5 is not < 1: the first breakpoint routes into recovery.
    assert_eq!(
        path_labels(&tree, &Overrides::new()),
        vec!["session", "fast_entry", "breakpoint", "recovery", "hold"]
    );
}

#[test]
fn binding_waits_for_the_group_to_close() {
    let tree = Tree::build(|b| {
        b.node("session", Expr::literal(true), |b| {
            b.group("outer", |b, outer| {
                b.group("inner", |b, _| {
                    b.node("probe", Expr::literal(false), |b| {
                        b.long()?;
                        b.break_from(outer)?;
                        Ok(())
                    })?;
                    Ok(())
                })?;
                // Inner has closed but outer has not: this node must not
                // take the binding.
                b.node("mid", Expr::literal(true), |b| {
                    b.short()?;
                    b.hold()?;
                    Ok(())
                })?;
                Ok(())
            })?;
            b.node("after", Expr::literal(true), |b| {
                b.hold()?;
                b.short()?;
                Ok(())
            })?;
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();

    let bp = tree.find("breakpoint").unwrap();
    let after = tree.find("after").unwrap();
    let mid = tree.find("mid").unwrap();
    assert_eq!(tree.link_target(bp).unwrap(), Some(after));
    assert_ne!(tree.link_target(bp).unwrap(), Some(mid));

    assert_eq!(
        tree.groups(tree.find("probe").unwrap()).unwrap(),
        vec!["inner".to_owned(), "outer".to_owned()]
    );
    assert_eq!(
        path_labels(&tree, &Overrides::new()),
        vec!["session", "probe", "breakpoint", "after", "hold"]
    );
}

#[test]
fn break_from_closed_group_fails() {
    let mut escaped = None;
    let err = Tree::build(|b| {
        b.group("risk", |_, risk| {
            escaped = Some(risk.clone());
            Ok(())
        })?;
        b.node("gate", Expr::literal(true), |b| {
            b.break_from(escaped.as_ref().unwrap()).map(|_| ())
        })?;
        Ok(())
    })
    .unwrap_err();

    assert_eq!(err.to_string(), "node not found: open group 'risk'");
}

#[test]
fn unbound_breakpoint_fails_only_when_reached() {
    let tree = Tree::build(|b| {
        b.mapping("market", Value::map([("volatility", 0.3)]), |b, m| {
            b.node("calm", m.key("volatility").lt(0.5), |b| {
                b.long()?;
                b.breakpoint()?;
                Ok(())
            })?;
            Ok(())
        })
    })
    .unwrap();

    let bp = tree.find("breakpoint").unwrap();
    assert_eq!(tree.link_target(bp).unwrap(), None);
    assert!(!tree.is_leaf(bp).unwrap());

    // The calm path never touches the dangling breakpoint.
    assert_eq!(tree.evaluate().unwrap(), Some(Action::Long));

    let stormy = Overrides::new().set("market", Value::map([("volatility", 0.9)]));
    let err = tree.evaluate_with(&stormy).unwrap_err();
    assert_eq!(
        err.to_string(),
        "too few children under node 'breakpoint': no child to follow"
    );
}

#[test]
fn extend_attaches_an_owned_continuation() {
    let mut saved = None;
    let tree = Tree::build(|b| {
        b.node("gate", Expr::literal(false), |b| {
            b.long()?;
            saved = Some(b.breakpoint()?);
            Ok(())
        })?;
        let bp = saved.unwrap();
        b.extend(bp, |b| {
            b.node("recovery", Expr::literal(true), |b| {
                b.short()?;
                b.hold()?;
                Ok(())
            })?;
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();

    let bp = tree.find("breakpoint").unwrap();
    let recovery = tree.find("recovery").unwrap();
    assert_eq!(tree.link_target(bp).unwrap(), Some(recovery));
    assert_eq!(tree.child_under(bp, Condition::Auto).unwrap(), Some(recovery));
    assert_eq!(tree.parent(recovery).unwrap(), Some(bp));

    assert_eq!(
        path_labels(&tree, &Overrides::new()),
        vec!["gate", "breakpoint", "recovery", "short"]
    );

    // Owned continuations show up under the breakpoint in the walk.
    let order = tree.walk(tree.root()).unwrap();
    let labels: Vec<&str> = order.iter().map(|id| tree.label(*id).unwrap()).collect();
    assert_eq!(
        labels,
        vec!["root", "gate", "long", "breakpoint", "recovery", "short", "hold"]
    );
}

#[test]
fn extend_is_legal_under_a_full_parent() {
    let mut saved = None;
    let tree = Tree::build(|b| {
        b.node("gate", Expr::literal(false), |b| {
            b.long()?;
            saved = Some(b.breakpoint()?);
            b.hold()?;
            Ok(())
        })?;
        // Every edge of gate is taken; extension still works because it
        // enters the breakpoint without appending anything.
        b.extend(saved.unwrap(), |b| {
            b.short()?;
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();

    assert_eq!(tree.evaluate().unwrap(), Some(Action::Short));
}

#[test]
fn extend_rejects_a_second_continuation() {
    let mut saved = None;
    let err = Tree::build(|b| {
        b.node("gate", Expr::literal(false), |b| {
            b.long()?;
            saved = Some(b.breakpoint()?);
            Ok(())
        })?;
        let bp = saved.unwrap();
        b.extend(bp, |b| {
            b.short()?;
            Ok(())
        })?;
        b.extend(bp, |b| {
            b.hold()?;
            Ok(())
        })?;
        Ok(())
    })
    .unwrap_err();

    assert_eq!(
        err.to_string(),
        "too many children under node 'breakpoint': edge auto is not available"
    );
}

#[test]
fn manual_extension_wins_over_binding() {
    let mut saved = None;
    let mut gate_id = None;
    let tree = Tree::build(|b| {
        b.group("risk", |b, risk| {
            gate_id = Some(b.node("gate", Expr::literal(false), |b| {
                b.long()?;
                saved = Some(b.break_from(risk)?);
                Ok(())
            })?);
            let bp = saved.unwrap();
            b.extend(bp, |b| {
                b.node("manual", Expr::literal(true), |b| {
                    b.short()?;
                    b.hold()?;
                    Ok(())
                })?;
                Ok(())
            })?;
            Ok(())
        })?;
        // The pending breakpoint is already linked; the next node does
        // not steal it.
        b.attach(gate_id.unwrap(), Condition::Else, "later", Expr::literal(true))?;
        Ok(())
    })
    .unwrap();

    let bp = tree.find("breakpoint").unwrap();
    let manual = tree.find("manual").unwrap();
    assert_eq!(tree.link_target(bp).unwrap(), Some(manual));
    assert_eq!(
        path_labels(&tree, &Overrides::new()),
        vec!["gate", "breakpoint", "manual", "short"]
    );
}

#[test]
fn roots_and_breakpoints_never_take_bindings() {
    let mut gate_id = None;
    let tree = Tree::build(|b| {
        b.group("risk", |b, risk| {
            gate_id = Some(b.node("gate", Expr::literal(false), |b| {
                b.long()?;
                b.break_from(risk)?;
                Ok(())
            })?);
            Ok(())
        })?;
        // An embedded root is fully isolated: nothing built inside it
        // sees the awaiting breakpoint.
        b.root("aside", |b| {
            b.node("shadow", Expr::literal(true), |b| {
                b.hold()?;
                b.hold()?;
                Ok(())
            })?;
            Ok(())
        })?;
        b.attach(gate_id.unwrap(), Condition::Else, "catcher", Expr::literal(true))?;
        Ok(())
    })
    .unwrap();

    let bp = tree.find("breakpoint").unwrap();
    let catcher = tree.find("catcher").unwrap();
    assert_eq!(tree.link_target(bp).unwrap(), Some(catcher));

    let resolution = tree.resolve(&Overrides::new()).unwrap();
    assert_eq!(resolution.label(), "catcher");
    assert_eq!(resolution.action(), None);
    assert_eq!(
        path_labels(&tree, &Overrides::new()),
        vec!["gate", "breakpoint", "catcher"]
    );
}
