use ramify::{Overrides, Tree, Value};

fn main() {
    // A small entry model: calm markets chase momentum, stormy markets
    // only short from a senior tier.
    let tree = Tree::build_named("entry", |b| {
        b.mapping(
            "market",
            Value::map([
                ("volatility", Value::from(0.3)),
                ("down_prob", Value::from(0.2)),
                ("tier", Value::from(2_i64)),
            ]),
            |b, m| {
                b.node("calm", m.key("volatility").lt(0.5), |b| {
                    b.node("rising", m.key("down_prob").lt(0.4), |b| {
                        b.long()?;
                        b.short()?;
                        Ok(())
                    })?;
                    b.node("senior", m.key("tier").gte(3_i64), |b| {
                        b.short()?;
                        b.hold()?;
                        Ok(())
                    })?;
                    Ok(())
                })?;
                Ok(())
            },
        )
    })
    .expect("failed to build tree");

    println!("{tree}");
    println!();
    print!("{}", tree.snapshot());
    println!();

    // Evaluate against the data declared at build time
    match tree.evaluate().expect("evaluation failed") {
        Some(action) => println!("Declared data: {action}"),
        None => println!("Declared data: no action"),
    }

    // A live feed replaces the whole context by name
    let stormy = Overrides::new().set(
        "market",
        Value::map([
            ("volatility", Value::from(0.8)),
            ("down_prob", Value::from(0.6)),
            ("tier", Value::from(4_i64)),
        ]),
    );
    let resolution = tree.resolve(&stormy).expect("evaluation failed");
    println!("Stormy override: {resolution}");
    for id in resolution.path() {
        let label = tree.label(*id).expect("path ids are valid");
        println!("  visited {label}");
    }

    // Render the tree with the resolved path marked
    println!();
    print!("{}", tree.snapshot_with(&resolution));
}
