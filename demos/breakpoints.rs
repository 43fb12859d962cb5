use ramify::{Overrides, Tree, Value};

fn main() {
    // Builder trace events go to stderr, demo output to stdout
    tracing_subscriber::fmt()
        .with_env_filter("ramify=trace")
        .with_writer(std::io::stderr)
        .init();

    // Gates inside the risk group can bail out early. Once the group
    // closes, every break binds to the next node built, so the whole
    // group shares one recovery branch.
    let tree = Tree::build_named("entry", |b| {
        b.mapping(
            "market",
            Value::map([("volatility", 0.8), ("down_prob", 0.2)]),
            |b, m| {
                b.node("session", m.key("volatility").lt(2.0), |b| {
                    b.group("risk", |b, risk| {
                        b.node("calm", m.key("volatility").lt(0.5), |b| {
                            b.node("rising", m.key("down_prob").lt(0.4), |b| {
                                b.long()?;
                                b.break_from(risk)?;
                                Ok(())
                            })?;
                            b.break_from(risk)?;
                            Ok(())
                        })?;
                        Ok(())
                    })?;
                    // Both breaks resume here
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
    .expect("failed to build tree");

    print!("{}", tree.snapshot());
    println!();

    for bp in tree.all_labeled("breakpoint") {
        let target = tree.link_target(*bp).expect("breakpoint ids are valid");
        let label = target
            .map(|id| tree.label(id).expect("link targets are valid").to_owned())
            .unwrap_or_else(|| "unbound".to_owned());
        println!("breakpoint {} resumes at {label}", bp.index());
    }
    println!();

    let scenarios = [
        ("declared (stormy)", Overrides::new()),
        (
            "calm and rising",
            Overrides::new().set(
                "market",
                Value::map([("volatility", 0.2), ("down_prob", 0.1)]),
            ),
        ),
        (
            "calm but falling",
            Overrides::new().set(
                "market",
                Value::map([("volatility", 0.2), ("down_prob", 0.9)]),
            ),
        ),
    ];

    for (name, overrides) in &scenarios {
        let resolution = tree.resolve(overrides).expect("evaluation failed");
        let labels: Vec<&str> = resolution
            .path()
            .iter()
            .map(|id| tree.label(*id).expect("path ids are valid"))
            .collect();
        println!("{name}: {resolution}");
        println!("  {}", labels.join(" -> "));
    }
}
