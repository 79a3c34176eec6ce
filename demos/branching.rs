use camino::Utf8PathBuf;
use wdlflow::{Component, EmbeddedBody, Manager, Settings, WdlType, Workflow};

fn main() -> anyhow::Result<()> {
    #[cfg(feature = "logging")]
    wdlflow::init_logging();

    let mut manager = Manager::with_settings(Settings::default().workflow_name("branching"));

    let classify = manager
        .task("classify")
        .outputs([WdlType::Int, WdlType::Condition])
        .body(
            r#"
def classify():
    value = 7
    return value, "odd" if value % 2 else "even"
"#,
        )
        .register()?;

    let odd = manager
        .task("odd")
        .input(WdlType::Int)
        .output(WdlType::Int)
        .body("def odd(x):\n    return 3 * x + 1\n")
        .register()?;

    let even = manager
        .task("even")
        .input(WdlType::Int)
        .output(WdlType::Int)
        .body("def even(x):\n    return x // 2\n")
        .register()?;

    let report = manager
        .task("report")
        .input(WdlType::Int)
        .body("def report(x):\n    print(x)\n")
        .register()?;

    manager.add_workflow(&Workflow::new(classify).branch(Component::tasks([odd, even])))?;
    manager.add_workflow(&Workflow::new(odd).forward(report))?;
    manager.add_workflow(&Workflow::new(even).forward(report))?;

    println!("{}", manager.blueprint());

    let translation = manager.translate(&EmbeddedBody)?;
    println!("{}", translation.document);

    let dir = Utf8PathBuf::try_from(std::env::temp_dir())?.join("wdlflow-branching");
    for path in translation.write(&dir)? {
        println!("wrote {path}");
    }

    Ok(())
}
