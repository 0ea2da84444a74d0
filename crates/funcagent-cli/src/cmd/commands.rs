use crate::output::{print_json, print_table};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    let agent = super::build_agent(&config)?;

    if json {
        return print_json(&agent.commands());
    }
    let rows = agent
        .commands()
        .iter()
        .map(|c| vec![c.invocation.clone(), c.description.clone()])
        .collect();
    print_table(&["COMMAND", "DESCRIPTION"], rows);
    Ok(())
}
