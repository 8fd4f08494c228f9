//! `goforge tasks` command

use anyhow::Result;

use crate::cli::{GlobalOpts, TasksArgs};
use goforge::ops::goforge_build::{list_tasks, BuildOptions};

pub fn execute(global: &GlobalOpts, args: TasksArgs) -> Result<()> {
    let ctx = global.context()?;
    let opts = BuildOptions {
        variants: args.selection.variants,
        targets: args.selection.targets,
        ..BuildOptions::default()
    };

    for task in list_tasks(&ctx, &opts)? {
        println!("{} - {}", task.name, task.description);
        for output in &task.outputs {
            println!("    output: {}", output.display());
        }
        if global.verbose && !task.depends_on.is_empty() {
            println!("    depends on: {}", task.depends_on.join(", "));
        }
    }

    Ok(())
}
