//! `goforge init` command

use std::path::PathBuf;

use anyhow::Result;

use crate::cli::{GlobalOpts, InitArgs};
use goforge::ops::goforge_init::{init_project, InitOptions};
use goforge::util::shell::Status;

pub fn execute(global: &GlobalOpts, args: InitArgs) -> Result<()> {
    let shell = global.shell(false);
    let path = args.path.unwrap_or_else(|| PathBuf::from("."));

    let opts = InitOptions {
        module_dir: args.module_dir,
        module_path: args.module_path,
    };
    let manifest = init_project(&path, &opts)?;

    shell.status(Status::Created, manifest.display());
    Ok(())
}
