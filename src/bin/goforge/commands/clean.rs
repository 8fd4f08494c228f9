//! `goforge clean` command

use anyhow::Result;

use crate::cli::{CleanArgs, GlobalOpts};
use goforge::ops::goforge_clean::{clean, CleanOptions};
use goforge::util::shell::Status;

pub fn execute(global: &GlobalOpts, args: CleanArgs) -> Result<()> {
    let shell = global.shell(false);
    let manifest = global.context()?.load_manifest()?;

    let removed = clean(
        &manifest,
        CleanOptions {
            cache_only: args.cache,
        },
    )?;

    for dir in &removed {
        shell.status(Status::Removed, dir.display());
    }
    if removed.is_empty() {
        shell.note("nothing to clean");
    }

    Ok(())
}
