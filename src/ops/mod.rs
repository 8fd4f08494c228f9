//! High-level operations.
//!
//! This module contains the implementation of goforge commands.

pub mod goforge_build;
pub mod goforge_clean;
pub mod goforge_init;

pub use goforge_build::{
    build, list_tasks, plan, run, select_units, BuildOptions, BuildSession, ShellReporter,
    TaskSummary,
};
pub use goforge_clean::{clean, CleanOptions};
pub use goforge_init::{init_project, InitOptions};
