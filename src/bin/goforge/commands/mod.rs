//! Command implementations

pub mod build;
pub mod clean;
pub mod completions;
pub mod init;
pub mod tasks;
pub mod toolchain;
