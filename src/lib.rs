//! goforge - cross-compiles Go modules for a matrix of targets
//!
//! This crate provides the library behind the `goforge` CLI: target matrix
//! expansion, toolchain resolution, content fingerprinting, supervised
//! `go build` execution and task graph integration.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

/// Fake `go` toolchain and fixture helpers for unit tests.
#[cfg(test)]
pub mod test_support;

pub use builder::{BuildError, BuildReport, TaskGraphAdapter};
pub use core::{BuildUnit, Manifest, TargetPair};
pub use util::context::GlobalContext;
