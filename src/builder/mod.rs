//! Go cross-compilation pipeline.
//!
//! Expands the target matrix into build units, fingerprints their inputs,
//! resolves toolchains and runs `go build`, with a persisted per-unit cache
//! deciding what is up to date.

pub mod adapter;
pub mod cache;
pub mod errors;
pub mod events;
pub mod executor;
pub mod fingerprint;
pub mod graph;
pub mod matrix;
pub mod toolchain;

pub use adapter::{BuildObserver, BuildReport, TaskGraphAdapter, UnitState};
pub use cache::{BuildCacheEntry, CacheStore};
pub use errors::BuildError;
pub use events::BuildEvent;
pub use executor::{BuildResult, BuildStatus, BuildUnitExecutor};
pub use fingerprint::{Fingerprint, InputFingerprinter};
pub use graph::{FailurePolicy, LocalTaskGraph, TaskGraph, TaskOutcome, TaskSpec};
pub use matrix::BuildTargetMatrix;
pub use toolchain::{ToolchainOverrides, ToolchainResolver, ToolchainSpec};
