//! Core data structures for goforge.
//!
//! - Target pairs and build modes
//! - Build units and their identities
//! - The `GoForge.toml` manifest

pub mod manifest;
pub mod target;
pub mod unit;

pub use manifest::{find_manifest, Manifest, MANIFEST_NAME};
pub use target::{BuildMode, GoArch, GoOs, TargetPair};
pub use unit::{BuildUnit, CgoConfig, UnitId};
