//! Persisted build cache.
//!
//! One JSON file per build unit under `<cache>/units/`, named after a hash
//! of the unit identity. Each file is replaced atomically, so units never
//! contend for a shared file, and a truncated or corrupt entry only costs
//! a rebuild of that unit.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::builder::errors::BuildError;
use crate::builder::fingerprint::Fingerprint;
use crate::builder::toolchain::ToolchainSpec;
use crate::core::unit::UnitId;
use crate::util::fs::write_atomic;
use crate::util::hash::{sha256_bytes, sha256_file, short};

/// Current on-disk entry format.
pub const CACHE_SCHEMA_VERSION: u32 = 2;

/// Last successful build of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildCacheEntry {
    pub version: u32,
    /// `UnitId` in display form; guards against hash-name collisions.
    pub unit: String,
    pub fingerprint: Fingerprint,
    pub artifact: PathBuf,
    pub artifact_sha256: String,
    /// [`ToolchainSpec::identity`] of the toolchain that built the artifact.
    #[serde(default)]
    pub toolchain: String,
}

impl BuildCacheEntry {
    pub fn new(unit: &UnitId, fingerprint: Fingerprint, artifact: &Path, checksum: String) -> Self {
        BuildCacheEntry {
            version: CACHE_SCHEMA_VERSION,
            unit: unit.to_string(),
            fingerprint,
            artifact: artifact.to_path_buf(),
            artifact_sha256: checksum,
            toolchain: String::new(),
        }
    }

    pub fn with_toolchain(mut self, toolchain: &ToolchainSpec) -> Self {
        self.toolchain = toolchain.identity();
        self
    }

    /// Whether this entry proves `fingerprint` was already built into the
    /// artifact declared at `artifact`, still intact on disk.
    pub fn is_fresh(&self, fingerprint: &Fingerprint, artifact: &Path) -> bool {
        if &self.fingerprint != fingerprint || self.artifact != artifact {
            return false;
        }
        match sha256_file(&self.artifact) {
            Ok(checksum) => checksum == self.artifact_sha256,
            Err(_) => false,
        }
    }

    /// Whether `toolchain` is the one that built the artifact.
    pub fn built_with(&self, toolchain: &ToolchainSpec) -> bool {
        self.toolchain == toolchain.identity()
    }
}

/// Directory-backed store of [`BuildCacheEntry`] values.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        CacheStore {
            dir: cache_dir.into().join("units"),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the entry for `unit`.
    pub fn entry_path(&self, unit: &UnitId) -> PathBuf {
        let digest = sha256_bytes(unit.to_string().as_bytes());
        self.dir.join(format!("{}.json", short(&digest)))
    }

    /// Load the entry for `unit`. Missing, unreadable, corrupt, outdated or
    /// foreign entries all read as `None`.
    pub fn load(&self, unit: &UnitId) -> Option<BuildCacheEntry> {
        let path = self.entry_path(unit);
        let contents = match std::fs::read(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("ignoring unreadable cache entry {}: {}", path.display(), e);
                return None;
            }
        };

        let entry: BuildCacheEntry = match serde_json::from_slice(&contents) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("ignoring corrupt cache entry {}: {}", path.display(), e);
                return None;
            }
        };

        if entry.version != CACHE_SCHEMA_VERSION || entry.unit != unit.to_string() {
            tracing::debug!("ignoring stale cache entry {}", path.display());
            return None;
        }

        Some(entry)
    }

    /// Atomically write the entry for its unit.
    pub fn store(&self, unit: &UnitId, entry: &BuildCacheEntry) -> Result<(), BuildError> {
        let path = self.entry_path(unit);
        let json = serde_json::to_vec_pretty(entry).map_err(|e| BuildError::io(&path, e))?;
        write_atomic(&path, &json).map_err(|e| BuildError::io(&path, e))
    }

    /// Remove the entry for `unit`, if any.
    pub fn remove(&self, unit: &UnitId) -> Result<(), BuildError> {
        let path = self.entry_path(unit);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BuildError::io(&path, e)),
        }
    }
}
