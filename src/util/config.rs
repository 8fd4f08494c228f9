//! Layered configuration.
//!
//! Settings come from three layers, highest precedence first:
//! 1. Command-line flags
//! 2. The project manifest (`GoForge.toml`)
//! 3. Global config (`~/.goforge/config.toml`)
//!
//! Each layer is a [`Config`]; absent values fall through to the layer below.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::toolchain::ToolchainOverrides;
use crate::core::manifest::Manifest;

/// One configuration layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub build: BuildConfig,
    pub toolchain: ToolchainConfig,
}

/// Build scheduling settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BuildConfig {
    /// Parallel units (None = one per CPU)
    pub jobs: Option<usize>,

    /// Per-unit timeout in seconds (None or 0 = no timeout)
    pub timeout: Option<u64>,

    /// Stop scheduling after the first failed unit
    pub fail_fast: Option<bool>,
}

/// Toolchain locations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Path to the `go` binary
    pub go: Option<PathBuf>,

    /// Path to the Android NDK
    pub ndk: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if the file doesn't
    /// exist or can't be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// The layer contributed by a project manifest. Relative toolchain
    /// paths are resolved against the manifest directory.
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let absolute = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                manifest.root.join(p)
            }
        };

        Config {
            build: BuildConfig {
                jobs: manifest.build.jobs,
                timeout: manifest.build.timeout,
                fail_fast: manifest.build.fail_fast,
            },
            toolchain: ToolchainConfig {
                go: manifest.toolchain.go.as_ref().map(absolute),
                ndk: manifest.toolchain.ndk.as_ref().map(absolute),
            },
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.build.jobs.is_some() {
            self.build.jobs = other.build.jobs;
        }
        if other.build.timeout.is_some() {
            self.build.timeout = other.build.timeout;
        }
        if other.build.fail_fast.is_some() {
            self.build.fail_fast = other.build.fail_fast;
        }

        if other.toolchain.go.is_some() {
            self.toolchain.go = other.toolchain.go;
        }
        if other.toolchain.ndk.is_some() {
            self.toolchain.ndk = other.toolchain.ndk;
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.build
            .timeout
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn fail_fast(&self) -> bool {
        self.build.fail_fast.unwrap_or(false)
    }

    pub fn toolchain_overrides(&self) -> ToolchainOverrides {
        ToolchainOverrides {
            go: self.toolchain.go.clone(),
            ndk: self.toolchain.ndk.clone(),
        }
    }
}

/// Merge the global config file and a project manifest.
pub fn load_config(global_path: Option<&Path>, manifest: &Manifest) -> Config {
    let mut config = Config::default();

    if let Some(path) = global_path {
        config.merge(Config::load_or_default(path));
    }

    config.merge(Config::from_manifest(manifest));
    config
}

/// Get the global goforge config directory (~/.goforge).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".goforge"))
}

/// Get the global config path (~/.goforge/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}
