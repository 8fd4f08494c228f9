//! Global context for goforge operations.
//!
//! Holds the working directory, the goforge home directory and an optional
//! explicit manifest path, and knows how to turn those into a loaded
//! manifest plus its layered configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::manifest::{find_manifest, Manifest};
use crate::util::config::{global_config_dir, load_config, Config};

/// Process-wide settings for one CLI invocation.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    cwd: PathBuf,
    /// `~/.goforge`; absent when no home directory can be determined.
    home: Option<PathBuf>,
    manifest_path: Option<PathBuf>,
}

impl GlobalContext {
    /// Create a context rooted at the process working directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::with_cwd(cwd))
    }

    /// Create a context with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Self {
        GlobalContext {
            cwd,
            home: global_config_dir(),
            manifest_path: None,
        }
    }

    /// Use `path` instead of searching for `GoForge.toml`.
    pub fn with_manifest_path(mut self, path: Option<PathBuf>) -> Self {
        self.manifest_path = path.map(|p| {
            if p.is_absolute() {
                p
            } else {
                self.cwd.join(p)
            }
        });
        self
    }

    /// Override the goforge home directory.
    pub fn with_home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn home(&self) -> Option<&Path> {
        self.home.as_deref()
    }

    /// Global configuration file path.
    pub fn config_path(&self) -> Option<PathBuf> {
        self.home.as_ref().map(|home| home.join("config.toml"))
    }

    /// Locate the manifest: the explicit path, or the nearest `GoForge.toml`
    /// at or above the working directory.
    pub fn find_manifest(&self) -> Result<PathBuf> {
        match &self.manifest_path {
            Some(path) if path.is_file() => Ok(path.clone()),
            Some(path) => anyhow::bail!("manifest `{}` does not exist", path.display()),
            None => find_manifest(&self.cwd),
        }
    }

    pub fn load_manifest(&self) -> Result<Manifest> {
        let path = self.find_manifest()?;
        tracing::debug!("using manifest {}", path.display());
        Manifest::load(&path)
    }

    /// Global config merged under the manifest's settings.
    pub fn config(&self, manifest: &Manifest) -> Config {
        load_config(self.config_path().as_deref(), manifest)
    }

    /// Ensure a directory exists, creating it if necessary.
    pub fn ensure_dir(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::MANIFEST_NAME;
    use tempfile::TempDir;

    #[test]
    fn test_finds_manifest_above_cwd() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(MANIFEST_NAME), "").unwrap();
        let nested = tmp.path().join("app").join("src");
        std::fs::create_dir_all(&nested).unwrap();

        let ctx = GlobalContext::with_cwd(nested).with_home(None);
        assert_eq!(ctx.find_manifest().unwrap(), tmp.path().join(MANIFEST_NAME));
        assert_eq!(ctx.load_manifest().unwrap().root, tmp.path());
    }

    #[test]
    fn test_explicit_manifest_path() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("other.toml"), "").unwrap();

        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf())
            .with_manifest_path(Some(PathBuf::from("other.toml")));
        assert_eq!(ctx.find_manifest().unwrap(), tmp.path().join("other.toml"));

        let missing = GlobalContext::with_cwd(tmp.path().to_path_buf())
            .with_manifest_path(Some(PathBuf::from("missing.toml")));
        assert!(missing.find_manifest().is_err());
    }

    #[test]
    fn test_config_reads_home() {
        let tmp = TempDir::new().unwrap();
        let home = tmp.path().join("home");
        std::fs::create_dir_all(&home).unwrap();
        std::fs::write(home.join("config.toml"), "[build]\njobs = 3\n").unwrap();

        let manifest = Manifest::parse("", tmp.path()).unwrap();
        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf()).with_home(Some(home));
        assert_eq!(ctx.config(&manifest).build.jobs, Some(3));
    }
}
