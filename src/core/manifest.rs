//! `GoForge.toml` manifest parsing and schema.
//!
//! The manifest names the Go module to build, the target matrix and the
//! per-variant build settings.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::target::{BuildMode, GoArch, GoOs};

/// Canonical manifest file name.
pub const MANIFEST_NAME: &str = "GoForge.toml";

/// Default artifact directory, relative to the project root.
pub const DEFAULT_OUTPUT_DIR: &str = "build/outputs/golang";

/// Default fingerprint cache directory, relative to the project root.
pub const DEFAULT_CACHE_DIR: &str = ".goforge/cache";

/// Parsed `GoForge.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub module: ModuleSection,
    pub build: BuildSection,
    pub toolchain: ToolchainSection,
    /// Settings every variant inherits.
    pub defaults: VariantSettings,
    /// Named variants, keyed by variant name.
    pub variants: BTreeMap<String, VariantSpec>,

    /// Directory containing the manifest.
    #[serde(skip)]
    pub root: PathBuf,
}

/// `[module]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleSection {
    /// Module root, relative to the project root.
    pub directory: PathBuf,
    /// Extra input globs, relative to the project root.
    pub inputs: Vec<String>,
}

impl Default for ModuleSection {
    fn default() -> Self {
        ModuleSection {
            directory: PathBuf::from("."),
            inputs: Vec::new(),
        }
    }
}

/// `[build]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BuildSection {
    /// `os/arch` pairs, or `["all"]`. Only used when no variants are declared.
    pub targets: Vec<String>,
    pub fail_fast: Option<bool>,
    /// Per-unit timeout in seconds.
    pub timeout: Option<u64>,
    pub jobs: Option<usize>,
    pub output_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
}

/// `[toolchain]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSection {
    /// Path to the `go` binary.
    pub go: Option<PathBuf>,
    /// Android NDK root.
    pub ndk: Option<PathBuf>,
}

/// Settings shared by `[defaults]` and each `[variants.<name>]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct VariantSettings {
    /// Module root override, relative to the project root.
    pub module: Option<PathBuf>,
    pub build_mode: Option<BuildMode>,
    pub package: Option<String>,
    pub file_name: Option<String>,
    pub tags: Option<Vec<String>>,
    pub flags: Option<Vec<String>>,
    pub cgo: Option<CgoSpec>,
    pub env: BTreeMap<String, String>,
}

impl VariantSettings {
    /// Fill unset fields from `defaults`. Environment maps are merged with
    /// `self` taking precedence.
    pub fn inherit(&self, defaults: &VariantSettings) -> VariantSettings {
        let mut env = defaults.env.clone();
        env.extend(self.env.clone());

        VariantSettings {
            module: self.module.clone().or_else(|| defaults.module.clone()),
            build_mode: self.build_mode.or(defaults.build_mode),
            package: self.package.clone().or_else(|| defaults.package.clone()),
            file_name: self.file_name.clone().or_else(|| defaults.file_name.clone()),
            tags: self.tags.clone().or_else(|| defaults.tags.clone()),
            flags: self.flags.clone().or_else(|| defaults.flags.clone()),
            cgo: self.cgo.clone().or_else(|| defaults.cgo.clone()),
            env,
        }
    }
}

/// `cgo = { android = 21 }` or `cgo = { cc = "/usr/bin/clang" }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CgoSpec {
    /// Android API level; selects the NDK clang for the variant's ABI.
    pub android: Option<u32>,
    /// Explicit C compiler.
    pub cc: Option<PathBuf>,
    /// Exported as `CGO_CFLAGS`.
    pub cflags: Option<String>,
}

/// `[variants.<name>]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantSpec {
    /// Defaults to the host OS.
    pub os: Option<GoOs>,
    /// Defaults to the host architecture.
    pub arch: Option<GoArch>,
    #[serde(flatten)]
    pub settings: VariantSettings,
}

impl Manifest {
    /// Parse a manifest from a string. `root` is the directory it lives in.
    pub fn parse(contents: &str, root: &Path) -> Result<Self> {
        let mut manifest: Manifest =
            toml::from_str(contents).context("failed to parse manifest")?;
        manifest.root = root.to_path_buf();
        Ok(manifest)
    }

    /// Load a manifest from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;
        let root = path.parent().unwrap_or_else(|| Path::new("."));
        Manifest::parse(&contents, root)
            .with_context(|| format!("invalid manifest: {}", path.display()))
    }

    /// Default module root (`[module].directory`).
    pub fn module_root(&self) -> PathBuf {
        self.root.join(&self.module.directory)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(
            self.build
                .output_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
        )
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(
            self.build
                .cache_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR)),
        )
    }
}

/// Find `GoForge.toml` by walking up from `start`.
pub fn find_manifest(start: &Path) -> Result<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        let candidate = dir.join(MANIFEST_NAME);
        if candidate.is_file() {
            return Ok(candidate);
        }
        current = dir.parent();
    }
    bail!(
        "could not find `{}` in `{}` or any parent directory",
        MANIFEST_NAME,
        start.display()
    )
}

/// Template written by `goforge init`.
pub fn template(module_dir: &str) -> String {
    format!(
        r#"[module]
directory = "{module_dir}"

[build]
# fail-fast = false
# timeout = 600

[defaults]
build-mode = "c-shared"

[variants.arm64-v8a]
os = "android"
arch = "arm64"
cgo = {{ android = 21 }}

[variants.armeabi-v7a]
os = "android"
arch = "arm"
cgo = {{ android = 21 }}

[variants.x86_64]
os = "android"
arch = "amd64"
cgo = {{ android = 21 }}

[variants.x86]
os = "android"
arch = "386"
cgo = {{ android = 21 }}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
[module]
directory = "src/main/golang"
inputs = ["shared/*.go"]

[build]
targets = ["linux/amd64"]
fail-fast = true
timeout = 120
output-dir = "out"

[toolchain]
go = "/opt/go/bin/go"

[defaults]
build-mode = "c-shared"
package = "./cmd/core"
tags = ["netgo"]
env = { GOFLAGS = "-mod=mod", A = "1" }

[variants.arm64]
os = "android"
arch = "aarch64"
file-name = "libcore.so"
cgo = { android = 21, cflags = "-O2" }
env = { A = "2" }
"#;

    #[test]
    fn test_parse_sample() {
        let m = Manifest::parse(SAMPLE, Path::new("/project")).unwrap();
        assert_eq!(m.module.directory, PathBuf::from("src/main/golang"));
        assert_eq!(m.module_root(), PathBuf::from("/project/src/main/golang"));
        assert_eq!(m.build.fail_fast, Some(true));
        assert_eq!(m.build.timeout, Some(120));
        assert_eq!(m.output_dir(), PathBuf::from("/project/out"));
        assert_eq!(m.cache_dir(), PathBuf::from("/project/.goforge/cache"));
        assert_eq!(m.toolchain.go, Some(PathBuf::from("/opt/go/bin/go")));

        let v = &m.variants["arm64"];
        assert_eq!(v.os, Some(GoOs::Android));
        assert_eq!(v.arch, Some(GoArch::Arm64));
        assert_eq!(v.settings.file_name.as_deref(), Some("libcore.so"));
        assert_eq!(v.settings.cgo.as_ref().unwrap().android, Some(21));
    }

    #[test]
    fn test_inherit_defaults() {
        let m = Manifest::parse(SAMPLE, Path::new("/project")).unwrap();
        let merged = m.variants["arm64"].settings.inherit(&m.defaults);

        assert_eq!(merged.build_mode, Some(BuildMode::Shared));
        assert_eq!(merged.package.as_deref(), Some("./cmd/core"));
        assert_eq!(merged.tags, Some(vec!["netgo".to_string()]));
        assert_eq!(merged.env.get("A").map(String::as_str), Some("2"));
        assert_eq!(merged.env.get("GOFLAGS").map(String::as_str), Some("-mod=mod"));
    }

    #[test]
    fn test_empty_manifest_defaults() {
        let m = Manifest::parse("", Path::new("/p")).unwrap();
        assert_eq!(m.module_root(), PathBuf::from("/p/."));
        assert_eq!(m.output_dir(), PathBuf::from("/p/build/outputs/golang"));
        assert!(m.variants.is_empty());
    }

    #[test]
    fn test_template_parses() {
        let m = Manifest::parse(&template("golang"), Path::new("/p")).unwrap();
        assert_eq!(m.variants.len(), 4);
        assert_eq!(m.variants["armeabi-v7a"].arch, Some(GoArch::Arm));
    }

    #[test]
    fn test_find_manifest_walks_up() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(MANIFEST_NAME), "").unwrap();
        let nested = tmp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let found = find_manifest(&nested).unwrap();
        assert_eq!(found, tmp.path().join(MANIFEST_NAME));
    }

    #[test]
    fn test_find_manifest_missing() {
        let tmp = TempDir::new().unwrap();
        let err = find_manifest(tmp.path()).unwrap_err();
        assert!(err.to_string().contains(MANIFEST_NAME));
    }
}
