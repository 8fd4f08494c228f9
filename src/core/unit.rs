//! Build units: one `go build` invocation for a (module, OS, arch) triple.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::target::{BuildMode, GoArch, GoOs, TargetPair};

/// Default `CGO_CFLAGS` for cgo-enabled units.
pub const DEFAULT_CGO_CFLAGS: &str = "-O3";

/// Identity of a build unit. Unique within a matrix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId {
    pub module: PathBuf,
    pub target: TargetPair,
}

impl UnitId {
    pub fn new(module: impl Into<PathBuf>, target: TargetPair) -> Self {
        UnitId {
            module: module.into(),
            target,
        }
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.target, self.module.display())
    }
}

/// Which C compiler a cgo build needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CcRequirement {
    /// cgo disabled.
    None,
    /// Android NDK clang for the unit's architecture at this API level.
    Android { api: u32 },
    /// An explicit compiler, absolute or looked up on `PATH`.
    Path(PathBuf),
}

impl CcRequirement {
    pub fn is_required(&self) -> bool {
        !matches!(self, CcRequirement::None)
    }
}

impl fmt::Display for CcRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CcRequirement::None => f.write_str("none"),
            CcRequirement::Android { api } => write!(f, "android-ndk(api {})", api),
            CcRequirement::Path(p) => write!(f, "{}", p.display()),
        }
    }
}

/// cgo settings of a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CgoConfig {
    pub compiler: CcRequirement,
    pub cflags: String,
}

impl CgoConfig {
    pub fn disabled() -> Self {
        CgoConfig {
            compiler: CcRequirement::None,
            cflags: String::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.compiler.is_required()
    }
}

impl Default for CgoConfig {
    fn default() -> Self {
        CgoConfig::disabled()
    }
}

/// Files outside the module tree that also feed the fingerprint, and
/// directories inside it that must not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSpec {
    /// Base directory for `globs`.
    pub base: PathBuf,
    pub globs: Vec<String>,
    pub excluded_dirs: Vec<PathBuf>,
}

/// A fully configured compilation job. Immutable once built by the matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildUnit {
    /// Variant name, e.g. `arm64` or `linux-amd64`.
    pub name: String,
    /// Names of identical variants merged into this unit.
    pub aliases: Vec<String>,
    pub module_root: PathBuf,
    pub target: TargetPair,
    pub build_mode: BuildMode,
    /// Go package to build, relative to the module root (`.` when unset).
    pub package: String,
    pub tags: Vec<String>,
    pub flags: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub cgo: CgoConfig,
    /// Final location of the artifact.
    pub artifact: PathBuf,
    pub inputs: InputSpec,
    /// Identity of the configured toolchain (override paths), folded into
    /// the fingerprint.
    pub toolchain_identity: String,
}

impl BuildUnit {
    pub fn id(&self) -> UnitId {
        UnitId::new(&self.module_root, self.target)
    }

    pub fn os(&self) -> GoOs {
        self.target.os
    }

    pub fn arch(&self) -> GoArch {
        self.target.arch
    }

    pub fn module_root(&self) -> &Path {
        &self.module_root
    }

    /// Host task name, e.g. `compileGolangAndroidArm64`.
    pub fn task_name(&self) -> String {
        format!("{}{}", COMPILE_TASK_PREFIX, capitalize_segments(&self.name))
    }

    /// Whether `name` is this unit's variant name, a merged alias or its
    /// task name.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|a| a == name) || self.task_name() == name
    }

    /// Whether two units describe the same build, ignoring the variant name.
    pub fn same_configuration(&self, other: &BuildUnit) -> bool {
        let mut renamed = other.clone();
        renamed.name = self.name.clone();
        renamed.aliases = self.aliases.clone();
        renamed.artifact = self.artifact.clone();
        *self == renamed
    }
}

/// Prefix of per-unit task names; also the name of the aggregate task.
pub const COMPILE_TASK_PREFIX: &str = "compileGolang";

/// `arm64-v8a` -> `Arm64V8a`.
pub fn capitalize_segments(name: &str) -> String {
    name.split(['-', '_', '.'])
        .filter(|s| !s.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(name: &str) -> BuildUnit {
        BuildUnit {
            name: name.to_string(),
            aliases: Vec::new(),
            module_root: PathBuf::from("/work/golang"),
            target: TargetPair::new(GoOs::Android, GoArch::Arm64),
            build_mode: BuildMode::Shared,
            package: ".".to_string(),
            tags: Vec::new(),
            flags: Vec::new(),
            env: BTreeMap::new(),
            cgo: CgoConfig::disabled(),
            artifact: PathBuf::from(format!("/out/{}/libgo.so", name)),
            inputs: InputSpec::default(),
            toolchain_identity: String::new(),
        }
    }

    #[test]
    fn test_task_name() {
        assert_eq!(unit("arm64").task_name(), "compileGolangArm64");
        assert_eq!(unit("android-arm64").task_name(), "compileGolangAndroidArm64");
        assert_eq!(unit("x86_64").task_name(), "compileGolangX8664");
    }

    #[test]
    fn test_answers_to_aliases() {
        let mut merged = unit("arm64");
        merged.aliases.push("aarch64".to_string());

        assert!(merged.answers_to("arm64"));
        assert!(merged.answers_to("aarch64"));
        assert!(merged.answers_to("compileGolangArm64"));
        assert!(!merged.answers_to("x86"));
    }

    #[test]
    fn test_id_ignores_variant_name() {
        assert_eq!(unit("a").id(), unit("b").id());
        assert_eq!(unit("a").id().to_string(), "android/arm64@/work/golang");
    }

    #[test]
    fn test_same_configuration() {
        let a = unit("a");
        let b = unit("b");
        assert!(a.same_configuration(&b));

        let mut c = unit("c");
        c.tags.push("netgo".to_string());
        assert!(!a.same_configuration(&c));
    }
}
