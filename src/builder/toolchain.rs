//! Go toolchain and C cross-compiler resolution.
//!
//! Resolution order for the `go` binary:
//! 1. `[toolchain] go` from the manifest or global config
//! 2. `$GOROOT/bin/go`
//! 3. `go` on `PATH`
//!
//! Android NDK lookup order: `[toolchain] ndk`, `ANDROID_NDK_HOME`,
//! `ANDROID_NDK_ROOT`, `ANDROID_NDK`, then the newest `ndk/<version>` (or
//! `ndk-bundle`) under `ANDROID_HOME` / `ANDROID_SDK_ROOT`.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use regex::Regex;

use crate::builder::errors::BuildError;
use crate::core::target::{GoArch, GoOs, TargetPair};
use crate::core::unit::CcRequirement;
use crate::util::process::ProcessBuilder;

/// User-configured toolchain locations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolchainOverrides {
    pub go: Option<PathBuf>,
    pub ndk: Option<PathBuf>,
}

/// Everything needed to invoke `go build` for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainSpec {
    pub go: PathBuf,
    pub go_version: String,
    /// Target selector variables, in the order they are applied.
    pub env: Vec<(String, String)>,
    pub cc: Option<PathBuf>,
    pub valid: bool,
}

impl ToolchainSpec {
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The compilers this spec builds with, as recorded in cache entries.
    pub fn identity(&self) -> String {
        match &self.cc {
            Some(cc) => format!("go{} {};cc={}", self.go_version, self.go.display(), cc.display()),
            None => format!("go{} {}", self.go_version, self.go.display()),
        }
    }
}

/// Cache key for resolved specs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ToolchainKey {
    pub target: TargetPair,
    pub cc: CcRequirement,
}

/// A probed Go installation.
#[derive(Debug)]
struct GoInstallation {
    binary: PathBuf,
    version: String,
    ports: HashSet<TargetPair>,
}

/// Resolves and caches toolchain specs for one build session.
///
/// Lookups take a read lock; a miss resolves without holding any lock and
/// then inserts under the write lock, keeping whichever spec got there
/// first. Failed resolutions are not cached.
#[derive(Debug)]
pub struct ToolchainResolver {
    overrides: ToolchainOverrides,
    vars: HashMap<String, String>,
    go: Mutex<Option<Arc<GoInstallation>>>,
    cache: RwLock<HashMap<ToolchainKey, Arc<ToolchainSpec>>>,
}

impl ToolchainResolver {
    /// Create a resolver reading fallbacks from the process environment.
    pub fn new(overrides: ToolchainOverrides) -> Self {
        Self::with_env(overrides, std::env::vars().collect())
    }

    /// Create a resolver with an explicit environment snapshot.
    pub fn with_env(overrides: ToolchainOverrides, vars: HashMap<String, String>) -> Self {
        ToolchainResolver {
            overrides,
            vars,
            go: Mutex::new(None),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn overrides(&self) -> &ToolchainOverrides {
        &self.overrides
    }

    /// Resolve the toolchain for a target.
    pub fn resolve(
        &self,
        os: GoOs,
        arch: GoArch,
        cc: &CcRequirement,
    ) -> Result<Arc<ToolchainSpec>, BuildError> {
        let key = ToolchainKey {
            target: TargetPair::new(os, arch),
            cc: cc.clone(),
        };

        if let Some(spec) = self.read_cache().get(&key) {
            return Ok(Arc::clone(spec));
        }

        let spec = Arc::new(self.resolve_uncached(&key)?);

        let mut cache = self
            .cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(Arc::clone(cache.entry(key).or_insert(spec)))
    }

    /// Number of cached specs.
    pub fn cached(&self) -> usize {
        self.read_cache().len()
    }

    /// Drop every cached result, as if a new session started.
    pub fn clear(&self) {
        self.cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
        *self.go.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }

    fn read_cache(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<ToolchainKey, Arc<ToolchainSpec>>> {
        self.cache
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn resolve_uncached(&self, key: &ToolchainKey) -> Result<ToolchainSpec, BuildError> {
        let go = self.go_installation()?;
        let target = key.target;

        if !go.ports.contains(&target) {
            return Err(BuildError::unsupported(
                target,
                format!("not listed by `go tool dist list` for go{}", go.version),
            ));
        }

        let cc = match &key.cc {
            CcRequirement::None => None,
            CcRequirement::Android { api } => {
                if target.os != GoOs::Android {
                    return Err(BuildError::unsupported(
                        target,
                        "an Android NDK compiler only targets android",
                    ));
                }
                Some(self.android_clang(target.arch, *api)?)
            }
            CcRequirement::Path(path) => Some(self.explicit_cc(path)?),
        };

        let mut env = vec![
            ("GOOS".to_string(), target.os.as_str().to_string()),
            ("GOARCH".to_string(), target.arch.as_str().to_string()),
        ];
        if let Some(goarm) = target.arch.goarm() {
            env.push(("GOARM".to_string(), goarm.to_string()));
        }
        match &cc {
            Some(cc) => {
                env.push(("CGO_ENABLED".to_string(), "1".to_string()));
                env.push(("CC".to_string(), cc.display().to_string()));
            }
            None => env.push(("CGO_ENABLED".to_string(), "0".to_string())),
        }

        tracing::debug!(
            "resolved toolchain for {} (cc: {}): go{} at {}",
            target,
            key.cc,
            go.version,
            go.binary.display()
        );

        Ok(ToolchainSpec {
            go: go.binary.clone(),
            go_version: go.version.clone(),
            env,
            cc,
            valid: true,
        })
    }

    /// Probe the Go installation once per session.
    fn go_installation(&self) -> Result<Arc<GoInstallation>, BuildError> {
        let mut slot = self
            .go
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(go) = slot.as_ref() {
            return Ok(Arc::clone(go));
        }

        let binary = self.find_go()?;
        let version = probe_version(&binary)?;
        let ports = probe_ports(&binary);

        tracing::info!("Using go{} at {}", version, binary.display());

        let go = Arc::new(GoInstallation {
            binary,
            version,
            ports,
        });
        *slot = Some(Arc::clone(&go));
        Ok(go)
    }

    fn find_go(&self) -> Result<PathBuf, BuildError> {
        if let Some(ref go) = self.overrides.go {
            if go.is_file() {
                return Ok(go.clone());
            }
            return Err(BuildError::toolchain_not_found(format!(
                "configured go binary `{}` does not exist",
                go.display()
            )));
        }

        if let Some(goroot) = self.var("GOROOT") {
            let candidate = Path::new(goroot).join("bin").join(exe_name("go"));
            if candidate.is_file() {
                return Ok(candidate);
            }
        }

        self.which("go").ok_or_else(|| {
            BuildError::toolchain_not_found("`go` was not found on PATH and GOROOT is not set")
        })
    }

    fn explicit_cc(&self, path: &Path) -> Result<PathBuf, BuildError> {
        if path.is_absolute() || path.components().count() > 1 {
            if path.is_file() {
                return Ok(path.to_path_buf());
            }
        } else if let Some(found) = self.which(&path.to_string_lossy()) {
            return Ok(found);
        }
        Err(BuildError::toolchain_not_found(format!(
            "C compiler `{}` not found",
            path.display()
        )))
    }

    fn android_clang(&self, arch: GoArch, api: u32) -> Result<PathBuf, BuildError> {
        let ndk = self.find_ndk()?;
        let compiler = ndk_clang_path(&ndk, arch, api);
        if compiler.is_file() {
            Ok(compiler)
        } else {
            Err(BuildError::toolchain_not_found(format!(
                "NDK clang for {} at API {} not found at `{}`",
                arch,
                api,
                compiler.display()
            )))
        }
    }

    fn find_ndk(&self) -> Result<PathBuf, BuildError> {
        if let Some(ref ndk) = self.overrides.ndk {
            if ndk.is_dir() {
                return Ok(ndk.clone());
            }
            return Err(BuildError::toolchain_not_found(format!(
                "configured NDK `{}` does not exist",
                ndk.display()
            )));
        }

        for var in ["ANDROID_NDK_HOME", "ANDROID_NDK_ROOT", "ANDROID_NDK"] {
            if let Some(dir) = self.var(var).map(PathBuf::from) {
                if dir.is_dir() {
                    return Ok(dir);
                }
            }
        }

        for var in ["ANDROID_HOME", "ANDROID_SDK_ROOT"] {
            let Some(sdk) = self.var(var).map(PathBuf::from) else {
                continue;
            };
            if let Some(ndk) = newest_side_by_side_ndk(&sdk.join("ndk")) {
                return Ok(ndk);
            }
            let bundle = sdk.join("ndk-bundle");
            if bundle.is_dir() {
                return Ok(bundle);
            }
        }

        Err(BuildError::toolchain_not_found(
            "Android NDK not found (set ANDROID_NDK_HOME or [toolchain] ndk)",
        ))
    }

    fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    fn which(&self, name: &str) -> Option<PathBuf> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        which::which_in(name, self.var("PATH"), cwd).ok()
    }
}

/// Location of the NDK clang wrapper for an ABI and API level.
pub fn ndk_clang_path(ndk: &Path, arch: GoArch, api: u32) -> PathBuf {
    let triple = match arch {
        GoArch::Arm64 => "aarch64-linux-android",
        GoArch::Arm => "armv7a-linux-androideabi",
        GoArch::I386 => "i686-linux-android",
        GoArch::Amd64 => "x86_64-linux-android",
    };
    let suffix = if cfg!(windows) { ".cmd" } else { "" };

    ndk.join("toolchains")
        .join("llvm")
        .join("prebuilt")
        .join(ndk_host_tag())
        .join("bin")
        .join(format!("{}{}-clang{}", triple, api, suffix))
}

/// Prebuilt directory name for the machine running the build.
pub fn ndk_host_tag() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows-x86_64"
    } else if cfg!(target_os = "macos") {
        "darwin-x86_64"
    } else {
        "linux-x86_64"
    }
}

fn newest_side_by_side_ndk(dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .max_by_key(|p| {
            p.file_name()
                .map(|n| version_key(&n.to_string_lossy()))
                .unwrap_or_default()
        })
}

fn version_key(name: &str) -> Vec<u64> {
    name.split('.').map(|part| part.parse().unwrap_or(0)).collect()
}

fn exe_name(name: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}

fn probe_version(go: &Path) -> Result<String, BuildError> {
    let output = ProcessBuilder::new(go)
        .arg("version")
        .exec()
        .map_err(|e| BuildError::toolchain_not_found(format!("{:#}", e)))?;
    if !output.status.success() {
        return Err(BuildError::toolchain_not_found(format!(
            "`{} version` failed: {}",
            go.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    parse_go_version(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
        BuildError::toolchain_not_found(format!(
            "`{}` did not report a Go version",
            go.display()
        ))
    })
}

/// Extract `1.22.3` from `go version go1.22.3 linux/amd64`.
pub fn parse_go_version(output: &str) -> Option<String> {
    let re = Regex::new(r"\bgo(\d+(?:\.\d+)*)").ok()?;
    re.captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Ports reported by `go tool dist list`, falling back to the static table.
fn probe_ports(go: &Path) -> HashSet<TargetPair> {
    let listed = ProcessBuilder::new(go)
        .args(["tool", "dist", "list"])
        .exec()
        .ok()
        .filter(|out| out.status.success())
        .map(|out| parse_dist_list(&String::from_utf8_lossy(&out.stdout)))
        .unwrap_or_default();

    if listed.is_empty() {
        tracing::warn!("`go tool dist list` unavailable; assuming the default port list");
        TargetPair::supported().into_iter().collect()
    } else {
        listed
    }
}

/// Parse `go tool dist list` output, skipping ports this crate does not model.
pub fn parse_dist_list(output: &str) -> HashSet<TargetPair> {
    output
        .lines()
        .filter_map(|line| line.trim().parse::<TargetPair>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_go_version() {
        assert_eq!(
            parse_go_version("go version go1.22.3 linux/amd64\n").as_deref(),
            Some("1.22.3")
        );
        assert_eq!(
            parse_go_version("go version go1.21 darwin/arm64").as_deref(),
            Some("1.21")
        );
        assert_eq!(parse_go_version("not go"), None);
    }

    #[test]
    fn test_parse_dist_list_skips_unknown_ports() {
        let ports = parse_dist_list("aix/ppc64\nandroid/arm64\nlinux/amd64\nplan9/386\n");
        assert_eq!(ports.len(), 2);
        assert!(ports.contains(&TargetPair::new(GoOs::Android, GoArch::Arm64)));
    }

    #[test]
    fn test_ndk_clang_path() {
        let path = ndk_clang_path(Path::new("/ndk"), GoArch::Arm, 21);
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("armv7a-linux-androideabi21-clang"));
        assert!(path.starts_with("/ndk/toolchains/llvm/prebuilt"));
    }

    #[test]
    fn test_version_key_orders_numerically() {
        assert!(version_key("26.1.10909125") > version_key("25.2.9519653"));
        assert!(version_key("10.0") > version_key("9.9"));
    }

    #[test]
    fn test_missing_go_override() {
        let resolver = ToolchainResolver::with_env(
            ToolchainOverrides {
                go: Some(PathBuf::from("/definitely/not/go")),
                ndk: None,
            },
            HashMap::new(),
        );
        let err = resolver
            .resolve(GoOs::Linux, GoArch::Amd64, &CcRequirement::None)
            .unwrap_err();
        assert!(matches!(err, BuildError::ToolchainNotFound { .. }));
        assert_eq!(resolver.cached(), 0);
    }

    #[cfg(unix)]
    mod with_fake_go {
        use super::*;
        use crate::test_support::{fake_go, fake_ndk};
        use tempfile::TempDir;

        fn resolver(tmp: &TempDir, ndk: Option<PathBuf>) -> ToolchainResolver {
            ToolchainResolver::with_env(
                ToolchainOverrides {
                    go: Some(fake_go(tmp.path())),
                    ndk,
                },
                HashMap::new(),
            )
        }

        #[test]
        fn test_resolve_plain_cross_compile() {
            let tmp = TempDir::new().unwrap();
            let resolver = resolver(&tmp, None);

            let spec = resolver
                .resolve(GoOs::Android, GoArch::Arm, &CcRequirement::None)
                .unwrap();

            assert!(spec.valid);
            assert_eq!(spec.go_version, "1.22.3");
            assert_eq!(spec.env_value("GOOS"), Some("android"));
            assert_eq!(spec.env_value("GOARCH"), Some("arm"));
            assert_eq!(spec.env_value("GOARM"), Some("7"));
            assert_eq!(spec.env_value("CGO_ENABLED"), Some("0"));
            assert_eq!(spec.env_value("CC"), None);
        }

        #[test]
        fn test_resolution_is_cached() {
            let tmp = TempDir::new().unwrap();
            let resolver = resolver(&tmp, None);

            let a = resolver
                .resolve(GoOs::Linux, GoArch::Amd64, &CcRequirement::None)
                .unwrap();
            let b = resolver
                .resolve(GoOs::Linux, GoArch::Amd64, &CcRequirement::None)
                .unwrap();
            assert!(Arc::ptr_eq(&a, &b));
            assert_eq!(resolver.cached(), 1);

            resolver.clear();
            assert_eq!(resolver.cached(), 0);
        }

        #[test]
        fn test_concurrent_resolution_first_wins() {
            let tmp = TempDir::new().unwrap();
            let resolver = Arc::new(resolver(&tmp, None));

            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let r = Arc::clone(&resolver);
                    std::thread::spawn(move || {
                        r.resolve(GoOs::Linux, GoArch::Arm64, &CcRequirement::None)
                            .unwrap()
                    })
                })
                .collect();
            let specs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

            let cached = resolver
                .resolve(GoOs::Linux, GoArch::Arm64, &CcRequirement::None)
                .unwrap();
            assert!(specs.iter().all(|s| **s == *cached));
            assert_eq!(resolver.cached(), 1);
        }

        #[test]
        fn test_port_missing_from_dist_list() {
            let tmp = TempDir::new().unwrap();
            let resolver = resolver(&tmp, None);

            let err = resolver
                .resolve(GoOs::Windows, GoArch::Arm, &CcRequirement::None)
                .unwrap_err();
            assert!(matches!(err, BuildError::UnsupportedTarget { .. }));
        }

        #[test]
        fn test_android_ndk_compiler() {
            let tmp = TempDir::new().unwrap();
            let ndk = fake_ndk(tmp.path(), GoArch::Arm64, 21);
            let resolver = resolver(&tmp, Some(ndk.clone()));

            let spec = resolver
                .resolve(GoOs::Android, GoArch::Arm64, &CcRequirement::Android { api: 21 })
                .unwrap();

            let cc = spec.cc.clone().unwrap();
            assert!(cc.starts_with(&ndk));
            assert_eq!(spec.env_value("CGO_ENABLED"), Some("1"));
            assert_eq!(spec.env_value("CC"), Some(cc.display().to_string().as_str()));
        }

        #[test]
        fn test_android_ndk_missing_api_level() {
            let tmp = TempDir::new().unwrap();
            let ndk = fake_ndk(tmp.path(), GoArch::Arm64, 21);
            let resolver = resolver(&tmp, Some(ndk));

            let err = resolver
                .resolve(GoOs::Android, GoArch::Arm64, &CcRequirement::Android { api: 33 })
                .unwrap_err();
            assert!(matches!(err, BuildError::ToolchainNotFound { .. }));
        }

        #[test]
        fn test_android_compiler_for_linux_target() {
            let tmp = TempDir::new().unwrap();
            let ndk = fake_ndk(tmp.path(), GoArch::Amd64, 21);
            let resolver = resolver(&tmp, Some(ndk));

            let err = resolver
                .resolve(GoOs::Linux, GoArch::Amd64, &CcRequirement::Android { api: 21 })
                .unwrap_err();
            assert!(matches!(err, BuildError::UnsupportedTarget { .. }));
        }

        #[test]
        fn test_ndk_from_sdk_side_by_side() {
            let tmp = TempDir::new().unwrap();
            let sdk = tmp.path().join("sdk");
            let old = sdk.join("ndk").join("25.2.9519653");
            let new = sdk.join("ndk").join("26.1.10909125");
            std::fs::create_dir_all(&old).unwrap();
            std::fs::create_dir_all(&new).unwrap();
            let clang = ndk_clang_path(&new, GoArch::Amd64, 23);
            std::fs::create_dir_all(clang.parent().unwrap()).unwrap();
            std::fs::write(&clang, "").unwrap();

            let mut vars = HashMap::new();
            vars.insert("ANDROID_HOME".to_string(), sdk.display().to_string());
            let resolver = ToolchainResolver::with_env(
                ToolchainOverrides {
                    go: Some(fake_go(tmp.path())),
                    ndk: None,
                },
                vars,
            );

            let spec = resolver
                .resolve(GoOs::Android, GoArch::Amd64, &CcRequirement::Android { api: 23 })
                .unwrap();
            assert_eq!(spec.cc, Some(clang));
        }
    }
}
