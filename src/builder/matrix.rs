//! Expansion of the configured target matrix into build units.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::builder::errors::BuildError;
use crate::builder::toolchain::ToolchainOverrides;
use crate::core::manifest::{CgoSpec, Manifest, VariantSpec};
use crate::core::target::{GoOs, TargetPair};
use crate::core::unit::{
    BuildUnit, CcRequirement, CgoConfig, InputSpec, UnitId, DEFAULT_CGO_CFLAGS,
};
use crate::util::fs::normalize_path;

/// Keyword in `[build].targets` selecting every supported pair.
pub const ALL_TARGETS: &str = "all";

/// Turns a manifest into the ordered, deduplicated list of build units.
pub struct BuildTargetMatrix<'a> {
    manifest: &'a Manifest,
    overrides: ToolchainOverrides,
}

impl<'a> BuildTargetMatrix<'a> {
    pub fn new(manifest: &'a Manifest) -> Self {
        BuildTargetMatrix {
            manifest,
            overrides: ToolchainOverrides {
                go: manifest.toolchain.go.clone(),
                ndk: manifest.toolchain.ndk.clone(),
            },
        }
    }

    /// Use the effective toolchain locations (after config layering) for
    /// the units' toolchain identity.
    pub fn with_overrides(mut self, overrides: ToolchainOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Expand the matrix.
    ///
    /// Units come from `[variants]` (by name), else `[build].targets`, else
    /// the host pair. Exact duplicates collapse into the first occurrence;
    /// two differently configured variants with the same identity are an
    /// error.
    pub fn expand(&self) -> Result<Vec<BuildUnit>, BuildError> {
        let declared = self.declared_variants()?;

        let mut units: Vec<BuildUnit> = Vec::new();
        let mut seen: HashMap<UnitId, usize> = HashMap::new();

        for (name, spec) in declared {
            let unit = self.build_unit(&name, &spec)?;
            let id = unit.id();

            match seen.get(&id) {
                Some(&index) if units[index].same_configuration(&unit) => {
                    let kept = &mut units[index];
                    if !kept.answers_to(&unit.name) {
                        tracing::warn!(
                            "variant `{}` builds the same as `{}`; merging",
                            unit.name,
                            kept.name
                        );
                        kept.aliases.push(unit.name);
                    }
                }
                Some(&index) => {
                    return Err(BuildError::configuration(format!(
                        "variants `{}` and `{}` both build {} with different settings",
                        units[index].name, unit.name, id
                    )));
                }
                None => {
                    seen.insert(id, units.len());
                    units.push(unit);
                }
            }
        }

        Ok(units)
    }

    fn declared_variants(&self) -> Result<Vec<(String, VariantSpec)>, BuildError> {
        if !self.manifest.variants.is_empty() {
            return Ok(self
                .manifest
                .variants
                .iter()
                .map(|(name, spec)| (name.clone(), spec.clone()))
                .collect());
        }

        let pairs = if self.manifest.build.targets.is_empty() {
            vec![TargetPair::host()]
        } else {
            parse_targets(&self.manifest.build.targets)?
        };

        Ok(pairs
            .into_iter()
            .map(|pair| {
                let spec = VariantSpec {
                    os: Some(pair.os),
                    arch: Some(pair.arch),
                    ..VariantSpec::default()
                };
                (pair.slug(), spec)
            })
            .collect())
    }

    fn build_unit(&self, name: &str, spec: &VariantSpec) -> Result<BuildUnit, BuildError> {
        validate_variant_name(name)?;

        let settings = spec.settings.inherit(&self.manifest.defaults);
        let target = TargetPair::new(
            spec.os.unwrap_or_else(GoOs::host),
            spec.arch.unwrap_or_else(crate::core::target::GoArch::host),
        );
        if !target.is_known_supported() {
            return Err(BuildError::configuration(format!(
                "variant `{}`: target {} is not supported by the Go toolchain",
                name, target
            )));
        }

        let module_dir = settings
            .module
            .clone()
            .unwrap_or_else(|| self.manifest.module.directory.clone());
        let module_root = self.manifest.root.join(&module_dir);
        if !module_root.is_dir() {
            return Err(BuildError::configuration(format!(
                "variant `{}`: module directory `{}` does not exist",
                name,
                module_root.display()
            )));
        }
        let module_root = normalize_path(&module_root);

        let build_mode = settings.build_mode.unwrap_or_default();
        let package = settings.package.clone().unwrap_or_else(|| ".".to_string());
        let file_name = match settings.file_name.clone() {
            Some(file_name) => file_name,
            None => build_mode.output_filename(&artifact_stem(&package, &module_root), target.os),
        };
        if file_name.is_empty() || file_name.contains(['/', '\\']) {
            return Err(BuildError::configuration(format!(
                "variant `{}`: invalid file-name `{}`",
                name, file_name
            )));
        }

        let output_dir = normalize_path(&self.manifest.output_dir());
        let cache_dir = normalize_path(&self.manifest.cache_dir());

        Ok(BuildUnit {
            name: name.to_string(),
            aliases: Vec::new(),
            module_root,
            target,
            build_mode,
            package,
            tags: settings.tags.clone().unwrap_or_default(),
            flags: settings.flags.clone().unwrap_or_default(),
            env: settings.env.clone(),
            cgo: cgo_config(name, settings.cgo.as_ref())?,
            artifact: output_dir.join(name).join(file_name),
            inputs: InputSpec {
                base: self.manifest.root.clone(),
                globs: self.manifest.module.inputs.clone(),
                excluded_dirs: vec![output_dir, cache_dir],
            },
            toolchain_identity: self.toolchain_identity(),
        })
    }

    fn toolchain_identity(&self) -> String {
        let describe = |p: &Option<PathBuf>| {
            p.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "auto".to_string())
        };
        format!(
            "go={};ndk={}",
            describe(&self.overrides.go),
            describe(&self.overrides.ndk)
        )
    }
}

/// Parse `[build].targets`, expanding `all`.
pub fn parse_targets(targets: &[String]) -> Result<Vec<TargetPair>, BuildError> {
    let mut pairs = Vec::new();
    for target in targets {
        if target.eq_ignore_ascii_case(ALL_TARGETS) {
            pairs.extend(TargetPair::supported());
            continue;
        }
        let pair: TargetPair = target.parse().map_err(BuildError::configuration)?;
        pairs.push(pair);
    }
    Ok(pairs)
}

fn validate_variant_name(name: &str) -> Result<(), BuildError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && name.chars().any(|c| c.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(BuildError::configuration(format!(
            "invalid variant name `{}`: use letters, digits, `-`, `_` or `.`",
            name
        )))
    }
}

fn cgo_config(name: &str, spec: Option<&CgoSpec>) -> Result<CgoConfig, BuildError> {
    let Some(spec) = spec else {
        return Ok(CgoConfig::disabled());
    };

    let compiler = match (spec.android, &spec.cc) {
        (Some(_), Some(_)) => {
            return Err(BuildError::configuration(format!(
                "variant `{}`: cgo accepts either `android` or `cc`, not both",
                name
            )))
        }
        (Some(api), None) => CcRequirement::Android { api },
        (None, Some(cc)) => CcRequirement::Path(cc.clone()),
        (None, None) => {
            return Err(BuildError::configuration(format!(
                "variant `{}`: cgo needs `android = <api>` or `cc = \"<path>\"`",
                name
            )))
        }
    };

    Ok(CgoConfig {
        compiler,
        cflags: spec
            .cflags
            .clone()
            .unwrap_or_else(|| DEFAULT_CGO_CFLAGS.to_string()),
    })
}

/// Base name for a default artifact: last segment of the package, else the
/// module directory name.
fn artifact_stem(package: &str, module_root: &Path) -> String {
    let from_package = package
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .map(str::to_string);

    from_package
        .or_else(|| {
            module_root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "go".to_string())
}
