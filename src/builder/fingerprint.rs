//! Content fingerprints for incremental builds.
//!
//! A fingerprint covers every input file of a unit (by relative path and
//! content hash, never timestamps) plus the unit's build configuration.
//! Files are sorted by relative path before hashing so the digest does not
//! depend on directory traversal order.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::builder::errors::BuildError;
use crate::core::unit::BuildUnit;
use crate::util::fs::{glob_files, is_hidden, relative_slash_path};
use crate::util::hash::{sha256_file, short, DigestBuilder};

/// Bumped whenever the digest layout changes, invalidating old entries.
const FINGERPRINT_SCHEMA: &str = "goforge-fingerprint-v1";

/// Prefix for inputs matched by `[module].inputs` globs, keeping them apart
/// from files of the module tree.
const EXTRA_INPUT_PREFIX: &str = "extra:";

/// Opaque digest of a unit's inputs and configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an existing hex digest.
    pub fn new(digest: impl Into<String>) -> Self {
        Fingerprint(digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        short(&self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One hashed input file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct InputFile {
    /// `/`-separated path relative to the module root.
    pub path: String,
    pub hash: String,
}

/// Computes fingerprints for build units.
#[derive(Debug, Clone, Default)]
pub struct InputFingerprinter;

impl InputFingerprinter {
    pub fn new() -> Self {
        InputFingerprinter
    }

    /// Fingerprint a unit: walk and hash its inputs, then fold in its
    /// configuration.
    pub fn fingerprint(&self, unit: &BuildUnit) -> Result<Fingerprint, BuildError> {
        let files = self.input_files(unit)?;
        tracing::debug!("{}: fingerprinting {} input files", unit.name, files.len());
        Ok(compute(files, unit))
    }

    /// Hash every input file of a unit.
    pub fn input_files(&self, unit: &BuildUnit) -> Result<Vec<InputFile>, BuildError> {
        let mut files = Vec::new();

        for path in module_files(unit)? {
            let hash = sha256_file(&path).map_err(|e| BuildError::io(&path, e))?;
            files.push(InputFile {
                path: relative_slash_path(&unit.module_root, &path),
                hash,
            });
        }

        if !unit.inputs.globs.is_empty() {
            let extra = glob_files(&unit.inputs.base, &unit.inputs.globs)
                .map_err(|e| BuildError::io(&unit.inputs.base, format!("{:#}", e)))?;
            for path in extra {
                let hash = sha256_file(&path).map_err(|e| BuildError::io(&path, e))?;
                files.push(InputFile {
                    path: format!(
                        "{}{}",
                        EXTRA_INPUT_PREFIX,
                        relative_slash_path(&unit.inputs.base, &path)
                    ),
                    hash,
                });
            }
        }

        Ok(files)
    }
}

/// Combine hashed inputs and configuration into a fingerprint. Input order
/// does not matter.
pub fn compute(mut files: Vec<InputFile>, unit: &BuildUnit) -> Fingerprint {
    files.sort();

    let mut digest = DigestBuilder::new();
    digest.update_str(FINGERPRINT_SCHEMA);

    digest.update_str(&files.len().to_string());
    for file in &files {
        digest.update_field(&file.path, &file.hash);
    }

    digest
        .update_field("os", unit.os().as_str())
        .update_field("arch", unit.arch().as_str())
        .update_field("buildmode", unit.build_mode.as_flag())
        .update_field("package", &unit.package)
        .update_strs(unit.tags.iter().map(String::as_str))
        .update_strs(unit.flags.iter().map(String::as_str));

    // BTreeMap iteration is already sorted by key.
    digest.update_str(&unit.env.len().to_string());
    for (key, value) in &unit.env {
        digest.update_field(key, value);
    }

    let file_name = unit
        .artifact
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());
    digest
        .update_field("cc", &unit.cgo.compiler.to_string())
        .update_field("cflags", &unit.cgo.cflags)
        .update_opt(file_name.as_deref())
        .update_field("toolchain", &unit.toolchain_identity);

    Fingerprint(digest.finish())
}

/// Regular files under the module root, minus hidden entries and excluded
/// directories.
fn module_files(unit: &BuildUnit) -> Result<Vec<PathBuf>, BuildError> {
    let root = &unit.module_root;
    let excluded = &unit.inputs.excluded_dirs;

    let walker = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || (!is_hidden(entry.file_name()) && !is_excluded(entry.path(), excluded))
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
            BuildError::io(path, e)
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn is_excluded(path: &Path, excluded: &[PathBuf]) -> bool {
    excluded.iter().any(|dir| path.starts_with(dir))
}
