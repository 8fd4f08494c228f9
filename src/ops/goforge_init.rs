//! Implementation of `goforge init`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::core::manifest::{template, MANIFEST_NAME};

/// Options for initializing a project.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Go module directory, relative to the project root
    pub module_dir: String,

    /// Go module path for a scaffolded module (defaults to the project
    /// directory name)
    pub module_path: Option<String>,
}

impl Default for InitOptions {
    fn default() -> Self {
        InitOptions {
            module_dir: "src/main/golang".to_string(),
            module_path: None,
        }
    }
}

/// Write `GoForge.toml` into `path`, scaffolding a Go module when the module
/// directory does not exist yet. Returns the manifest path.
pub fn init_project(path: &Path, opts: &InitOptions) -> Result<PathBuf> {
    let manifest_path = path.join(MANIFEST_NAME);
    if manifest_path.exists() {
        bail!("`{}` already exists in `{}`", MANIFEST_NAME, path.display());
    }

    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))?;

    let module = path.join(&opts.module_dir);
    if !module.exists() {
        let module_path = opts.module_path.clone().unwrap_or_else(|| {
            path.canonicalize()
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                .unwrap_or_else(|| "gomodule".to_string())
        });
        scaffold_module(&module, &module_path)?;
    }

    fs::write(&manifest_path, template(&opts.module_dir))
        .with_context(|| format!("failed to write {}", manifest_path.display()))?;

    Ok(manifest_path)
}

fn scaffold_module(dir: &Path, module_path: &str) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create directory: {}", dir.display()))?;

    fs::write(
        dir.join("go.mod"),
        format!("module {}\n\ngo 1.21\n", module_path),
    )
    .context("failed to write go.mod")?;

    fs::write(
        dir.join("main.go"),
        r#"package main

import "C"

//export Version
func Version() *C.char {
	return C.CString("0.1.0")
}

func main() {}
"#,
    )
    .context("failed to write main.go")?;

    Ok(())
}
