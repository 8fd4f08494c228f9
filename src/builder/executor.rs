//! Runs `go build` for a single build unit.
//!
//! The compiler writes into a staging directory created next to the final
//! artifact. Only a successful build renames its outputs into place, so a
//! failed, timed-out or cancelled run leaves any previous artifact intact
//! and never exposes a partial file at the declared path.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::builder::errors::BuildError;
use crate::builder::toolchain::ToolchainSpec;
use crate::core::unit::{BuildUnit, UnitId};
use crate::util::fs::ensure_dir;
use crate::util::process::{CancellationToken, Completion, ProcessBuilder};

/// Flags whose values `go build` only accepts once; repeated occurrences
/// are joined with spaces.
const MERGED_FLAGS: [&str; 3] = ["-asmflags", "-gcflags", "-ldflags"];

/// Outcome of one unit in one build invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildStatus {
    Succeeded,
    Failed,
    /// Up to date according to the fingerprint cache; nothing ran.
    Skipped,
}

/// Immutable record of what happened to a unit.
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub unit: UnitId,
    pub name: String,
    pub status: BuildStatus,
    pub artifact: PathBuf,
    /// Combined compiler output, verbatim.
    pub diagnostics: String,
    pub duration: Duration,
    pub error: Option<BuildError>,
}

impl BuildResult {
    pub fn succeeded(unit: &BuildUnit, diagnostics: String, duration: Duration) -> Self {
        BuildResult {
            unit: unit.id(),
            name: unit.name.clone(),
            status: BuildStatus::Succeeded,
            artifact: unit.artifact.clone(),
            diagnostics,
            duration,
            error: None,
        }
    }

    pub fn skipped(unit: &BuildUnit, duration: Duration) -> Self {
        BuildResult {
            unit: unit.id(),
            name: unit.name.clone(),
            status: BuildStatus::Skipped,
            artifact: unit.artifact.clone(),
            diagnostics: String::new(),
            duration,
            error: None,
        }
    }

    pub fn failed(
        unit: &BuildUnit,
        error: BuildError,
        diagnostics: String,
        duration: Duration,
    ) -> Self {
        BuildResult {
            unit: unit.id(),
            name: unit.name.clone(),
            status: BuildStatus::Failed,
            artifact: unit.artifact.clone(),
            diagnostics,
            duration,
            error: Some(error),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status == BuildStatus::Failed
    }
}

/// Invokes the Go toolchain. Makes no caching decisions.
#[derive(Debug, Clone, Default)]
pub struct BuildUnitExecutor {
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl BuildUnitExecutor {
    pub fn new(timeout: Option<Duration>, cancel: CancellationToken) -> Self {
        BuildUnitExecutor { timeout, cancel }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Build `unit` with `spec`.
    pub fn execute(&self, unit: &BuildUnit, spec: &ToolchainSpec) -> BuildResult {
        let start = Instant::now();
        match self.run(unit, spec) {
            Ok(diagnostics) => BuildResult::succeeded(unit, diagnostics, start.elapsed()),
            Err((error, diagnostics)) => {
                BuildResult::failed(unit, error, diagnostics, start.elapsed())
            }
        }
    }

    fn run(&self, unit: &BuildUnit, spec: &ToolchainSpec) -> Result<String, (BuildError, String)> {
        let no_output = |e: BuildError| (e, String::new());

        let (dir, file_name) = split_artifact(&unit.artifact).map_err(no_output)?;
        ensure_dir(dir).map_err(|e| no_output(BuildError::io(dir, e)))?;

        // Dropped on every exit path, which deletes partial outputs.
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(dir)
            .map_err(|e| no_output(BuildError::io(dir, e)))?;
        let staged = staging.path().join(file_name);

        let cmd = go_build_command(unit, spec, &staged);
        tracing::debug!("{}: {}", unit.name, cmd.display_command());

        let out = cmd
            .exec_supervised(self.timeout, &self.cancel)
            .map_err(|e| no_output(BuildError::io(&spec.go, format!("{:#}", e))))?;
        let diagnostics = out.output_lossy();

        match out.completion {
            Completion::Exited(status) if status.success() => {
                if !staged.is_file() {
                    return Err((
                        BuildError::io(&staged, "go build reported success but wrote no artifact"),
                        diagnostics,
                    ));
                }
                promote(staging.path(), dir, file_name)
                    .map_err(|e| (e, diagnostics.clone()))?;
                Ok(diagnostics)
            }
            Completion::Exited(status) => Err((
                BuildError::BuildFailure {
                    code: status.code(),
                    diagnostics: diagnostics.clone(),
                },
                diagnostics,
            )),
            Completion::TimedOut => {
                let seconds = self.timeout.map(|t| t.as_secs()).unwrap_or_default();
                tracing::warn!("{}: killed after {}s", unit.name, seconds);
                Err((BuildError::Timeout { seconds }, diagnostics))
            }
            Completion::Cancelled => Err((BuildError::Cancelled, diagnostics)),
        }
    }
}

/// Assemble the `go build` invocation for `unit`, writing to `output`.
pub fn go_build_command(unit: &BuildUnit, spec: &ToolchainSpec, output: &Path) -> ProcessBuilder {
    let mut cmd = ProcessBuilder::new(&spec.go)
        .args(["build", "-trimpath", "-o"])
        .arg(output)
        .args(["-buildmode", unit.build_mode.as_flag()]);

    if !unit.tags.is_empty() {
        cmd = cmd.arg("-tags").arg(unit.tags.join(","));
    }

    cmd = cmd.args(merge_flags(&unit.flags)).arg(&unit.package).cwd(&unit.module_root);

    for (key, value) in &spec.env {
        cmd = cmd.env(key, value);
    }
    if unit.cgo.enabled() && !unit.cgo.cflags.is_empty() {
        cmd = cmd.env("CGO_CFLAGS", &unit.cgo.cflags);
    }
    for (key, value) in &unit.env {
        cmd = cmd.env(key, value);
    }

    cmd
}

/// Collapse repeated `-asmflags`, `-gcflags` and `-ldflags` into one
/// occurrence each, appended after the remaining flags.
pub fn merge_flags(flags: &[String]) -> Vec<String> {
    let mut passthrough = Vec::new();
    let mut merged: [Vec<String>; 3] = Default::default();

    let mut iter = flags.iter();
    while let Some(flag) = iter.next() {
        let (name, inline) = match flag.split_once('=') {
            Some((name, value)) => (name, Some(value.to_string())),
            None => (flag.as_str(), None),
        };

        match MERGED_FLAGS.iter().position(|f| *f == name) {
            Some(slot) => match inline.or_else(|| iter.next().cloned()) {
                Some(value) => merged[slot].push(value),
                None => passthrough.push(flag.clone()),
            },
            None => passthrough.push(flag.clone()),
        }
    }

    for (name, values) in MERGED_FLAGS.iter().zip(merged) {
        if !values.is_empty() {
            passthrough.push(name.to_string());
            passthrough.push(values.join(" "));
        }
    }
    passthrough
}

fn split_artifact(artifact: &Path) -> Result<(&Path, &std::ffi::OsStr), BuildError> {
    match (artifact.parent(), artifact.file_name()) {
        (Some(dir), Some(name)) => Ok((dir, name)),
        _ => Err(BuildError::io(artifact, "artifact path has no file name")),
    }
}

/// Move staged outputs into `dir`. Sidecars (e.g. the c-shared header) go
/// first; the artifact itself is renamed last.
fn promote(staging: &Path, dir: &Path, artifact: &std::ffi::OsStr) -> Result<(), BuildError> {
    let entries = std::fs::read_dir(staging).map_err(|e| BuildError::io(staging, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| BuildError::io(staging, e))?;
        let name = entry.file_name();
        if name == artifact || !entry.path().is_file() {
            continue;
        }
        let target = dir.join(&name);
        std::fs::rename(entry.path(), &target).map_err(|e| BuildError::io(&target, e))?;
    }

    let target = dir.join(artifact);
    std::fs::rename(staging.join(artifact), &target).map_err(|e| BuildError::io(&target, e))
}
