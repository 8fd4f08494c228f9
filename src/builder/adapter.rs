//! Bridges build units onto a task graph.
//!
//! Every unit becomes a `compileGolang<Variant>` task; the aggregate
//! `compileGolang` task depends on all of them. A unit task fingerprints
//! its inputs, consults the cache store, and only resolves a toolchain and
//! runs `go build` on a miss.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;

use crate::builder::cache::{BuildCacheEntry, CacheStore};
use crate::builder::errors::BuildError;
use crate::builder::executor::{BuildResult, BuildStatus, BuildUnitExecutor};
use crate::builder::fingerprint::InputFingerprinter;
use crate::builder::graph::{TaskGraph, TaskOutcome, TaskSpec};
use crate::builder::toolchain::ToolchainResolver;
use crate::core::unit::{BuildUnit, COMPILE_TASK_PREFIX};
use crate::util::hash::sha256_file;

/// Lifecycle of one unit within a build invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitState {
    Pending,
    Fingerprinting,
    Resolving,
    Executing,
    Skipped,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal unit state transition {from} -> {to}")]
pub struct TransitionError {
    pub from: UnitState,
    pub to: UnitState,
}

impl UnitState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            UnitState::Skipped | UnitState::Succeeded | UnitState::Failed
        )
    }

    /// Move to `next`, if the lifecycle allows it.
    pub fn transition(self, next: UnitState) -> Result<UnitState, TransitionError> {
        use UnitState::*;

        let allowed = matches!(
            (self, next),
            (Pending, Fingerprinting)
                | (Fingerprinting, Skipped)
                | (Fingerprinting, Resolving)
                | (Fingerprinting, Failed)
                | (Resolving, Executing)
                | (Resolving, Failed)
                | (Executing, Succeeded)
                | (Executing, Failed)
        );
        if allowed {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnitState::Pending => "pending",
            UnitState::Fingerprinting => "fingerprinting",
            UnitState::Resolving => "resolving",
            UnitState::Executing => "executing",
            UnitState::Skipped => "skipped",
            UnitState::Succeeded => "succeeded",
            UnitState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Receives unit progress as it happens. Called from worker threads.
pub trait BuildObserver: Send + Sync {
    /// `go build` is about to run for `unit`.
    fn unit_started(&self, _unit: &BuildUnit) {}

    fn unit_finished(&self, _result: &BuildResult) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl BuildObserver for NoopObserver {}

/// Outcome of every unit in a build invocation.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub results: Vec<BuildResult>,
    /// Units that never ran (blocked or stopped by fail-fast).
    pub not_run: Vec<String>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.not_run.is_empty() && self.results.iter().all(|r| !r.is_failure())
    }

    pub fn failed(&self) -> impl Iterator<Item = &BuildResult> {
        self.results.iter().filter(|r| r.is_failure())
    }

    pub fn count(&self, status: BuildStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn result(&self, name: &str) -> Option<&BuildResult> {
        self.results.iter().find(|r| r.name == name)
    }
}

struct Shared {
    units: Vec<BuildUnit>,
    resolver: Arc<ToolchainResolver>,
    fingerprinter: InputFingerprinter,
    executor: Arc<BuildUnitExecutor>,
    cache: CacheStore,
    observer: Arc<dyn BuildObserver>,
    states: Mutex<Vec<UnitState>>,
    results: Mutex<Vec<Option<BuildResult>>>,
}

/// Registers build units as tasks and drives their incremental builds.
#[derive(Clone)]
pub struct TaskGraphAdapter {
    shared: Arc<Shared>,
}

impl TaskGraphAdapter {
    /// Name of the task depending on every unit task.
    pub const AGGREGATE_TASK: &'static str = COMPILE_TASK_PREFIX;

    pub fn new(
        units: Vec<BuildUnit>,
        resolver: Arc<ToolchainResolver>,
        executor: Arc<BuildUnitExecutor>,
        cache: CacheStore,
    ) -> Self {
        let count = units.len();
        TaskGraphAdapter {
            shared: Arc::new(Shared {
                units,
                resolver,
                fingerprinter: InputFingerprinter::new(),
                executor,
                cache,
                observer: Arc::new(NoopObserver),
                states: Mutex::new(vec![UnitState::Pending; count]),
                results: Mutex::new(vec![None; count]),
            }),
        }
    }

    /// Attach an observer. Must be called before tasks are registered.
    pub fn with_observer(self, observer: Arc<dyn BuildObserver>) -> Self {
        match Arc::try_unwrap(self.shared) {
            Ok(mut shared) => {
                shared.observer = observer;
                TaskGraphAdapter {
                    shared: Arc::new(shared),
                }
            }
            Err(shared) => {
                tracing::warn!("observer attached after registration; ignoring it");
                TaskGraphAdapter { shared }
            }
        }
    }

    pub fn units(&self) -> &[BuildUnit] {
        &self.shared.units
    }

    /// Register one task per unit plus the aggregate task.
    pub fn register(&self, graph: &mut dyn TaskGraph) -> Result<(), BuildError> {
        let mut aggregate = TaskSpec::new(
            Self::AGGREGATE_TASK,
            "Compiles every configured Go variant",
        );

        for (index, unit) in self.shared.units.iter().enumerate() {
            let shared = Arc::clone(&self.shared);
            let name = unit.task_name();
            let task = TaskSpec::new(&name, format!("Compiles the Go module for {}", unit.target))
                .input(&unit.module_root)
                .output(&unit.artifact)
                .action(move || outcome(shared.run_unit(index).status));

            graph.register(task)?;
            aggregate = aggregate.depends_on(name);
        }

        graph.register(aggregate)
    }

    /// Build one unit directly, outside of any task graph.
    pub fn run_unit(&self, index: usize) -> Option<BuildResult> {
        (index < self.shared.units.len()).then(|| self.shared.run_unit(index))
    }

    pub fn state(&self, index: usize) -> Option<UnitState> {
        self.shared.lock_states().get(index).copied()
    }

    /// Results gathered so far.
    pub fn report(&self) -> BuildReport {
        let results = self.shared.lock_results();
        let mut report = BuildReport::default();
        for (unit, result) in self.shared.units.iter().zip(results.iter()) {
            match result {
                Some(result) => report.results.push(result.clone()),
                None => report.not_run.push(unit.name.clone()),
            }
        }
        report
    }
}

fn outcome(status: BuildStatus) -> TaskOutcome {
    match status {
        BuildStatus::Succeeded => TaskOutcome::Succeeded,
        BuildStatus::Skipped => TaskOutcome::UpToDate,
        BuildStatus::Failed => TaskOutcome::Failed,
    }
}

impl Shared {
    fn run_unit(&self, index: usize) -> BuildResult {
        let unit = &self.units[index];
        let start = Instant::now();

        let result = match self.advance(index, UnitState::Fingerprinting) {
            Ok(()) => self.build(index, unit, start),
            Err(e) => BuildResult::failed(
                unit,
                BuildError::configuration(e.to_string()),
                String::new(),
                start.elapsed(),
            ),
        };

        self.lock_results()[index] = Some(result.clone());
        self.observer.unit_finished(&result);
        result
    }

    fn build(&self, index: usize, unit: &BuildUnit, start: Instant) -> BuildResult {
        let id = unit.id();

        let fingerprint = match self.fingerprinter.fingerprint(unit) {
            Ok(fingerprint) => fingerprint,
            Err(e) => return self.fail(index, unit, e, String::new(), start),
        };

        if let Some(entry) = self.cache.load(&id) {
            if entry.is_fresh(&fingerprint, &unit.artifact) && self.same_toolchain(unit, &entry) {
                tracing::info!("{}: up to date ({})", unit.name, fingerprint.short());
                return self.finish(index, UnitState::Skipped, BuildResult::skipped(unit, start.elapsed()));
            }
            tracing::debug!("{}: cache entry is stale", unit.name);
        }

        if let Err(e) = self.advance(index, UnitState::Resolving) {
            return self.fail(index, unit, BuildError::configuration(e.to_string()), String::new(), start);
        }
        let spec = match self.resolver.resolve(unit.os(), unit.arch(), &unit.cgo.compiler) {
            Ok(spec) => spec,
            Err(e) => return self.fail(index, unit, e, String::new(), start),
        };

        if let Err(e) = self.advance(index, UnitState::Executing) {
            return self.fail(index, unit, BuildError::configuration(e.to_string()), String::new(), start);
        }
        self.observer.unit_started(unit);
        tracing::info!("{}: building for {}", unit.name, unit.target);

        let result = self.executor.execute(unit, &spec);
        if result.is_failure() {
            return self.finish(index, UnitState::Failed, result);
        }

        // Recorded before the task reports completion. A failed write only
        // costs a rebuild next time.
        match sha256_file(&unit.artifact) {
            Ok(checksum) => {
                let entry = BuildCacheEntry::new(&id, fingerprint, &unit.artifact, checksum)
                    .with_toolchain(&spec);
                if let Err(e) = self.cache.store(&id, &entry) {
                    tracing::warn!("{}: could not record cache entry: {}", unit.name, e);
                }
            }
            Err(e) => tracing::warn!("{}: could not checksum artifact: {}", unit.name, e),
        }

        self.finish(index, UnitState::Succeeded, result)
    }

    /// Whether the toolchain the unit resolves to today built the cached
    /// artifact. A resolution failure reads as a mismatch and is reported
    /// again from the Resolving step.
    fn same_toolchain(&self, unit: &BuildUnit, entry: &BuildCacheEntry) -> bool {
        match self.resolver.resolve(unit.os(), unit.arch(), &unit.cgo.compiler) {
            Ok(spec) if entry.built_with(&spec) => true,
            Ok(spec) => {
                tracing::debug!(
                    "{}: toolchain changed ({} -> {})",
                    unit.name,
                    entry.toolchain,
                    spec.identity()
                );
                false
            }
            Err(_) => false,
        }
    }

    fn fail(
        &self,
        index: usize,
        unit: &BuildUnit,
        error: BuildError,
        diagnostics: String,
        start: Instant,
    ) -> BuildResult {
        tracing::debug!("{}: {}", unit.name, error);
        let result = BuildResult::failed(unit, error, diagnostics, start.elapsed());
        self.finish(index, UnitState::Failed, result)
    }

    fn finish(&self, index: usize, state: UnitState, result: BuildResult) -> BuildResult {
        if let Err(e) = self.advance(index, state) {
            tracing::error!("{}: {}", result.name, e);
        }
        result
    }

    fn advance(&self, index: usize, next: UnitState) -> Result<(), TransitionError> {
        let mut states = self.lock_states();
        states[index] = states[index].transition(next)?;
        Ok(())
    }

    fn lock_states(&self) -> std::sync::MutexGuard<'_, Vec<UnitState>> {
        self.states
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_results(&self) -> std::sync::MutexGuard<'_, Vec<Option<BuildResult>>> {
        self.results
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_transitions() {
        use UnitState::*;

        let state = Pending.transition(Fingerprinting).unwrap();
        assert_eq!(state.transition(Skipped), Ok(Skipped));
        let state = state.transition(Resolving).unwrap();
        assert_eq!(state.transition(Failed), Ok(Failed));
        let state = state.transition(Executing).unwrap();
        assert_eq!(state.transition(Succeeded), Ok(Succeeded));
    }

    #[test]
    fn test_illegal_transitions() {
        use UnitState::*;

        assert!(Pending.transition(Executing).is_err());
        assert!(Fingerprinting.transition(Succeeded).is_err());
        assert!(Resolving.transition(Skipped).is_err());
        for terminal in [Skipped, Succeeded, Failed] {
            assert!(terminal.is_terminal());
            for next in [Pending, Fingerprinting, Resolving, Executing, Skipped, Succeeded, Failed] {
                assert!(terminal.transition(next).is_err());
            }
        }
    }

    #[cfg(unix)]
    mod with_fake_go {
        use super::*;
        use crate::builder::graph::{FailurePolicy, LocalTaskGraph, TaskStatus};
        use crate::builder::toolchain::ToolchainOverrides;
        use crate::core::target::{BuildMode, GoArch, GoOs, TargetPair};
        use crate::core::unit::{CcRequirement, CgoConfig, InputSpec};
        use crate::test_support::{fake_go, go_module, invocations};
        use crate::util::fs::normalize_path;
        use crate::util::process::CancellationToken;
        use std::collections::{BTreeMap, HashMap};
        use std::fs;
        use std::path::{Path, PathBuf};
        use tempfile::TempDir;

        struct Project {
            tmp: TempDir,
            go: PathBuf,
        }

        impl Project {
            fn new() -> Self {
                let tmp = TempDir::new().unwrap();
                let go = fake_go(&tmp.path().join("bin"));
                Project { tmp, go }
            }

            fn root(&self) -> PathBuf {
                normalize_path(self.tmp.path())
            }

            fn invocations(&self) -> Vec<String> {
                invocations(&self.tmp.path().join("bin"))
            }

            fn unit(&self, module: &Path, name: &str, os: GoOs, arch: GoArch) -> BuildUnit {
                let out = self.root().join("out");
                BuildUnit {
                    name: name.to_string(),
                    aliases: Vec::new(),
                    module_root: normalize_path(module),
                    target: TargetPair::new(os, arch),
                    build_mode: BuildMode::Executable,
                    package: ".".to_string(),
                    tags: Vec::new(),
                    flags: Vec::new(),
                    env: BTreeMap::new(),
                    cgo: CgoConfig::disabled(),
                    artifact: out.join(name).join("core"),
                    inputs: InputSpec {
                        base: self.root(),
                        globs: Vec::new(),
                        excluded_dirs: vec![out],
                    },
                    toolchain_identity: "go=test;ndk=auto".to_string(),
                }
            }

            fn adapter(&self, units: Vec<BuildUnit>, cancel: CancellationToken) -> TaskGraphAdapter {
                let resolver = ToolchainResolver::with_env(
                    ToolchainOverrides {
                        go: Some(self.go.clone()),
                        ndk: None,
                    },
                    HashMap::new(),
                );
                TaskGraphAdapter::new(
                    units,
                    Arc::new(resolver),
                    Arc::new(BuildUnitExecutor::new(None, cancel)),
                    CacheStore::new(self.root().join(".goforge").join("cache")),
                )
            }

            /// Register and run everything, returning the unit report.
            fn build(&self, units: Vec<BuildUnit>, policy: FailurePolicy) -> BuildReport {
                let cancel = CancellationToken::new();
                let adapter = self.adapter(units, cancel.clone());
                let mut graph = LocalTaskGraph::new(policy, Some(1), cancel);
                adapter.register(&mut graph).unwrap();
                graph.run(&[TaskGraphAdapter::AGGREGATE_TASK]).unwrap();
                adapter.report()
            }
        }

        #[test]
        fn test_registers_unit_and_aggregate_tasks() {
            let project = Project::new();
            let module = go_module(project.tmp.path(), "core");
            let units = vec![
                project.unit(&module, "arm64-v8a", GoOs::Android, GoArch::Arm64),
                project.unit(&module, "x86_64", GoOs::Android, GoArch::Amd64),
            ];
            let adapter = project.adapter(units, CancellationToken::new());
            let mut graph = LocalTaskGraph::new(FailurePolicy::Continue, None, CancellationToken::new());
            adapter.register(&mut graph).unwrap();

            let names: Vec<&str> = graph.tasks().map(|t| t.name.as_str()).collect();
            assert_eq!(
                names,
                vec!["compileGolangArm64V8a", "compileGolangX8664", "compileGolang"]
            );
            let aggregate = graph.task("compileGolang").unwrap();
            assert_eq!(aggregate.depends_on.len(), 2);
            let unit_task = graph.task("compileGolangArm64V8a").unwrap();
            assert_eq!(unit_task.outputs, vec![adapter.units()[0].artifact.clone()]);
        }

        #[test]
        fn test_second_run_skips_everything() {
            let project = Project::new();
            let module = go_module(project.tmp.path(), "core");
            let units = vec![
                project.unit(&module, "linux-amd64", GoOs::Linux, GoArch::Amd64),
                project.unit(&module, "android-arm64", GoOs::Android, GoArch::Arm64),
            ];

            let first = project.build(units.clone(), FailurePolicy::Continue);
            assert_eq!(first.count(BuildStatus::Succeeded), 2);
            assert_ne!(units[0].id(), units[1].id());

            let second = project.build(units, FailurePolicy::Continue);
            assert_eq!(second.count(BuildStatus::Skipped), 2);
            assert_eq!(project.invocations().len(), 2);
        }

        #[test]
        fn test_change_in_one_module_rebuilds_only_its_units() {
            let project = Project::new();
            let app = go_module(project.tmp.path(), "app");
            let lib = go_module(project.tmp.path(), "lib");
            let units = vec![
                project.unit(&app, "app", GoOs::Linux, GoArch::Amd64),
                project.unit(&lib, "lib", GoOs::Linux, GoArch::Amd64),
            ];
            project.build(units.clone(), FailurePolicy::Continue);

            let store = CacheStore::new(project.root().join(".goforge").join("cache"));
            let lib_entry = fs::read(store.entry_path(&units[1].id())).unwrap();

            fs::write(app.join("main.go"), "package main\n\nfunc main() { }\n").unwrap();
            let report = project.build(units.clone(), FailurePolicy::Continue);

            assert_eq!(report.result("app").unwrap().status, BuildStatus::Succeeded);
            assert_eq!(report.result("lib").unwrap().status, BuildStatus::Skipped);
            assert_eq!(fs::read(store.entry_path(&units[1].id())).unwrap(), lib_entry);
        }

        #[test]
        fn test_corrupt_cache_entry_rebuilds() {
            let project = Project::new();
            let module = go_module(project.tmp.path(), "core");
            let units = vec![project.unit(&module, "linux-amd64", GoOs::Linux, GoArch::Amd64)];
            project.build(units.clone(), FailurePolicy::Continue);

            let store = CacheStore::new(project.root().join(".goforge").join("cache"));
            fs::write(store.entry_path(&units[0].id()), "{\"version\": 1, \"unit\"").unwrap();

            let report = project.build(units, FailurePolicy::Continue);
            assert_eq!(report.count(BuildStatus::Succeeded), 1);
            assert_eq!(project.invocations().len(), 2);
        }

        #[test]
        fn test_deleted_artifact_rebuilds() {
            let project = Project::new();
            let module = go_module(project.tmp.path(), "core");
            let units = vec![project.unit(&module, "linux-amd64", GoOs::Linux, GoArch::Amd64)];
            project.build(units.clone(), FailurePolicy::Continue);

            fs::remove_file(&units[0].artifact).unwrap();
            let report = project.build(units.clone(), FailurePolicy::Continue);
            assert_eq!(report.count(BuildStatus::Succeeded), 1);
            assert!(units[0].artifact.is_file());
        }

        #[test]
        fn test_renamed_variant_rebuilds_into_new_path() {
            let project = Project::new();
            let module = go_module(project.tmp.path(), "core");
            let before = project.unit(&module, "arm64", GoOs::Android, GoArch::Arm64);
            project.build(vec![before.clone()], FailurePolicy::Continue);

            let after = project.unit(&module, "arm64-v8a", GoOs::Android, GoArch::Arm64);
            assert_eq!(before.id(), after.id());
            let report = project.build(vec![after.clone()], FailurePolicy::Continue);

            assert_eq!(report.result("arm64-v8a").unwrap().status, BuildStatus::Succeeded);
            assert!(after.artifact.is_file());
            assert_eq!(project.invocations().len(), 2);
        }

        #[test]
        fn test_moved_output_dir_rebuilds() {
            let project = Project::new();
            let module = go_module(project.tmp.path(), "core");
            let unit = project.unit(&module, "linux-amd64", GoOs::Linux, GoArch::Amd64);
            project.build(vec![unit.clone()], FailurePolicy::Continue);

            let mut moved = unit.clone();
            moved.artifact = project.root().join("dist").join("linux-amd64").join("core");
            let report = project.build(vec![moved.clone()], FailurePolicy::Continue);

            assert_eq!(report.count(BuildStatus::Succeeded), 1);
            assert!(moved.artifact.is_file());
        }

        #[test]
        fn test_different_toolchain_rebuilds() {
            let project = Project::new();
            let module = go_module(project.tmp.path(), "core");
            let units = vec![project.unit(&module, "linux-amd64", GoOs::Linux, GoArch::Amd64)];
            project.build(units.clone(), FailurePolicy::Continue);

            // Pretend an older Go produced the cached artifact.
            let store = CacheStore::new(project.root().join(".goforge").join("cache"));
            let mut entry = store.load(&units[0].id()).unwrap();
            assert!(entry.toolchain.starts_with("go1.22.3 "));
            entry.toolchain = entry.toolchain.replace("go1.22.3", "go1.21.0");
            store.store(&units[0].id(), &entry).unwrap();

            let report = project.build(units.clone(), FailurePolicy::Continue);
            assert_eq!(report.count(BuildStatus::Succeeded), 1);
            assert_eq!(project.invocations().len(), 2);

            let third = project.build(units, FailurePolicy::Continue);
            assert_eq!(third.count(BuildStatus::Skipped), 1);
        }

        #[test]
        fn test_toolchain_failure_does_not_block_siblings() {
            let project = Project::new();
            let module = go_module(project.tmp.path(), "core");
            let mut needs_ndk = project.unit(&module, "arm64-v8a", GoOs::Android, GoArch::Arm64);
            needs_ndk.cgo = CgoConfig {
                compiler: CcRequirement::Android { api: 21 },
                cflags: "-O3".to_string(),
            };
            let units = vec![
                needs_ndk,
                project.unit(&module, "linux-amd64", GoOs::Linux, GoArch::Amd64),
            ];

            let report = project.build(units.clone(), FailurePolicy::Continue);

            let failed = report.result("arm64-v8a").unwrap();
            assert!(matches!(failed.error, Some(BuildError::ToolchainNotFound { .. })));
            assert_eq!(
                report.result("linux-amd64").unwrap().status,
                BuildStatus::Succeeded
            );
            assert!(!units[0].artifact.exists());
            assert!(!report.is_success());
        }

        #[test]
        fn test_failed_build_writes_no_cache_entry() {
            let project = Project::new();
            let module = go_module(project.tmp.path(), "core");
            fs::write(module.join("FAIL"), "").unwrap();
            let units = vec![project.unit(&module, "linux-amd64", GoOs::Linux, GoArch::Amd64)];

            let report = project.build(units.clone(), FailurePolicy::Continue);
            let result = report.result("linux-amd64").unwrap();
            assert!(result.diagnostics.contains("syntax error"));

            let store = CacheStore::new(project.root().join(".goforge").join("cache"));
            assert!(store.load(&units[0].id()).is_none());
        }

        #[test]
        fn test_fail_fast_stops_scheduling() {
            let project = Project::new();
            let module = go_module(project.tmp.path(), "core");
            fs::write(module.join("FAIL-linux-amd64"), "").unwrap();
            let units = vec![
                project.unit(&module, "linux-amd64", GoOs::Linux, GoArch::Amd64),
                project.unit(&module, "linux-arm64", GoOs::Linux, GoArch::Arm64),
                project.unit(&module, "windows-amd64", GoOs::Windows, GoArch::Amd64),
            ];

            let report = project.build(units, FailurePolicy::FailFast);

            assert_eq!(project.invocations().len(), 1);
            assert_eq!(report.results.len(), 1);
            assert_eq!(report.not_run, vec!["linux-arm64", "windows-amd64"]);
        }

        #[test]
        fn test_continue_runs_independent_units() {
            let project = Project::new();
            let module = go_module(project.tmp.path(), "core");
            fs::write(module.join("FAIL-linux-amd64"), "").unwrap();
            let units = vec![
                project.unit(&module, "linux-amd64", GoOs::Linux, GoArch::Amd64),
                project.unit(&module, "linux-arm64", GoOs::Linux, GoArch::Arm64),
            ];

            let cancel = CancellationToken::new();
            let adapter = project.adapter(units, cancel.clone());
            let mut graph = LocalTaskGraph::new(FailurePolicy::Continue, Some(2), cancel);
            adapter.register(&mut graph).unwrap();
            let tasks = graph.run(&[TaskGraphAdapter::AGGREGATE_TASK]).unwrap();

            assert_eq!(tasks.status("compileGolangLinuxAmd64"), Some(TaskStatus::Failed));
            assert_eq!(tasks.status("compileGolangLinuxArm64"), Some(TaskStatus::Succeeded));
            assert_eq!(tasks.status("compileGolang"), Some(TaskStatus::Blocked));
            assert_eq!(adapter.state(0), Some(UnitState::Failed));
            assert_eq!(adapter.state(1), Some(UnitState::Succeeded));
        }

        #[test]
        fn test_run_unit_directly() {
            let project = Project::new();
            let module = go_module(project.tmp.path(), "core");
            let adapter = project.adapter(
                vec![project.unit(&module, "linux-amd64", GoOs::Linux, GoArch::Amd64)],
                CancellationToken::new(),
            );
            assert_eq!(adapter.state(0), Some(UnitState::Pending));
            let result = adapter.run_unit(0).unwrap();
            assert_eq!(result.status, BuildStatus::Succeeded);
            assert!(adapter.run_unit(1).is_none());
        }
    }
}
