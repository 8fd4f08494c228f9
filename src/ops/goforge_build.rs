//! Implementation of `goforge build` and `goforge tasks`.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use crate::builder::adapter::{BuildObserver, BuildReport, TaskGraphAdapter};
use crate::builder::cache::CacheStore;
use crate::builder::errors::BuildError;
use crate::builder::events::BuildEvent;
use crate::builder::executor::{BuildResult, BuildStatus, BuildUnitExecutor};
use crate::builder::graph::{FailurePolicy, LocalTaskGraph};
use crate::builder::matrix::{parse_targets, BuildTargetMatrix};
use crate::builder::toolchain::ToolchainResolver;
use crate::core::manifest::Manifest;
use crate::core::unit::BuildUnit;
use crate::util::config::Config;
use crate::util::context::GlobalContext;
use crate::util::process::CancellationToken;
use crate::util::shell::{Progress, Shell, Status};

/// Options for the build command.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Variant or task names to build (empty = all)
    pub variants: Vec<String>,

    /// Only build units for these `os/arch` pairs (empty = all)
    pub targets: Vec<String>,

    /// Command-line configuration layer
    pub config: Config,
}

/// A manifest with its effective configuration and selected units.
#[derive(Debug, Clone)]
pub struct BuildSession {
    pub manifest: Manifest,
    pub config: Config,
    pub units: Vec<BuildUnit>,
}

/// One registered task, for `goforge tasks`.
#[derive(Debug, Clone)]
pub struct TaskSummary {
    pub name: String,
    pub description: String,
    pub outputs: Vec<PathBuf>,
    pub depends_on: Vec<String>,
}

/// Load the manifest, layer configuration and expand the selected units.
pub fn plan(ctx: &GlobalContext, opts: &BuildOptions) -> Result<BuildSession> {
    let manifest = ctx.load_manifest()?;
    let mut config = ctx.config(&manifest);
    config.merge(opts.config.clone());

    let units = BuildTargetMatrix::new(&manifest)
        .with_overrides(config.toolchain_overrides())
        .expand()?;
    let units = select_units(units, &opts.variants, &opts.targets)?;

    Ok(BuildSession {
        manifest,
        config,
        units,
    })
}

/// Narrow expanded units to the requested variants and targets.
pub fn select_units(
    units: Vec<BuildUnit>,
    variants: &[String],
    targets: &[String],
) -> Result<Vec<BuildUnit>, BuildError> {
    for requested in variants {
        let known = units.iter().any(|u| u.answers_to(requested));
        if !known {
            let available: Vec<&str> = units.iter().map(|u| u.name.as_str()).collect();
            return Err(BuildError::configuration(format!(
                "unknown variant `{}` (available: {})",
                requested,
                available.join(", ")
            )));
        }
    }

    let pairs: HashSet<_> = parse_targets(targets)?.into_iter().collect();

    let selected: Vec<BuildUnit> = units
        .into_iter()
        .filter(|u| variants.is_empty() || variants.iter().any(|v| u.answers_to(v)))
        .filter(|u| pairs.is_empty() || pairs.contains(&u.target))
        .collect();

    if selected.is_empty() {
        return Err(BuildError::configuration(format!(
            "no configured variant builds {}",
            targets.join(", ")
        )));
    }
    Ok(selected)
}

/// Build every unit of a session.
pub fn run(session: &BuildSession, observer: Arc<dyn BuildObserver>) -> Result<BuildReport> {
    let config = &session.config;
    let cancel = CancellationToken::new();

    let resolver = Arc::new(ToolchainResolver::new(config.toolchain_overrides()));
    let executor = Arc::new(BuildUnitExecutor::new(config.timeout(), cancel.clone()));
    let cache = CacheStore::new(session.manifest.cache_dir());

    let adapter = TaskGraphAdapter::new(session.units.clone(), resolver, executor, cache)
        .with_observer(observer);

    let policy = if config.fail_fast() {
        FailurePolicy::FailFast
    } else {
        FailurePolicy::Continue
    };
    let mut graph = LocalTaskGraph::new(policy, config.build.jobs, cancel);
    adapter.register(&mut graph)?;

    tracing::debug!(
        "running {} units ({:?}, jobs: {:?})",
        session.units.len(),
        policy,
        config.build.jobs
    );
    graph.run(&[TaskGraphAdapter::AGGREGATE_TASK])?;

    Ok(adapter.report())
}

/// Plan and run a build.
pub fn build(
    ctx: &GlobalContext,
    opts: &BuildOptions,
    observer: Arc<dyn BuildObserver>,
) -> Result<BuildReport> {
    let session = plan(ctx, opts)?;
    run(&session, observer)
}

/// Tasks a build would register, in registration order.
pub fn list_tasks(ctx: &GlobalContext, opts: &BuildOptions) -> Result<Vec<TaskSummary>> {
    let session = plan(ctx, opts)?;

    // Never executed; only used to validate and order the registrations.
    let resolver = Arc::new(ToolchainResolver::new(session.config.toolchain_overrides()));
    let adapter = TaskGraphAdapter::new(
        session.units,
        resolver,
        Arc::new(BuildUnitExecutor::default()),
        CacheStore::new(session.manifest.cache_dir()),
    );
    let mut graph = LocalTaskGraph::new(FailurePolicy::Continue, None, CancellationToken::new());
    adapter.register(&mut graph)?;

    Ok(graph
        .tasks()
        .map(|task| TaskSummary {
            name: task.name.clone(),
            description: task.description.clone(),
            outputs: task.outputs.clone(),
            depends_on: task.depends_on.clone(),
        })
        .collect())
}

/// Reports unit progress on a [`Shell`]: status lines and a progress bar in
/// human mode, [`BuildEvent`]s in JSON mode.
pub struct ShellReporter {
    shell: Arc<Shell>,
    progress: Progress,
}

impl ShellReporter {
    pub fn new(shell: Arc<Shell>, units: &[BuildUnit]) -> Self {
        shell.event(&BuildEvent::started(
            units.iter().map(|u| u.name.clone()).collect(),
        ));
        let progress = shell.progress(units.len() as u64, "Building");
        ShellReporter { shell, progress }
    }

    /// Clear the progress bar.
    pub fn finish(&self) {
        self.progress.finish();
    }
}

impl BuildObserver for ShellReporter {
    fn unit_started(&self, unit: &BuildUnit) {
        self.shell
            .status(Status::Compiling, format!("{} ({})", unit.name, unit.target));
        self.shell
            .event(&BuildEvent::unit_started(&unit.name, unit.target));
    }

    fn unit_finished(&self, result: &BuildResult) {
        let label = format!("{} ({})", result.name, result.unit.target);
        match result.status {
            BuildStatus::Succeeded => {
                if self.shell.is_verbose() {
                    self.shell.print_block(&result.diagnostics);
                }
            }
            BuildStatus::Skipped => self.shell.status(Status::Fresh, label),
            BuildStatus::Failed => {
                let reason = result
                    .error
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "failed".to_string());
                self.shell
                    .status(Status::Failed, format!("{}: {}", label, reason));
                self.shell.print_block(&result.diagnostics);
            }
        }
        self.shell.event(&BuildEvent::unit_finished(result));
        self.progress.inc(1);
    }
}
