//! Task graph contract and the built-in local host.
//!
//! Hosts accept named tasks with declared inputs, outputs and dependencies.
//! [`LocalTaskGraph`] runs a set of requested tasks plus their transitive
//! dependencies in dependency waves; tasks of one wave run in parallel on a
//! rayon pool.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use rayon::prelude::*;
use serde::Serialize;

use crate::builder::errors::BuildError;
use crate::util::process::CancellationToken;

/// Work performed by a task.
pub type TaskAction = Arc<dyn Fn() -> TaskOutcome + Send + Sync>;

/// What a task's action reports back to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskOutcome {
    Succeeded,
    UpToDate,
    Failed,
}

/// A task as registered with a host.
#[derive(Clone)]
pub struct TaskSpec {
    pub name: String,
    pub description: String,
    pub inputs: Vec<PathBuf>,
    pub outputs: Vec<PathBuf>,
    pub depends_on: Vec<String>,
    /// `None` for lifecycle tasks that only aggregate their dependencies.
    pub action: Option<TaskAction>,
}

impl TaskSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        TaskSpec {
            name: name.into(),
            description: description.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            depends_on: Vec::new(),
            action: None,
        }
    }

    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.inputs.push(path.into());
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.outputs.push(path.into());
        self
    }

    pub fn depends_on(mut self, task: impl Into<String>) -> Self {
        self.depends_on.push(task.into());
        self
    }

    pub fn action(mut self, action: impl Fn() -> TaskOutcome + Send + Sync + 'static) -> Self {
        self.action = Some(Arc::new(action));
        self
    }
}

impl fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSpec")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("depends_on", &self.depends_on)
            .field("action", &self.action.is_some())
            .finish()
    }
}

/// Something tasks can be registered with.
pub trait TaskGraph {
    fn register(&mut self, task: TaskSpec) -> Result<(), BuildError>;
}

/// How the local host reacts to a failed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Start nothing new and cancel in-flight work.
    FailFast,
    /// Keep running everything that does not depend on the failure.
    #[default]
    Continue,
}

/// Final status of a task in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Succeeded,
    UpToDate,
    Failed,
    /// A dependency failed.
    Blocked,
    /// Never started because a fail-fast run was already stopping.
    NotRun,
}

impl TaskStatus {
    fn is_ok(self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::UpToDate)
    }
}

impl From<TaskOutcome> for TaskStatus {
    fn from(outcome: TaskOutcome) -> Self {
        match outcome {
            TaskOutcome::Succeeded => TaskStatus::Succeeded,
            TaskOutcome::UpToDate => TaskStatus::UpToDate,
            TaskOutcome::Failed => TaskStatus::Failed,
        }
    }
}

/// Statuses of every task touched by a run, in execution order.
#[derive(Debug, Clone, Default)]
pub struct TaskRunReport {
    pub tasks: Vec<(String, TaskStatus)>,
}

impl TaskRunReport {
    pub fn status(&self, name: &str) -> Option<TaskStatus> {
        self.tasks
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, status)| *status)
    }

    pub fn is_success(&self) -> bool {
        self.tasks.iter().all(|(_, status)| status.is_ok())
    }

    pub fn failed(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|(_, status)| *status == TaskStatus::Failed)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// In-process task host.
///
/// Dependencies must be registered before their dependents, so the graph
/// is acyclic by construction. Edges point from a dependency to its
/// dependent.
pub struct LocalTaskGraph {
    graph: DiGraph<TaskSpec, ()>,
    index: HashMap<String, NodeIndex>,
    policy: FailurePolicy,
    jobs: Option<usize>,
    cancel: CancellationToken,
}

impl LocalTaskGraph {
    pub fn new(policy: FailurePolicy, jobs: Option<usize>, cancel: CancellationToken) -> Self {
        LocalTaskGraph {
            graph: DiGraph::new(),
            index: HashMap::new(),
            policy,
            jobs,
            cancel,
        }
    }

    pub fn task(&self, name: &str) -> Option<&TaskSpec> {
        self.index.get(name).map(|&node| &self.graph[node])
    }

    /// All registered tasks, in registration order.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskSpec> {
        self.graph.node_indices().map(move |node| &self.graph[node])
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Run `targets` and everything they depend on.
    pub fn run(&self, targets: &[&str]) -> Result<TaskRunReport, BuildError> {
        let selected = self.closure(targets)?;
        let waves = self.waves(&selected);

        let pool = {
            let mut builder = rayon::ThreadPoolBuilder::new();
            if let Some(jobs) = self.jobs {
                builder = builder.num_threads(jobs);
            }
            builder
                .build()
                .map_err(|e| BuildError::configuration(format!("thread pool: {}", e)))?
        };

        let stopping = AtomicBool::new(false);
        let mut statuses: HashMap<NodeIndex, TaskStatus> = HashMap::new();
        let mut report = TaskRunReport::default();

        for wave in waves {
            let mut runnable = Vec::new();
            for node in wave {
                let blocked = self
                    .graph
                    .neighbors_directed(node, Direction::Incoming)
                    .any(|dep| statuses.get(&dep).is_some_and(|s| !s.is_ok()));
                if blocked {
                    tracing::debug!("{}: blocked by a failed dependency", self.graph[node].name);
                    statuses.insert(node, TaskStatus::Blocked);
                    report.tasks.push((self.graph[node].name.clone(), TaskStatus::Blocked));
                } else {
                    runnable.push(node);
                }
            }

            let finished: Vec<(NodeIndex, TaskStatus)> = pool.install(|| {
                runnable
                    .par_iter()
                    .map(|&node| (node, self.run_task(node, &stopping)))
                    .collect()
            });

            for (node, status) in finished {
                statuses.insert(node, status);
                report.tasks.push((self.graph[node].name.clone(), status));
            }
        }

        Ok(report)
    }

    fn run_task(&self, node: NodeIndex, stopping: &AtomicBool) -> TaskStatus {
        let task = &self.graph[node];
        if stopping.load(Ordering::SeqCst) {
            return TaskStatus::NotRun;
        }

        let status = match task.action {
            Some(ref action) => TaskStatus::from(action()),
            None => TaskStatus::UpToDate,
        };

        if status == TaskStatus::Failed && self.policy == FailurePolicy::FailFast {
            tracing::debug!("{} failed; stopping", task.name);
            stopping.store(true, Ordering::SeqCst);
            self.cancel.cancel();
        }
        status
    }

    /// Requested tasks plus their transitive dependencies.
    fn closure(&self, targets: &[&str]) -> Result<HashSet<NodeIndex>, BuildError> {
        let mut selected = HashSet::new();
        let mut stack = Vec::new();
        for name in targets {
            let node = self.index.get(*name).ok_or_else(|| {
                BuildError::configuration(format!("task `{}` does not exist", name))
            })?;
            stack.push(*node);
        }

        while let Some(node) = stack.pop() {
            if selected.insert(node) {
                stack.extend(self.graph.neighbors_directed(node, Direction::Incoming));
            }
        }
        Ok(selected)
    }

    /// Group selected tasks by dependency depth.
    fn waves(&self, selected: &HashSet<NodeIndex>) -> Vec<Vec<NodeIndex>> {
        // Node indices follow registration order, which is already a
        // topological order.
        let mut depth: HashMap<NodeIndex, usize> = HashMap::new();
        let mut waves: Vec<Vec<NodeIndex>> = Vec::new();

        for node in self.graph.node_indices().filter(|n| selected.contains(n)) {
            let level = self
                .graph
                .neighbors_directed(node, Direction::Incoming)
                .filter_map(|dep| depth.get(&dep))
                .map(|d| d + 1)
                .max()
                .unwrap_or(0);
            depth.insert(node, level);
            if waves.len() <= level {
                waves.resize_with(level + 1, Vec::new);
            }
            waves[level].push(node);
        }
        waves
    }
}

impl TaskGraph for LocalTaskGraph {
    fn register(&mut self, task: TaskSpec) -> Result<(), BuildError> {
        if self.index.contains_key(&task.name) {
            return Err(BuildError::configuration(format!(
                "task `{}` is already registered",
                task.name
            )));
        }

        let mut deps = Vec::with_capacity(task.depends_on.len());
        for dep in &task.depends_on {
            let node = self.index.get(dep).ok_or_else(|| {
                BuildError::configuration(format!(
                    "task `{}` depends on unknown task `{}`",
                    task.name, dep
                ))
            })?;
            deps.push(*node);
        }

        let name = task.name.clone();
        let node = self.graph.add_node(task);
        for dep in deps {
            self.graph.add_edge(dep, node, ());
        }
        self.index.insert(name, node);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording(log: &Arc<Mutex<Vec<String>>>, name: &str, outcome: TaskOutcome) -> TaskSpec {
        let log = Arc::clone(log);
        let label = name.to_string();
        TaskSpec::new(name, "test task").action(move || {
            log.lock().unwrap().push(label.clone());
            outcome
        })
    }

    fn host(policy: FailurePolicy) -> LocalTaskGraph {
        LocalTaskGraph::new(policy, Some(1), CancellationToken::new())
    }

    #[test]
    fn test_dependencies_run_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut graph = host(FailurePolicy::Continue);
        graph.register(recording(&log, "a", TaskOutcome::Succeeded)).unwrap();
        graph.register(recording(&log, "b", TaskOutcome::UpToDate)).unwrap();
        graph
            .register(recording(&log, "c", TaskOutcome::Succeeded).depends_on("a").depends_on("b"))
            .unwrap();

        let report = graph.run(&["c"]).unwrap();
        assert!(report.is_success());
        assert_eq!(log.lock().unwrap().last().map(String::as_str), Some("c"));
        assert_eq!(report.status("b"), Some(TaskStatus::UpToDate));
    }

    #[test]
    fn test_only_requested_closure_runs() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut graph = host(FailurePolicy::Continue);
        graph.register(recording(&log, "a", TaskOutcome::Succeeded)).unwrap();
        graph.register(recording(&log, "b", TaskOutcome::Succeeded)).unwrap();

        let report = graph.run(&["b"]).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["b".to_string()]);
        assert_eq!(report.status("a"), None);
    }

    #[test]
    fn test_failed_dependency_blocks_dependents() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut graph = host(FailurePolicy::Continue);
        graph.register(recording(&log, "bad", TaskOutcome::Failed)).unwrap();
        graph.register(recording(&log, "good", TaskOutcome::Succeeded)).unwrap();
        graph
            .register(TaskSpec::new("all", "aggregate").depends_on("bad").depends_on("good"))
            .unwrap();

        let report = graph.run(&["all"]).unwrap();
        assert_eq!(report.status("bad"), Some(TaskStatus::Failed));
        assert_eq!(report.status("good"), Some(TaskStatus::Succeeded));
        assert_eq!(report.status("all"), Some(TaskStatus::Blocked));
        assert_eq!(report.failed(), vec!["bad"]);
    }

    #[test]
    fn test_fail_fast_stops_and_cancels() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let cancel = CancellationToken::new();
        let mut graph = LocalTaskGraph::new(FailurePolicy::FailFast, Some(1), cancel.clone());
        graph.register(recording(&log, "first", TaskOutcome::Failed)).unwrap();
        graph.register(recording(&log, "second", TaskOutcome::Succeeded)).unwrap();
        graph.register(recording(&log, "third", TaskOutcome::Succeeded)).unwrap();

        let report = graph.run(&["first", "second", "third"]).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["first".to_string()]);
        assert_eq!(report.status("second"), Some(TaskStatus::NotRun));
        assert_eq!(report.status("third"), Some(TaskStatus::NotRun));
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_register_rejects_duplicates_and_unknown_deps() {
        let mut graph = host(FailurePolicy::Continue);
        graph.register(TaskSpec::new("a", "")).unwrap();

        let dup = graph.register(TaskSpec::new("a", "")).unwrap_err();
        assert!(dup.to_string().contains("already registered"));

        let unknown = graph
            .register(TaskSpec::new("b", "").depends_on("missing"))
            .unwrap_err();
        assert!(unknown.to_string().contains("unknown task `missing`"));
    }

    #[test]
    fn test_unknown_target() {
        let graph = host(FailurePolicy::Continue);
        assert!(graph.run(&["nope"]).is_err());
    }
}
