//! Generic task graph and topological scheduler.
//!
//! A [`TaskGraph`] is a set of named nodes, each carrying a job value and the
//! names of the nodes that must complete before it may start. Predecessors
//! must be added before their dependents, so every graph is acyclic by
//! construction and insertion order is a valid topological order.
//!
//! [`TaskGraph::execute`] runs the graph: every node whose predecessors have
//! all completed is started immediately on its own scoped thread, so
//! independent nodes run concurrently. When a node fails, every node that
//! (transitively) depends on it is marked [`TaskState::Skipped`]. Nodes that
//! are already running are left to finish, and completed work is never rolled
//! back. A node that panics counts as failed; the panic never escapes
//! [`TaskGraph::execute`].
//!
//! ```text
//! clean ─► copy ─► optimize-images ─┬─► styles
//!                                   ├─► markup
//!                                   ├─► scripts
//!                                   └─► ...
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GraphError {
    #[error("duplicate task name: {0}")]
    DuplicateName(String),
    #[error("task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: String, dependency: String },
}

/// A job that panicked instead of returning.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("panicked: {message}")]
pub struct TaskPanic {
    pub message: String,
}

impl TaskPanic {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self { message }
    }
}

/// Run `job`, turning a panic into an error.
pub fn catch_panic<R, E, F>(job: F) -> Result<R, E>
where
    F: FnOnce() -> Result<R, E>,
    E: From<TaskPanic>,
{
    panic::catch_unwind(AssertUnwindSafe(job))
        .unwrap_or_else(|payload| Err(TaskPanic::from_payload(payload).into()))
}

/// Index of a node inside its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Lifecycle of a single node during one [`TaskGraph::execute`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    NotStarted,
    Running,
    Completed,
    Failed,
    /// A predecessor failed or was skipped; the node never ran.
    Skipped,
}

#[derive(Debug)]
struct Node<T> {
    name: String,
    job: T,
    deps: Vec<NodeId>,
}

/// A DAG of named jobs.
#[derive(Debug)]
pub struct TaskGraph<T> {
    nodes: Vec<Node<T>>,
    by_name: HashMap<String, NodeId>,
}

impl<T> Default for TaskGraph<T> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            by_name: HashMap::new(),
        }
    }
}

impl<T> TaskGraph<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node that may only start after every node named in `after`.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        job: T,
        after: &[&str],
    ) -> Result<NodeId, GraphError> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(GraphError::DuplicateName(name));
        }
        let deps = after
            .iter()
            .map(|dep| {
                self.by_name
                    .get(*dep)
                    .copied()
                    .ok_or_else(|| GraphError::UnknownDependency {
                        task: name.clone(),
                        dependency: dep.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let id = NodeId(self.nodes.len());
        self.by_name.insert(name.clone(), id);
        self.nodes.push(Node { name, job, deps });
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id.0].name
    }

    pub fn job(&self, id: NodeId) -> &T {
        &self.nodes[id.0].job
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Group nodes into stages: a node's stage is one past the deepest of its
    /// predecessors. Nodes within a stage have no edges between them.
    pub fn levels(&self) -> Vec<Vec<NodeId>> {
        let mut depth = vec![0usize; self.nodes.len()];
        let mut levels: Vec<Vec<NodeId>> = Vec::new();
        for (i, node) in self.nodes.iter().enumerate() {
            // Predecessors always have a lower index.
            let d = node.deps.iter().map(|p| depth[p.0] + 1).max().unwrap_or(0);
            depth[i] = d;
            if levels.len() <= d {
                levels.resize_with(d + 1, Vec::new);
            }
            levels[d].push(NodeId(i));
        }
        levels
    }
}

/// Final record of one node after [`TaskGraph::execute`].
#[derive(Debug)]
pub struct NodeOutcome<R, E> {
    pub name: String,
    pub state: TaskState,
    pub duration: Duration,
    /// `Some(Ok)` for completed nodes, `Some(Err)` for failed ones.
    pub result: Option<Result<R, E>>,
}

/// Result of executing a whole graph, one outcome per node in insertion order.
#[derive(Debug)]
pub struct GraphRun<R, E> {
    pub outcomes: Vec<NodeOutcome<R, E>>,
}

impl<R, E> GraphRun<R, E> {
    /// True when every node completed.
    pub fn is_success(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| o.state == TaskState::Completed)
    }

    pub fn state_of(&self, name: &str) -> Option<TaskState> {
        self.outcomes
            .iter()
            .find(|o| o.name == name)
            .map(|o| o.state)
    }

    /// Errors of failed nodes, in insertion order.
    pub fn errors(&self) -> impl Iterator<Item = (&str, &E)> {
        self.outcomes.iter().filter_map(|o| match &o.result {
            Some(Err(e)) => Some((o.name.as_str(), e)),
            _ => None,
        })
    }
}

impl<T: Sync> TaskGraph<T> {
    /// Run every node, starting each as soon as its predecessors completed.
    pub fn execute<R, E, F>(&self, run: F) -> GraphRun<R, E>
    where
        F: Fn(&str, &T) -> Result<R, E> + Sync,
        R: Send,
        E: Send + From<TaskPanic>,
    {
        let n = self.nodes.len();
        let mut states = vec![TaskState::NotStarted; n];
        let mut durations = vec![Duration::ZERO; n];
        let mut results: Vec<Option<Result<R, E>>> = (0..n).map(|_| None).collect();

        std::thread::scope(|scope| {
            let (tx, rx) = mpsc::channel::<(usize, Duration, Result<R, E>)>();
            let mut running = 0usize;

            loop {
                // Propagate failures, then launch everything that became ready.
                // A single pass suffices because predecessors precede dependents.
                for i in 0..n {
                    if states[i] != TaskState::NotStarted {
                        continue;
                    }
                    let deps = &self.nodes[i].deps;
                    if deps.iter().any(|d| {
                        matches!(states[d.0], TaskState::Failed | TaskState::Skipped)
                    }) {
                        tracing::debug!(task = %self.nodes[i].name, "skipped");
                        states[i] = TaskState::Skipped;
                    } else if deps.iter().all(|d| states[d.0] == TaskState::Completed) {
                        states[i] = TaskState::Running;
                        running += 1;
                        let tx = tx.clone();
                        let node = &self.nodes[i];
                        let run = &run;
                        scope.spawn(move || {
                            tracing::debug!(task = %node.name, "started");
                            let start = Instant::now();
                            let result = catch_panic(|| run(&node.name, &node.job));
                            // The receiver outlives every spawned node.
                            let _ = tx.send((i, start.elapsed(), result));
                        });
                    }
                }

                if running == 0 {
                    break;
                }

                let Ok((i, elapsed, result)) = rx.recv() else {
                    break;
                };
                running -= 1;
                durations[i] = elapsed;
                states[i] = if result.is_ok() {
                    TaskState::Completed
                } else {
                    TaskState::Failed
                };
                tracing::debug!(
                    task = %self.nodes[i].name,
                    state = ?states[i],
                    elapsed_ms = elapsed.as_millis() as u64,
                    "finished"
                );
                results[i] = Some(result);
            }
        });

        let outcomes = self
            .nodes
            .iter()
            .zip(states)
            .zip(durations)
            .zip(results)
            .map(|(((node, state), duration), result)| NodeOutcome {
                name: node.name.clone(),
                state,
                duration,
                result,
            })
            .collect();

        GraphRun { outcomes }
    }
}
