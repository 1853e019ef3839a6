// src/dag/task_graph.rs

//! Static composition of leaf tasks.

use std::fmt;

use crate::tasks::Task;

/// Tree of sequence/parallel nodes over leaf tasks.
///
/// A graph is an owned tree, so it cannot reference itself; it is lowered and
/// validated into a [`crate::dag::DagGraph`] before anything runs.
#[derive(Debug, Clone)]
pub enum TaskGraph {
    Leaf(Task),
    /// Children run one after another; a failure skips the rest.
    Sequence(Vec<TaskGraph>),
    /// Children run concurrently; completes when all children completed.
    Parallel(Vec<TaskGraph>),
}

/// Compose graphs so that each starts only after the previous one succeeded.
pub fn sequence(graphs: impl IntoIterator<Item = TaskGraph>) -> TaskGraph {
    TaskGraph::Sequence(graphs.into_iter().collect())
}

/// Compose graphs to run concurrently behind a join barrier.
pub fn parallel(graphs: impl IntoIterator<Item = TaskGraph>) -> TaskGraph {
    TaskGraph::Parallel(graphs.into_iter().collect())
}

impl From<Task> for TaskGraph {
    fn from(task: Task) -> Self {
        TaskGraph::Leaf(task)
    }
}

impl TaskGraph {
    /// Leaf tasks in depth-first order (a task used twice appears twice).
    pub fn leaves(&self) -> Vec<&Task> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Task>) {
        match self {
            TaskGraph::Leaf(task) => out.push(task),
            TaskGraph::Sequence(children) | TaskGraph::Parallel(children) => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }

    /// Names of the leaf tasks, in depth-first order.
    pub fn leaf_names(&self) -> Vec<&str> {
        self.leaves().into_iter().map(|t| t.name()).collect()
    }
}

impl fmt::Display for TaskGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (label, children) = match self {
            TaskGraph::Leaf(task) => return f.write_str(task.name()),
            TaskGraph::Sequence(children) => ("sequence", children),
            TaskGraph::Parallel(children) => ("parallel", children),
        };
        write!(f, "{label}(")?;
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{child}")?;
        }
        f.write_str(")")
    }
}
