//! Dependency graph over a workflow's task list.
//!
//! [`TaskGraph`] holds the submitted tasks in insertion order, validates the
//! shape once at accept time (unique ids, resolvable dependencies, no self
//! references, no cycles), and answers the scheduler's per-wave question:
//! which tasks are ready now, and in what order should they start?
//!
//! The graph is immutable after validation. Readiness is recomputed from the
//! completed-id set each wave; at the workflow sizes this crate targets
//! (N ≤ ~200 tasks) the O(N·E) rescan is not worth optimizing away.
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashSet;
//! use taskwave::{Task, TaskGraph};
//!
//! let graph = TaskGraph::new(vec![
//!     Task::new("a", "planner", "Plan."),
//!     Task::new("b", "worker", "Build.").depends_on("a"),
//! ]);
//! graph.validate().unwrap();
//!
//! let none_done = HashSet::new();
//! assert_eq!(graph.ready_ids(&none_done), vec!["a".to_string()]);
//! ```

use crate::taskwave::task::Task;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt;

/// Why a submission was rejected at accept time.
///
/// The `Display` form of these values is exactly what the terminal
/// `workflow_error` event carries, so messages stay short and concrete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Two tasks share an id.
    DuplicateId(String),
    /// A task id is empty.
    EmptyId,
    /// A dependency names a task that is not part of the workflow.
    UnknownDependency {
        /// The task carrying the bad edge.
        task: String,
        /// The id that could not be resolved.
        dependency: String,
    },
    /// A task lists itself as a dependency.
    SelfReference(String),
    /// The dependency edges form a cycle; the payload is the closed path.
    Cycle(Vec<String>),
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::DuplicateId(id) => write!(f, "duplicate task id: {}", id),
            GraphError::EmptyId => write!(f, "empty task id"),
            GraphError::UnknownDependency { task, dependency } => {
                write!(f, "task {} depends on unknown task {}", task, dependency)
            }
            GraphError::SelfReference(id) => write!(f, "task {} depends on itself", id),
            GraphError::Cycle(path) => write!(f, "cycle: {}", path.join(" -> ")),
        }
    }
}

impl Error for GraphError {}

/// DFS coloring used by cycle detection.
#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Immutable task list plus dependency index.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    tasks: Vec<Task>,
    index: HashMap<String, usize>,
}

impl TaskGraph {
    /// Wrap a task list. Call [`validate`](TaskGraph::validate) before
    /// scheduling; construction itself never fails so that validation errors
    /// can be surfaced through the event stream instead of a panic path.
    pub fn new(tasks: Vec<Task>) -> Self {
        let mut index = HashMap::with_capacity(tasks.len());
        for (position, task) in tasks.iter().enumerate() {
            // First occurrence wins; validate() reports the duplicate.
            index.entry(task.id.clone()).or_insert(position);
        }
        Self { tasks, index }
    }

    /// Check the whole graph shape: non-empty unique ids, resolvable
    /// dependencies, no self references, no cycles.
    ///
    /// Returns the first problem found, in a deterministic order (insertion
    /// order for id and edge problems, then cycles).
    pub fn validate(&self) -> Result<(), GraphError> {
        let mut seen = HashSet::with_capacity(self.tasks.len());
        for task in &self.tasks {
            if task.id.is_empty() {
                return Err(GraphError::EmptyId);
            }
            if !seen.insert(task.id.as_str()) {
                return Err(GraphError::DuplicateId(task.id.clone()));
            }
        }

        for task in &self.tasks {
            for dependency in &task.dependencies {
                if dependency == &task.id {
                    return Err(GraphError::SelfReference(task.id.clone()));
                }
                if !self.index.contains_key(dependency) {
                    return Err(GraphError::UnknownDependency {
                        task: task.id.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        self.check_cycles()
    }

    /// Gray/black DFS over the dependency edges. A back edge onto a gray
    /// node closes a cycle; the error carries the closed path.
    fn check_cycles(&self) -> Result<(), GraphError> {
        let mut colors = vec![Color::White; self.tasks.len()];
        let mut stack: Vec<String> = Vec::new();

        for start in 0..self.tasks.len() {
            if colors[start] == Color::White {
                self.visit(start, &mut colors, &mut stack)?;
            }
        }
        Ok(())
    }

    fn visit(
        &self,
        node: usize,
        colors: &mut Vec<Color>,
        stack: &mut Vec<String>,
    ) -> Result<(), GraphError> {
        colors[node] = Color::Gray;
        stack.push(self.tasks[node].id.clone());

        for dependency in &self.tasks[node].dependencies {
            let next = self.index[dependency.as_str()];
            match colors[next] {
                Color::Gray => {
                    let from = stack
                        .iter()
                        .position(|id| id == dependency)
                        .unwrap_or(0);
                    let mut path: Vec<String> = stack[from..].to_vec();
                    path.push(dependency.clone());
                    return Err(GraphError::Cycle(path));
                }
                Color::White => self.visit(next, colors, stack)?,
                Color::Black => {}
            }
        }

        stack.pop();
        colors[node] = Color::Black;
        Ok(())
    }

    /// Ids whose dependencies all lie in `completed` and which are not
    /// themselves completed, ordered by descending priority with insertion
    /// order breaking ties.
    ///
    /// The order is the dispatch order: when the permit pool is saturated,
    /// earlier entries start first.
    pub fn ready_ids(&self, completed: &HashSet<String>) -> Vec<String> {
        let mut ready: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|task| !completed.contains(&task.id))
            .filter(|task| {
                task.dependencies
                    .iter()
                    .all(|dependency| completed.contains(dependency))
            })
            .collect();
        // Stable sort keeps insertion order inside each priority band.
        ready.sort_by_key(|task| std::cmp::Reverse(task.priority));
        ready.into_iter().map(|task| task.id.clone()).collect()
    }

    /// Ids not yet completed, in insertion order.
    pub fn remaining_ids(&self, completed: &HashSet<String>) -> Vec<String> {
        self.tasks
            .iter()
            .filter(|task| !completed.contains(&task.id))
            .map(|task| task.id.clone())
            .collect()
    }

    /// True when the workflow has no tasks at all.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Number of tasks in the workflow.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Look up a task by id.
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.index.get(id).map(|position| &self.tasks[*position])
    }

    /// The tasks in insertion order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_error_names_the_closed_path() {
        let graph = TaskGraph::new(vec![
            Task::new("a", "x", "p").depends_on("b"),
            Task::new("b", "x", "p").depends_on("a"),
        ]);
        match graph.validate() {
            Err(GraphError::Cycle(path)) => {
                assert_eq!(path.first(), path.last());
                assert!(path.len() >= 3);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn ready_order_is_priority_then_insertion() {
        let graph = TaskGraph::new(vec![
            Task::new("low", "x", "p").with_priority(1),
            Task::new("first_high", "x", "p").with_priority(9),
            Task::new("second_high", "x", "p").with_priority(9),
        ]);
        let ready = graph.ready_ids(&HashSet::new());
        assert_eq!(ready, vec!["first_high", "second_high", "low"]);
    }
}
