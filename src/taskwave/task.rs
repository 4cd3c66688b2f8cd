//! Workflow task model.
//!
//! A [`Task`] is one unit of agent work inside a workflow: a prompt addressed
//! to a named agent, a set of dependencies on other tasks, and scheduling
//! hints (priority, output token cap, model override). A [`TaskResult`] is
//! the immutable record produced when the task has run (or was skipped
//! because an upstream dependency failed).
//!
//! Both types derive serde so that explicit-task submissions can be carried
//! over the wire; omitted fields deserialize to their documented defaults.
//!
//! # Example
//!
//! ```rust
//! use taskwave::Task;
//!
//! let plan = Task::new("plan", "planner", "Break the project into steps.");
//! let build = Task::new("build", "engineer", "Implement the plan.")
//!     .depends_on("plan")
//!     .with_priority(8)
//!     .with_context("language", "Rust");
//!
//! assert_eq!(build.dependencies, vec!["plan".to_string()]);
//! assert_eq!(plan.priority, 5); // default
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default tie-breaking priority assigned when a submission omits one.
pub const DEFAULT_PRIORITY: i32 = 5;

/// Default upper bound on model output tokens per task.
pub const DEFAULT_MAX_TOKENS: usize = 8000;

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

fn default_max_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}

/// One unit of agent work supplied by the caller.
///
/// Tasks are plain values: the orchestrator never mutates them, and workflow
/// templates produce them in bulk. Identity is the `id` string, unique within
/// a workflow; dependencies reference other tasks in the same workflow by id.
///
/// Construct with [`Task::new`] and refine with the `with_*` builders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier within the workflow. Must be non-empty.
    pub id: String,

    /// Name of the agent that runs this task. Resolved through the
    /// [`AgentRegistry`](crate::registry::AgentRegistry) at execution time.
    pub agent_name: String,

    /// Human-readable description, used in logs and demo output.
    #[serde(default)]
    pub description: String,

    /// The task instruction handed to the agent as the user prompt.
    pub prompt: String,

    /// Ids of tasks that must complete before this one may start.
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Tie-breaking priority within a ready set; higher starts first.
    #[serde(default = "default_priority")]
    pub priority: i32,

    /// Upper bound on model output tokens for this task.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Overrides the agent's default model tier when set.
    #[serde(default)]
    pub model_override: Option<String>,

    /// Opaque key/value bag appended verbatim to the prompt.
    #[serde(default)]
    pub context: HashMap<String, String>,

    /// Parent task id; consulted only by the hierarchical context strategy.
    #[serde(default)]
    pub parent_id: Option<String>,
}

impl Task {
    /// Create a task with the given id, agent name, and prompt.
    ///
    /// All remaining fields start at their defaults: no description, no
    /// dependencies, priority 5, an 8 000 token output cap, no model
    /// override, an empty context bag, and no parent.
    ///
    /// # Example
    ///
    /// ```rust
    /// use taskwave::Task;
    ///
    /// let task = Task::new("research", "researcher", "Survey prior art.");
    /// assert_eq!(task.id, "research");
    /// assert!(task.dependencies.is_empty());
    /// ```
    pub fn new(
        id: impl Into<String>,
        agent_name: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            agent_name: agent_name.into(),
            description: String::new(),
            prompt: prompt.into(),
            dependencies: Vec::new(),
            priority: DEFAULT_PRIORITY,
            max_tokens: DEFAULT_MAX_TOKENS,
            model_override: None,
            context: HashMap::new(),
            parent_id: None,
        }
    }

    /// Set the human-readable description (builder pattern).
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a dependency on another task id (builder pattern).
    ///
    /// May be called repeatedly; duplicates are tolerated and collapse during
    /// graph validation.
    pub fn depends_on(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    /// Set the tie-breaking priority (builder pattern). Higher is sooner.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the per-task output token cap (builder pattern).
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Override the agent's default model tier for this task (builder pattern).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_override = Some(model.into());
        self
    }

    /// Attach a key/value pair to the context bag (builder pattern).
    ///
    /// The bag is serialized as a sorted key/value block at the end of the
    /// task prompt; the orchestrator never interprets it.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Set the parent task id used by the hierarchical context strategy
    /// (builder pattern).
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

/// Immutable record of one task execution.
///
/// Exactly one `TaskResult` exists per task once a run has passed over it,
/// whether the backend was invoked, the task was skipped because an upstream
/// dependency failed, or the run was cancelled underneath it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Id of the task this result belongs to.
    pub task_id: String,

    /// Agent that ran (or would have run) the task.
    pub agent_name: String,

    /// Whether the task produced a usable output.
    pub success: bool,

    /// Agent output text. Empty when `success` is false.
    pub output: String,

    /// Failure description. Empty when `success` is true.
    pub error: String,

    /// Input plus output tokens as reported by the backend; zero when the
    /// backend was never invoked.
    pub tokens_used: usize,

    /// Wall time of the task runner call, in milliseconds.
    pub duration_ms: u64,

    /// Always carries at least `model` and `stop_reason`.
    pub metadata: HashMap<String, String>,
}

impl TaskResult {
    /// Build a successful result.
    pub fn success(
        task: &Task,
        output: impl Into<String>,
        tokens_used: usize,
        duration_ms: u64,
        model: impl Into<String>,
        stop_reason: impl Into<String>,
    ) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("model".to_string(), model.into());
        metadata.insert("stop_reason".to_string(), stop_reason.into());
        Self {
            task_id: task.id.clone(),
            agent_name: task.agent_name.clone(),
            success: true,
            output: output.into(),
            error: String::new(),
            tokens_used,
            duration_ms,
            metadata,
        }
    }

    /// Build a failed result with the given error text.
    pub fn failure(task: &Task, error: impl Into<String>, duration_ms: u64) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("model".to_string(), String::new());
        metadata.insert("stop_reason".to_string(), "error".to_string());
        Self {
            task_id: task.id.clone(),
            agent_name: task.agent_name.clone(),
            success: false,
            output: String::new(),
            error: error.into(),
            tokens_used: 0,
            duration_ms,
            metadata,
        }
    }

    /// Build the result for a task skipped because `upstream_id` failed.
    ///
    /// Skipped tasks never invoke the backend; the error text records which
    /// dependency took them down.
    ///
    /// # Example
    ///
    /// ```rust
    /// use taskwave::{Task, TaskResult};
    ///
    /// let task = Task::new("report", "writer", "Write it up.").depends_on("research");
    /// let result = TaskResult::skipped(&task, "research");
    /// assert!(!result.success);
    /// assert_eq!(result.error, "upstream research failed");
    /// ```
    pub fn skipped(task: &Task, upstream_id: &str) -> Self {
        let mut result = Self::failure(task, format!("upstream {} failed", upstream_id), 0);
        result
            .metadata
            .insert("stop_reason".to_string(), "skipped".to_string());
        result
    }

    /// Build the result for a task torn down by run cancellation or timeout.
    pub fn cancelled(task: &Task, duration_ms: u64) -> Self {
        let mut result = Self::failure(task, "cancelled", duration_ms);
        result
            .metadata
            .insert("stop_reason".to_string(), "cancelled".to_string());
        result
    }

    /// Attach an extra metadata pair (builder pattern).
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
