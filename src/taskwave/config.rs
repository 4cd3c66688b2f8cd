//! Per-run workflow configuration.
//!
//! One [`WorkflowConfig`] value rides along with every submission. All fields
//! carry serde defaults, so a submission may set only the options it cares
//! about and inherit the rest:
//!
//! ```rust
//! use taskwave::WorkflowConfig;
//!
//! let config: WorkflowConfig =
//!     serde_json::from_str(r#"{ "max_parallel_agents": 8 }"#).unwrap();
//! assert_eq!(config.max_parallel_agents, 8);
//! assert_eq!(config.task_retries, 2); // default preserved
//! ```

use crate::taskwave::context_store::ContextStrategy;
use serde::{Deserialize, Serialize};

/// Tunable options for a single workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Upper bound on concurrently running tasks within a wave.
    pub max_parallel_agents: usize,

    /// Hard wall-clock deadline for the whole run, in milliseconds. When it
    /// passes, the run behaves exactly like a cancellation with reason
    /// `"timeout"`.
    pub global_timeout_ms: u64,

    /// Enables the peer message bus. When false, every bus operation is a
    /// no-op and the peer-communication preamble is left out of prompts.
    pub enable_communication: bool,

    /// How prior-work context is selected for each task prompt.
    pub context_strategy: ContextStrategy,

    /// Global token cap governing snapshot re-packing; see the context store.
    pub pruning_threshold: usize,

    /// Tokens of prior work injected into each task prompt.
    pub per_task_context_budget: usize,

    /// Retries granted to transient backend failures, per task.
    pub task_retries: usize,

    /// How long cancellation waits for in-flight tasks before tearing them
    /// down, in milliseconds.
    pub cancellation_grace_ms: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_parallel_agents: 3,
            global_timeout_ms: 300_000,
            enable_communication: true,
            context_strategy: ContextStrategy::Shared,
            pruning_threshold: 150_000,
            per_task_context_budget: 5_000,
            task_retries: 2,
            cancellation_grace_ms: 2_000,
        }
    }
}
