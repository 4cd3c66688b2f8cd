//! Agent catalog.
//!
//! Tasks name their agent by string; the registry maps that name to the two
//! things a call actually needs: a system-prompt template and a default model
//! tier. There is no agent class hierarchy; an "agent" is nothing more than
//! this pair, resolved at execution time.
//!
//! [`StaticRegistry`] is the batteries-included implementation: an immutable
//! in-memory map built once at startup. Applications with dynamic catalogs
//! (databases, remote config) implement [`AgentRegistry`] themselves.
//!
//! # Example
//!
//! ```rust
//! use taskwave::{AgentRegistry, AgentSpec, StaticRegistry};
//!
//! let registry = StaticRegistry::new()
//!     .with_agent("researcher", AgentSpec::new(
//!         "You are a meticulous researcher. Cite your sources.",
//!         "gpt-4o",
//!     ))
//!     .with_agent("writer", AgentSpec::new(
//!         "You are a concise technical writer.",
//!         "gpt-4o-mini",
//!     ));
//!
//! assert!(registry.resolve("researcher").is_some());
//! assert!(registry.resolve("poet").is_none());
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Everything the task runner needs to know about a named agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    /// System prompt installed for every call made on this agent's behalf.
    pub system_prompt_template: String,
    /// Model tier used when the task carries no `model_override`.
    pub default_model: String,
}

impl AgentSpec {
    /// Create a spec from a system prompt template and a default model.
    pub fn new(
        system_prompt_template: impl Into<String>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            system_prompt_template: system_prompt_template.into(),
            default_model: default_model.into(),
        }
    }
}

/// Name → agent lookup consulted once per task execution.
///
/// `resolve` is synchronous on purpose: catalogs are immutable per process
/// and a lookup must not become a suspension point inside the task runner.
/// Returning `None` surfaces as a `task_error` for the task that named the
/// missing agent; downstream tasks are skipped.
pub trait AgentRegistry: Send + Sync {
    /// Look up an agent by name.
    fn resolve(&self, name: &str) -> Option<AgentSpec>;
}

/// Immutable in-memory [`AgentRegistry`].
///
/// Built with [`with_agent`](StaticRegistry::with_agent) (builder pattern) or
/// [`register`](StaticRegistry::register), then shared behind an `Arc` across
/// every run in the process.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    agents: HashMap<String, AgentSpec>,
}

impl StaticRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an agent (builder pattern). Re-registering a name replaces the
    /// earlier spec.
    pub fn with_agent(mut self, name: impl Into<String>, spec: AgentSpec) -> Self {
        self.agents.insert(name.into(), spec);
        self
    }

    /// Add an agent in place.
    pub fn register(&mut self, name: impl Into<String>, spec: AgentSpec) {
        self.agents.insert(name.into(), spec);
    }

    /// Registered agent names, unordered.
    pub fn names(&self) -> Vec<&str> {
        self.agents.keys().map(String::as_str).collect()
    }
}

impl AgentRegistry for StaticRegistry {
    fn resolve(&self, name: &str) -> Option<AgentSpec> {
        self.agents.get(name).cloned()
    }
}
