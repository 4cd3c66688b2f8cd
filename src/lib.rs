// src/lib.rs

// Import the top-level `taskwave` module.
pub mod taskwave;

// Re-exporting key items for easier external access.
pub use taskwave::backend::{AgentBackend, BackendError, BackendErrorKind, CancelToken, Completion};
pub use taskwave::config::WorkflowConfig;
pub use taskwave::context_store;
pub use taskwave::context_store::ContextStrategy;
pub use taskwave::event::{EventStream, WorkflowEvent, WorkflowSummary};
pub use taskwave::graph::{GraphError, TaskGraph};
pub use taskwave::message_bus;
pub use taskwave::orchestrator::{Orchestrator, RunHandle};
pub use taskwave::registry::{AgentRegistry, AgentSpec, StaticRegistry};
pub use taskwave::task::{Task, TaskResult};
pub use taskwave::workflow;
pub use taskwave::workflow::{TemplateCatalog, WorkflowSubmission};
