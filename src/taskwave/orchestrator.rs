//! Public entry point: wire a backend and a registry, submit workflows,
//! watch them run.
//!
//! One [`Orchestrator`] serves a whole process. Each submission gets its own
//! run state (context store, message bus, event channel, cancel token), so
//! any number of runs proceed concurrently while sharing only the immutable
//! backend and registry.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use taskwave::{Orchestrator, StaticRegistry, Task, WorkflowConfig};
//!
//! # async fn example(backend: Arc<dyn taskwave::AgentBackend>) {
//! let registry = Arc::new(
//!     StaticRegistry::new().with_agent(
//!         "analyst",
//!         taskwave::AgentSpec::new("You are a careful analyst.", "gpt-4o"),
//!     ),
//! );
//! let orchestrator = Orchestrator::new(backend, registry);
//!
//! let tasks = vec![Task::new("survey", "analyst", "Survey the landscape.")];
//! let (handle, mut events) = orchestrator.submit(tasks, WorkflowConfig::default());
//!
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! handle.wait().await;
//! # }
//! ```

use crate::taskwave::backend::{AgentBackend, CancelToken};
use crate::taskwave::config::WorkflowConfig;
use crate::taskwave::context_store::ContextStore;
use crate::taskwave::event::{event_channel, EventStream, WorkflowEvent};
use crate::taskwave::graph::TaskGraph;
use crate::taskwave::message_bus::MessageBus;
use crate::taskwave::registry::AgentRegistry;
use crate::taskwave::runner::RunContext;
use crate::taskwave::scheduler::Scheduler;
use crate::taskwave::task::Task;
use crate::taskwave::workflow::{TemplateCatalog, WorkflowSubmission};
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Per-subscriber queue bound on each run's message bus.
const BUS_QUEUE_CAPACITY: usize = 64;

/// Caller's grip on one running workflow.
///
/// Dropping the handle does **not** stop the run; call
/// [`cancel`](RunHandle::cancel) for that. Dropping the [`EventStream`]
/// does stop it: the scheduler treats a closed stream as a cancellation.
pub struct RunHandle {
    run_id: Uuid,
    cancel: CancelToken,
    bus: Arc<MessageBus>,
    join: JoinHandle<()>,
}

impl RunHandle {
    /// Unique id of this run, for logs and correlation.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Request cooperative cancellation. Idempotent; a run whose tasks have
    /// all finished completes normally regardless.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// True once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// True once the run has reached its terminal event and wound down.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// This run's message bus, for embedders that want to publish to or
    /// subscribe alongside the agents. Inert when the run disabled
    /// communication.
    pub fn message_bus(&self) -> Arc<MessageBus> {
        self.bus.clone()
    }

    /// Wait for the run to wind down completely.
    pub async fn wait(self) {
        let _ = self.join.await;
    }
}

/// Builds runs out of a backend, a registry, and a template catalog.
pub struct Orchestrator {
    backend: Arc<dyn AgentBackend>,
    registry: Arc<dyn AgentRegistry>,
    templates: TemplateCatalog,
}

impl Orchestrator {
    /// Create an orchestrator with the built-in template catalog.
    pub fn new(backend: Arc<dyn AgentBackend>, registry: Arc<dyn AgentRegistry>) -> Self {
        Self {
            backend,
            registry,
            templates: TemplateCatalog::with_builtins(),
        }
    }

    /// Replace the template catalog (builder pattern).
    pub fn with_templates(mut self, templates: TemplateCatalog) -> Self {
        self.templates = templates;
        self
    }

    /// Submit an explicit task list.
    ///
    /// Returns immediately with the run handle and the lazy, ordered event
    /// stream. Validation happens on the scheduler task: a malformed
    /// workflow produces a stream holding exactly one `workflow_error`.
    pub fn submit(&self, tasks: Vec<Task>, config: WorkflowConfig) -> (RunHandle, EventStream) {
        let run_id = Uuid::new_v4();
        let (emitter, stream) = event_channel();
        let cancel = CancelToken::new();
        let bus = Arc::new(MessageBus::new(
            config.enable_communication,
            BUS_QUEUE_CAPACITY,
        ));

        log::info!("run {}: submitted with {} task(s)", run_id, tasks.len());

        let ctx = Arc::new(RunContext {
            config,
            backend: self.backend.clone(),
            registry: self.registry.clone(),
            context: Arc::new(ContextStore::new()),
            bus: bus.clone(),
            emitter,
            cancel: cancel.clone(),
        });
        let graph = TaskGraph::new(tasks);
        let join = tokio::spawn(async move {
            Scheduler::new(ctx).run(graph).await;
        });

        (
            RunHandle {
                run_id,
                cancel,
                bus,
                join,
            },
            stream,
        )
    }

    /// Submit the wire form: explicit tasks, or a template plus parameters.
    ///
    /// Resolution failures (unknown template, bad parameters, empty
    /// submission) surface on the stream as a `workflow_error` before any
    /// `workflow_start`, keeping the one-terminal-event contract uniform
    /// for transports.
    pub fn submit_workflow(&self, submission: WorkflowSubmission) -> (RunHandle, EventStream) {
        let config = submission.config.clone().unwrap_or_default();
        match submission.resolve(&self.templates) {
            Ok(tasks) => self.submit(tasks, config),
            Err(error) => {
                let run_id = Uuid::new_v4();
                log::error!("run {}: rejected submission: {}", run_id, error);
                let (emitter, stream) = event_channel();
                let bus = Arc::new(MessageBus::new(false, BUS_QUEUE_CAPACITY));
                let join = tokio::spawn(async move {
                    let _ = emitter
                        .emit(WorkflowEvent::WorkflowError {
                            error: error.to_string(),
                        })
                        .await;
                });
                (
                    RunHandle {
                        run_id,
                        cancel: CancelToken::new(),
                        bus,
                        join,
                    },
                    stream,
                )
            }
        }
    }
}
