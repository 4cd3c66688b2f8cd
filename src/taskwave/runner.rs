//! Single-task execution.
//!
//! The [`TaskRunner`] takes one task through its whole lifecycle: emit
//! `task_start`, resolve the agent, assemble the system and user prompts,
//! call the backend (with retries for transient failures and cooperative
//! cancellation throughout), record the output, and emit the closing
//! `task_complete` or `task_error`.
//!
//! The runner is pure with respect to the run's bookkeeping: it reads
//! snapshots from the context store and messages from the bus, but the
//! scheduler alone owns the pending/completed maps, and the runner only returns
//! a [`TaskResult`].

use crate::taskwave::backend::{AgentBackend, CancelToken, Completion};
use crate::taskwave::config::WorkflowConfig;
use crate::taskwave::context_store::ContextStore;
use crate::taskwave::event::{preview, EventEmitter, WorkflowEvent, OUTPUT_PREVIEW_CHARS};
use crate::taskwave::message_bus::{AgentMessage, MessageBus};
use crate::taskwave::registry::AgentRegistry;
use crate::taskwave::task::{Task, TaskResult};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Advertises the message bus to agents when communication is enabled.
/// Elided entirely when it is not.
const PEER_PREAMBLE: &str = "\n\nYou are one agent in a multi-agent workflow. \
Peers may send you messages; when they do, they appear in your prompt under \
'Messages from peers'. Your completed output is shared with the tasks that \
depend on yours.";

/// First retry delay for transient backend failures.
const RETRY_BASE_MS: u64 = 500;

/// Ceiling on any single retry delay.
const RETRY_CAP_MS: u64 = 8_000;

/// Everything a task execution needs from its run, shared behind an `Arc`.
/// Created by the orchestrator at submission and dropped when the run ends.
pub struct RunContext {
    /// The run's immutable configuration.
    pub config: WorkflowConfig,
    /// LLM provider shared by every run in the process.
    pub backend: Arc<dyn AgentBackend>,
    /// Agent catalog shared by every run in the process.
    pub registry: Arc<dyn AgentRegistry>,
    /// This run's prior-work store.
    pub context: Arc<ContextStore>,
    /// This run's peer message bus.
    pub bus: Arc<MessageBus>,
    /// Producer half of this run's event stream.
    pub emitter: EventEmitter,
    /// This run's cancellation flag.
    pub cancel: CancelToken,
}

/// Executes one task at a time on behalf of the scheduler.
pub struct TaskRunner {
    ctx: Arc<RunContext>,
}

impl TaskRunner {
    /// Wrap a run context.
    pub fn new(ctx: Arc<RunContext>) -> Self {
        Self { ctx }
    }

    /// Emit an event; a closed stream flips the run's cancel flag so the
    /// scheduler tears the run down.
    async fn emit(&self, event: WorkflowEvent) {
        if self.ctx.emitter.emit(event).await.is_err() {
            self.ctx.cancel.cancel();
        }
    }

    /// Run `task` to a [`TaskResult`].
    ///
    /// `failed_upstream` is the id of a failed dependency when the scheduler
    /// already knows this task cannot run; the task is then marked skipped
    /// without touching the backend (it still gets its `task_start` /
    /// `task_error` pair so event accounting stays uniform).
    pub async fn run(&self, task: Task, failed_upstream: Option<String>) -> TaskResult {
        let started = Instant::now();
        self.emit(WorkflowEvent::TaskStart {
            task_id: task.id.clone(),
            agent_name: task.agent_name.clone(),
        })
        .await;

        if let Some(upstream) = failed_upstream {
            log::info!("task {}: skipped, upstream {} failed", task.id, upstream);
            let result = TaskResult::skipped(&task, &upstream);
            self.emit(WorkflowEvent::TaskError {
                task_id: task.id.clone(),
                error: result.error.clone(),
            })
            .await;
            return result;
        }

        if self.ctx.cancel.is_cancelled() {
            return self.fail(&task, "cancelled", started).await;
        }

        let spec = match self.ctx.registry.resolve(&task.agent_name) {
            Some(spec) => spec,
            None => {
                let error = format!("unknown agent: {}", task.agent_name);
                log::error!("task {}: {}", task.id, error);
                return self.fail(&task, error, started).await;
            }
        };
        let model = task
            .model_override
            .clone()
            .unwrap_or_else(|| spec.default_model.clone());

        // Subscribe before assembling the prompt so peers that finish while
        // we run still land in the queue (and in the next dependent's view).
        let communicating = self.ctx.config.enable_communication;
        let mut subscription = if communicating {
            Some(self.ctx.bus.subscribe(&task.id))
        } else {
            None
        };
        let peer_messages = subscription
            .as_mut()
            .map(|sub| sub.drain())
            .unwrap_or_default();

        let mut system = spec.system_prompt_template.clone();
        if communicating {
            system.push_str(PEER_PREAMBLE);
        }

        let snapshot = self
            .ctx
            .context
            .snapshot_for(
                &task,
                self.ctx.config.context_strategy,
                self.ctx.config.per_task_context_budget,
                self.ctx.config.pruning_threshold,
            )
            .await;
        let user = assemble_user_prompt(&task, &snapshot, &peer_messages);
        log::debug!(
            "task {}: prompt assembled ({} chars system, {} chars user)",
            task.id,
            system.len(),
            user.len()
        );

        self.emit(WorkflowEvent::AgentInvoke {
            task_id: task.id.clone(),
            agent_name: task.agent_name.clone(),
            model: model.clone(),
            max_tokens: task.max_tokens,
        })
        .await;

        match self.call_with_retries(&task, &system, &user, &model).await {
            Ok(completion) => {
                let tokens_used = completion.total_tokens();
                self.ctx
                    .context
                    .record(&task, &completion.text, Some(tokens_used))
                    .await;
                // Announce completion only; output travels through the
                // context store so the isolated strategy stays airtight.
                if communicating {
                    self.ctx.bus.broadcast(
                        &task.id,
                        serde_json::json!({
                            "task_id": task.id,
                            "status": "complete",
                        }),
                    );
                }
                let duration_ms = started.elapsed().as_millis() as u64;
                let result = TaskResult::success(
                    &task,
                    completion.text.clone(),
                    tokens_used,
                    duration_ms,
                    model,
                    completion.stop_reason,
                );
                log::info!(
                    "task {}: complete in {}ms ({} tokens)",
                    task.id,
                    duration_ms,
                    tokens_used
                );
                self.emit(WorkflowEvent::TaskComplete {
                    task_id: task.id.clone(),
                    success: true,
                    duration_ms,
                    tokens_used,
                    output_preview: preview(&completion.text, OUTPUT_PREVIEW_CHARS),
                })
                .await;
                result
            }
            Err(error) => self.fail(&task, error, started).await,
        }
    }

    /// Build a failure result and emit its `task_error`.
    async fn fail(&self, task: &Task, error: impl Into<String>, started: Instant) -> TaskResult {
        let error = error.into();
        let duration_ms = started.elapsed().as_millis() as u64;
        let result = if error == "cancelled" {
            TaskResult::cancelled(task, duration_ms)
        } else {
            TaskResult::failure(task, error.clone(), duration_ms)
        };
        self.emit(WorkflowEvent::TaskError {
            task_id: task.id.clone(),
            error,
        })
        .await;
        result
    }

    /// Call the backend, retrying transient failures with exponential
    /// backoff. Every suspension races the run's cancel token.
    async fn call_with_retries(
        &self,
        task: &Task,
        system: &str,
        user: &str,
        model: &str,
    ) -> Result<Completion, String> {
        let cancel = &self.ctx.cancel;
        let mut attempt = 0usize;
        loop {
            let call = self
                .ctx
                .backend
                .complete(system, user, task.max_tokens, model, cancel);
            let outcome = tokio::select! {
                outcome = call => outcome,
                _ = cancel.cancelled() => return Err("cancelled".to_string()),
            };

            match outcome {
                Ok(completion) => return Ok(completion),
                Err(error) if error.is_transient() && attempt < self.ctx.config.task_retries => {
                    let delay = backoff_delay(attempt, &task.id);
                    log::warn!(
                        "task {}: transient backend failure ({}), retry {}/{} in {:?}",
                        task.id,
                        error,
                        attempt + 1,
                        self.ctx.config.task_retries,
                        delay
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return Err("cancelled".to_string()),
                    }
                    attempt += 1;
                }
                Err(error) => {
                    log::error!("task {}: backend failure: {}", task.id, error);
                    return Err(error.to_string());
                }
            }
        }
    }
}

/// Exponential backoff starting at [`RETRY_BASE_MS`], doubling per attempt,
/// capped at [`RETRY_CAP_MS`], with a ±20% jitter derived from hashing the
/// task id and attempt: deterministic for a given input, spread across a
/// fleet of tasks.
fn backoff_delay(attempt: usize, task_id: &str) -> Duration {
    let exponent = attempt.min(4) as u32;
    let base = std::cmp::min(RETRY_BASE_MS << exponent, RETRY_CAP_MS);

    let mut hasher = DefaultHasher::new();
    task_id.hash(&mut hasher);
    attempt.hash(&mut hasher);
    // Map the hash onto a 0.8..=1.2 factor in per-mille steps.
    let factor = 800 + (hasher.finish() % 401);

    Duration::from_millis(base * factor / 1000)
}

/// Glue the task prompt, the prior-work snapshot, any queued peer messages,
/// and the caller's context bag into the user prompt.
fn assemble_user_prompt(task: &Task, snapshot: &str, peer_messages: &[AgentMessage]) -> String {
    let mut prompt = task.prompt.clone();

    if !snapshot.is_empty() {
        prompt.push_str("\n\n## Prior work\n");
        prompt.push_str(snapshot);
    }

    if !peer_messages.is_empty() {
        prompt.push_str("\n\n## Messages from peers\n");
        for message in peer_messages {
            prompt.push_str(&format!("[{}]: {}\n", message.from, message.content));
        }
    }

    if !task.context.is_empty() {
        let mut keys: Vec<&String> = task.context.keys().collect();
        keys.sort();
        prompt.push_str("\n\n## Context\n");
        for key in keys {
            prompt.push_str(&format!("{}: {}\n", key, task.context[key]));
        }
    }

    prompt
}
