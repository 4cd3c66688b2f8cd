//! Wave-based workflow scheduling.
//!
//! The [`Scheduler`] drives one run: it repeatedly asks the graph which
//! tasks are ready, dispatches them concurrently under the permit pool,
//! waits for the wave to settle, and advances. Waves are strict barriers:
//! wave N+1 never launches before every task of wave N has settled, while
//! tasks inside a wave complete in any order.
//!
//! The scheduler is the sole owner of the run's completed map. Task runners
//! return results through their join handles and never mutate shared
//! bookkeeping, which keeps the wave loop free of locks.
//!
//! Run-level aborts (cancellation, global timeout, deadlock, a dropped event
//! stream) end the run with a single `workflow_error`; per-task failures
//! never do; they flow downstream through the skip policy instead.

use crate::taskwave::event::{EmitterClosed, WorkflowEvent, WorkflowSummary};
use crate::taskwave::graph::TaskGraph;
use crate::taskwave::runner::{RunContext, TaskRunner};
use crate::taskwave::task::TaskResult;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Why a run aborted mid-flight. Carried into the terminal `workflow_error`.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Abort {
    Cancelled,
    Timeout,
}

impl Abort {
    fn reason(self) -> &'static str {
        match self {
            Abort::Cancelled => "cancelled",
            Abort::Timeout => "timeout",
        }
    }
}

/// Drives one workflow run to its terminal event.
pub struct Scheduler {
    ctx: Arc<RunContext>,
    runner: Arc<TaskRunner>,
}

impl Scheduler {
    /// Build a scheduler (and its task runner) over a run context.
    pub fn new(ctx: Arc<RunContext>) -> Self {
        let runner = Arc::new(TaskRunner::new(ctx.clone()));
        Self { ctx, runner }
    }

    /// Validate and execute the workflow, emitting every lifecycle event.
    ///
    /// Always leaves the bus closed and the stream terminated; if the
    /// consumer dropped the stream mid-run, the run is cancelled and wound
    /// down quietly.
    pub async fn run(&self, graph: TaskGraph) {
        if let Err(invalid) = graph.validate() {
            log::error!("workflow rejected: {}", invalid);
            let _ = self
                .ctx
                .emitter
                .emit(WorkflowEvent::WorkflowError {
                    error: invalid.to_string(),
                })
                .await;
            self.ctx.bus.close();
            return;
        }

        // Give every task a mailbox up front so broadcasts published before
        // a task starts are waiting for it when it does.
        for task in graph.tasks() {
            self.ctx.bus.register(&task.id);
        }

        if let Err(EmitterClosed) = self.drive(&graph).await {
            log::warn!("event consumer dropped the stream; cancelling run");
            self.ctx.cancel.cancel();
        }
        self.ctx.bus.close();
    }

    /// The wave loop proper. Returns early only when the event stream is
    /// gone; every other outcome ends with exactly one terminal event.
    async fn drive(&self, graph: &TaskGraph) -> Result<(), EmitterClosed> {
        let emitter = &self.ctx.emitter;
        let run_started = Instant::now();
        let deadline = run_started + Duration::from_millis(self.ctx.config.global_timeout_ms);

        emitter
            .emit(WorkflowEvent::WorkflowStart {
                task_count: graph.len(),
            })
            .await?;
        log::info!(
            "workflow started: {} task(s), {} max parallel",
            graph.len(),
            self.ctx.config.max_parallel_agents
        );

        let semaphore = Arc::new(Semaphore::new(self.ctx.config.max_parallel_agents));
        let mut completed: HashMap<String, TaskResult> = HashMap::new();
        let mut wave_index = 0usize;

        loop {
            let completed_ids: HashSet<String> = completed.keys().cloned().collect();
            let ready = graph.ready_ids(&completed_ids);

            if ready.is_empty() {
                if completed.len() == graph.len() {
                    break;
                }
                // Only reachable if a completion was lost upstream of us;
                // always a bug, never a recoverable state.
                log::error!(
                    "deadlock: {} task(s) pending with none ready",
                    graph.len() - completed.len()
                );
                emitter
                    .emit(WorkflowEvent::WorkflowError {
                        error: "deadlock".to_string(),
                    })
                    .await?;
                return Ok(());
            }

            if self.ctx.cancel.is_cancelled() {
                emitter
                    .emit(WorkflowEvent::WorkflowError {
                        error: "cancelled".to_string(),
                    })
                    .await?;
                return Ok(());
            }
            if Instant::now() >= deadline {
                self.ctx.cancel.cancel();
                emitter
                    .emit(WorkflowEvent::WorkflowError {
                        error: "timeout".to_string(),
                    })
                    .await?;
                return Ok(());
            }

            for task_id in &ready {
                emitter
                    .emit(WorkflowEvent::TaskReady {
                        task_id: task_id.clone(),
                    })
                    .await?;
            }
            emitter
                .emit(WorkflowEvent::WaveStart {
                    wave_index,
                    task_ids: ready.clone(),
                })
                .await?;
            log::info!("wave {}: dispatching {} task(s)", wave_index, ready.len());

            let (results, abort) = self
                .dispatch_wave(graph, &ready, &completed, &semaphore, deadline)
                .await?;

            let success_count = results.iter().filter(|result| result.success).count();
            let failure_count = results.len() - success_count;
            for result in results {
                completed.insert(result.task_id.clone(), result);
            }

            emitter
                .emit(WorkflowEvent::WaveComplete {
                    wave_index,
                    success_count,
                    failure_count,
                })
                .await?;
            log::info!(
                "wave {}: {} succeeded, {} failed",
                wave_index,
                success_count,
                failure_count
            );

            if let Some(abort) = abort {
                emitter
                    .emit(WorkflowEvent::WorkflowError {
                        error: abort.reason().to_string(),
                    })
                    .await?;
                return Ok(());
            }

            wave_index += 1;
        }

        let success = completed.values().filter(|result| result.success).count();
        let summary = WorkflowSummary {
            total: graph.len(),
            success,
            failure: graph.len() - success,
            total_tokens: completed.values().map(|result| result.tokens_used).sum(),
            total_duration_ms: run_started.elapsed().as_millis() as u64,
        };
        log::info!(
            "workflow complete: {}/{} succeeded, {} tokens, {}ms",
            summary.success,
            summary.total,
            summary.total_tokens,
            summary.total_duration_ms
        );
        emitter
            .emit(WorkflowEvent::WorkflowComplete { summary })
            .await?;
        Ok(())
    }

    /// Launch one wave under the permit pool and wait for it to settle.
    ///
    /// Permits are acquired in ready order, so when the pool is saturated
    /// high-priority tasks start first. On cancellation or timeout the
    /// launch loop stops, in-flight tasks get the grace window to honor the
    /// cancel flag, and everything still unsettled is recorded as cancelled.
    async fn dispatch_wave(
        &self,
        graph: &TaskGraph,
        ready: &[String],
        completed: &HashMap<String, TaskResult>,
        semaphore: &Arc<Semaphore>,
        deadline: Instant,
    ) -> Result<(Vec<TaskResult>, Option<Abort>), EmitterClosed> {
        let cancel = &self.ctx.cancel;
        let mut abort: Option<Abort> = None;
        let mut join_set: JoinSet<TaskResult> = JoinSet::new();
        let mut launched: HashSet<String> = HashSet::new();

        for task_id in ready {
            let task = match graph.get(task_id) {
                Some(task) => task.clone(),
                None => continue,
            };
            let failed_upstream = task
                .dependencies
                .iter()
                .find(|dependency| {
                    completed
                        .get(dependency.as_str())
                        .map(|result| !result.success)
                        .unwrap_or(false)
                })
                .cloned();

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    abort = Some(Abort::Cancelled);
                    break;
                }
                _ = tokio::time::sleep_until(deadline) => {
                    cancel.cancel();
                    abort = Some(Abort::Timeout);
                    break;
                }
                permit = semaphore.clone().acquire_owned() => {
                    permit.expect("permit pool closed mid-run")
                }
            };
            log::debug!("task {}: permit acquired", task.id);

            launched.insert(task_id.clone());
            let runner = self.runner.clone();
            join_set.spawn(async move {
                let result = runner.run(task, failed_upstream).await;
                drop(permit);
                result
            });
        }

        let mut results: Vec<TaskResult> = Vec::new();
        loop {
            if abort.is_none() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        abort = Some(Abort::Cancelled);
                    }
                    _ = tokio::time::sleep_until(deadline) => {
                        cancel.cancel();
                        abort = Some(Abort::Timeout);
                    }
                    joined = join_set.join_next() => match joined {
                        Some(Ok(result)) => results.push(result),
                        Some(Err(join_error)) => {
                            log::error!("task aborted abnormally: {}", join_error);
                        }
                        None => break,
                    }
                }
            } else {
                // Grace window: in-flight runners observe the cancel flag
                // and settle themselves; whatever remains is torn down.
                let grace = Duration::from_millis(self.ctx.config.cancellation_grace_ms);
                match tokio::time::timeout(grace, join_set.join_next()).await {
                    Ok(Some(Ok(result))) => results.push(result),
                    Ok(Some(Err(join_error))) => {
                        log::error!("task aborted abnormally: {}", join_error);
                    }
                    Ok(None) => break,
                    Err(_) => {
                        log::warn!(
                            "cancellation grace expired with {} task(s) in flight",
                            join_set.len()
                        );
                        join_set.abort_all();
                        while join_set.join_next().await.is_some() {}
                        break;
                    }
                }
            }
        }

        if abort.is_some() {
            // Settle the wave's books: members that never produced a result
            // are recorded (and reported) as cancelled.
            let settled: HashSet<String> = results
                .iter()
                .map(|result| result.task_id.clone())
                .collect();
            for task_id in ready {
                if settled.contains(task_id.as_str()) {
                    continue;
                }
                let task = match graph.get(task_id) {
                    Some(task) => task,
                    None => continue,
                };
                if !launched.contains(task_id) {
                    self.ctx
                        .emitter
                        .emit(WorkflowEvent::TaskStart {
                            task_id: task_id.clone(),
                            agent_name: task.agent_name.clone(),
                        })
                        .await?;
                }
                self.ctx
                    .emitter
                    .emit(WorkflowEvent::TaskError {
                        task_id: task_id.clone(),
                        error: "cancelled".to_string(),
                    })
                    .await?;
                results.push(TaskResult::cancelled(task, 0));
            }
        }

        Ok((results, abort))
    }
}
