//! Progress event stream.
//!
//! A workflow run narrates itself as an ordered sequence of [`WorkflowEvent`]s
//! delivered to a single subscriber: the [`EventStream`] handed back by
//! [`Orchestrator::submit`](crate::orchestrator::Orchestrator::submit).
//! Delivery is lossless and back-pressured: when the consumer is slow,
//! [`EventEmitter::emit`] suspends until the consumer catches up, which in
//! turn paces the scheduler.
//!
//! # Ordering guarantees
//!
//! - The emitted sequence is a linearization of the concurrent `emit` calls:
//!   if A's `emit` returned before B's began, A appears first.
//! - Every `task_start` is followed, for the same id, by exactly one of
//!   `task_complete` or `task_error`.
//! - `wave_start` precedes all of its wave's `task_start`s; `wave_complete`
//!   follows all of them.
//! - Exactly one terminal event closes the stream: `workflow_complete` or
//!   `workflow_error`, never both.
//!
//! Events are a serde-tagged union (`"type"` discriminant, snake_case names)
//! so transports can frame them one per message without bespoke encoders.

use futures_util::Stream;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Queue depth of the emitter channel. Small on purpose: a stalled consumer
/// should stall the scheduler rather than buffer a run's worth of events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Maximum characters of task output carried on a `task_complete` event.
pub const OUTPUT_PREVIEW_CHARS: usize = 280;

/// Truncate `text` to at most `max` characters on a char boundary.
pub(crate) fn preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    text.chars().take(max).collect()
}

/// Closing totals carried by `workflow_complete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    /// Tasks in the workflow.
    pub total: usize,
    /// Tasks that produced output.
    pub success: usize,
    /// Tasks that failed or were skipped.
    pub failure: usize,
    /// Tokens consumed across every backend call.
    pub total_tokens: usize,
    /// Wall time of the run in milliseconds.
    pub total_duration_ms: u64,
}

/// One frame of workflow progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// The run was accepted and is about to schedule its first wave.
    WorkflowStart {
        /// Number of tasks in the workflow.
        task_count: usize,
    },

    /// A task entered a ready set.
    TaskReady {
        /// The ready task.
        task_id: String,
    },

    /// A wave of ready tasks is about to dispatch.
    WaveStart {
        /// Zero-based wave counter.
        wave_index: usize,
        /// The wave's members in dispatch order.
        task_ids: Vec<String>,
    },

    /// A task began executing.
    TaskStart {
        /// The task.
        task_id: String,
        /// Agent the task names.
        agent_name: String,
    },

    /// The backend is about to be called on the task's behalf.
    AgentInvoke {
        /// The task.
        task_id: String,
        /// Agent the task names.
        agent_name: String,
        /// Model actually selected (task override or registry default).
        model: String,
        /// Output token cap for the call.
        max_tokens: usize,
    },

    /// A task finished with output.
    TaskComplete {
        /// The task.
        task_id: String,
        /// Always true; present so consumers can treat complete/error rows
        /// uniformly.
        success: bool,
        /// Wall time of the task in milliseconds.
        duration_ms: u64,
        /// Tokens consumed by the task's backend calls.
        tokens_used: usize,
        /// First [`OUTPUT_PREVIEW_CHARS`] characters of the output.
        output_preview: String,
    },

    /// A task failed, was skipped, or was cancelled.
    TaskError {
        /// The task.
        task_id: String,
        /// What went wrong.
        error: String,
    },

    /// All of a wave's tasks have settled.
    WaveComplete {
        /// Zero-based wave counter.
        wave_index: usize,
        /// Wave members that succeeded.
        success_count: usize,
        /// Wave members that failed.
        failure_count: usize,
    },

    /// Terminal: the run drained its graph.
    WorkflowComplete {
        /// Closing totals.
        summary: WorkflowSummary,
    },

    /// Terminal: the run aborted (invalid workflow, deadlock, cancellation,
    /// timeout).
    WorkflowError {
        /// Why.
        error: String,
    },
}

impl WorkflowEvent {
    /// True for the two terminal variants.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowEvent::WorkflowComplete { .. } | WorkflowEvent::WorkflowError { .. }
        )
    }
}

/// The consumer dropped the [`EventStream`]; nothing further can be
/// delivered. The scheduler reacts by cancelling the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmitterClosed;

impl fmt::Display for EmitterClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event consumer dropped the stream")
    }
}

impl Error for EmitterClosed {}

/// Producer half of the run's event channel. Cloned into every task runner;
/// the channel serializes concurrent emits into one total order.
#[derive(Clone)]
pub struct EventEmitter {
    tx: mpsc::Sender<WorkflowEvent>,
}

impl EventEmitter {
    /// Deliver one event, suspending while the consumer is behind.
    pub async fn emit(&self, event: WorkflowEvent) -> Result<(), EmitterClosed> {
        self.tx.send(event).await.map_err(|_| EmitterClosed)
    }
}

/// Consumer half of the run's event channel.
///
/// Ends (yields `None`) after the terminal event, once the run's last
/// emitter handle is dropped. Also implements [`futures_util::Stream`]
/// for combinator-style consumption.
pub struct EventStream {
    rx: mpsc::Receiver<WorkflowEvent>,
}

impl EventStream {
    /// Next event in order, or `None` when the stream has ended.
    pub async fn recv(&mut self) -> Option<WorkflowEvent> {
        self.rx.recv().await
    }

    /// Drain the stream to completion and return every event in order.
    /// Convenient in tests and batch consumers; interactive callers should
    /// loop on [`recv`](EventStream::recv) instead.
    pub async fn collect_all(mut self) -> Vec<WorkflowEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        events
    }
}

impl Stream for EventStream {
    type Item = WorkflowEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // EventStream is Unpin (mpsc::Receiver is), so this is the safe path.
        self.get_mut().rx.poll_recv(cx)
    }
}

/// Build one run's emitter/stream pair.
pub fn event_channel() -> (EventEmitter, EventStream) {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    (EventEmitter { tx }, EventStream { rx })
}
