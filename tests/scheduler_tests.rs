use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use taskwave::{
    AgentBackend, AgentSpec, BackendError, CancelToken, Completion, ContextStrategy, Orchestrator,
    StaticRegistry, Task, WorkflowConfig, WorkflowEvent,
};

/// Mock backend scripted by substring-matching the user prompt: task prompts
/// carry unique markers, so tests can target behavior per task without the
/// backend knowing task ids.
struct ScriptedBackend {
    delay_ms: u64,
    responses: Vec<(String, String)>,
    permanent_failures: Vec<String>,
    transient_failures: Mutex<HashMap<String, usize>>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedBackend {
    fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            responses: Vec::new(),
            permanent_failures: Vec::new(),
            transient_failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    fn respond(mut self, marker: &str, text: &str) -> Self {
        self.responses.push((marker.to_string(), text.to_string()));
        self
    }

    fn fail_permanently(mut self, marker: &str) -> Self {
        self.permanent_failures.push(marker.to_string());
        self
    }

    fn fail_transiently(self, marker: &str, times: usize) -> Self {
        self.transient_failures
            .lock()
            .unwrap()
            .insert(marker.to_string(), times);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn peak(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentBackend for ScriptedBackend {
    async fn complete(
        &self,
        _system: &str,
        user: &str,
        _max_tokens: usize,
        _model: &str,
        _cancel: &CancelToken,
    ) -> Result<Completion, BackendError> {
        self.calls.lock().unwrap().push(user.to_string());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        for marker in &self.permanent_failures {
            if user.contains(marker) {
                return Err(BackendError::permanent(format!("scripted failure: {}", marker)));
            }
        }
        {
            let mut transient = self.transient_failures.lock().unwrap();
            for (marker, remaining) in transient.iter_mut() {
                if user.contains(marker) && *remaining > 0 {
                    *remaining -= 1;
                    return Err(BackendError::transient("scripted transient failure"));
                }
            }
        }

        let text = self
            .responses
            .iter()
            .find(|(marker, _)| user.contains(marker))
            .map(|(_, text)| text.clone())
            .unwrap_or_else(|| "ok".to_string());
        Ok(Completion {
            text,
            input_tokens: user.len() / 4,
            output_tokens: 10,
            stop_reason: "end_turn".to_string(),
        })
    }
}

fn registry() -> Arc<StaticRegistry> {
    Arc::new(
        StaticRegistry::new()
            .with_agent("agent", AgentSpec::new("You are a test agent.", "mock-model"))
            .with_agent("other", AgentSpec::new("You are another agent.", "mock-model-2")),
    )
}

fn fast_config() -> WorkflowConfig {
    WorkflowConfig {
        max_parallel_agents: 2,
        task_retries: 0,
        ..WorkflowConfig::default()
    }
}

fn diamond() -> Vec<Task> {
    vec![
        Task::new("a", "agent", "marker_a: do the root work"),
        Task::new("b", "agent", "marker_b: first branch").depends_on("a"),
        Task::new("c", "agent", "marker_c: second branch").depends_on("a"),
        Task::new("d", "agent", "marker_d: join the branches")
            .depends_on("b")
            .depends_on("c"),
    ]
}

async fn run_to_events(
    backend: Arc<ScriptedBackend>,
    tasks: Vec<Task>,
    config: WorkflowConfig,
) -> Vec<WorkflowEvent> {
    let orchestrator = Orchestrator::new(backend, registry());
    let (handle, stream) = orchestrator.submit(tasks, config);
    let events = stream.collect_all().await;
    handle.wait().await;
    events
}

fn index_of<F: Fn(&WorkflowEvent) -> bool>(events: &[WorkflowEvent], predicate: F) -> usize {
    events
        .iter()
        .position(predicate)
        .unwrap_or_else(|| panic!("event not found in {:?}", events))
}

fn task_start_index(events: &[WorkflowEvent], id: &str) -> usize {
    index_of(events, |event| {
        matches!(event, WorkflowEvent::TaskStart { task_id, .. } if task_id == id)
    })
}

fn task_settled_index(events: &[WorkflowEvent], id: &str) -> usize {
    index_of(events, |event| match event {
        WorkflowEvent::TaskComplete { task_id, .. } => task_id == id,
        WorkflowEvent::TaskError { task_id, .. } => task_id == id,
        _ => false,
    })
}

/// Every task gets exactly one task_start and exactly one settling event,
/// start before settle, and the stream ends with exactly one terminal event.
fn assert_lifecycle_invariants(events: &[WorkflowEvent], ids: &[&str]) {
    for id in ids {
        let starts = events
            .iter()
            .filter(|event| {
                matches!(event, WorkflowEvent::TaskStart { task_id, .. } if task_id == id)
            })
            .count();
        let settles = events
            .iter()
            .filter(|event| match event {
                WorkflowEvent::TaskComplete { task_id, .. } => task_id == id,
                WorkflowEvent::TaskError { task_id, .. } => task_id == id,
                _ => false,
            })
            .count();
        assert_eq!(starts, 1, "task {} start count", id);
        assert_eq!(settles, 1, "task {} settle count", id);
        assert!(task_start_index(events, id) < task_settled_index(events, id));
    }

    let terminals = events.iter().filter(|event| event.is_terminal()).count();
    assert_eq!(terminals, 1, "exactly one terminal event");
    assert!(events.last().unwrap().is_terminal());
}

// ---------------------------------------------------------------------------
// End-to-end scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_fan_out_fan_in_waves() {
    let backend = Arc::new(ScriptedBackend::new(50));
    let events = run_to_events(backend.clone(), diamond(), fast_config()).await;

    assert!(matches!(
        events[0],
        WorkflowEvent::WorkflowStart { task_count: 4 }
    ));
    assert_lifecycle_invariants(&events, &["a", "b", "c", "d"]);

    // Three waves: [a], [b, c], [d].
    let waves: Vec<(usize, Vec<String>)> = events
        .iter()
        .filter_map(|event| match event {
            WorkflowEvent::WaveStart {
                wave_index,
                task_ids,
            } => Some((*wave_index, task_ids.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(waves.len(), 3);
    assert_eq!(waves[0], (0, vec!["a".to_string()]));
    assert_eq!(waves[1], (1, vec!["b".to_string(), "c".to_string()]));
    assert_eq!(waves[2], (2, vec!["d".to_string()]));

    // Siblings overlap: both started before either settled.
    let starts = task_start_index(&events, "b").max(task_start_index(&events, "c"));
    let settles = task_settled_index(&events, "b").min(task_settled_index(&events, "c"));
    assert!(starts < settles, "b and c must run concurrently");

    // Wave barriers: d starts only after wave 1 completed.
    let wave1_complete = index_of(&events, |event| {
        matches!(event, WorkflowEvent::WaveComplete { wave_index: 1, .. })
    });
    assert!(task_start_index(&events, "d") > wave1_complete);

    match events.last().unwrap() {
        WorkflowEvent::WorkflowComplete { summary } => {
            assert_eq!(summary.total, 4);
            assert_eq!(summary.success, 4);
            assert_eq!(summary.failure, 0);
            assert!(summary.total_tokens > 0);
        }
        other => panic!("expected workflow_complete, got {:?}", other),
    }

    assert!(backend.peak() <= 2, "concurrency cap exceeded");
}

#[tokio::test]
async fn test_upstream_failure_skips_downstream() {
    let backend = Arc::new(ScriptedBackend::new(10).fail_permanently("marker_b"));
    let events = run_to_events(backend.clone(), diamond(), fast_config()).await;

    assert_lifecycle_invariants(&events, &["a", "b", "c", "d"]);

    // d settles as an upstream-failure skip, without a backend call.
    let d_error = events
        .iter()
        .find_map(|event| match event {
            WorkflowEvent::TaskError { task_id, error } if task_id == "d" => Some(error.clone()),
            _ => None,
        })
        .expect("d must error");
    assert_eq!(d_error, "upstream b failed");
    assert!(
        !events.iter().any(|event| matches!(
            event,
            WorkflowEvent::AgentInvoke { task_id, .. } if task_id == "d"
        )),
        "skipped task must not invoke the backend"
    );
    assert!(!backend.calls().iter().any(|call| call.contains("marker_d")));

    // Per-task failure never aborts the run.
    match events.last().unwrap() {
        WorkflowEvent::WorkflowComplete { summary } => {
            assert_eq!(summary.success, 2);
            assert_eq!(summary.failure, 2);
        }
        other => panic!("expected workflow_complete, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cycle_rejected_before_any_start() {
    let backend = Arc::new(ScriptedBackend::new(0));
    let tasks = vec![
        Task::new("a", "agent", "p").depends_on("b"),
        Task::new("b", "agent", "p").depends_on("a"),
    ];
    let events = run_to_events(backend.clone(), tasks, fast_config()).await;

    assert_eq!(events.len(), 1, "stream is exactly one workflow_error");
    match &events[0] {
        WorkflowEvent::WorkflowError { error } => assert!(error.starts_with("cycle: ")),
        other => panic!("expected workflow_error, got {:?}", other),
    }
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_global_timeout_cancels_in_flight_work() {
    let backend = Arc::new(ScriptedBackend::new(60_000));
    let config = WorkflowConfig {
        global_timeout_ms: 300,
        cancellation_grace_ms: 500,
        ..fast_config()
    };
    let started = std::time::Instant::now();
    let events = run_to_events(
        backend,
        vec![Task::new("slow", "agent", "marker_slow")],
        config,
    )
    .await;
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "timeout must cut the run short"
    );

    let error = events
        .iter()
        .find_map(|event| match event {
            WorkflowEvent::TaskError { task_id, error } if task_id == "slow" => {
                Some(error.clone())
            }
            _ => None,
        })
        .expect("in-flight task must settle as cancelled");
    assert_eq!(error, "cancelled");

    let wave_complete = index_of(&events, |event| {
        matches!(event, WorkflowEvent::WaveComplete { .. })
    });
    let terminal = events.len() - 1;
    assert!(wave_complete < terminal, "wave_complete precedes the terminal");
    match &events[terminal] {
        WorkflowEvent::WorkflowError { error } => assert_eq!(error, "timeout"),
        other => panic!("expected workflow_error(timeout), got {:?}", other),
    }
}

#[tokio::test]
async fn test_priority_tie_break_under_saturation() {
    let backend = Arc::new(ScriptedBackend::new(100));
    let tasks = vec![
        Task::new("x", "agent", "marker_x").with_priority(9),
        Task::new("y", "agent", "marker_y").with_priority(9),
        Task::new("z", "agent", "marker_z").with_priority(1),
    ];
    let events = run_to_events(backend, tasks, fast_config()).await;

    // Ready order is priority desc, insertion asc.
    let wave_start = index_of(&events, |event| {
        matches!(event, WorkflowEvent::WaveStart { .. })
    });
    match &events[wave_start] {
        WorkflowEvent::WaveStart { task_ids, .. } => {
            assert_eq!(task_ids, &["x", "y", "z"]);
        }
        _ => unreachable!(),
    }

    // With two permits, z cannot start until one of x/y settles.
    let z_start = task_start_index(&events, "z");
    let first_settle =
        task_settled_index(&events, "x").min(task_settled_index(&events, "y"));
    assert!(z_start > first_settle, "z must wait for a free permit");

    let x_start = task_start_index(&events, "x");
    let y_start = task_start_index(&events, "y");
    assert!(x_start < z_start && y_start < z_start);
}

#[tokio::test]
async fn test_context_isolation_and_sharing() {
    let secret = "SECRET_ALPHA_OUTPUT_93";
    let tasks = || {
        vec![
            Task::new("a", "agent", "marker_alpha: produce"),
            Task::new("b", "agent", "marker_beta: consume").depends_on("a"),
        ]
    };

    // Isolated: no trace of a's output in b's prompt, byte for byte.
    let backend = Arc::new(ScriptedBackend::new(5).respond("marker_alpha", secret));
    let config = WorkflowConfig {
        context_strategy: ContextStrategy::Isolated,
        ..fast_config()
    };
    run_to_events(backend.clone(), tasks(), config).await;
    let b_call = backend
        .calls()
        .into_iter()
        .find(|call| call.contains("marker_beta"))
        .expect("b must run");
    assert!(
        !b_call.contains(secret),
        "isolated strategy leaked upstream output"
    );

    // Shared: a's output (whole or packed) appears in b's prompt.
    let backend = Arc::new(ScriptedBackend::new(5).respond("marker_alpha", secret));
    run_to_events(backend.clone(), tasks(), fast_config()).await;
    let b_call = backend
        .calls()
        .into_iter()
        .find(|call| call.contains("marker_beta"))
        .expect("b must run");
    assert!(b_call.contains("## Prior work"));
    assert!(
        b_call.contains(secret) || b_call.contains("[content pruned]"),
        "shared strategy must carry upstream output"
    );
}

// ---------------------------------------------------------------------------
// Boundaries and policies
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_empty_task_list_completes_immediately() {
    let backend = Arc::new(ScriptedBackend::new(0));
    let events = run_to_events(backend, vec![], fast_config()).await;

    assert_eq!(events.len(), 2);
    assert!(matches!(
        events[0],
        WorkflowEvent::WorkflowStart { task_count: 0 }
    ));
    match &events[1] {
        WorkflowEvent::WorkflowComplete { summary } => {
            assert_eq!(summary.total, 0);
            assert_eq!(summary.success, 0);
            assert_eq!(summary.failure, 0);
            assert_eq!(summary.total_tokens, 0);
        }
        other => panic!("expected workflow_complete, got {:?}", other),
    }
}

#[tokio::test]
async fn test_single_permit_serializes_wave() {
    let backend = Arc::new(ScriptedBackend::new(30));
    let tasks = vec![
        Task::new("t0", "agent", "m0"),
        Task::new("t1", "agent", "m1"),
        Task::new("t2", "agent", "m2"),
    ];
    let config = WorkflowConfig {
        max_parallel_agents: 1,
        ..fast_config()
    };
    let events = run_to_events(backend.clone(), tasks, config).await;

    assert_eq!(backend.peak(), 1, "tasks must run strictly one at a time");
    assert_lifecycle_invariants(&events, &["t0", "t1", "t2"]);
}

#[tokio::test]
async fn test_cancel_after_completion_is_a_noop() {
    let backend = Arc::new(ScriptedBackend::new(5));
    let orchestrator = Orchestrator::new(backend, registry());
    let (handle, stream) = orchestrator.submit(
        vec![Task::new("only", "agent", "m")],
        fast_config(),
    );
    // Drain the stream first: the run has already reached its terminal event
    // by the time collect_all returns, so this cancel hits a finished run.
    let events = stream.collect_all().await;
    handle.cancel();
    handle.wait().await;

    assert!(matches!(
        events.last().unwrap(),
        WorkflowEvent::WorkflowComplete { .. }
    ));
}

#[tokio::test]
async fn test_cancellation_mid_run() {
    let backend = Arc::new(ScriptedBackend::new(60_000));
    let orchestrator = Orchestrator::new(backend, registry());
    let config = WorkflowConfig {
        cancellation_grace_ms: 500,
        ..fast_config()
    };
    let (handle, stream) =
        orchestrator.submit(vec![Task::new("slow", "agent", "marker_slow")], config);

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.cancel();
        handle.cancel(); // idempotent
        handle
    });

    let started = std::time::Instant::now();
    let events = stream.collect_all().await;
    assert!(started.elapsed() < Duration::from_secs(5));

    let handle = canceller.await.unwrap();
    handle.wait().await;

    match events.last().unwrap() {
        WorkflowEvent::WorkflowError { error } => assert_eq!(error, "cancelled"),
        other => panic!("expected workflow_error(cancelled), got {:?}", other),
    }
    assert!(events.iter().any(|event| matches!(
        event,
        WorkflowEvent::TaskError { error, .. } if error == "cancelled"
    )));
}

#[tokio::test]
async fn test_transient_failure_retried_to_success() {
    let backend = Arc::new(ScriptedBackend::new(5).fail_transiently("marker_flaky", 1));
    let config = WorkflowConfig {
        task_retries: 2,
        ..fast_config()
    };
    let events = run_to_events(
        backend.clone(),
        vec![Task::new("flaky", "agent", "marker_flaky")],
        config,
    )
    .await;

    assert_eq!(backend.calls().len(), 2, "one failure, one retry");
    assert_lifecycle_invariants(&events, &["flaky"]);
    assert!(events.iter().any(|event| matches!(
        event,
        WorkflowEvent::TaskComplete { task_id, .. } if task_id == "flaky"
    )));
}

#[tokio::test]
async fn test_transient_failures_exhaust_retries() {
    let backend = Arc::new(ScriptedBackend::new(5).fail_transiently("marker_flaky", 99));
    let config = WorkflowConfig {
        task_retries: 1,
        ..fast_config()
    };
    let events = run_to_events(
        backend.clone(),
        vec![Task::new("flaky", "agent", "marker_flaky")],
        config,
    )
    .await;

    assert_eq!(backend.calls().len(), 2, "initial call plus one retry");
    assert!(events.iter().any(|event| matches!(
        event,
        WorkflowEvent::TaskError { task_id, .. } if task_id == "flaky"
    )));
    // A lone task failure still ends in workflow_complete.
    assert!(matches!(
        events.last().unwrap(),
        WorkflowEvent::WorkflowComplete { .. }
    ));
}

#[tokio::test]
async fn test_permanent_failure_is_not_retried() {
    let backend = Arc::new(ScriptedBackend::new(5).fail_permanently("marker_dead"));
    let config = WorkflowConfig {
        task_retries: 5,
        ..fast_config()
    };
    run_to_events(
        backend.clone(),
        vec![Task::new("dead", "agent", "marker_dead")],
        config,
    )
    .await;
    assert_eq!(backend.calls().len(), 1);
}

#[tokio::test]
async fn test_unknown_agent_fails_task_and_skips_downstream() {
    let backend = Arc::new(ScriptedBackend::new(5));
    let tasks = vec![
        Task::new("ghost_task", "ghost", "m1"),
        Task::new("after", "agent", "m2").depends_on("ghost_task"),
    ];
    let events = run_to_events(backend.clone(), tasks, fast_config()).await;

    let ghost_error = events
        .iter()
        .find_map(|event| match event {
            WorkflowEvent::TaskError { task_id, error } if task_id == "ghost_task" => {
                Some(error.clone())
            }
            _ => None,
        })
        .unwrap();
    assert_eq!(ghost_error, "unknown agent: ghost");
    assert!(backend.calls().is_empty());

    let after_error = events
        .iter()
        .find_map(|event| match event {
            WorkflowEvent::TaskError { task_id, error } if task_id == "after" => {
                Some(error.clone())
            }
            _ => None,
        })
        .unwrap();
    assert_eq!(after_error, "upstream ghost_task failed");
}

#[tokio::test]
async fn test_model_override_reaches_agent_invoke() {
    let backend = Arc::new(ScriptedBackend::new(5));
    let tasks = vec![
        Task::new("default_model", "agent", "m1"),
        Task::new("override", "agent", "m2").with_model("special-tier"),
    ];
    let events = run_to_events(backend, tasks, fast_config()).await;

    let models: HashMap<String, String> = events
        .iter()
        .filter_map(|event| match event {
            WorkflowEvent::AgentInvoke { task_id, model, .. } => {
                Some((task_id.clone(), model.clone()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(models["default_model"], "mock-model");
    assert_eq!(models["override"], "special-tier");
}

#[tokio::test]
async fn test_output_preview_is_bounded() {
    let long_output = "y".repeat(5_000);
    let backend = Arc::new(ScriptedBackend::new(5).respond("marker_long", &long_output));
    let events = run_to_events(
        backend,
        vec![Task::new("long", "agent", "marker_long")],
        fast_config(),
    )
    .await;

    let preview = events
        .iter()
        .find_map(|event| match event {
            WorkflowEvent::TaskComplete { output_preview, .. } => Some(output_preview.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(preview.chars().count(), 280);
}

#[tokio::test]
async fn test_peer_announcements_reach_later_tasks() {
    let backend = Arc::new(ScriptedBackend::new(5));
    let tasks = vec![
        Task::new("a", "agent", "marker_a"),
        Task::new("b", "agent", "marker_b").depends_on("a"),
    ];
    let events = run_to_events(backend.clone(), tasks, fast_config()).await;
    assert!(matches!(
        events.last().unwrap(),
        WorkflowEvent::WorkflowComplete { .. }
    ));

    let b_call = backend
        .calls()
        .into_iter()
        .find(|call| call.contains("marker_b"))
        .unwrap();
    assert!(b_call.contains("## Messages from peers"));
    assert!(b_call.contains("[a]:"));
}

#[tokio::test]
async fn test_disabled_communication_elides_preamble_and_messages() {
    let backend = Arc::new(ScriptedBackend::new(5));
    let tasks = vec![
        Task::new("a", "agent", "marker_a"),
        Task::new("b", "agent", "marker_b").depends_on("a"),
    ];
    let config = WorkflowConfig {
        enable_communication: false,
        ..fast_config()
    };
    let orchestrator = Orchestrator::new(backend.clone(), registry());
    let (handle, stream) = orchestrator.submit(tasks, config);
    let events = stream.collect_all().await;

    assert!(matches!(
        events.last().unwrap(),
        WorkflowEvent::WorkflowComplete { .. }
    ));
    for call in backend.calls() {
        assert!(!call.contains("## Messages from peers"));
    }
    assert!(handle.message_bus().history().is_empty());
    handle.wait().await;
}

#[tokio::test]
async fn test_concurrent_runs_do_not_interfere() {
    let backend = Arc::new(ScriptedBackend::new(20));
    let orchestrator = Orchestrator::new(backend, registry());

    let (handle_one, stream_one) = orchestrator.submit(diamond(), fast_config());
    let (handle_two, stream_two) = orchestrator.submit(diamond(), fast_config());
    assert_ne!(handle_one.run_id(), handle_two.run_id());

    let (events_one, events_two) =
        tokio::join!(stream_one.collect_all(), stream_two.collect_all());
    handle_one.wait().await;
    handle_two.wait().await;

    for events in [&events_one, &events_two] {
        assert_lifecycle_invariants(events, &["a", "b", "c", "d"]);
        assert!(matches!(
            events.last().unwrap(),
            WorkflowEvent::WorkflowComplete { .. }
        ));
    }
}

#[tokio::test]
async fn test_submit_workflow_rejects_unknown_template() {
    let backend = Arc::new(ScriptedBackend::new(0));
    let orchestrator = Orchestrator::new(backend, registry());
    let submission = taskwave::WorkflowSubmission::from_template("nope", HashMap::new());
    let (handle, stream) = orchestrator.submit_workflow(submission);
    let events = stream.collect_all().await;
    handle.wait().await;

    assert_eq!(events.len(), 1);
    match &events[0] {
        WorkflowEvent::WorkflowError { error } => {
            assert_eq!(error, "unknown template: nope");
        }
        other => panic!("expected workflow_error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_event_serialization_is_tagged() {
    let event = WorkflowEvent::TaskComplete {
        task_id: "t".to_string(),
        success: true,
        duration_ms: 12,
        tokens_used: 34,
        output_preview: "out".to_string(),
    };
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(value["type"], "task_complete");
    assert_eq!(value["task_id"], "t");

    let back: WorkflowEvent = serde_json::from_value(value).unwrap();
    assert_eq!(back, event);
}
