//! Diamond-shaped workflow over a scripted backend.
//!
//! Four tasks (one root, two parallel branches, one join) run under a
//! two-permit pool while the event stream narrates progress. No network, no
//! API keys: the backend is scripted, so this demo shows the orchestration
//! machinery itself.
//!
//! ```bash
//! RUST_LOG=info cargo run --example fan_out_fan_in
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use taskwave::{
    AgentBackend, AgentSpec, BackendError, CancelToken, Completion, Orchestrator, StaticRegistry,
    Task, WorkflowConfig, WorkflowEvent,
};

/// Pretends to think for a moment, then answers from a tiny script.
struct ScriptedBackend;

#[async_trait]
impl AgentBackend for ScriptedBackend {
    async fn complete(
        &self,
        _system: &str,
        user: &str,
        _max_tokens: usize,
        model: &str,
        _cancel: &CancelToken,
    ) -> Result<Completion, BackendError> {
        tokio::time::sleep(Duration::from_millis(400)).await;
        let text = if user.contains("root") {
            "The root analysis: split the problem into a data question and a systems question."
        } else if user.contains("data question") {
            "Data finding: the workload is read-heavy with a long tail of cold keys."
        } else if user.contains("systems question") {
            "Systems finding: a two-tier cache fits the latency budget."
        } else {
            "Joined conclusion: pair a small hot-tier cache with lazy cold-tier loading."
        };
        Ok(Completion {
            text: text.to_string(),
            input_tokens: user.len() / 4,
            output_tokens: text.len() / 4,
            stop_reason: format!("end_turn ({})", model),
        })
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let registry = Arc::new(StaticRegistry::new().with_agent(
        "analyst",
        AgentSpec::new("You are a pragmatic systems analyst.", "scripted-model"),
    ));
    let orchestrator = Orchestrator::new(Arc::new(ScriptedBackend), registry);

    let tasks = vec![
        Task::new("root", "analyst", "Analyze the root of the caching problem."),
        Task::new("branch_data", "analyst", "Take the data question from the root analysis.")
            .depends_on("root"),
        Task::new(
            "branch_systems",
            "analyst",
            "Take the systems question from the root analysis.",
        )
        .depends_on("root"),
        Task::new("join", "analyst", "Join both branch findings into one recommendation.")
            .depends_on("branch_data")
            .depends_on("branch_systems")
            .with_priority(8),
    ];

    let config = WorkflowConfig {
        max_parallel_agents: 2,
        ..WorkflowConfig::default()
    };
    let (handle, mut events) = orchestrator.submit(tasks, config);
    println!("run {} submitted\n", handle.run_id());

    while let Some(event) = events.recv().await {
        match event {
            WorkflowEvent::WaveStart {
                wave_index,
                task_ids,
            } => println!("== wave {} :: {:?}", wave_index, task_ids),
            WorkflowEvent::TaskStart {
                task_id,
                agent_name,
            } => println!("   -> {} ({})", task_id, agent_name),
            WorkflowEvent::TaskComplete {
                task_id,
                duration_ms,
                output_preview,
                ..
            } => println!("   <- {} [{}ms] {}", task_id, duration_ms, output_preview),
            WorkflowEvent::TaskError { task_id, error } => {
                println!("   !! {} failed: {}", task_id, error)
            }
            WorkflowEvent::WorkflowComplete { summary } => println!(
                "\ndone: {}/{} succeeded, {} tokens, {}ms",
                summary.success, summary.total, summary.total_tokens, summary.total_duration_ms
            ),
            WorkflowEvent::WorkflowError { error } => println!("\naborted: {}", error),
            _ => {}
        }
    }
    handle.wait().await;
}
