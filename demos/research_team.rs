//! The built-in `research_report` template end to end.
//!
//! Submits a template-form workflow (the same JSON shape a network transport
//! would carry), watches the planner fan out into researchers, and prints the
//! synthesized report from the final task's completion preview.
//!
//! ```bash
//! RUST_LOG=info cargo run --example research_team
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use taskwave::{
    AgentBackend, AgentSpec, BackendError, CancelToken, Completion, Orchestrator, StaticRegistry,
    WorkflowEvent, WorkflowSubmission,
};

struct ScriptedBackend;

#[async_trait]
impl AgentBackend for ScriptedBackend {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        _max_tokens: usize,
        _model: &str,
        _cancel: &CancelToken,
    ) -> Result<Completion, BackendError> {
        tokio::time::sleep(Duration::from_millis(250)).await;
        let text = if system.contains("planner") {
            "1. Storage engines\n2. Conflict resolution\n3. Transport protocols".to_string()
        } else if system.contains("researcher") {
            format!("Findings for my angle, grounded in the plan: {} chars of prior work seen.", user.len())
        } else {
            "Report: the three angles converge on a log-structured, CRDT-merged design.".to_string()
        };
        Ok(Completion {
            output_tokens: text.len() / 4,
            input_tokens: user.len() / 4,
            text,
            stop_reason: "end_turn".to_string(),
        })
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let registry = Arc::new(
        StaticRegistry::new()
            .with_agent(
                "planner",
                AgentSpec::new("You are the planner of a research team.", "scripted-large"),
            )
            .with_agent(
                "researcher",
                AgentSpec::new("You are a researcher on a team.", "scripted-small"),
            )
            .with_agent(
                "writer",
                AgentSpec::new("You are the team's writer.", "scripted-large"),
            ),
    );
    let orchestrator = Orchestrator::new(Arc::new(ScriptedBackend), registry);

    let mut parameters = HashMap::new();
    parameters.insert("topic".to_string(), "local-first data sync".to_string());
    parameters.insert("researchers".to_string(), "3".to_string());
    let submission = WorkflowSubmission::from_template("research_report", parameters);

    let (handle, mut events) = orchestrator.submit_workflow(submission);
    while let Some(event) = events.recv().await {
        match event {
            WorkflowEvent::TaskComplete {
                task_id,
                output_preview,
                ..
            } => {
                println!("[{}] {}", task_id, output_preview);
            }
            WorkflowEvent::WorkflowComplete { summary } => {
                println!(
                    "\nworkflow complete: {}/{} tasks, {} tokens",
                    summary.success, summary.total, summary.total_tokens
                );
            }
            WorkflowEvent::WorkflowError { error } => println!("workflow failed: {}", error),
            _ => {}
        }
    }
    handle.wait().await;
}
