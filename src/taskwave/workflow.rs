//! Workflow submissions and templates.
//!
//! A caller describes a run either as an explicit task list or as a
//! `template_id` plus parameters; both arrive as a [`WorkflowSubmission`].
//! Templates are factories: [`WorkflowTemplate::expand`] turns parameters
//! into a plain task list using nothing beyond the [`Task`] input schema, so
//! the scheduler never knows whether a run came from a template.
//!
//! Two templates ship in [`TemplateCatalog::with_builtins`]:
//!
//! - `research_report`: plan, a configurable fan-out of researchers, and a
//!   synthesis task that fans their findings back in.
//! - `design_review`: proposal, two parallel critiques, revision.
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use taskwave::workflow::{TemplateCatalog, WorkflowSubmission};
//!
//! let catalog = TemplateCatalog::with_builtins();
//! let mut parameters = HashMap::new();
//! parameters.insert("topic".to_string(), "local-first sync".to_string());
//!
//! let submission = WorkflowSubmission::from_template("research_report", parameters);
//! let tasks = submission.resolve(&catalog).unwrap();
//! assert_eq!(tasks.len(), 5); // plan + 3 researchers + report
//! ```

use crate::taskwave::config::WorkflowConfig;
use crate::taskwave::task::Task;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Why a submission could not be turned into a task list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// The submission names a template the catalog does not know.
    UnknownTemplate(String),
    /// A template with the same id is already registered.
    DuplicateTemplate(String),
    /// A required parameter is absent.
    MissingParameter {
        /// Template that needed it.
        template: String,
        /// The absent key.
        parameter: String,
    },
    /// A parameter is present but unusable.
    InvalidParameter {
        /// Template that rejected it.
        template: String,
        /// The offending key.
        parameter: String,
        /// What was wrong with it.
        message: String,
    },
    /// The submission carries neither tasks nor a template id.
    EmptySubmission,
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::UnknownTemplate(id) => write!(f, "unknown template: {}", id),
            TemplateError::DuplicateTemplate(id) => {
                write!(f, "template already registered: {}", id)
            }
            TemplateError::MissingParameter {
                template,
                parameter,
            } => write!(
                f,
                "template {} requires parameter '{}'",
                template, parameter
            ),
            TemplateError::InvalidParameter {
                template,
                parameter,
                message,
            } => write!(
                f,
                "template {}: parameter '{}' {}",
                template, parameter, message
            ),
            TemplateError::EmptySubmission => {
                write!(f, "submission carries neither tasks nor a template id")
            }
        }
    }
}

impl Error for TemplateError {}

/// A parameterized factory for task lists.
pub trait WorkflowTemplate: Send + Sync {
    /// Stable identifier used in submissions.
    fn id(&self) -> &str;

    /// One-line human description for catalogs and UIs.
    fn description(&self) -> &str;

    /// Turn parameters into a task list. Must be deterministic for a given
    /// parameter map.
    fn expand(&self, parameters: &HashMap<String, String>) -> Result<Vec<Task>, TemplateError>;
}

/// Id-keyed collection of templates shared across runs.
#[derive(Clone, Default)]
pub struct TemplateCatalog {
    templates: HashMap<String, Arc<dyn WorkflowTemplate>>,
}

impl TemplateCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog preloaded with the built-in templates.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog
            .register(Arc::new(ResearchReportTemplate))
            .expect("builtin template ids collide");
        catalog
            .register(Arc::new(DesignReviewTemplate))
            .expect("builtin template ids collide");
        catalog
    }

    /// Add a template; rejects duplicate ids.
    pub fn register(&mut self, template: Arc<dyn WorkflowTemplate>) -> Result<(), TemplateError> {
        let id = template.id().to_string();
        if self.templates.contains_key(&id) {
            return Err(TemplateError::DuplicateTemplate(id));
        }
        self.templates.insert(id, template);
        Ok(())
    }

    /// Look up a template by id.
    pub fn get(&self, id: &str) -> Option<Arc<dyn WorkflowTemplate>> {
        self.templates.get(id).cloned()
    }

    /// Registered template ids, unordered.
    pub fn ids(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }

    /// Expand `id` with `parameters` into a task list.
    pub fn expand(
        &self,
        id: &str,
        parameters: &HashMap<String, String>,
    ) -> Result<Vec<Task>, TemplateError> {
        let template = self
            .get(id)
            .ok_or_else(|| TemplateError::UnknownTemplate(id.to_string()))?;
        template.expand(parameters)
    }
}

/// The wire-level description of one run: explicit tasks, or a template plus
/// parameters, with an optional (possibly partial) configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSubmission {
    /// Template to expand; ignored when `tasks` is present.
    pub template_id: Option<String>,
    /// Parameters for the template.
    pub parameters: HashMap<String, String>,
    /// Explicit task list; takes precedence over the template.
    pub tasks: Option<Vec<Task>>,
    /// Configuration; omitted fields fall back to defaults.
    pub config: Option<WorkflowConfig>,
}

impl WorkflowSubmission {
    /// Build a submission from an explicit task list.
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Some(tasks),
            ..Self::default()
        }
    }

    /// Build a submission from a template id and parameters.
    pub fn from_template(id: impl Into<String>, parameters: HashMap<String, String>) -> Self {
        Self {
            template_id: Some(id.into()),
            parameters,
            ..Self::default()
        }
    }

    /// Attach a configuration (builder pattern).
    pub fn with_config(mut self, config: WorkflowConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Produce the task list this submission describes.
    pub fn resolve(&self, catalog: &TemplateCatalog) -> Result<Vec<Task>, TemplateError> {
        if let Some(tasks) = &self.tasks {
            return Ok(tasks.clone());
        }
        if let Some(template_id) = &self.template_id {
            return catalog.expand(template_id, &self.parameters);
        }
        Err(TemplateError::EmptySubmission)
    }
}

fn required<'a>(
    template: &str,
    parameters: &'a HashMap<String, String>,
    key: &str,
) -> Result<&'a str, TemplateError> {
    parameters
        .get(key)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| TemplateError::MissingParameter {
            template: template.to_string(),
            parameter: key.to_string(),
        })
}

/// `research_report`: plan the topic, fan out researchers, fan their
/// findings back into one report.
///
/// Parameters: `topic` (required), `researchers` (optional count, default 3,
/// 1..=8). Agents named: `planner`, `researcher`, `writer`.
pub struct ResearchReportTemplate;

impl WorkflowTemplate for ResearchReportTemplate {
    fn id(&self) -> &str {
        "research_report"
    }

    fn description(&self) -> &str {
        "Plan a topic, research it from several angles in parallel, synthesize a report"
    }

    fn expand(&self, parameters: &HashMap<String, String>) -> Result<Vec<Task>, TemplateError> {
        let topic = required(self.id(), parameters, "topic")?;
        let researchers = match parameters.get("researchers") {
            None => 3usize,
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|count| (1..=8).contains(count))
                .ok_or_else(|| TemplateError::InvalidParameter {
                    template: self.id().to_string(),
                    parameter: "researchers".to_string(),
                    message: format!("must be an integer between 1 and 8, got '{}'", raw),
                })?,
        };

        let mut tasks = vec![Task::new(
            "plan",
            "planner",
            format!(
                "Break the research topic '{}' into {} distinct angles, one per line. \
                 Keep each angle narrow enough for a single focused investigation.",
                topic, researchers
            ),
        )
        .with_description(format!("Plan research angles for '{}'", topic))
        .with_priority(8)];

        let mut report = Task::new(
            "report",
            "writer",
            format!(
                "Synthesize the research findings into a single coherent report on '{}'. \
                 Resolve contradictions explicitly and keep the sourcing visible.",
                topic
            ),
        )
        .with_description("Synthesize the final report")
        .with_priority(7);

        for index in 0..researchers {
            let id = format!("research_{}", index);
            tasks.push(
                Task::new(
                    &id,
                    "researcher",
                    format!(
                        "You are investigating angle {} (counting from 1) of the plan for the \
                         topic '{}'. Take that angle from the plan in your prior work and \
                         research it thoroughly.",
                        index + 1,
                        topic
                    ),
                )
                .with_description(format!("Research angle {}", index + 1))
                .depends_on("plan")
                .with_parent("plan"),
            );
            report = report.depends_on(id);
        }

        tasks.push(report);
        Ok(tasks)
    }
}

/// `design_review`: draft a proposal, critique it twice in parallel, revise.
///
/// Parameters: `subject` (required). Agents named: `architect`, `reviewer`.
pub struct DesignReviewTemplate;

impl WorkflowTemplate for DesignReviewTemplate {
    fn id(&self) -> &str {
        "design_review"
    }

    fn description(&self) -> &str {
        "Draft a design, run parallel correctness and simplicity critiques, revise"
    }

    fn expand(&self, parameters: &HashMap<String, String>) -> Result<Vec<Task>, TemplateError> {
        let subject = required(self.id(), parameters, "subject")?;
        Ok(vec![
            Task::new(
                "proposal",
                "architect",
                format!(
                    "Draft a design proposal for: {}. State assumptions and tradeoffs.",
                    subject
                ),
            )
            .with_description("Initial design proposal")
            .with_priority(8),
            Task::new(
                "critique_correctness",
                "reviewer",
                "Critique the proposal in your prior work strictly for correctness: \
                 failure modes, race conditions, unstated invariants.",
            )
            .with_description("Correctness critique")
            .depends_on("proposal")
            .with_priority(7),
            Task::new(
                "critique_simplicity",
                "reviewer",
                "Critique the proposal in your prior work strictly for simplicity: \
                 what can be removed, merged, or deferred without losing the goal?",
            )
            .with_description("Simplicity critique")
            .depends_on("proposal")
            .with_priority(6),
            Task::new(
                "revision",
                "architect",
                format!(
                    "Revise the proposal for '{}' to address both critiques in your \
                     prior work. Note which points you rejected and why.",
                    subject
                ),
            )
            .with_description("Revised design")
            .depends_on("critique_correctness")
            .depends_on("critique_simplicity")
            .with_priority(8),
        ])
    }
}
