//! Project state and the records threaded through the development loop.
//!
//! [`ProjectState`] is treated as an immutable snapshot: every transition consumes
//! the previous value and returns the next one. Its JSON form is the persisted
//! state file, so field names here are a stable contract.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::action::ActionKind;

/// Step ceiling applied when a state does not specify one.
pub const DEFAULT_MAX_STEPS: u32 = 10;

/// Error-log entry recorded when the step budget is exhausted.
pub const MAX_STEPS_REACHED: &str = "Maximum steps reached";

/// Context key under which resumed human feedback is exposed to the model.
pub const HUMAN_FEEDBACK_KEY: &str = "human_feedback";

/// Workflow status.
///
/// `Complete` and `Error` are terminal. `NeedsHumanInput` ends an invocation but
/// not the workflow: the caller resumes it with feedback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Initial,
    InProgress,
    NeedsHumanInput,
    Complete,
    Error,
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::InProgress => "in_progress",
            Self::NeedsHumanInput => "needs_human_input",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One resolved instruction for the next step. Never edited after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDecision {
    pub action_type: ActionKind,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub needs_human_input: bool,
    #[serde(default)]
    pub human_query: Option<String>,
    /// Action-specific parameters (relevant files, focus, expected outcome, ...).
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl ActionDecision {
    /// Whether this decision suspends the workflow instead of executing an action.
    ///
    /// An `ask_human` action always suspends, even if the flag was left unset.
    pub fn requests_human_input(&self) -> bool {
        self.needs_human_input || self.action_type == ActionKind::AskHuman
    }

    /// Question to put to the human, falling back to the description.
    pub fn query_for_human(&self) -> String {
        self.human_query
            .as_deref()
            .map(str::trim)
            .filter(|query| !query.is_empty())
            .unwrap_or(&self.description)
            .to_string()
    }
}

impl fmt::Display for ActionDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.action_type, self.description)?;
        if self.needs_human_input {
            f.write_str(" [needs human input]")?;
        }
        Ok(())
    }
}

/// A generated file tracked by path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeComponent {
    pub file_path: String,
    pub content: String,
    pub language: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default = "default_component_status")]
    pub status: String,
    #[serde(default = "default_component_version")]
    pub version: u32,
}

impl CodeComponent {
    pub fn new(
        file_path: impl Into<String>,
        content: impl Into<String>,
        language: impl Into<String>,
        dependencies: Vec<String>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            content: content.into(),
            language: language.into(),
            dependencies,
            status: default_component_status(),
            version: default_component_version(),
        }
    }
}

fn default_component_status() -> String {
    "pending".to_string()
}

fn default_component_version() -> u32 {
    1
}

/// One test outcome for a component. Results per path form an append-only history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub component_path: String,
    pub status: String,
    pub passed: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub execution_time: f64,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// Audit record for one executed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub step: u32,
    pub action: ActionDecision,
    pub result: Value,
}

/// Aggregate state of one development session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectState {
    pub status: ProjectStatus,
    pub original_requirements: String,
    pub current_context: Map<String, Value>,
    pub components: BTreeMap<String, CodeComponent>,
    pub test_results: BTreeMap<String, Vec<TestResult>>,
    pub current_action: Option<ActionDecision>,
    pub action_history: Vec<ActionDecision>,
    pub needs_human_input: bool,
    pub human_query: Option<String>,
    pub human_feedback: Option<String>,
    pub step_count: u32,
    pub max_steps: u32,
    pub error_log: Vec<String>,
    pub development_history: Vec<HistoryEntry>,
}

impl Default for ProjectState {
    fn default() -> Self {
        Self {
            status: ProjectStatus::Initial,
            original_requirements: String::new(),
            current_context: Map::new(),
            components: BTreeMap::new(),
            test_results: BTreeMap::new(),
            current_action: None,
            action_history: Vec::new(),
            needs_human_input: false,
            human_query: None,
            human_feedback: None,
            step_count: 0,
            max_steps: DEFAULT_MAX_STEPS,
            error_log: Vec::new(),
            development_history: Vec::new(),
        }
    }
}

impl ProjectState {
    /// Fresh state for a new user request.
    pub fn new(requirements: impl Into<String>, max_steps: u32) -> Self {
        Self {
            original_requirements: requirements.into(),
            max_steps,
            ..Self::default()
        }
    }

    pub fn budget_exhausted(&self) -> bool {
        self.step_count >= self.max_steps
    }

    /// Terminal transition taken when no step budget remains.
    pub fn into_budget_exhausted(mut self) -> Self {
        self.status = ProjectStatus::Complete;
        self.error_log.push(MAX_STEPS_REACHED.to_string());
        self
    }

    /// Move pending human feedback into the working context.
    pub fn absorb_human_feedback(mut self) -> Self {
        if let Some(feedback) = self.human_feedback.take() {
            self.current_context
                .insert(HUMAN_FEEDBACK_KEY.to_string(), Value::String(feedback));
        }
        self
    }

    /// Record a freshly made decision. This is the only place `step_count` moves.
    pub fn with_decision(mut self, decision: ActionDecision) -> Self {
        self.action_history.push(decision.clone());
        self.current_action = Some(decision);
        self.step_count += 1;
        self
    }

    /// Suspend the workflow until a human answers `query`.
    pub fn escalated(mut self, query: String) -> Self {
        self.status = ProjectStatus::NeedsHumanInput;
        self.needs_human_input = true;
        self.human_query = Some(query);
        self
    }

    /// Resume a suspended workflow with the human's answer.
    pub fn with_human_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.human_feedback = Some(feedback.into());
        self.human_query = None;
        self.needs_human_input = false;
        self.status = ProjectStatus::InProgress;
        self
    }

    /// Terminal transition for a fatal step error.
    pub fn failed(mut self, message: impl Into<String>) -> Self {
        self.status = ProjectStatus::Error;
        self.error_log.push(message.into());
        self
    }

    /// Most recent test result recorded for `path`.
    pub fn latest_test_result(&self, path: &str) -> Option<&TestResult> {
        self.test_results.get(path).and_then(|results| results.last())
    }
}
