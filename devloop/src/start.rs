//! Orchestration for user requests: start a workflow, or resume one with feedback.
//!
//! A session is the `.devloop/` directory of a project root. Each request loads
//! the config, drives the controller, persists the resulting state and appends
//! one record to the request history. A failed request is recorded too.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::core::types::{ProjectState, ProjectStatus};
use crate::io::completion::CompletionService;
use crate::io::config::{DevloopConfig, load_config};
use crate::io::history::{RequestRecord, append_history};
use crate::io::init::DevloopPaths;
use crate::io::prompt::PromptGenerator;
use crate::io::state_store::{load_state_if_exists, write_state};
use crate::looping::{LoopOutcome, WorkflowController};

/// Fresh state for `requirements`.
pub fn start_project(requirements: &str, max_steps: u32) -> ProjectState {
    ProjectState::new(requirements.trim(), max_steps)
}

/// Apply a human answer to a workflow that is waiting for one.
pub fn resume_with_feedback(state: ProjectState, feedback: &str) -> Result<ProjectState> {
    let feedback = feedback.trim();
    if feedback.is_empty() {
        bail!("feedback must not be empty");
    }
    if state.status != ProjectStatus::NeedsHumanInput && !state.needs_human_input {
        bail!(
            "workflow is not waiting for human input (status: {})",
            state.status
        );
    }
    Ok(state.with_human_feedback(feedback))
}

/// Loaded config and paths for one project root.
#[derive(Debug, Clone)]
pub struct Session {
    paths: DevloopPaths,
    config: DevloopConfig,
}

impl Session {
    /// Open the session rooted at `root`. A missing config means defaults.
    pub fn open(root: &Path) -> Result<Self> {
        let paths = DevloopPaths::new(root);
        let config = load_config(&paths.config_path)
            .with_context(|| format!("load {}", paths.config_path.display()))?;
        debug!(root = %root.display(), max_steps = config.max_steps, "opened session");
        Ok(Self { paths, config })
    }

    pub fn paths(&self) -> &DevloopPaths {
        &self.paths
    }

    pub fn config(&self) -> &DevloopConfig {
        &self.config
    }

    /// Persisted state, if any request has run yet.
    pub fn load_state(&self) -> Result<Option<ProjectState>> {
        load_state_if_exists(&self.paths.state_path)
    }

    /// Start a new workflow for `requirements`, replacing any persisted one.
    pub fn run_request<C, F>(
        &self,
        completion: &C,
        requirements: &str,
        max_steps: Option<u32>,
        on_step: F,
    ) -> Result<LoopOutcome>
    where
        C: CompletionService + ?Sized,
        F: FnMut(&ProjectState),
    {
        let details = json!({ "requirements": requirements });
        self.recorded("run", details, || {
            if requirements.trim().is_empty() {
                bail!("requirements must not be empty");
            }
            let max_steps = max_steps.unwrap_or(self.config.max_steps);
            if max_steps == 0 {
                bail!("max steps must be > 0");
            }
            info!(max_steps, "starting workflow");
            self.drive(completion, start_project(requirements, max_steps), on_step)
        })
    }

    /// Resume the persisted workflow with a human answer.
    pub fn answer_request<C, F>(
        &self,
        completion: &C,
        feedback: &str,
        on_step: F,
    ) -> Result<LoopOutcome>
    where
        C: CompletionService + ?Sized,
        F: FnMut(&ProjectState),
    {
        let details = json!({ "feedback": feedback });
        self.recorded("answer", details, || {
            let Some(state) = self.load_state()? else {
                bail!("no workflow to answer (run `devloop run` first)");
            };
            let state = resume_with_feedback(state, feedback)?;
            info!(step = state.step_count, "resuming workflow");
            self.drive(completion, state, on_step)
        })
    }

    fn drive<C, F>(&self, completion: &C, state: ProjectState, on_step: F) -> Result<LoopOutcome>
    where
        C: CompletionService + ?Sized,
        F: FnMut(&ProjectState),
    {
        let prompts = PromptGenerator::new(self.config.prompt_budget_bytes);
        let outcome = WorkflowController::new(completion, &prompts).run(state, on_step);
        write_state(&self.paths.state_path, &outcome.state)
            .with_context(|| format!("write {}", self.paths.state_path.display()))?;
        Ok(outcome)
    }

    /// Run `request` and append its history record, on failure as well.
    fn recorded(
        &self,
        action: &str,
        mut details: serde_json::Value,
        request: impl FnOnce() -> Result<LoopOutcome>,
    ) -> Result<LoopOutcome> {
        let result = request();
        let record = match &result {
            Ok(outcome) => {
                details["status"] = json!(outcome.state.status);
                details["steps_executed"] = json!(outcome.steps_executed);
                details["step_count"] = json!(outcome.state.step_count);
                if outcome.state.status == ProjectStatus::Error {
                    details["error"] = json!(outcome.state.error_log.last());
                    RequestRecord::now("error", details)
                } else {
                    RequestRecord::now(action, details)
                }
            }
            Err(err) => {
                details["request"] = json!(action);
                details["error"] = json!(format!("{err:#}"));
                RequestRecord::now("error", details)
            }
        };
        if let Err(err) = append_history(&self.paths.history_path, record) {
            if result.is_ok() {
                return Err(err.context("append request history"));
            }
            warn!(err = %format!("{err:#}"), "failed to record failed request");
        }
        result
    }
}
