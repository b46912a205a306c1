//! Workflow controller: run steps until the workflow stops or yields to a human.

use tracing::{debug, info, instrument};

use crate::core::policy::{ActionKindPolicy, infer_action_kind};
use crate::core::types::{ProjectState, ProjectStatus};
use crate::io::completion::CompletionService;
use crate::io::prompt::PromptGenerator;
use crate::step::StepExecutor;

/// Reason why [`WorkflowController::run`] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStop {
    /// The workflow completed (including by exhausting its step budget).
    Complete,
    /// The workflow is waiting for a human to answer `query`.
    NeedsHumanInput { query: String },
    /// A step failed fatally; `message` is the last error-log entry.
    Error { message: String },
}

/// Summary of one controller invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopOutcome {
    pub state: ProjectState,
    pub steps_executed: u32,
    pub stop: LoopStop,
}

/// Drives [`StepExecutor`] until the state is terminal or needs human input.
pub struct WorkflowController<'a, C: CompletionService + ?Sized> {
    completion: &'a C,
    prompts: &'a PromptGenerator,
    policy: ActionKindPolicy,
}

impl<'a, C: CompletionService + ?Sized> WorkflowController<'a, C> {
    pub fn new(completion: &'a C, prompts: &'a PromptGenerator) -> Self {
        Self {
            completion,
            prompts,
            policy: infer_action_kind,
        }
    }

    pub fn with_policy(mut self, policy: ActionKindPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run steps on `state` until it stops, calling `on_step` after each one.
    ///
    /// A state that is already terminal, or still waiting on a human, is returned
    /// as-is with zero steps executed.
    #[instrument(skip_all, fields(step = state.step_count, status = %state.status))]
    pub fn run<F: FnMut(&ProjectState)>(
        &self,
        mut state: ProjectState,
        mut on_step: F,
    ) -> LoopOutcome {
        let executor = StepExecutor::new(self.completion, self.prompts).with_policy(self.policy);
        let mut steps_executed = 0u32;
        loop {
            if let Some(stop) = stop_reason(&state) {
                info!(steps_executed, step = state.step_count, ?stop, "workflow stopped");
                return LoopOutcome {
                    state,
                    steps_executed,
                    stop,
                };
            }
            debug!(step = state.step_count, "executing step");
            state = executor.execute_step(state);
            steps_executed += 1;
            on_step(&state);
        }
    }
}

/// Why the loop must not execute another step on `state`, if it must not.
fn stop_reason(state: &ProjectState) -> Option<LoopStop> {
    match state.status {
        ProjectStatus::Complete => Some(LoopStop::Complete),
        ProjectStatus::Error => Some(LoopStop::Error {
            message: state.error_log.last().cloned().unwrap_or_default(),
        }),
        ProjectStatus::NeedsHumanInput => Some(LoopStop::NeedsHumanInput {
            query: state.human_query.clone().unwrap_or_default(),
        }),
        ProjectStatus::Initial | ProjectStatus::InProgress if state.needs_human_input => {
            Some(LoopStop::NeedsHumanInput {
                query: state.human_query.clone().unwrap_or_default(),
            })
        }
        ProjectStatus::Initial | ProjectStatus::InProgress => None,
    }
}
