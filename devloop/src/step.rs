//! One iteration of the loop: decide, then execute or escalate, then fold.

use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::core::error::LoopError;
use crate::core::output::ActionResult;
use crate::core::policy::{ActionKindPolicy, infer_action_kind};
use crate::core::repair::repair_output;
use crate::core::state_update::update_state_with_result;
use crate::core::types::{ActionDecision, ProjectState};
use crate::core::validator::validate_and_parse;
use crate::decision::DecisionEngine;
use crate::io::completion::{CompletionService, complete_or_empty};
use crate::io::prompt::{PromptGenerator, PromptRequest};

pub const EXECUTION_SYSTEM_PROMPT: &str =
    "You must respond with ONLY a JSON object, no additional text or explanation.";

/// Executes single steps against a completion service.
pub struct StepExecutor<'a, C: CompletionService + ?Sized> {
    completion: &'a C,
    prompts: &'a PromptGenerator,
    policy: ActionKindPolicy,
}

impl<'a, C: CompletionService + ?Sized> StepExecutor<'a, C> {
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

    /// Advance `state` by one step.
    ///
    /// The step budget is checked before anything else, so an exhausted state
    /// completes without contacting the completion service. A decision that
    /// requests human input suspends the workflow without executing anything.
    #[instrument(skip_all, fields(step = state.step_count, max_steps = state.max_steps))]
    pub fn execute_step(&self, state: ProjectState) -> ProjectState {
        if state.budget_exhausted() {
            info!("step budget exhausted");
            return state.into_budget_exhausted();
        }
        let state = state.absorb_human_feedback();

        let decision = DecisionEngine::new(self.completion, self.prompts)
            .with_policy(self.policy)
            .decide_next_action(&state);
        let state = state.with_decision(decision.clone());

        if decision.requests_human_input() {
            let query = decision.query_for_human();
            info!(%query, "escalating to human");
            return state.escalated(query);
        }

        let folded = self.execute_action(&decision, &state).and_then(|result| {
            update_state_with_result(&state, &decision, &result).map_err(LoopError::fatal)
        });
        match folded {
            Ok(next) => {
                info!(action = %decision.action_type, status = %next.status, "step finished");
                next
            }
            Err(err) => {
                error!(error = %err, "step failed");
                state.failed(err.to_string())
            }
        }
    }

    /// Run `decision` through the completion service and validate the reply.
    ///
    /// An invalid reply is repaired and validated once more; if it still fails the
    /// result is [`ActionResult::Failed`]. Only a prompt that cannot be built is an
    /// error, and it is fatal for the step.
    pub fn execute_action(
        &self,
        decision: &ActionDecision,
        state: &ProjectState,
    ) -> Result<ActionResult, LoopError> {
        let kind = &decision.action_type;
        let action = json!({ "action": decision });
        let prompt = self
            .prompts
            .generate_prompt(
                &PromptRequest::new(kind, &action)
                    .with_working_context(&state.current_context)
                    .with_state(state),
            )
            .map_err(|err| LoopError::StepFatal(format!("{err:#}")))?;

        let raw = complete_or_empty(self.completion, &prompt, EXECUTION_SYSTEM_PROMPT);
        let first = validate_and_parse(&raw, kind, &decision.context);
        let Some(first_error) = first.error_message().map(str::to_string) else {
            return Ok(ActionResult::Completed(first));
        };

        warn!(action = %kind, error = %first_error, "repairing invalid output");
        let repaired =
            serde_json::to_string(&repair_output(&raw, kind)).map_err(LoopError::fatal)?;
        let second = validate_and_parse(&repaired, kind, &decision.context);
        match second.error_message() {
            None => Ok(ActionResult::Completed(second)),
            Some(repair_error) => {
                let repair_error = LoopError::RepairFailed(repair_error.to_string());
                let error = LoopError::ActionExecutionFailed(format!("{first_error}; {repair_error}"));
                warn!(action = %kind, %error, "output still invalid after repair");
                Ok(ActionResult::Failed {
                    action_type: kind.clone(),
                    error: error.to_string(),
                })
            }
        }
    }
}
