//! Decision engine: ask the completion service what the next step should be.

use serde_json::{Map, Value, json};
use tracing::{info, instrument, warn};

use crate::core::action::ActionKind;
use crate::core::error::LoopError;
use crate::core::policy::{ActionKindPolicy, fallback_decision, infer_action_kind, resolve_decision};
use crate::core::types::{ActionDecision, ProjectState};
use crate::core::validator::validate_and_parse;
use crate::io::completion::{CompletionService, complete_or_empty};
use crate::io::prompt::{PromptGenerator, PromptRequest};

pub const DECISION_SYSTEM_PROMPT: &str =
    "You are an AI project manager overseeing a code generation project.";

/// Number of trailing actions shown to the model.
const RECENT_ACTIONS: usize = 3;

const DECISION_INSTRUCTIONS: &str = r#"Consider:
1. Project requirements and current progress
2. Code quality and test results
3. Recent actions and their outcomes
4. Whether human input might be needed

Your response must include:
1. Insights about the current state
2. Recommendations for next steps
3. Code quality metrics if applicable
4. Priority actions to take

Also include a "decision" object in the metadata with this structure:
{
    "action_type": "string (one of 'analyze', 'generate', 'test', 'refactor', 'ask_human')",
    "description": "string explaining the action",
    "needs_human_input": boolean,
    "human_query": "string (if needs_human_input is true)",
    "context": {
        "relevant_files": ["list of files to focus on"],
        "specific_focus": "string describing specific aspect to address",
        "expected_outcome": "string describing what this action should achieve"
    }
}"#;

/// Picks the next action from the current project state.
pub struct DecisionEngine<'a, C: CompletionService + ?Sized> {
    completion: &'a C,
    prompts: &'a PromptGenerator,
    policy: ActionKindPolicy,
}

impl<'a, C: CompletionService + ?Sized> DecisionEngine<'a, C> {
    pub fn new(completion: &'a C, prompts: &'a PromptGenerator) -> Self {
        Self {
            completion,
            prompts,
            policy: infer_action_kind,
        }
    }

    /// Replace the keyword heuristic used when no decision is embedded.
    pub fn with_policy(mut self, policy: ActionKindPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Decide the next action. Never fails: any problem yields a decision that
    /// asks a human for guidance.
    #[instrument(skip_all, fields(step = state.step_count))]
    pub fn decide_next_action(&self, state: &ProjectState) -> ActionDecision {
        let context = decision_context(state);
        let kind = ActionKind::Analyze;
        let prompt = match self.prompts.generate_prompt(
            &PromptRequest::new(&kind, &context).with_instructions(DECISION_INSTRUCTIONS),
        ) {
            Ok(prompt) => prompt,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "failed to build decision prompt");
                return fallback_decision(&LoopError::DecisionResolutionFailed(format!("{err:#}")));
            }
        };

        let raw = complete_or_empty(self.completion, &prompt, DECISION_SYSTEM_PROMPT);
        let mut marker = Map::new();
        marker.insert("decision_making".into(), Value::Bool(true));
        let validated = validate_and_parse(&raw, &kind, &marker);

        match resolve_decision(&validated, self.policy) {
            Ok(decision) => {
                info!(
                    action = %decision.action_type,
                    needs_human_input = decision.needs_human_input,
                    "decided next action"
                );
                decision
            }
            Err(err) => {
                warn!(error = %err, "decision resolution failed; escalating to human");
                fallback_decision(&err)
            }
        }
    }
}

/// Snapshot of the state shown to the model when deciding.
pub fn decision_context(state: &ProjectState) -> Value {
    let components: Vec<Value> = state
        .components
        .iter()
        .map(|(path, component)| {
            json!({
                "path": path,
                "language": component.language,
                "status": component.status,
                "version": component.version,
            })
        })
        .collect();
    let test_results: Vec<Value> = state
        .test_results
        .iter()
        .map(|(path, results)| {
            let latest = results.last();
            json!({
                "component": path,
                "passed": latest.is_some_and(|r| r.passed),
                "suggestions": latest.map(|r| r.suggestions.clone()).unwrap_or_default(),
            })
        })
        .collect();
    let skip = state.action_history.len().saturating_sub(RECENT_ACTIONS);
    let recent_actions: Vec<String> = state
        .action_history
        .iter()
        .skip(skip)
        .map(ToString::to_string)
        .collect();
    json!({
        "requirements": state.original_requirements,
        "current_context": state.current_context,
        "components": components,
        "test_results": test_results,
        "step_count": state.step_count,
        "recent_actions": recent_actions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::policy::FALLBACK_QUERY;
    use crate::core::types::{CodeComponent, TestResult};
    use crate::test_support::{ScriptedCompletion, analysis_reply, decision_reply};

    fn prompts() -> PromptGenerator {
        PromptGenerator::new(40_000)
    }

    fn decision(description: &str) -> ActionDecision {
        ActionDecision {
            action_type: ActionKind::Analyze,
            description: description.to_string(),
            needs_human_input: false,
            human_query: None,
            context: Map::new(),
        }
    }

    #[test]
    fn context_summarizes_components_tests_and_recent_actions() {
        let mut state = ProjectState::new("todo app", 10);
        for i in 1..=5 {
            state = state.with_decision(decision(&format!("step {i}")));
        }
        state.components.insert(
            "app.py".into(),
            CodeComponent::new("app.py", "x", "python", Vec::new()),
        );
        state.test_results.insert(
            "app.py".into(),
            vec![
                TestResult {
                    component_path: "app.py".into(),
                    status: "failed".into(),
                    passed: false,
                    error_message: None,
                    execution_time: 0.0,
                    suggestions: vec!["old".into()],
                },
                TestResult {
                    component_path: "app.py".into(),
                    status: "passed".into(),
                    passed: true,
                    error_message: None,
                    execution_time: 0.1,
                    suggestions: vec!["add docs".into()],
                },
            ],
        );

        let context = decision_context(&state);
        assert_eq!(context["requirements"], json!("todo app"));
        assert_eq!(context["step_count"], json!(5));
        assert_eq!(
            context["recent_actions"],
            json!(["analyze: step 3", "analyze: step 4", "analyze: step 5"])
        );
        assert_eq!(
            context["components"],
            json!([{"path": "app.py", "language": "python", "status": "pending", "version": 1}])
        );
        assert_eq!(
            context["test_results"],
            json!([{"component": "app.py", "passed": true, "suggestions": ["add docs"]}])
        );
    }

    #[test]
    fn uses_embedded_decision_and_decision_system_prompt() {
        let completion = ScriptedCompletion::new([decision_reply("generate", "write main.py")]);
        let prompts = prompts();
        let engine = DecisionEngine::new(&completion, &prompts);
        let decision = engine.decide_next_action(&ProjectState::new("cli", 5));

        assert_eq!(decision.action_type, ActionKind::Generate);
        assert_eq!(decision.description, "write main.py");
        let calls = completion.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].system, DECISION_SYSTEM_PROMPT);
        assert!(calls[0].prompt.contains("\"decision\" object"));
        assert!(calls[0].prompt.contains("\"requirements\": \"cli\""));
    }

    #[test]
    fn falls_back_to_priority_actions() {
        let completion = ScriptedCompletion::new([analysis_reply(&["Build the parser"])]);
        let prompts = prompts();
        let decision =
            DecisionEngine::new(&completion, &prompts).decide_next_action(&ProjectState::new("x", 5));
        assert_eq!(decision.action_type, ActionKind::Generate);
        assert_eq!(decision.description, "Build the parser");
    }

    #[test]
    fn garbage_reply_escalates_to_human() {
        let completion = ScriptedCompletion::new(["I am not sure what to do."]);
        let prompts = prompts();
        let decision =
            DecisionEngine::new(&completion, &prompts).decide_next_action(&ProjectState::new("x", 5));
        assert!(decision.needs_human_input);
        assert_eq!(decision.human_query.as_deref(), Some(FALLBACK_QUERY));
        assert!(decision.context.contains_key("error"));
    }

    #[test]
    fn completion_failure_escalates_to_human() {
        let completion = ScriptedCompletion::new(Vec::<String>::new());
        let prompts = prompts();
        let decision =
            DecisionEngine::new(&completion, &prompts).decide_next_action(&ProjectState::new("x", 5));
        assert!(decision.requests_human_input());
        assert_eq!(completion.call_count(), 1);
    }
}
