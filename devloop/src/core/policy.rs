//! Decision resolution: turn a validated analysis output into the next action.
//!
//! An embedded `metadata.decision` object always wins. Without one, the first
//! priority action is mapped to an action kind by a swappable keyword policy.

use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::core::action::ActionKind;
use crate::core::error::LoopError;
use crate::core::output::{EnhancedActionResult, OutputBody};
use crate::core::types::ActionDecision;

/// Words that mark a priority action as code generation.
pub const GENERATION_KEYWORDS: [&str; 4] = ["implement", "create", "build", "generate"];

/// Expected outcome used when the analysis gave no recommendation.
pub const DEFAULT_EXPECTED_OUTCOME: &str = "Improve code quality";

pub const FALLBACK_DESCRIPTION: &str = "Analyzing current state due to decision parsing error";
pub const FALLBACK_QUERY: &str = "There was an error in the AI's decision making. Would you like to provide guidance on the next step?";

/// Swappable mapping from free text to an action kind.
pub type ActionKindPolicy = fn(&str) -> ActionKind;

/// `generate` if `text` mentions any generation keyword (ignoring case), else `analyze`.
pub fn infer_action_kind(text: &str) -> ActionKind {
    let lowered = text.to_lowercase();
    if GENERATION_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
    {
        ActionKind::Generate
    } else {
        ActionKind::Analyze
    }
}

/// Resolve the decision carried by a validated decision-making reply.
pub fn resolve_decision(
    result: &EnhancedActionResult,
    policy: ActionKindPolicy,
) -> Result<ActionDecision, LoopError> {
    if let Some(embedded) = embedded_decision(&result.output.metadata) {
        return ActionDecision::deserialize(embedded)
            .map_err(|err| LoopError::DecisionResolutionFailed(format!("invalid decision: {err}")));
    }
    if let OutputBody::CodeAnalysis(analysis) = &result.output.body
        && let Some(first) = analysis.priority_actions.first()
    {
        let expected_outcome = analysis
            .recommendations
            .first()
            .map_or(DEFAULT_EXPECTED_OUTCOME, String::as_str);
        let mut context = Map::new();
        context.insert("relevant_files".into(), json!([]));
        context.insert("specific_focus".into(), json!(first));
        context.insert("expected_outcome".into(), json!(expected_outcome));
        context.insert("insights".into(), json!(analysis.insights));
        context.insert("recommendations".into(), json!(analysis.recommendations));
        return Ok(ActionDecision {
            action_type: policy(first),
            description: first.clone(),
            needs_human_input: false,
            human_query: None,
            context,
        });
    }
    let reason = result
        .error_message()
        .unwrap_or("no decision and no priority actions");
    Err(LoopError::DecisionResolutionFailed(reason.to_string()))
}

/// `metadata.decision`, unless absent, null or empty.
fn embedded_decision(metadata: &Map<String, Value>) -> Option<&Value> {
    match metadata.get("decision")? {
        Value::Null => None,
        Value::Object(map) if map.is_empty() => None,
        Value::String(text) if text.is_empty() => None,
        Value::Array(items) if items.is_empty() => None,
        value => Some(value),
    }
}

/// Safe decision used whenever resolution fails: analyze, after asking a human.
pub fn fallback_decision(err: &LoopError) -> ActionDecision {
    let mut context = Map::new();
    context.insert("error".into(), Value::String(err.to_string()));
    ActionDecision {
        action_type: ActionKind::Analyze,
        description: FALLBACK_DESCRIPTION.to_string(),
        needs_human_input: true,
        human_query: Some(FALLBACK_QUERY.to_string()),
        context,
    }
}
