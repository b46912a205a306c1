//! Fold one executed action into the next project state.

use serde_json::Value;

use crate::core::output::{ActionResult, OutputBody, TestExecutionOutput};
use crate::core::types::{
    ActionDecision, CodeComponent, HistoryEntry, ProjectState, ProjectStatus, TestResult,
};

/// Context key under which the raw result of an action kind is stored.
pub fn last_result_key(kind: &str) -> String {
    format!("last_{kind}_result")
}

/// Next state after applying `result` of executing `decision` to `state`.
///
/// Only a completed result changes components or test history. Every result is
/// stored in the working context and recorded in the development history.
pub fn update_state_with_result(
    state: &ProjectState,
    decision: &ActionDecision,
    result: &ActionResult,
) -> serde_json::Result<ProjectState> {
    let raw = result.to_value()?;
    let mut state = state.clone();
    state.status = ProjectStatus::InProgress;
    state
        .current_context
        .insert(last_result_key(decision.action_type.as_str()), raw.clone());

    if let ActionResult::Completed(completed) = result {
        match &completed.output.body {
            OutputBody::CodeGeneration(generated) => {
                let component = CodeComponent::new(
                    generated.file_path.clone(),
                    generated.content.clone(),
                    generated.language.clone(),
                    generated.dependencies.clone(),
                );
                state
                    .components
                    .insert(component.file_path.clone(), component);
            }
            OutputBody::TestExecution(tested) => append_test_results(&mut state, tested),
            OutputBody::CodeAnalysis(_) | OutputBody::Base => {}
        }
    }

    state.development_history.push(HistoryEntry {
        step: state.step_count,
        action: decision.clone(),
        result: raw,
    });
    Ok(state)
}

fn append_test_results(state: &mut ProjectState, tested: &TestExecutionOutput) {
    for report in &tested.test_results {
        let status = if report.passed { "passed" } else { "failed" };
        state
            .test_results
            .entry(report.component_path.clone())
            .or_default()
            .push(TestResult {
                component_path: report.component_path.clone(),
                status: status.to_string(),
                passed: report.passed,
                error_message: report.error_message.clone(),
                execution_time: report.execution_time,
                suggestions: report.suggestions.clone(),
            });
    }
}

/// Raw result most recently stored for `kind`, if any.
pub fn last_result<'a>(state: &'a ProjectState, kind: &str) -> Option<&'a Value> {
    state.current_context.get(&last_result_key(kind))
}
