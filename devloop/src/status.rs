//! Human-readable summaries for `devloop status` and the end of a request.

use crate::core::types::ProjectState;
use crate::io::history::RequestRecord;

const RECENT_ACTIONS: usize = 3;

/// Multi-line summary of `state`.
pub fn render_summary(state: &ProjectState) -> String {
    let mut lines = vec![
        format!("Status: {}", state.status),
        format!("Steps: {}/{}", state.step_count, state.max_steps),
    ];
    if let Some(action) = &state.current_action {
        lines.push(format!("Current action: {action}"));
    }
    if let Some(query) = &state.human_query {
        lines.push(format!("Waiting on human: {query}"));
    }

    if !state.components.is_empty() {
        lines.push(String::new());
        lines.push("Components:".to_string());
        lines.extend(state.components.iter().map(|(path, component)| {
            format!(
                "  - {path} ({}, {}, v{})",
                component.language, component.status, component.version
            )
        }));
    }

    if !state.test_results.is_empty() {
        lines.push(String::new());
        lines.push("Test results:".to_string());
        for path in state.test_results.keys() {
            let Some(latest) = state.latest_test_result(path) else {
                continue;
            };
            let verdict = if latest.passed { "passed" } else { "failed" };
            lines.push(format!("  - {path}: {verdict}"));
            if let Some(message) = &latest.error_message {
                lines.push(format!("      error: {message}"));
            }
            lines.extend(
                latest
                    .suggestions
                    .iter()
                    .map(|suggestion| format!("      suggestion: {suggestion}")),
            );
        }
    }

    if !state.action_history.is_empty() {
        lines.push(String::new());
        lines.push("Recent actions:".to_string());
        let skip = state.action_history.len().saturating_sub(RECENT_ACTIONS);
        lines.extend(
            state
                .action_history
                .iter()
                .skip(skip)
                .map(|action| format!("  - {action}")),
        );
    }

    if let Some(entry) = state.development_history.last() {
        let outcome = entry
            .result
            .get("status")
            .or_else(|| entry.result.pointer("/output/status"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        lines.push(String::new());
        lines.push(format!(
            "Last step: #{} {} ({outcome})",
            entry.step, entry.action.action_type
        ));
    }

    if !state.error_log.is_empty() {
        lines.push(String::new());
        lines.push("Errors:".to_string());
        lines.extend(state.error_log.iter().map(|error| format!("  - {error}")));
    }
    terminated(lines)
}

/// One line per request record, oldest first.
pub fn render_history(records: &[RequestRecord]) -> String {
    if records.is_empty() {
        return "No requests recorded.\n".to_string();
    }
    terminated(records.iter().map(|record| {
        let detail = record
            .details
            .get("requirements")
            .or_else(|| record.details.get("feedback"))
            .or_else(|| record.details.get("error"))
            .and_then(|v| v.as_str())
            .unwrap_or("");
        format!("{} {:<6} {detail}", record.timestamp, record.action)
    }))
}

/// Join lines, each followed by a newline.
fn terminated(lines: impl IntoIterator<Item = String>) -> String {
    lines.into_iter().map(|line| line + "\n").collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::action::ActionKind;
    use crate::core::types::{ActionDecision, CodeComponent, HistoryEntry, TestResult};
    use serde_json::{Map, json};

    fn decision(description: &str) -> ActionDecision {
        ActionDecision {
            action_type: ActionKind::Generate,
            description: description.to_string(),
            needs_human_input: false,
            human_query: None,
            context: Map::new(),
        }
    }

    #[test]
    fn summary_lists_components_tests_and_recent_actions() {
        let mut state = ProjectState::new("app", 10);
        for i in 1..=4 {
            state = state.with_decision(decision(&format!("step {i}")));
        }
        state.components.insert(
            "a.py".into(),
            CodeComponent::new("a.py", "x", "python", Vec::new()),
        );
        state.test_results.insert(
            "a.py".into(),
            vec![TestResult {
                component_path: "a.py".into(),
                status: "failed".into(),
                passed: false,
                error_message: Some("boom".into()),
                execution_time: 0.0,
                suggestions: vec!["check imports".into()],
            }],
        );
        state.development_history.push(HistoryEntry {
            step: 4,
            action: decision("step 4"),
            result: json!({"output": {"status": "completed"}}),
        });

        let summary = render_summary(&state);
        assert!(summary.contains("Status: initial"));
        assert!(summary.contains("Steps: 4/10"));
        assert!(summary.contains("a.py (python, pending, v1)"));
        assert!(summary.contains("a.py: failed"));
        assert!(summary.contains("suggestion: check imports"));
        assert!(!summary.contains("generate: step 1"));
        assert!(summary.contains("generate: step 2"));
        assert!(summary.contains("Last step: #4 generate (completed)"));
    }

    #[test]
    fn summary_of_fresh_state_is_exact() {
        let mut state = ProjectState::new("app", 10);
        state.error_log.push("boom".into());
        assert_eq!(
            render_summary(&state),
            "Status: initial\nSteps: 0/10\n\nErrors:\n  - boom\n"
        );
    }

    #[test]
    fn history_renders_one_line_per_record() {
        let records = vec![
            RequestRecord {
                action: "run".into(),
                details: json!({"requirements": "todo app"}),
                timestamp: "2026-01-01T00:00:00Z".into(),
            },
            RequestRecord {
                action: "answer".into(),
                details: json!({"feedback": "flask"}),
                timestamp: "2026-01-01T00:01:00Z".into(),
            },
        ];
        let rendered = render_history(&records);
        assert_eq!(rendered.lines().count(), 2);
        assert!(rendered.contains("run    todo app"));
        assert!(rendered.contains("answer flask"));
        assert_eq!(render_history(&[]), "No requests recorded.\n");
    }
}
