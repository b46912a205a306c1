//! Synthesize a minimally valid record when a reply cannot be validated.

use serde_json::{Map, Value, json};

use crate::core::action::ActionKind;
use crate::core::extract::extract_json_object;
use crate::core::output::{STATUS_REPAIRED, new_step_id};

/// Repair `raw` into a map carrying every field `kind` requires.
///
/// Fields the reply did provide are kept as-is; only missing ones are filled
/// with placeholders that are clearly synthetic.
pub fn repair_output(raw: &str, kind: &ActionKind) -> Map<String, Value> {
    let mut data = extract_json_object(raw).unwrap_or_else(|_| minimal_record(raw));
    fill_required_fields(&mut data, kind);
    data
}

fn minimal_record(raw: &str) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("step_id".into(), Value::String(new_step_id()));
    data.insert("status".into(), Value::String(STATUS_REPAIRED.into()));
    data.insert("confidence_score".into(), json!(0.5));
    data.insert("metadata".into(), json!({ "original_output": raw }));
    data
}

fn fill_required_fields(data: &mut Map<String, Value>, kind: &ActionKind) {
    let defaults: Vec<(&str, Value)> = match kind {
        ActionKind::Analyze => vec![
            ("insights", json!(["No insights available"])),
            ("recommendations", json!(["No recommendations available"])),
            ("code_quality_metrics", json!({ "unknown": 0.0 })),
            ("priority_actions", json!(["Review and fix output structure"])),
        ],
        ActionKind::Generate | ActionKind::Refactor => vec![
            ("file_path", json!("unknown_path")),
            ("content", json!("# Generated content unavailable")),
            ("language", json!("unknown")),
            ("dependencies", json!([])),
        ],
        ActionKind::Test => vec![
            ("test_cases", json!([{ "name": "unknown", "status": "error" }])),
            ("coverage", json!({ "total": 0.0 })),
            (
                "failures",
                json!([{ "message": "Output structure validation failed" }]),
            ),
        ],
        ActionKind::AskHuman | ActionKind::Unknown(_) => Vec::new(),
    };
    for (key, value) in defaults {
        data.entry(key).or_insert(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_placeholders_when_nothing_extracted() {
        let data = repair_output("the model rambled", &ActionKind::Generate);
        assert_eq!(data.get("file_path"), Some(&json!("unknown_path")));
        assert_eq!(
            data.get("content"),
            Some(&json!("# Generated content unavailable"))
        );
        assert_eq!(data.get("language"), Some(&json!("unknown")));
        assert_eq!(data.get("dependencies"), Some(&json!([])));
        assert_eq!(data.get("status"), Some(&json!("repaired")));
        assert_eq!(data.get("confidence_score"), Some(&json!(0.5)));
        assert_eq!(
            data.get("metadata"),
            Some(&json!({ "original_output": "the model rambled" }))
        );
    }

    #[test]
    fn present_fields_are_kept() {
        let data = repair_output(
            r#"note: {"file_path": "src/app.py", "confidence_score": "high"}"#,
            &ActionKind::Generate,
        );
        assert_eq!(data.get("file_path"), Some(&json!("src/app.py")));
        assert_eq!(data.get("language"), Some(&json!("unknown")));
        assert_eq!(data.get("confidence_score"), Some(&json!("high")));
        assert!(!data.contains_key("step_id"));
    }

    #[test]
    fn analyze_placeholders() {
        let data = repair_output("", &ActionKind::Analyze);
        assert_eq!(
            data.get("priority_actions"),
            Some(&json!(["Review and fix output structure"]))
        );
        assert_eq!(data.get("code_quality_metrics"), Some(&json!({ "unknown": 0.0 })));
    }

    #[test]
    fn test_placeholders() {
        let data = repair_output("{}", &ActionKind::Test);
        assert_eq!(data.get("coverage"), Some(&json!({ "total": 0.0 })));
        assert_eq!(
            data.get("test_cases"),
            Some(&json!([{ "name": "unknown", "status": "error" }]))
        );
        assert!(data.contains_key("failures"));
    }

    #[test]
    fn unknown_kind_gets_base_record_only() {
        let data = repair_output("nothing", &ActionKind::parse("deploy"));
        let mut keys: Vec<&str> = data.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["confidence_score", "metadata", "status", "step_id"]);
    }
}
