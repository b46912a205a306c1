//! Turn a raw completion reply into a typed, schema-checked structured output.
//!
//! Validation never fails past this boundary: a reply that cannot be extracted or
//! does not match its schema still yields an [`EnhancedActionResult`], carrying a
//! base error output plus an [`ErrorContext`] describing what went wrong.

use std::sync::LazyLock;

use jsonschema::{Draft, Validator};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::core::action::ActionKind;
use crate::core::error::{LoopError, ValidationStage};
use crate::core::extract::extract_json_object;
use crate::core::output::{
    CodeAnalysisOutput, CodeGenerationOutput, EnhancedActionResult, ErrorContext,
    ExecutionMetadata, OutputBody, STATUS_COMPLETED, StructuredOutput, TestExecutionOutput,
    ValidationDetails, new_step_id,
};

const ANALYSIS_SCHEMA: &str = include_str!("../../schemas/analysis_output.schema.json");
const GENERATION_SCHEMA: &str = include_str!("../../schemas/generation_output.schema.json");
const TEST_SCHEMA: &str = include_str!("../../schemas/test_output.schema.json");

static ANALYSIS_VALIDATOR: LazyLock<Validator> = LazyLock::new(|| compile(ANALYSIS_SCHEMA));
static GENERATION_VALIDATOR: LazyLock<Validator> = LazyLock::new(|| compile(GENERATION_SCHEMA));
static TEST_VALIDATOR: LazyLock<Validator> = LazyLock::new(|| compile(TEST_SCHEMA));

/// List fields whose elements are coerced to strings before validation.
const SOFT_LIST_FIELDS: [&str; 3] = ["priority_actions", "insights", "recommendations"];

/// Characters of raw output kept in an error context.
const RAW_OUTPUT_PREVIEW_CHARS: usize = 500;

const DEFAULT_CONFIDENCE: f64 = 0.8;
const ERROR_REPORTED_CONFIDENCE: f64 = 0.5;

fn compile(raw: &str) -> Validator {
    let schema: Value = serde_json::from_str(raw).expect("embedded schema should be valid JSON");
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .expect("embedded schema should compile")
}

/// Base fields shared by every output variant.
#[derive(Debug, Deserialize)]
struct BaseFields {
    step_id: String,
    status: String,
    confidence_score: f64,
    #[serde(default)]
    metadata: Map<String, Value>,
}

/// Validate `raw` as the output of an action of `kind`.
///
/// `context` is merged into the output's `metadata.context` when non-empty.
pub fn validate_and_parse(
    raw: &str,
    kind: &ActionKind,
    context: &Map<String, Value>,
) -> EnhancedActionResult {
    debug!(action = %kind, raw_len = raw.len(), "validating output");
    let mut data = match extract_json_object(raw) {
        Ok(data) => data,
        Err(err) => return failure(raw, kind, err, None, ValidationStage::DataExtraction),
    };
    debug!(keys = ?data.keys().collect::<Vec<_>>(), "extracted JSON object");

    if let Err(err) = prepare_fields(&mut data, context) {
        return failure(raw, kind, err, Some(data), ValidationStage::ModelValidation);
    }
    let value = Value::Object(data);
    match build_output(&value, kind) {
        Ok(output) => {
            let details = ValidationDetails {
                output_type: output.body.type_name().to_string(),
                fields_present: output.field_names(),
            };
            EnhancedActionResult {
                action_type: kind.clone(),
                output,
                execution_metadata: ExecutionMetadata {
                    raw_output_length: raw.len(),
                    validation_successful: true,
                    validation_details: Some(details),
                },
                error_context: None,
            }
        }
        Err(err) => {
            let partial = match value {
                Value::Object(map) => Some(map),
                _ => None,
            };
            failure(raw, kind, err, partial, ValidationStage::ModelValidation)
        }
    }
}

/// Inject base fields, coerce soft lists and merge caller context.
fn prepare_fields(
    data: &mut Map<String, Value>,
    context: &Map<String, Value>,
) -> Result<(), LoopError> {
    data.insert("step_id".into(), Value::String(new_step_id()));
    data.entry("status")
        .or_insert_with(|| Value::String(STATUS_COMPLETED.into()));
    let confidence = if data.contains_key("error") {
        ERROR_REPORTED_CONFIDENCE
    } else {
        DEFAULT_CONFIDENCE
    };
    data.entry("confidence_score")
        .or_insert_with(|| json!(confidence));
    data.entry("metadata")
        .or_insert_with(|| Value::Object(Map::new()));

    for field in SOFT_LIST_FIELDS {
        if let Some(Value::Array(items)) = data.get_mut(field) {
            for item in items {
                if !item.is_string() {
                    *item = Value::String(item.to_string());
                }
            }
        }
    }

    if !context.is_empty() {
        let Some(Value::Object(metadata)) = data.get_mut("metadata") else {
            return Err(LoopError::SchemaValidationFailed(
                "metadata must be an object".into(),
            ));
        };
        metadata.insert("context".into(), Value::Object(context.clone()));
    }
    Ok(())
}

fn build_output(value: &Value, kind: &ActionKind) -> Result<StructuredOutput, LoopError> {
    let body = match kind {
        ActionKind::Analyze => {
            check_schema(&ANALYSIS_VALIDATOR, value)?;
            OutputBody::CodeAnalysis(typed::<CodeAnalysisOutput>(value)?)
        }
        ActionKind::Generate | ActionKind::Refactor => {
            check_schema(&GENERATION_VALIDATOR, value)?;
            OutputBody::CodeGeneration(typed::<CodeGenerationOutput>(value)?)
        }
        ActionKind::Test => {
            check_schema(&TEST_VALIDATOR, value)?;
            OutputBody::TestExecution(typed::<TestExecutionOutput>(value)?)
        }
        ActionKind::AskHuman | ActionKind::Unknown(_) => {
            return Err(LoopError::SchemaValidationFailed(format!(
                "no output schema for action type '{kind}'"
            )));
        }
    };
    let base = typed::<BaseFields>(value)?;
    Ok(StructuredOutput {
        step_id: base.step_id,
        status: base.status,
        confidence_score: base.confidence_score,
        metadata: base.metadata,
        body,
    })
}

fn check_schema(validator: &Validator, value: &Value) -> Result<(), LoopError> {
    let messages: Vec<String> = validator
        .iter_errors(value)
        .map(|err| err.to_string())
        .collect();
    if messages.is_empty() {
        Ok(())
    } else {
        Err(LoopError::SchemaValidationFailed(messages.join("; ")))
    }
}

fn typed<'a, T: Deserialize<'a>>(value: &'a Value) -> Result<T, LoopError> {
    T::deserialize(value).map_err(|err| LoopError::SchemaValidationFailed(err.to_string()))
}

fn failure(
    raw: &str,
    kind: &ActionKind,
    err: LoopError,
    partial_data: Option<Map<String, Value>>,
    stage: ValidationStage,
) -> EnhancedActionResult {
    warn!(action = %kind, ?stage, error = %err, "output validation failed");
    let message = err.to_string();
    EnhancedActionResult {
        action_type: kind.clone(),
        output: StructuredOutput::error(&message),
        execution_metadata: ExecutionMetadata {
            raw_output_length: raw.len(),
            validation_successful: false,
            validation_details: None,
        },
        error_context: Some(ErrorContext {
            error_type: err.kind().to_string(),
            error_message: message,
            partial_data,
            raw_output: preview(raw),
            validation_stage: stage,
        }),
    }
}

fn preview(raw: &str) -> String {
    match raw.char_indices().nth(RAW_OUTPUT_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &raw[..cut]),
        None => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_context() -> Map<String, Value> {
        Map::new()
    }

    #[test]
    fn analysis_reply_in_prose_validates() {
        let raw = r#"Here you go: {"insights": ["small codebase"], "recommendations": ["add tests"], "priority_actions": ["Implement parser"]}"#;
        let result = validate_and_parse(raw, &ActionKind::Analyze, &no_context());
        assert!(!result.is_failure());
        assert!(result.execution_metadata.validation_successful);
        assert_eq!(result.output.status, "completed");
        assert_eq!(result.output.confidence_score, 0.8);
        let OutputBody::CodeAnalysis(analysis) = &result.output.body else {
            panic!("expected analysis body, got {:?}", result.output.body);
        };
        assert_eq!(analysis.priority_actions, vec!["Implement parser"]);
        assert_eq!(analysis.code_quality_metrics.len(), 3);
        let details = result
            .execution_metadata
            .validation_details
            .expect("details");
        assert_eq!(details.output_type, "CodeAnalysisOutput");
        assert!(details.fields_present.contains(&"insights".to_string()));
    }

    #[test]
    fn step_id_is_always_fresh() {
        let raw = r#"{"step_id": "model-chosen", "file_path": "a.py", "content": "x"}"#;
        let result = validate_and_parse(raw, &ActionKind::Generate, &no_context());
        assert!(!result.is_failure());
        assert_ne!(result.output.step_id, "model-chosen");
    }

    #[test]
    fn error_key_lowers_default_confidence() {
        let raw = r#"{"error": "partial", "file_path": "a.py", "content": ""}"#;
        let result = validate_and_parse(raw, &ActionKind::Generate, &no_context());
        assert_eq!(result.output.confidence_score, 0.5);
    }

    #[test]
    fn soft_list_elements_are_stringified_in_order() {
        let raw = r#"{"priority_actions": [{"task": "build"}, "review", 3]}"#;
        let result = validate_and_parse(raw, &ActionKind::Analyze, &no_context());
        let OutputBody::CodeAnalysis(analysis) = &result.output.body else {
            panic!("expected analysis body");
        };
        assert_eq!(
            analysis.priority_actions,
            vec![r#"{"task":"build"}"#.to_string(), "review".into(), "3".into()]
        );
    }

    #[test]
    fn context_is_merged_into_metadata() {
        let mut context = Map::new();
        context.insert("decision_making".into(), json!(true));
        let raw = r#"{"metadata": {"note": "kept"}, "insights": []}"#;
        let result = validate_and_parse(raw, &ActionKind::Analyze, &context);
        assert_eq!(result.output.metadata.get("note"), Some(&json!("kept")));
        assert_eq!(
            result.output.metadata.get("context"),
            Some(&json!({"decision_making": true}))
        );
    }

    #[test]
    fn no_json_is_extraction_failure() {
        let result = validate_and_parse("I could not do it", &ActionKind::Generate, &no_context());
        assert!(result.is_failure());
        assert_eq!(result.output.status, "error");
        assert_eq!(result.output.confidence_score, 0.0);
        assert_eq!(result.output.body, OutputBody::Base);
        let context = result.error_context.expect("error context");
        assert_eq!(context.error_type, "NoJsonFound");
        assert_eq!(context.validation_stage, ValidationStage::DataExtraction);
        assert_eq!(context.partial_data, None);
        assert_eq!(context.raw_output, "I could not do it");
    }

    #[test]
    fn schema_mismatch_is_model_validation_failure() {
        let raw = r#"{"file_path": 42, "content": "x"}"#;
        let result = validate_and_parse(raw, &ActionKind::Generate, &no_context());
        let context = result.error_context.expect("error context");
        assert_eq!(context.error_type, "SchemaValidationFailed");
        assert_eq!(context.validation_stage, ValidationStage::ModelValidation);
        let partial = context.partial_data.expect("partial data");
        assert_eq!(partial.get("file_path"), Some(&json!(42)));
    }

    #[test]
    fn generation_requires_non_blank_path_and_content() {
        let result = validate_and_parse(
            r#"{"status": "completed", "language": "python"}"#,
            &ActionKind::Generate,
            &no_context(),
        );
        assert!(result.is_failure());
        assert_eq!(
            result.error_context.map(|c| c.error_type),
            Some("SchemaValidationFailed".to_string())
        );

        let result = validate_and_parse(
            r#"{"file_path": "", "content": "x"}"#,
            &ActionKind::Refactor,
            &no_context(),
        );
        assert!(result.is_failure());
    }

    #[test]
    fn confidence_out_of_range_fails() {
        let raw = r#"{"confidence_score": 1.5, "insights": []}"#;
        let result = validate_and_parse(raw, &ActionKind::Analyze, &no_context());
        assert!(result.is_failure());
    }

    #[test]
    fn test_reports_are_typed() {
        let raw = r#"{"test_cases": [], "coverage": {"line": 80.0}, "failures": [],
            "test_results": [{"component_path": "a.py", "passed": false, "error_message": "boom", "suggestions": ["fix import"]}]}"#;
        let result = validate_and_parse(raw, &ActionKind::Test, &no_context());
        let OutputBody::TestExecution(test) = &result.output.body else {
            panic!("expected test body, got {:?}", result.error_context);
        };
        assert_eq!(test.test_results.len(), 1);
        assert!(!test.test_results[0].passed);
        assert_eq!(test.test_results[0].execution_time, 0.0);
    }

    #[test]
    fn refactor_validates_as_generation() {
        let raw = r#"{"file_path": "a.py", "content": "print(2)", "language": "python"}"#;
        let result = validate_and_parse(raw, &ActionKind::Refactor, &no_context());
        assert_eq!(result.output.body.type_name(), "CodeGenerationOutput");
        assert_eq!(result.action_type, ActionKind::Refactor);
    }

    #[test]
    fn kinds_without_schema_fail() {
        let result = validate_and_parse("{}", &ActionKind::AskHuman, &no_context());
        assert!(result.is_failure());
        let result = validate_and_parse("{}", &ActionKind::parse("deploy"), &no_context());
        assert!(
            result
                .error_message()
                .is_some_and(|message| message.contains("deploy"))
        );
    }

    #[test]
    fn raw_output_preview_is_truncated() {
        let raw = "x".repeat(700);
        let result = validate_and_parse(&raw, &ActionKind::Analyze, &no_context());
        let context = result.error_context.expect("error context");
        assert_eq!(context.raw_output.len(), RAW_OUTPUT_PREVIEW_CHARS + 3);
        assert!(context.raw_output.ends_with("..."));
    }
}
