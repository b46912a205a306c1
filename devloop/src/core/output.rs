//! Typed structured outputs produced from completion-service replies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::core::action::ActionKind;
use crate::core::error::ValidationStage;

pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_REPAIRED: &str = "repaired";
pub const STATUS_ERROR: &str = "error";
pub const STATUS_FAILED: &str = "failed";

/// Fresh identifier for one produced output.
pub fn new_step_id() -> String {
    Uuid::new_v4().to_string()
}

/// Output of an `analyze` action, also used for decision making.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeAnalysisOutput {
    #[serde(default)]
    pub insights: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default = "default_quality_metrics")]
    pub code_quality_metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub priority_actions: Vec<String>,
}

fn default_quality_metrics() -> BTreeMap<String, f64> {
    ["complexity", "maintainability", "documentation"]
        .into_iter()
        .map(|name| (name.to_string(), 0.0))
        .collect()
}

/// Output of a `generate` or `refactor` action: one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeGenerationOutput {
    pub file_path: String,
    pub content: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub quality_checks: Map<String, Value>,
    #[serde(default)]
    pub generation_context: Map<String, Value>,
    #[serde(default)]
    pub validation_results: Vec<Value>,
}

/// Per-component verdict reported by a `test` action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub component_path: String,
    pub passed: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub execution_time: f64,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// Output of a `test` action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestExecutionOutput {
    #[serde(default)]
    pub test_cases: Vec<Value>,
    #[serde(default)]
    pub coverage: BTreeMap<String, f64>,
    #[serde(default)]
    pub performance_metrics: Option<Map<String, Value>>,
    #[serde(default)]
    pub failures: Vec<Value>,
    #[serde(default)]
    pub test_results: Vec<TestReport>,
}

/// Variant-specific part of a [`StructuredOutput`].
///
/// `Base` carries no variant fields; it is only produced when validation failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "output_type")]
pub enum OutputBody {
    CodeAnalysis(CodeAnalysisOutput),
    CodeGeneration(CodeGenerationOutput),
    TestExecution(TestExecutionOutput),
    Base,
}

impl OutputBody {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::CodeAnalysis(_) => "CodeAnalysisOutput",
            Self::CodeGeneration(_) => "CodeGenerationOutput",
            Self::TestExecution(_) => "TestExecutionOutput",
            Self::Base => "StepOutput",
        }
    }
}

/// Base fields shared by every output plus exactly one variant body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredOutput {
    pub step_id: String,
    pub status: String,
    /// Within `0.0..=1.0`.
    pub confidence_score: f64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(flatten)]
    pub body: OutputBody,
}

impl StructuredOutput {
    /// Best-effort output built when validation failed.
    pub fn error(message: &str) -> Self {
        let mut metadata = Map::new();
        metadata.insert("error".to_string(), Value::String(message.to_string()));
        Self {
            step_id: new_step_id(),
            status: STATUS_ERROR.to_string(),
            confidence_score: 0.0,
            metadata,
            body: OutputBody::Base,
        }
    }

    /// Names of the populated top-level fields, in serialized order.
    pub fn field_names(&self) -> Vec<String> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }
}

/// Bookkeeping recorded by the validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    pub raw_output_length: usize,
    pub validation_successful: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_details: Option<ValidationDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationDetails {
    pub output_type: String,
    pub fields_present: Vec<String>,
}

/// Diagnostics attached when validation failed but a base output was still built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorContext {
    pub error_type: String,
    pub error_message: String,
    pub partial_data: Option<Map<String, Value>>,
    /// First 500 characters of the raw reply.
    pub raw_output: String,
    pub validation_stage: ValidationStage,
}

/// Validated (or best-effort) output for one completion-service reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedActionResult {
    pub action_type: ActionKind,
    pub output: StructuredOutput,
    pub execution_metadata: ExecutionMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_context: Option<ErrorContext>,
}

impl EnhancedActionResult {
    pub fn is_failure(&self) -> bool {
        self.error_context.is_some()
    }

    /// Failure message, if validation failed.
    pub fn error_message(&self) -> Option<&str> {
        self.error_context
            .as_ref()
            .map(|context| context.error_message.as_str())
    }
}

/// Result of executing one action, as folded into project state.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult {
    /// Output that passed validation, possibly after repair.
    Completed(EnhancedActionResult),
    /// Validation still failed after repair.
    Failed { action_type: ActionKind, error: String },
}

impl ActionResult {
    pub fn action_type(&self) -> &ActionKind {
        match self {
            Self::Completed(result) => &result.action_type,
            Self::Failed { action_type, .. } => action_type,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Completed(result) => result.error_message(),
            Self::Failed { error, .. } => Some(error),
        }
    }

    /// Raw JSON form stored in the working context and development history.
    ///
    /// A failed result is `{error, status: "failed", action_type}`.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        match self {
            Self::Completed(result) => serde_json::to_value(result),
            Self::Failed { action_type, error } => Ok(json!({
                "error": error,
                "status": STATUS_FAILED,
                "action_type": action_type,
            })),
        }
    }
}
