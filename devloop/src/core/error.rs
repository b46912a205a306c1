//! Error taxonomy for output handling and step execution.
//!
//! Only [`LoopError::StepFatal`] ends a workflow. Every other kind degrades: extraction
//! and schema failures go through repair, decision failures become a human escalation,
//! and action failures are recorded as a failed result.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoopError {
    #[error("failed to extract JSON from output")]
    NoJsonFound,
    #[error("schema validation failed: {0}")]
    SchemaValidationFailed(String),
    #[error("output repair failed: {0}")]
    RepairFailed(String),
    #[error("could not extract or construct valid decision data: {0}")]
    DecisionResolutionFailed(String),
    #[error("action execution failed: {0}")]
    ActionExecutionFailed(String),
    #[error("step execution error: {0}")]
    StepFatal(String),
}

impl LoopError {
    /// Stable name recorded in error contexts.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoJsonFound => "NoJsonFound",
            Self::SchemaValidationFailed(_) => "SchemaValidationFailed",
            Self::RepairFailed(_) => "RepairFailed",
            Self::DecisionResolutionFailed(_) => "DecisionResolutionFailed",
            Self::ActionExecutionFailed(_) => "ActionExecutionFailed",
            Self::StepFatal(_) => "StepFatal",
        }
    }

    /// Wrap any error chain as a fatal step error.
    pub fn fatal(err: impl std::fmt::Display) -> Self {
        Self::StepFatal(err.to_string())
    }
}

/// Where in validation a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStage {
    DataExtraction,
    ModelValidation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable_names() {
        assert_eq!(LoopError::NoJsonFound.kind(), "NoJsonFound");
        assert_eq!(
            LoopError::SchemaValidationFailed("x".into()).kind(),
            "SchemaValidationFailed"
        );
        assert_eq!(LoopError::fatal("boom").kind(), "StepFatal");
    }

    #[test]
    fn fatal_message_is_human_readable() {
        let err = LoopError::fatal("no prompt template for action type 'deploy'");
        assert_eq!(
            err.to_string(),
            "step execution error: no prompt template for action type 'deploy'"
        );
    }
}
