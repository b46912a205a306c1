//! Test-only helpers: a scripted completion service, canned model replies and a
//! throwaway project directory.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use serde_json::json;
use tempfile::TempDir;

use crate::io::completion::CompletionService;
use crate::io::config::{DevloopConfig, write_config};
use crate::io::init::{DevloopPaths, init_devloop};

/// One recorded call to [`ScriptedCompletion`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionCall {
    pub prompt: String,
    pub system: String,
}

/// Completion service that replays queued replies in order.
///
/// Every call is recorded. Once the queue is empty, calls fail.
#[derive(Debug, Default)]
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<CompletionCall>>,
}

impl ScriptedCompletion {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<CompletionCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().expect("replies lock").len()
    }
}

impl CompletionService for ScriptedCompletion {
    fn complete(&self, prompt: &str, system: &str) -> Result<String> {
        self.calls.lock().expect("calls lock").push(CompletionCall {
            prompt: prompt.to_string(),
            system: system.to_string(),
        });
        self.replies
            .lock()
            .expect("replies lock")
            .pop_front()
            .ok_or_else(|| anyhow!("scripted completion exhausted"))
    }
}

/// Analysis reply without an embedded decision.
pub fn analysis_reply(priority_actions: &[&str]) -> String {
    json!({
        "insights": ["project is at an early stage"],
        "recommendations": [],
        "code_quality_metrics": {},
        "priority_actions": priority_actions,
    })
    .to_string()
}

/// Decision-making reply embedding a decision of `kind`.
pub fn decision_reply(kind: &str, description: &str) -> String {
    json!({
        "insights": [],
        "recommendations": [],
        "priority_actions": [],
        "metadata": {
            "decision": {
                "action_type": kind,
                "description": description,
                "needs_human_input": false,
                "context": { "specific_focus": description },
            }
        }
    })
    .to_string()
}

/// Decision-making reply asking a human `query`.
pub fn needs_human_reply(query: &str) -> String {
    json!({
        "priority_actions": [],
        "metadata": {
            "decision": {
                "action_type": "ask_human",
                "description": "clarify requirements",
                "needs_human_input": true,
                "human_query": query,
            }
        }
    })
    .to_string()
}

/// Generation reply for `file_path`.
pub fn generation_reply(file_path: &str, content: &str) -> String {
    json!({
        "file_path": file_path,
        "content": content,
        "language": "python",
        "dependencies": [],
    })
    .to_string()
}

/// Test-execution reply with a single result for `component_path`.
pub fn test_reply(component_path: &str, passed: bool) -> String {
    json!({
        "test_cases": [{ "name": "test_main", "status": if passed { "passed" } else { "failed" } }],
        "coverage": { "total": 80.0 },
        "failures": [],
        "test_results": [{
            "component_path": component_path,
            "passed": passed,
            "error_message": if passed { None } else { Some("assertion failed") },
            "execution_time": 0.1,
        }],
    })
    .to_string()
}

/// Temporary project directory with `.devloop/` initialized.
pub struct TestProject {
    dir: TempDir,
    paths: DevloopPaths,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        let paths = init_devloop(dir.path(), false)?;
        Ok(Self { dir, paths })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn paths(&self) -> &DevloopPaths {
        &self.paths
    }

    pub fn write_config(&self, config: &DevloopConfig) -> Result<()> {
        write_config(&self.paths.config_path, config)
    }
}
