//! Prompt rendering for completion calls.
//!
//! Each supported action kind has a minijinja template split into sections with
//! `<!-- section:KEY required|droppable -->` markers. A prompt over budget loses
//! its droppable sections in a fixed order.

use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use minijinja::{Environment, context};
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::core::action::ActionKind;
use crate::core::types::ProjectState;

const BASE_FORMAT_TEMPLATE: &str = include_str!("prompts/base_format.md");
const ANALYZE_TEMPLATE: &str = include_str!("prompts/analyze.md");
const GENERATE_TEMPLATE: &str = include_str!("prompts/generate.md");
const TEST_TEMPLATE: &str = include_str!("prompts/test.md");
const REFACTOR_TEMPLATE: &str = include_str!("prompts/refactor.md");

/// Droppable sections, least important first.
const DROP_ORDER: [&str; 2] = ["state", "working_context"];

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!--\s*section:(\w+)\s+(required|droppable)\s*-->")
        .expect("section marker pattern should compile")
});

/// Everything a prompt is built from.
#[derive(Debug, Clone)]
pub struct PromptRequest<'a> {
    kind: &'a ActionKind,
    context: &'a Value,
    working_context: Option<&'a Map<String, Value>>,
    state: Option<&'a ProjectState>,
    instructions: Option<&'a str>,
}

impl<'a> PromptRequest<'a> {
    pub fn new(kind: &'a ActionKind, context: &'a Value) -> Self {
        Self {
            kind,
            context,
            working_context: None,
            state: None,
            instructions: None,
        }
    }

    pub fn with_working_context(mut self, working_context: &'a Map<String, Value>) -> Self {
        self.working_context = Some(working_context);
        self
    }

    pub fn with_state(mut self, state: &'a ProjectState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_instructions(mut self, instructions: &'a str) -> Self {
        self.instructions = Some(instructions);
        self
    }
}

/// Renders prompts within a byte budget.
pub struct PromptGenerator {
    env: Environment<'static>,
    budget_bytes: usize,
}

impl PromptGenerator {
    pub fn new(budget_bytes: usize) -> Self {
        let mut env = Environment::new();
        for (name, source) in [
            ("base_format", BASE_FORMAT_TEMPLATE),
            ("analyze", ANALYZE_TEMPLATE),
            ("generate", GENERATE_TEMPLATE),
            ("test", TEST_TEMPLATE),
            ("refactor", REFACTOR_TEMPLATE),
        ] {
            env.add_template(name, source)
                .expect("embedded prompt template should be valid");
        }
        Self { env, budget_bytes }
    }

    /// Render the prompt for `request`.
    ///
    /// Fails for kinds without a template (`ask_human` and unknown tags).
    pub fn generate_prompt(&self, request: &PromptRequest<'_>) -> Result<String> {
        let name = template_name(request.kind)?;
        let working_context = request
            .working_context
            .filter(|map| !map.is_empty())
            .map(serde_json::to_string_pretty)
            .transpose()
            .context("serialize working context")?;
        let state = request
            .state
            .map(serde_json::to_string_pretty)
            .transpose()
            .context("serialize project state")?;
        let rendered = self
            .env
            .get_template(name)?
            .render(context! {
                context => serde_json::to_string_pretty(request.context).context("serialize prompt context")?,
                working_context => working_context,
                state => state,
                instructions => request.instructions.map(str::trim).filter(|s| !s.is_empty()),
            })
            .with_context(|| format!("render {name} prompt"))?;

        let mut sections = parse_sections(&rendered);
        apply_budget(&mut sections, self.budget_bytes);
        let prompt = render_sections(&sections);
        debug!(template = name, prompt_len = prompt.len(), "rendered prompt");
        Ok(prompt)
    }
}

fn template_name(kind: &ActionKind) -> Result<&'static str> {
    match kind {
        ActionKind::Analyze => Ok("analyze"),
        ActionKind::Generate => Ok("generate"),
        ActionKind::Test => Ok("test"),
        ActionKind::Refactor => Ok("refactor"),
        ActionKind::AskHuman | ActionKind::Unknown(_) => {
            bail!("no prompt template for action type '{kind}'")
        }
    }
}

#[derive(Debug, Clone)]
struct Section {
    key: String,
    required: bool,
    content: String,
}

/// Split rendered output at section markers, skipping sections that rendered empty.
fn parse_sections(rendered: &str) -> Vec<Section> {
    let markers: Vec<_> = SECTION_RE.captures_iter(rendered).collect();
    let mut sections = Vec::with_capacity(markers.len());
    for (i, caps) in markers.iter().enumerate() {
        let start = caps.get(0).map_or(0, |m| m.end());
        let end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(rendered.len(), |m| m.start());
        let content = rendered[start..end].trim();
        if content.is_empty() {
            continue;
        }
        sections.push(Section {
            key: caps[1].to_string(),
            required: &caps[2] == "required",
            content: content.to_string(),
        });
    }
    sections
}

fn total_len(sections: &[Section]) -> usize {
    sections.iter().map(|s| s.content.len()).sum()
}

fn apply_budget(sections: &mut Vec<Section>, budget: usize) {
    for key in DROP_ORDER {
        if total_len(sections) <= budget {
            return;
        }
        if let Some(idx) = sections.iter().position(|s| s.key == key && !s.required) {
            let dropped = sections.remove(idx);
            debug!(
                section = key,
                bytes_dropped = dropped.content.len(),
                "dropped section for budget"
            );
        }
    }
    let total = total_len(sections);
    if total > budget {
        warn!(total, budget, "prompt exceeds budget after dropping sections");
    }
}

fn render_sections(sections: &[Section]) -> String {
    sections
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
