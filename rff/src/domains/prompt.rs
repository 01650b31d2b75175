//! Prompt templates for the bundled domains.

use anyhow::{Context, Result};
use minijinja::Environment;
use serde::Serialize;
use tracing::debug;

use crate::core::workspace::Workspace;

const GAME24_PLAN_TEMPLATE: &str = include_str!("prompts/game24_plan.md");
const GAME24_COMPUTE_TEMPLATE: &str = include_str!("prompts/game24_compute.md");
const WORD_PLAN_TEMPLATE: &str = include_str!("prompts/word_plan.md");
const WORD_COMPUTE_TEMPLATE: &str = include_str!("prompts/word_compute.md");

/// Bytes of rendered workspace shown to the model before truncation.
pub const DEFAULT_FACTS_BUDGET_BYTES: usize = 20_000;

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        for (name, source) in [
            ("game24_plan", GAME24_PLAN_TEMPLATE),
            ("game24_compute", GAME24_COMPUTE_TEMPLATE),
            ("word_plan", WORD_PLAN_TEMPLATE),
            ("word_compute", WORD_COMPUTE_TEMPLATE),
        ] {
            env.add_template(name, source)
                .with_context(|| format!("load template {name}"))?;
        }
        Ok(Self { env })
    }

    pub fn render<C: Serialize>(&self, name: &str, ctx: C) -> Result<String> {
        let template = self
            .env
            .get_template(name)
            .with_context(|| format!("template {name}"))?;
        let rendered = template
            .render(ctx)
            .with_context(|| format!("render template {name}"))?;
        Ok(rendered.trim().to_string())
    }
}

/// Pretty JSON of the workspace, cut to `budget` bytes on a char boundary.
pub fn render_facts(workspace: &Workspace, budget: usize) -> String {
    if workspace.is_empty() {
        return "(none yet)".to_string();
    }
    let rendered = serde_json::to_string_pretty(workspace.all())
        .unwrap_or_else(|_| format!("{:?}", workspace.all()));
    if rendered.len() <= budget {
        return rendered;
    }
    let mut cut = budget.saturating_sub(12);
    while cut > 0 && !rendered.is_char_boundary(cut) {
        cut -= 1;
    }
    debug!(
        before_len = rendered.len(),
        after_len = cut,
        "truncated facts for budget"
    );
    format!("{}\n[truncated]", &rendered[..cut])
}
