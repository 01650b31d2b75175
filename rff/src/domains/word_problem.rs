//! Arithmetic word problems (GSM8K style).
//!
//! Symbols are snake_case quantity names; the objective is always
//! `final_answer`. Forward steps come back from the backend as
//! `{"var": ..., "value": ...}` JSON checked against a bundled schema.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use jsonschema::{Draft, Validator};
use minijinja::context;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::core::types::Verdict;
use crate::core::workspace::{Workspace, render_value};
use crate::domains::prompt::{DEFAULT_FACTS_BUDGET_BYTES, PromptEngine, render_facts};
use crate::domains::{first_line, strip_code_fence};
use crate::io::generator::Generator;
use crate::strategy::Strategy;

pub const OBJECTIVE: &str = "final_answer";

/// Absolute tolerance when comparing against the gold answer.
pub const GOLD_TOLERANCE: f64 = 1e-6;

const PROPOSAL_SCHEMA: &str = include_str!("schemas/word_proposal.schema.json");

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("valid identifier regex"));

#[derive(Debug, Deserialize)]
struct ForwardStep {
    var: String,
    value: Value,
}

pub struct WordProblemStrategy<G> {
    generator: G,
    question: String,
    gold: Option<f64>,
    prompts: PromptEngine,
    schema: Validator,
}

impl<G: Generator> WordProblemStrategy<G> {
    pub fn new(generator: G, question: impl Into<String>, gold: Option<f64>) -> Result<Self> {
        let schema: Value =
            serde_json::from_str(PROPOSAL_SCHEMA).context("parse word proposal schema")?;
        let schema = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(&schema)
            .context("compile word proposal schema")?;
        Ok(Self {
            generator,
            question: question.into(),
            gold,
            prompts: PromptEngine::new()?,
            schema,
        })
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    /// Extract the `{"var", "value"}` step from model output, if it is well formed.
    fn parse_step(&self, response: &str) -> Option<ForwardStep> {
        let body = strip_code_fence(response);
        let start = body.find('{')?;
        let end = body.rfind('}')?;
        if end < start {
            return None;
        }
        let raw: Value = match serde_json::from_str(&body[start..=end]) {
            Ok(raw) => raw,
            Err(err) => {
                debug!(%err, "forward step is not JSON");
                return None;
            }
        };
        if !self.schema.is_valid(&raw) {
            debug!(%raw, "forward step does not match schema");
            return None;
        }
        serde_json::from_value(raw).ok()
    }
}

impl<G: Generator> Strategy for WordProblemStrategy<G> {
    fn derive_objective(&self, _problem: &str) -> String {
        OBJECTIVE.to_string()
    }

    fn locally_valid(&self, workspace: &Workspace, symbol: &str) -> bool {
        match workspace.get(symbol) {
            None | Some(Value::Null) => false,
            Some(value) if symbol == OBJECTIVE => numeric(value).is_some(),
            Some(_) => true,
        }
    }

    fn globally_verify(&self, workspace: &Workspace) -> Result<Verdict> {
        let Some(value) = workspace.get(OBJECTIVE) else {
            return Ok(Verdict::reject(""));
        };
        let answer = render_value(value);
        let accepted = match (self.gold, numeric(value)) {
            (Some(gold), Some(got)) => (gold - got).abs() <= GOLD_TOLERANCE,
            _ => false,
        };
        Ok(Verdict {
            accepted,
            answer,
        })
    }

    fn propose_prerequisite(
        &self,
        workspace: &Workspace,
        objective: &str,
        avoid: &BTreeSet<String>,
    ) -> Result<Option<String>> {
        let prompt = self.prompts.render(
            "word_plan",
            context! {
                question => &self.question,
                facts => render_facts(workspace, DEFAULT_FACTS_BUDGET_BYTES),
                objective => objective,
                avoid => avoid,
            },
        )?;
        let response = self.generator.generate(&prompt)?;
        let line = first_line(&response);
        let Some(symbol) = IDENTIFIER_RE.find(&line) else {
            debug!(%line, "no identifier in plan response");
            return Ok(None);
        };
        let symbol = known_spelling(workspace, objective, symbol.as_str())
            .unwrap_or_else(|| symbol.as_str().to_string());
        if avoid.contains(&symbol) {
            debug!(%symbol, "proposed symbol is in the avoid set");
            return Ok(None);
        }
        Ok(Some(symbol))
    }

    fn compute_value(
        &self,
        workspace: &Workspace,
        target: &str,
        _avoid: &BTreeSet<String>,
    ) -> Result<Workspace> {
        let prompt = self.prompts.render(
            "word_compute",
            context! {
                question => &self.question,
                facts => render_facts(workspace, DEFAULT_FACTS_BUDGET_BYTES),
                target => target,
                objective => OBJECTIVE,
            },
        )?;
        let response = self.generator.generate(&prompt)?;
        let Some(step) = self.parse_step(&response) else {
            return Ok(Workspace::new());
        };
        let Some(var) = storage_key(workspace, target, &step.var) else {
            debug!(var = %step.var, "forward step names no usable symbol");
            return Ok(Workspace::new());
        };
        Ok(Workspace::single(var, step.value))
    }

    fn merge_aliases(&self, workspace: Workspace) -> Workspace {
        // New values are stored under an existing spelling when one exists (see
        // `storage_key`), so groups only form from keys that were never folded.
        // Within such a group the smallest key wins.
        let mut merged: BTreeMap<String, (String, Value)> = BTreeMap::new();
        for (symbol, value) in workspace.all() {
            merged
                .entry(normalize(symbol))
                .or_insert_with(|| (symbol.clone(), value.clone()));
        }
        // The objective key must survive or the run could never finish.
        if let Some(value) = workspace.get(OBJECTIVE) {
            merged.insert(OBJECTIVE.to_string(), (OBJECTIVE.to_string(), value.clone()));
        }
        if merged.len() == workspace.len() {
            return workspace;
        }
        debug!(
            before = workspace.len(),
            after = merged.len(),
            "coalesced aliases"
        );
        merged.into_values().collect()
    }
}

/// Spelling already in use for `symbol`: the requested name or an existing key.
fn known_spelling(workspace: &Workspace, requested: &str, symbol: &str) -> Option<String> {
    let key = normalize(symbol);
    if key == normalize(requested) {
        return Some(requested.to_string());
    }
    workspace
        .symbols()
        .find(|existing| normalize(existing) == key)
        .map(str::to_string)
}

/// Key a forward step's `var` is stored under, or `None` if it cannot name a symbol.
///
/// Known spellings win so a newer value replaces the older one on commit;
/// otherwise the name itself, folded to its normalized form if needed.
fn storage_key(workspace: &Workspace, target: &str, var: &str) -> Option<String> {
    if let Some(known) = known_spelling(workspace, target, var) {
        return Some(known);
    }
    let var = var.trim();
    if is_identifier(var) {
        return Some(var.to_string());
    }
    let key = normalize(var);
    is_identifier(&key).then_some(key)
}

fn is_identifier(text: &str) -> bool {
    IDENTIFIER_RE
        .find(text)
        .is_some_and(|m| m.start() == 0 && m.end() == text.len())
}

/// Alias key: lowercase, with `-` and spaces folded to `_`.
fn normalize(symbol: &str) -> String {
    symbol
        .trim()
        .chars()
        .map(|ch| match ch {
            '-' | ' ' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

/// Numeric reading of a value: numbers, or strings like `"$1,200"` / `"18 "`.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text
            .trim()
            .trim_start_matches('$')
            .replace(',', "")
            .parse()
            .ok(),
        _ => None,
    }
}
