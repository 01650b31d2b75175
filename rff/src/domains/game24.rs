//! 24-game domain: combine the given numbers with `+ - * /` into 24.
//!
//! Symbols are canonical rational values (`"24"`, `"8"`, `"3/2"`). A workspace
//! entry records one expression reaching that value and the input numbers it
//! consumed.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Result, bail};
use minijinja::context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::core::arith::{Rational, evaluate};
use crate::core::types::Verdict;
use crate::core::workspace::Workspace;
use crate::domains::first_line;
use crate::domains::prompt::PromptEngine;
use crate::io::generator::Generator;
use crate::strategy::Strategy;

pub const TARGET: i128 = 24;

/// Sentinel the backend prints when a micro-goal is unreachable.
pub const CANNOT_ACHIEVE: &str = "CANNOT_ACHIEVE_WITH_AVAILABLE_NUMBERS";

/// One expression known to reach a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game24Entry {
    pub expr: String,
    pub value: String,
    pub nums: Vec<u64>,
}

impl Game24Entry {
    fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    fn rational(&self) -> Option<Rational> {
        self.value.parse().ok()
    }

    fn to_value(&self) -> Value {
        serde_json::json!({ "expr": self.expr, "value": self.value, "nums": self.nums })
    }
}

#[derive(Serialize)]
struct FactView<'a> {
    expr: &'a str,
    value: &'a str,
}

pub struct Game24Strategy<G> {
    generator: G,
    numbers: Vec<u64>,
    prompts: PromptEngine,
}

impl<G: Generator> Game24Strategy<G> {
    pub fn new(generator: G, numbers: Vec<u64>) -> Result<Self> {
        if numbers.is_empty() {
            bail!("game24 needs at least one number");
        }
        Ok(Self {
            generator,
            numbers,
            prompts: PromptEngine::new()?,
        })
    }

    pub fn numbers(&self) -> &[u64] {
        &self.numbers
    }

    /// Problem text handed to the controller, e.g. `"1 2 5 9"`.
    pub fn problem(&self) -> String {
        self.numbers
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Parse one expression from model output, keeping only ones built from the input numbers.
    fn parse_entry(&self, response: &str) -> Option<Game24Entry> {
        let line = first_line(response);
        let expr = line
            .split('=')
            .next()
            .unwrap_or("")
            .trim()
            .trim_end_matches(['.', ';'])
            .trim();
        if expr.is_empty() {
            return None;
        }
        let evaluation = match evaluate(expr) {
            Ok(evaluation) => evaluation,
            Err(err) => {
                debug!(%expr, %err, "unparsable expression");
                return None;
            }
        };
        if !is_sub_multiset(&evaluation.literals, &self.numbers) {
            debug!(%expr, "expression uses numbers outside the input");
            return None;
        }
        Some(Game24Entry {
            expr: expr.to_string(),
            value: evaluation.value.to_string(),
            nums: evaluation.literals,
        })
    }

    fn render(
        &self,
        name: &str,
        workspace: &Workspace,
        goal: &str,
        avoid: &BTreeSet<String>,
    ) -> Result<String> {
        let facts: Vec<Game24Entry> = entries(workspace).collect();
        let facts: Vec<FactView<'_>> = facts
            .iter()
            .map(|entry| FactView {
                expr: &entry.expr,
                value: &entry.value,
            })
            .collect();
        self.prompts.render(
            name,
            context! {
                numbers => &self.numbers,
                available => available(&self.numbers, workspace),
                facts => facts,
                objective => goal,
                target => goal,
                avoid => avoid,
                cannot => CANNOT_ACHIEVE,
            },
        )
    }
}

impl<G: Generator> Strategy for Game24Strategy<G> {
    fn derive_objective(&self, _problem: &str) -> String {
        Rational::integer(TARGET).to_string()
    }

    fn locally_valid(&self, workspace: &Workspace, symbol: &str) -> bool {
        let Ok(target) = symbol.parse::<Rational>() else {
            return false;
        };
        entries(workspace).any(|entry| entry.rational() == Some(target))
    }

    fn globally_verify(&self, workspace: &Workspace) -> Result<Verdict> {
        let all_numbers = sorted(&self.numbers);
        let target = Rational::integer(TARGET);
        let mut closest = None;
        for entry in entries(workspace) {
            if entry.rational() != Some(target) {
                continue;
            }
            if sorted(&entry.nums) == all_numbers {
                return Ok(Verdict::accept(entry.expr));
            }
            closest.get_or_insert(entry.expr);
        }
        Ok(Verdict::reject(closest.unwrap_or_default()))
    }

    fn propose_prerequisite(
        &self,
        workspace: &Workspace,
        objective: &str,
        avoid: &BTreeSet<String>,
    ) -> Result<Option<String>> {
        let prompt = self.render("game24_plan", workspace, objective, avoid)?;
        let response = self.generator.generate(&prompt)?;
        let Some(entry) = self.parse_entry(&response) else {
            return Ok(None);
        };
        if avoid.contains(&entry.value) {
            debug!(symbol = %entry.value, "proposed value is in the avoid set");
            return Ok(None);
        }
        Ok(Some(entry.value))
    }

    fn compute_value(
        &self,
        workspace: &Workspace,
        target: &str,
        avoid: &BTreeSet<String>,
    ) -> Result<Workspace> {
        if target.parse::<Rational>().is_err() {
            debug!(%target, "target is not a value");
            return Ok(Workspace::new());
        }
        let prompt = self.render("game24_compute", workspace, target, avoid)?;
        let response = self.generator.generate(&prompt)?;
        if first_line(&response).contains(CANNOT_ACHIEVE) {
            return Ok(Workspace::new());
        }
        Ok(self
            .parse_entry(&response)
            .map(|entry| Workspace::single(entry.value.clone(), entry.to_value()))
            .unwrap_or_default())
    }

    fn render_answer(&self, workspace: &Workspace, symbol: &str) -> Option<String> {
        let target = symbol.parse::<Rational>().ok()?;
        entries(workspace)
            .find(|entry| entry.rational() == Some(target))
            .map(|entry| entry.expr)
    }
}

fn entries(workspace: &Workspace) -> impl Iterator<Item = Game24Entry> + '_ {
    workspace.all().values().filter_map(Game24Entry::from_value)
}

/// Input numbers not yet consumed by any workspace entry, in input order.
fn available(numbers: &[u64], workspace: &Workspace) -> Vec<u64> {
    let mut used: BTreeMap<u64, usize> = BTreeMap::new();
    for entry in entries(workspace) {
        for number in entry.nums {
            *used.entry(number).or_default() += 1;
        }
    }
    numbers
        .iter()
        .copied()
        .filter(|number| match used.get_mut(number) {
            Some(count) if *count > 0 => {
                *count -= 1;
                false
            }
            _ => true,
        })
        .collect()
}

fn sorted(numbers: &[u64]) -> Vec<u64> {
    let mut numbers = numbers.to_vec();
    numbers.sort_unstable();
    numbers
}

fn is_sub_multiset(used: &[u64], available: &[u64]) -> bool {
    let mut counts: BTreeMap<u64, usize> = BTreeMap::new();
    for number in available {
        *counts.entry(*number).or_default() += 1;
    }
    used.iter().all(|number| match counts.get_mut(number) {
        Some(count) if *count > 0 => {
            *count -= 1;
            true
        }
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::SearchConfig;
    use crate::looping::run_loop;
    use crate::test_support::ScriptedGenerator;

    fn strategy(responses: &[&str]) -> Game24Strategy<ScriptedGenerator> {
        Game24Strategy::new(ScriptedGenerator::new(responses.iter().copied()), vec![1, 2, 5, 9])
            .expect("strategy")
    }

    fn entry(expr: &str, value: &str, nums: &[u64]) -> Value {
        Game24Entry {
            expr: expr.to_string(),
            value: value.to_string(),
            nums: nums.to_vec(),
        }
        .to_value()
    }

    #[test]
    fn proposes_value_of_suggested_expression() {
        let strategy = strategy(&["`(9 - 5) * 2`"]);
        let symbol = strategy
            .propose_prerequisite(&Workspace::new(), "24", &BTreeSet::new())
            .expect("propose");
        assert_eq!(symbol.as_deref(), Some("8"));
        assert!(strategy.generator.prompts()[0].contains("1, 2, 5, 9"));
    }

    #[test]
    fn rejects_expressions_over_foreign_or_reused_numbers() {
        let strategy = strategy(&["7 * 3", "9 * 9 - 5", "not math"]);
        for _ in 0..3 {
            let symbol = strategy
                .propose_prerequisite(&Workspace::new(), "24", &BTreeSet::new())
                .expect("propose");
            assert_eq!(symbol, None);
        }
    }

    #[test]
    fn avoided_value_is_not_proposed() {
        let strategy = strategy(&["9 - 1"]);
        let avoid = BTreeSet::from(["8".to_string()]);
        let symbol = strategy
            .propose_prerequisite(&Workspace::new(), "24", &avoid)
            .expect("propose");
        assert_eq!(symbol, None);
    }

    #[test]
    fn compute_records_entry_keyed_by_value() {
        let strategy = strategy(&["2 * (5 - 1) = 8", CANNOT_ACHIEVE]);
        let fragment = strategy
            .compute_value(&Workspace::new(), "8", &BTreeSet::new())
            .expect("compute");
        assert_eq!(fragment.get("8"), Some(&entry("2 * (5 - 1)", "8", &[2, 5, 1])));
        assert!(strategy.locally_valid(&fragment, "8"));
        assert!(!strategy.locally_valid(&fragment, "3"));

        let empty = strategy
            .compute_value(&fragment, "3/7", &BTreeSet::new())
            .expect("compute");
        assert!(empty.is_empty());
    }

    #[test]
    fn prompts_list_numbers_not_yet_consumed() {
        let strategy = strategy(&["9 - 1", "9 - 1"]);
        let mut ws = Workspace::new();
        ws.set("8", entry("9 - 1", "8", &[9, 1]));
        strategy
            .propose_prerequisite(&ws, "24", &BTreeSet::new())
            .expect("propose");
        strategy
            .compute_value(&ws, "3", &BTreeSet::new())
            .expect("compute");
        for prompt in strategy.generator.prompts() {
            assert!(prompt.contains("Numbers still available: 2, 5"), "{prompt}");
        }
        assert_eq!(available(&[4, 4, 6, 6], &ws), vec![4, 4, 6, 6]);
        assert!(available(&[9, 1], &ws).is_empty());
    }

    #[test]
    fn verification_requires_every_number() {
        let strategy = strategy(&[]);
        let mut ws = Workspace::new();
        ws.set("24", entry("(9 - 5) * 2 * 3", "24", &[9, 5, 2, 3]));
        let verdict = strategy.globally_verify(&ws).expect("verify");
        assert!(!verdict.accepted);

        ws.set("24", entry("(9 - 1) * (5 - 2)", "24", &[9, 1, 5, 2]));
        let verdict = strategy.globally_verify(&ws).expect("verify");
        assert_eq!(verdict, Verdict::accept("(9 - 1) * (5 - 2)"));
        assert_eq!(
            strategy.render_answer(&ws, "24").as_deref(),
            Some("(9 - 1) * (5 - 2)")
        );
    }

    #[test]
    fn solves_after_committing_intermediate_value() {
        let strategy = strategy(&[
            CANNOT_ACHIEVE,
            "9 - 1",
            "9 - 1",
            "(9 - 1) * (5 - 2)",
        ]);
        let mut transitions = Vec::new();
        let solution = run_loop(&strategy.problem(), &strategy, &SearchConfig::default(), |step| {
            transitions.push(step.transition.clone());
        })
        .expect("solved");
        assert_eq!(solution.answer, "(9 - 1) * (5 - 2)");
        assert_eq!(solution.iterations, 2);
        assert_eq!(
            transitions[0],
            crate::core::types::Transition::Committed {
                symbol: "8".to_string()
            }
        );
    }

    #[test]
    fn backend_failure_aborts_the_run() {
        let strategy = Game24Strategy::new(
            ScriptedGenerator::new(Vec::<String>::new()).then_fail("backend down"),
            vec![4, 6],
        )
        .expect("strategy");
        let err = run_loop("4 6", &strategy, &SearchConfig::default(), |_| {})
            .expect_err("fails");
        assert!(err.to_string().contains("backend down"));
    }
}
