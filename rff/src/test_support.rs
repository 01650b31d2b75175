//! Scripted collaborators for controller and domain tests.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, VecDeque};

use anyhow::{Result, anyhow};

use crate::core::types::Verdict;
use crate::core::workspace::{Workspace, render_value};
use crate::io::generator::Generator;
use crate::strategy::Strategy;

/// Strategy that replays queued plans, proposals, and verdicts.
///
/// - `propose_prerequisite` pops the next plan (empty queue → `None`).
/// - `compute_value` pops the next proposal (empty queue → empty fragment).
/// - `globally_verify` pops the next verdict (empty queue → accept).
/// - `locally_valid` holds when the symbol is present and not marked via
///   [`ScriptedStrategy::reject_symbol`].
#[derive(Debug, Default)]
pub struct ScriptedStrategy {
    objective: String,
    plans: RefCell<VecDeque<Option<String>>>,
    proposals: RefCell<VecDeque<Workspace>>,
    verdicts: RefCell<VecDeque<bool>>,
    rejected: BTreeSet<String>,
    compute_error: Option<String>,
    compute_requests: RefCell<Vec<String>>,
    verify_calls: Cell<usize>,
}

impl ScriptedStrategy {
    pub fn new(objective: &str) -> Self {
        Self {
            objective: objective.to_string(),
            ..Self::default()
        }
    }

    pub fn plan(self, symbol: Option<&str>) -> Self {
        self.plans
            .borrow_mut()
            .push_back(symbol.map(str::to_string));
        self
    }

    pub fn compute(self, proposal: Workspace) -> Self {
        self.proposals.borrow_mut().push_back(proposal);
        self
    }

    pub fn verdicts<I: IntoIterator<Item = bool>>(self, verdicts: I) -> Self {
        self.verdicts.borrow_mut().extend(verdicts);
        self
    }

    pub fn reject_symbol(mut self, symbol: &str) -> Self {
        self.rejected.insert(symbol.to_string());
        self
    }

    pub fn fail_compute(mut self, message: &str) -> Self {
        self.compute_error = Some(message.to_string());
        self
    }

    pub fn compute_calls(&self) -> usize {
        self.compute_requests.borrow().len()
    }

    /// Targets passed to `compute_value`, in call order.
    pub fn compute_requests(&self) -> Vec<String> {
        self.compute_requests.borrow().clone()
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.get()
    }
}

impl Strategy for ScriptedStrategy {
    fn derive_objective(&self, _problem: &str) -> String {
        self.objective.clone()
    }

    fn locally_valid(&self, workspace: &Workspace, symbol: &str) -> bool {
        workspace.contains(symbol) && !self.rejected.contains(symbol)
    }

    fn globally_verify(&self, workspace: &Workspace) -> Result<Verdict> {
        self.verify_calls.set(self.verify_calls.get() + 1);
        let answer = workspace
            .get(&self.objective)
            .map(render_value)
            .unwrap_or_default();
        let accepted = self.verdicts.borrow_mut().pop_front().unwrap_or(true);
        Ok(Verdict { accepted, answer })
    }

    fn propose_prerequisite(
        &self,
        _workspace: &Workspace,
        _objective: &str,
        _avoid: &BTreeSet<String>,
    ) -> Result<Option<String>> {
        Ok(self.plans.borrow_mut().pop_front().flatten())
    }

    fn compute_value(
        &self,
        _workspace: &Workspace,
        target: &str,
        _avoid: &BTreeSet<String>,
    ) -> Result<Workspace> {
        if let Some(message) = &self.compute_error {
            return Err(anyhow!("{message}"));
        }
        self.compute_requests.borrow_mut().push(target.to_string());
        Ok(self.proposals.borrow_mut().pop_front().unwrap_or_default())
    }
}

/// Generator that returns queued responses and records every prompt.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    responses: RefCell<VecDeque<Result<String, String>>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new<I, T>(responses: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            responses: RefCell::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    /// Queue a backend failure after the already queued responses.
    pub fn then_fail(self, message: &str) -> Self {
        self.responses
            .borrow_mut()
            .push_back(Err(message.to_string()));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }
}

impl Generator for ScriptedGenerator {
    fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.borrow_mut().push(prompt.to_string());
        match self.responses.borrow_mut().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!("{message}")),
            None => Err(anyhow!("scripted generator has no responses left")),
        }
    }
}
