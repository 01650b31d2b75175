//! Capability contract every problem domain implements.
//!
//! The controller talks to a domain only through [`Strategy`]. Prompting,
//! parsing, and scoring stay inside the implementation; the controller sees
//! structured proposals and yes/no answers.

use std::collections::BTreeSet;

use anyhow::Result;

use crate::core::types::Verdict;
use crate::core::workspace::{Workspace, render_value};

/// Domain plugin driven by the controller loop.
///
/// Methods that may reach the generation backend return `Result`: a backend
/// failure is fatal to the run and must be propagated, never folded into a
/// rejection. Everything else is infallible and deterministic.
pub trait Strategy {
    /// Objective symbol for `problem`. Called once per run.
    fn derive_objective(&self, problem: &str) -> String;

    /// Whether `workspace` already holds an acceptable value for `symbol`.
    fn locally_valid(&self, workspace: &Workspace, symbol: &str) -> bool;

    /// Authoritative check, only called once the objective is locally valid.
    fn globally_verify(&self, workspace: &Workspace) -> Result<Verdict>;

    /// Backward step: one prerequisite of `objective` not in `avoid`, or `None`.
    fn propose_prerequisite(
        &self,
        workspace: &Workspace,
        objective: &str,
        avoid: &BTreeSet<String>,
    ) -> Result<Option<String>>;

    /// Forward step: a fragment supplying a value, normally for `target`.
    ///
    /// The fragment may name a different symbol (e.g. the objective itself).
    fn compute_value(
        &self,
        workspace: &Workspace,
        target: &str,
        avoid: &BTreeSet<String>,
    ) -> Result<Workspace>;

    /// The single symbol `proposal` supplies, if any.
    fn resolve_proposal_target(&self, proposal: &Workspace) -> Option<String> {
        proposal.symbols().next().map(str::to_string)
    }

    /// Coalesce synonymous symbols. Must be idempotent.
    fn merge_aliases(&self, workspace: Workspace) -> Workspace {
        workspace
    }

    /// Answer text for `symbol`'s current value, used when no verification is required.
    fn render_answer(&self, workspace: &Workspace, symbol: &str) -> Option<String> {
        workspace.get(symbol).map(render_value)
    }
}
