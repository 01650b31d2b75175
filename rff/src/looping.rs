//! Bounded controller loop.

use std::fmt;

use anyhow::Result;
use tracing::{info, warn};

use crate::core::types::{StepOutcome, Transition};
use crate::core::workspace::Workspace;
use crate::io::config::SearchConfig;
use crate::step::{SearchState, run_step};
use crate::strategy::Strategy;

/// Successful end of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub objective: String,
    pub answer: String,
    /// Iterations executed, including the solving one.
    pub iterations: u32,
    /// Workspace at the time the objective was accepted.
    pub workspace: Workspace,
}

/// The iteration budget ran out before the objective was accepted.
///
/// Returned inside `anyhow::Error`; callers recover it with `downcast_ref`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExhaustedError {
    pub objective: String,
    pub max_iterations: u32,
}

impl fmt::Display for ExhaustedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "search exhausted {} iterations without solving '{}'",
            self.max_iterations, self.objective
        )
    }
}

impl std::error::Error for ExhaustedError {}

/// Run the controller until the objective is accepted or `max_iterations` is spent.
///
/// `on_step` sees every iteration record, including the solving one. Backend
/// failures stop the loop immediately and are returned unchanged.
pub fn run_loop<S: Strategy + ?Sized, F: FnMut(&StepOutcome)>(
    problem: &str,
    strategy: &S,
    config: &SearchConfig,
    mut on_step: F,
) -> Result<Solution> {
    config.validate()?;
    let mut state = SearchState::new(strategy, problem, config);
    info!(
        objective = state.objective(),
        max_iterations = config.max_iterations,
        "search started"
    );

    while state.next_iter < config.max_iterations {
        let step = run_step(strategy, &mut state, config)?;
        on_step(&step);
        if let Transition::Solved { answer } = step.transition {
            info!(iterations = step.iter + 1, %answer, "objective solved");
            return Ok(Solution {
                objective: state.objective().to_string(),
                answer,
                iterations: step.iter + 1,
                workspace: state.workspace,
            });
        }
    }

    warn!(
        objective = state.objective(),
        max_iterations = config.max_iterations,
        "search exhausted"
    );
    Err(ExhaustedError {
        objective: state.objective().to_string(),
        max_iterations: config.max_iterations,
    }
    .into())
}
