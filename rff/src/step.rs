//! One controller iteration.
//!
//! Each call performs a full state transition:
//!
//! 1. objective-satisfied check (verify if needed)
//! 2. direct attempt at the objective, unless it is excluded
//! 3. backward planning: one prerequisite symbol
//! 4. forward execution: compute it, resolve what was actually supplied
//! 5. alias coalescing
//! 6. stagnation bookkeeping
//!
//! A solved iteration returns right away and skips 5 and 6.

use anyhow::Result;
use tracing::{debug, instrument};

use crate::core::bookkeeping::Bookkeeping;
use crate::core::types::{DirectAttempt, StepOutcome, Transition};
use crate::core::workspace::Workspace;
use crate::io::config::SearchConfig;
use crate::strategy::Strategy;

/// Mutable state owned by the controller for one run.
#[derive(Debug, Clone)]
pub struct SearchState {
    objective: String,
    pub workspace: Workspace,
    pub bookkeeping: Bookkeeping,
    /// Zero-based index of the next iteration.
    pub next_iter: u32,
}

impl SearchState {
    pub fn new<S: Strategy + ?Sized>(strategy: &S, problem: &str, config: &SearchConfig) -> Self {
        Self {
            objective: strategy.derive_objective(problem),
            workspace: Workspace::new(),
            bookkeeping: Bookkeeping::new(config.failure_threshold, config.stagnation_window),
            next_iter: 0,
        }
    }

    /// Objective symbol; fixed for the lifetime of the run.
    pub fn objective(&self) -> &str {
        &self.objective
    }
}

/// Execute one iteration against `state`.
///
/// Errors are backend failures surfaced by the strategy and are fatal to the run.
/// Domain rejections are reported through [`Transition`].
#[instrument(skip_all, fields(iter = state.next_iter, objective = %state.objective))]
pub fn run_step<S: Strategy + ?Sized>(
    strategy: &S,
    state: &mut SearchState,
    config: &SearchConfig,
) -> Result<StepOutcome> {
    let iter = state.next_iter;
    state.next_iter += 1;
    let objective = state.objective.clone();
    let accept_unverified =
        !config.require_gold && iter >= config.min_iterations.saturating_sub(1);

    if strategy.locally_valid(&state.workspace, &objective) {
        if let Some(answer) = settle(strategy, &state.workspace, &objective, accept_unverified)? {
            return Ok(solved(state, iter, None, answer));
        }
        // The wrong value stays in the workspace; only trust in it is revoked.
        state.bookkeeping.register_failure(&objective);
    }

    let direct_attempt = if state.bookkeeping.is_excluded(&objective) {
        DirectAttempt::Skipped
    } else {
        let proposal =
            strategy.compute_value(&state.workspace, &objective, state.bookkeeping.avoid())?;
        let candidate = state.workspace.merge(&proposal);
        let attempt = if strategy.locally_valid(&candidate, &objective) {
            if let Some(answer) = settle(strategy, &candidate, &objective, accept_unverified)? {
                state.workspace = candidate;
                return Ok(solved(state, iter, Some(DirectAttempt::Unverified), answer));
            }
            DirectAttempt::Unverified
        } else {
            DirectAttempt::Invalid
        };
        // Keep side facts from the candidate even though the objective guess failed.
        state.workspace = candidate;
        state.bookkeeping.register_failure(&objective);
        attempt
    };

    let proposed =
        strategy.propose_prerequisite(&state.workspace, &objective, state.bookkeeping.avoid())?;
    let transition = match proposed.map(|symbol| symbol.trim().to_string()) {
        None => Transition::NoPrerequisite,
        Some(symbol) if symbol.is_empty() => Transition::NoPrerequisite,
        Some(symbol) if state.bookkeeping.is_excluded(&symbol) => Transition::Excluded { symbol },
        Some(prerequisite) => {
            forward(strategy, state, &objective, prerequisite, accept_unverified)?
        }
    };
    if let Transition::Solved { answer } = transition {
        return Ok(solved(state, iter, Some(direct_attempt), answer));
    }

    let workspace = std::mem::take(&mut state.workspace);
    state.workspace = strategy.merge_aliases(workspace);

    let stagnation_reset = state
        .bookkeeping
        .record_iteration(transition.made_progress());

    debug!(
        ?direct_attempt,
        ?transition,
        stagnation = state.bookkeeping.stagnation(),
        stagnation_reset,
        avoid = state.bookkeeping.avoid().len(),
        "iteration finished"
    );

    Ok(StepOutcome {
        iter,
        direct_attempt: Some(direct_attempt),
        transition,
        stagnation: state.bookkeeping.stagnation(),
        stagnation_reset,
        avoid: state.bookkeeping.avoid().iter().cloned().collect(),
        workspace_size: state.workspace.len(),
    })
}

/// Compute `prerequisite` and decide whether the proposal may be committed.
fn forward<S: Strategy + ?Sized>(
    strategy: &S,
    state: &mut SearchState,
    objective: &str,
    prerequisite: String,
    accept_unverified: bool,
) -> Result<Transition> {
    let proposal =
        strategy.compute_value(&state.workspace, &prerequisite, state.bookkeeping.avoid())?;
    let supplied = strategy.resolve_proposal_target(&proposal);

    match supplied {
        Some(symbol) if symbol == objective => {
            let candidate = state.workspace.merge(&proposal);
            if strategy.locally_valid(&candidate, objective)
                && let Some(answer) = settle(strategy, &candidate, objective, accept_unverified)?
            {
                state.workspace = candidate;
                return Ok(Transition::Solved { answer });
            }
            // Candidate is discarded: the running workspace is left as it was.
            state.bookkeeping.register_failure(objective);
            if prerequisite != objective {
                state.bookkeeping.register_failure(&prerequisite);
            }
            Ok(Transition::ObjectiveRejected { prerequisite })
        }
        Some(symbol) if symbol == prerequisite => {
            let candidate = state.workspace.merge(&proposal);
            if !strategy.locally_valid(&candidate, &prerequisite) {
                state.bookkeeping.register_failure(&prerequisite);
                return Ok(Transition::Invalid {
                    symbol: prerequisite,
                });
            }
            state.workspace = candidate;
            state.bookkeeping.mark_resolved(&prerequisite);
            Ok(Transition::Committed {
                symbol: prerequisite,
            })
        }
        supplied => {
            state.bookkeeping.register_failure(&prerequisite);
            Ok(Transition::Malformed {
                requested: prerequisite,
                supplied,
            })
        }
    }
}

/// Decide whether a locally valid objective in `workspace` ends the run.
fn settle<S: Strategy + ?Sized>(
    strategy: &S,
    workspace: &Workspace,
    objective: &str,
    accept_unverified: bool,
) -> Result<Option<String>> {
    if accept_unverified && let Some(answer) = strategy.render_answer(workspace, objective) {
        debug!("accepting unverified objective");
        return Ok(Some(answer));
    }
    let verdict = strategy.globally_verify(workspace)?;
    if verdict.accepted {
        return Ok(Some(verdict.answer));
    }
    debug!(answer = %verdict.answer, "verification rejected objective");
    Ok(None)
}

fn solved(
    state: &SearchState,
    iter: u32,
    direct_attempt: Option<DirectAttempt>,
    answer: String,
) -> StepOutcome {
    StepOutcome {
        iter,
        direct_attempt,
        transition: Transition::Solved { answer },
        stagnation: state.bookkeeping.stagnation(),
        stagnation_reset: false,
        avoid: state.bookkeeping.avoid().iter().cloned().collect(),
        workspace_size: state.workspace.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedStrategy;
    use serde_json::json;

    fn config() -> SearchConfig {
        SearchConfig::default()
    }

    #[test]
    fn commits_requested_prerequisite() {
        let strategy = ScriptedStrategy::new("goal")
            .plan(Some("a"))
            .compute(Workspace::new())
            .compute(Workspace::single("a", json!(1)));
        let mut state = SearchState::new(&strategy, "p", &config());

        let step = run_step(&strategy, &mut state, &config()).expect("step");

        assert_eq!(
            step.transition,
            Transition::Committed {
                symbol: "a".to_string()
            }
        );
        assert_eq!(step.direct_attempt, Some(DirectAttempt::Invalid));
        assert_eq!(state.workspace.get("a"), Some(&json!(1)));
        assert_eq!(state.bookkeeping.attempts("a"), 0);
        assert!(state.bookkeeping.is_excluded("a"));
        assert_eq!(state.bookkeeping.attempts("goal"), 1);
        assert_eq!(step.stagnation, 0);
    }

    #[test]
    fn malformed_proposal_never_mutates_workspace() {
        let strategy = ScriptedStrategy::new("goal")
            .plan(Some("a"))
            .compute(Workspace::new())
            .compute(Workspace::single("other", json!(5)));
        let mut state = SearchState::new(&strategy, "p", &config());

        let step = run_step(&strategy, &mut state, &config()).expect("step");

        assert_eq!(
            step.transition,
            Transition::Malformed {
                requested: "a".to_string(),
                supplied: Some("other".to_string()),
            }
        );
        assert!(state.workspace.is_empty());
        assert_eq!(state.bookkeeping.attempts("a"), 1);
        assert_eq!(step.stagnation, 1);
    }

    #[test]
    fn invalid_prerequisite_is_not_committed() {
        let strategy = ScriptedStrategy::new("goal")
            .plan(Some("a"))
            .compute(Workspace::new())
            .compute(Workspace::single("a", json!(null)))
            .reject_symbol("a");
        let mut state = SearchState::new(&strategy, "p", &config());

        let step = run_step(&strategy, &mut state, &config()).expect("step");

        assert_eq!(
            step.transition,
            Transition::Invalid {
                symbol: "a".to_string()
            }
        );
        assert!(!state.workspace.contains("a"));
    }

    #[test]
    fn rejected_objective_candidate_is_discarded() {
        let strategy = ScriptedStrategy::new("goal")
            .plan(Some("a"))
            .compute(Workspace::new())
            .compute(Workspace::single("goal", json!(7)))
            .verdicts([false]);
        let mut state = SearchState::new(&strategy, "p", &config());

        let step = run_step(&strategy, &mut state, &config()).expect("step");

        assert_eq!(
            step.transition,
            Transition::ObjectiveRejected {
                prerequisite: "a".to_string()
            }
        );
        assert!(!state.workspace.contains("goal"));
        assert_eq!(state.bookkeeping.attempts("goal"), 2);
        assert_eq!(state.bookkeeping.attempts("a"), 1);
    }

    #[test]
    fn locally_invalid_objective_from_forward_step_is_discarded() {
        let mut proposal = Workspace::single("goal", json!(7));
        proposal.set("side", json!(1));
        let strategy = ScriptedStrategy::new("goal")
            .plan(Some("a"))
            .compute(Workspace::new())
            .compute(proposal)
            .reject_symbol("goal");
        let mut state = SearchState::new(&strategy, "p", &config());

        let step = run_step(&strategy, &mut state, &config()).expect("step");

        assert_eq!(
            step.transition,
            Transition::ObjectiveRejected {
                prerequisite: "a".to_string()
            }
        );
        assert!(state.workspace.is_empty());
        assert_eq!(state.bookkeeping.attempts("goal"), 2);
        assert_eq!(state.bookkeeping.attempts("a"), 1);
        assert_eq!(strategy.verify_calls(), 0);
        assert_eq!(step.stagnation, 1);
    }

    #[test]
    fn direct_attempt_keeps_side_facts_of_wrong_guess() {
        let mut guess = Workspace::single("goal", json!(3));
        guess.set("side", json!("fact"));
        let strategy = ScriptedStrategy::new("goal")
            .compute(guess)
            .verdicts([false]);
        let mut state = SearchState::new(&strategy, "p", &config());

        let step = run_step(&strategy, &mut state, &config()).expect("step");

        assert_eq!(step.direct_attempt, Some(DirectAttempt::Unverified));
        assert_eq!(step.transition, Transition::NoPrerequisite);
        assert_eq!(state.workspace.get("side"), Some(&json!("fact")));
        assert_eq!(state.workspace.get("goal"), Some(&json!(3)));
    }

    #[test]
    fn excluded_objective_skips_direct_attempt() {
        let strategy = ScriptedStrategy::new("goal");
        let mut state = SearchState::new(&strategy, "p", &config());
        for _ in 0..config().failure_threshold {
            state.bookkeeping.register_failure("goal");
        }

        let step = run_step(&strategy, &mut state, &config()).expect("step");

        assert_eq!(step.direct_attempt, Some(DirectAttempt::Skipped));
        assert_eq!(strategy.compute_calls(), 0);
    }

    #[test]
    fn excluded_prerequisite_ends_iteration_without_progress() {
        let strategy = ScriptedStrategy::new("goal")
            .plan(Some("a"))
            .compute(Workspace::new());
        let mut state = SearchState::new(&strategy, "p", &config());
        state.bookkeeping.mark_resolved("a");

        let step = run_step(&strategy, &mut state, &config()).expect("step");

        assert_eq!(
            step.transition,
            Transition::Excluded {
                symbol: "a".to_string()
            }
        );
        assert_eq!(strategy.compute_calls(), 1);
        assert_eq!(step.stagnation, 1);
    }

    #[test]
    fn no_gold_mode_waits_for_min_iterations() {
        let cfg = SearchConfig {
            require_gold: false,
            min_iterations: 2,
            ..SearchConfig::default()
        };
        let strategy = ScriptedStrategy::new("goal")
            .compute(Workspace::single("goal", json!(9)))
            .verdicts([false]);
        let mut state = SearchState::new(&strategy, "p", &cfg);

        let first = run_step(&strategy, &mut state, &cfg).expect("first");
        assert!(!first.is_solved());

        let second = run_step(&strategy, &mut state, &cfg).expect("second");
        assert_eq!(
            second.transition,
            Transition::Solved {
                answer: "9".to_string()
            }
        );
        assert_eq!(strategy.verify_calls(), 1);
    }

    #[test]
    fn backend_failure_is_propagated() {
        let strategy = ScriptedStrategy::new("goal").fail_compute("backend unreachable");
        let mut state = SearchState::new(&strategy, "p", &config());

        let err = run_step(&strategy, &mut state, &config()).expect_err("fatal");
        assert!(err.to_string().contains("backend unreachable"));
    }
}
