//! Case execution orchestration.
//!
//! Builds the strategy for the case, runs the controller in-process, and
//! captures the results.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use rff::core::types::StepOutcome;
use rff::domains::game24::Game24Strategy;
use rff::domains::word_problem::WordProblemStrategy;
use rff::io::config::{RffConfig, SearchConfig};
use rff::io::generator::Generator;
use rff::looping::{Solution, run_loop};
use rff::strategy::Strategy;

use crate::case::{CaseFile, Problem};
use crate::config::apply_case_config;
use crate::outcome::{Outcome, classify_outcome};
use crate::results::{CaptureInput, capture_results};

/// Result of running a single case.
#[derive(Debug)]
pub struct RunOutcome {
    /// Unique identifier for this eval run.
    pub eval_run_id: String,
    /// Path to the results directory.
    pub results_dir: PathBuf,
    /// Classified outcome.
    pub outcome: Outcome,
    pub iterations: usize,
}

/// Run a case end-to-end against `generator`: controller loop, classification, result capture.
///
/// Backend and exhaustion failures are outcomes, not errors; only harness
/// problems (config, filesystem) are returned as `Err`.
#[instrument(skip_all, fields(case_id = %case.case.id))]
pub fn run_case<G: Generator>(
    repo_root: &Path,
    case_path: &Path,
    case: &CaseFile,
    generator: G,
) -> Result<RunOutcome> {
    info!("case run started");
    let config = case_config(case)?;

    let started_at = Utc::now();
    let eval_run_id = format!("eval-{}", started_at.format("%Y%m%d_%H%M%S_%3f"));

    debug!(kind = case.problem.kind(), "running controller");
    let (result, steps) = match &case.problem {
        Problem::Game24 { numbers } => {
            let strategy = Game24Strategy::new(generator, numbers.clone())?;
            execute(&strategy.problem(), &strategy, &config.search)
        }
        Problem::Word { question, gold } => {
            let strategy = WordProblemStrategy::new(generator, question.as_str(), *gold)?;
            execute(question, &strategy, &config.search)
        }
    };
    let finished_at = Utc::now();

    let outcome = classify_outcome(&result, &case.problem);
    let error = match &result {
        Ok(_) => None,
        Err(err) => {
            warn!(err = %format!("{err:#}"), "controller stopped without an answer");
            Some(format!("{err:#}"))
        }
    };
    let answer = result.as_ref().ok().map(|solution| solution.answer.as_str());

    let capture_input = CaptureInput {
        case_id: &case.case.id,
        case_path,
        eval_run_id: &eval_run_id,
        problem_kind: case.problem.kind(),
        generator_command: &config.generator.command,
        steps: &steps,
        answer,
        error,
        outcome,
        started_at,
        finished_at,
        repo_root,
    };
    let results_dir = capture_results(&repo_root.join("eval").join("results"), &capture_input)
        .context("capture results")?;

    info!(outcome = ?outcome, results_dir = %results_dir.display(), "case run complete");

    Ok(RunOutcome {
        eval_run_id,
        results_dir,
        outcome,
        iterations: steps.len(),
    })
}

/// Effective config for a case: defaults plus the case's overrides.
pub fn case_config(case: &CaseFile) -> Result<RffConfig> {
    apply_case_config(RffConfig::default(), &case.config)
}

fn execute<S: Strategy>(
    problem: &str,
    strategy: &S,
    search: &SearchConfig,
) -> (Result<Solution>, Vec<StepOutcome>) {
    let mut steps = Vec::new();
    let result = run_loop(problem, strategy, search, |step| steps.push(step.clone()));
    (result, steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rff::test_support::ScriptedGenerator;

    use crate::results::read_meta;

    fn game24_case() -> CaseFile {
        CaseFile {
            case: crate::case::CaseMeta {
                id: "game24-46".to_string(),
                description: None,
            },
            problem: Problem::Game24 {
                numbers: vec![4, 6],
            },
            config: crate::case::CaseConfig {
                max_iterations: Some(2),
                ..crate::case::CaseConfig::default()
            },
        }
    }

    #[test]
    fn solved_run_writes_results() {
        let temp = tempfile::tempdir().expect("tempdir");
        let case_path = temp.path().join("game24-46.toml");
        std::fs::write(&case_path, "placeholder").expect("case");

        let outcome = run_case(
            temp.path(),
            &case_path,
            &game24_case(),
            ScriptedGenerator::new(["6 * 4"]),
        )
        .expect("run");

        assert_eq!(outcome.outcome, Outcome::Solved);
        assert_eq!(outcome.iterations, 1);
        assert!(outcome.eval_run_id.starts_with("eval-"));
        let meta = read_meta(&outcome.results_dir.join("meta.json")).expect("meta");
        assert_eq!(meta.answer.as_deref(), Some("6 * 4"));
    }

    #[test]
    fn backend_failure_is_recorded_as_error_outcome() {
        let temp = tempfile::tempdir().expect("tempdir");
        let case_path = temp.path().join("game24-46.toml");
        std::fs::write(&case_path, "placeholder").expect("case");

        let outcome = run_case(
            temp.path(),
            &case_path,
            &game24_case(),
            ScriptedGenerator::new(Vec::<String>::new()).then_fail("backend down"),
        )
        .expect("run");

        assert_eq!(outcome.outcome, Outcome::Error);
        let meta = read_meta(&outcome.results_dir.join("meta.json")).expect("meta");
        assert!(meta.error.expect("error").contains("backend down"));
    }
}
