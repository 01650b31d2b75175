//! CLI command implementations.

use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use rff::io::generator::CommandGenerator;

use crate::case::{CaseFile, discover_cases};
use crate::report::aggregate;
use crate::run::{case_config, run_case};

/// List all available cases.
pub fn list_cases(repo_root: &Path) -> Result<()> {
    let cases_dir = repo_root.join("eval").join("cases");
    let cases = discover_cases(&cases_dir)?;
    for case in cases {
        match &case.case.description {
            Some(description) => {
                println!("{} {} {}", case.case.id, case.problem.kind(), description);
            }
            None => println!("{} {}", case.case.id, case.problem.kind()),
        }
    }
    Ok(())
}

/// Run a case by id (optionally multiple times).
pub fn run_case_by_id(repo_root: &Path, case_id: &str, runs: u32) -> Result<()> {
    let cases_dir = repo_root.join("eval").join("cases");
    let case_path = cases_dir.join(format!("{case_id}.toml"));
    if !case_path.exists() {
        bail!("case {} not found at {}", case_id, case_path.display());
    }
    let case = CaseFile::load(&case_path).context("load case")?;
    let generator = CommandGenerator::from_config(&case_config(&case)?.generator)
        .context("configure generator")?;
    debug!(case_id, runs, "case loaded");

    info!(case_id, runs, "starting runs");
    for run_num in 1..=runs {
        debug!(case_id, run_num, runs, "starting run");
        let outcome =
            run_case(repo_root, &case_path, &case, &generator).context("run case")?;
        println!(
            "run: case={} eval_run_id={} outcome={:?} iterations={} results={}",
            case_id,
            outcome.eval_run_id,
            outcome.outcome,
            outcome.iterations,
            outcome.results_dir.display()
        );
    }
    Ok(())
}

/// Show aggregated results for a case.
pub fn report_case(repo_root: &Path, case_id: &str) -> Result<()> {
    let results_dir = repo_root.join("eval").join("results").join(case_id);
    let (summary, warnings) = aggregate(&results_dir)?;
    println!("report: case={} runs={}", case_id, summary.runs);
    println!(
        "report: solved={} wrong={} exhausted={} error={}",
        summary.solved, summary.wrong, summary.exhausted, summary.error
    );
    if let Some(avg) = summary.avg_duration_secs {
        println!("report: avg_duration_secs={:.2}", avg);
    }
    if let Some(avg) = summary.avg_iterations {
        println!("report: avg_iterations={:.2}", avg);
    }
    for warning in warnings {
        eprintln!("warning: {}", warning);
    }
    Ok(())
}

/// Remove stored results for a case.
pub fn clean_case(repo_root: &Path, case_id: &str) -> Result<()> {
    let case_results = repo_root.join("eval").join("results").join(case_id);
    if case_results.exists() {
        std::fs::remove_dir_all(&case_results)
            .with_context(|| format!("remove {}", case_results.display()))?;
    }

    println!("clean: case={} results={}", case_id, case_results.display());
    Ok(())
}
