use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::outcome::Outcome;
use crate::results::read_meta;

#[derive(Debug, Default)]
pub struct ReportSummary {
    pub runs: usize,
    pub solved: usize,
    pub wrong: usize,
    pub exhausted: usize,
    pub error: usize,
    pub avg_duration_secs: Option<f64>,
    pub avg_iterations: Option<f64>,
}

pub fn load_run_dirs(case_results_dir: &Path) -> Result<Vec<PathBuf>> {
    if !case_results_dir.exists() {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in fs::read_dir(case_results_dir)
        .with_context(|| format!("read {}", case_results_dir.display()))?
    {
        let entry = entry.context("read entry")?;
        if entry.path().is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

pub fn aggregate(case_results_dir: &Path) -> Result<(ReportSummary, Vec<String>)> {
    let mut summary = ReportSummary::default();
    let mut warnings = Vec::new();

    for run_dir in load_run_dirs(case_results_dir)? {
        let meta = match read_meta(&run_dir.join("meta.json")) {
            Ok(meta) => meta,
            Err(err) => {
                warnings.push(format!(
                    "skip {}: meta.json invalid ({err:#})",
                    run_dir.display()
                ));
                continue;
            }
        };

        summary.runs += 1;
        match meta.outcome {
            Outcome::Solved => summary.solved += 1,
            Outcome::Wrong => summary.wrong += 1,
            Outcome::Exhausted => summary.exhausted += 1,
            Outcome::Error => summary.error += 1,
        }

        summary.avg_duration_secs = Some(running_mean(
            summary.avg_duration_secs,
            meta.duration_secs,
            summary.runs,
        ));
        summary.avg_iterations = Some(running_mean(
            summary.avg_iterations,
            f64::from(meta.iterations),
            summary.runs,
        ));
    }

    Ok((summary, warnings))
}

fn running_mean(avg: Option<f64>, value: f64, count: usize) -> f64 {
    match avg {
        None => value,
        Some(avg) => (avg * (count as f64 - 1.0) + value) / count as f64,
    }
}
