//! Result capture and persistence.
//!
//! Each eval run gets `eval/results/<case>/<eval-run-id>/` holding the
//! iteration trace (`trace.jsonl`) and run metadata (`meta.json`).

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use rff::core::types::StepOutcome;
use rff::io::trace::TraceWriter;

use crate::outcome::Outcome;

/// Everything known about a finished run.
#[derive(Debug)]
pub struct CaptureInput<'a> {
    pub case_id: &'a str,
    pub case_path: &'a Path,
    pub eval_run_id: &'a str,
    pub problem_kind: &'a str,
    pub generator_command: &'a [String],
    pub steps: &'a [StepOutcome],
    pub answer: Option<&'a str>,
    pub error: Option<String>,
    pub outcome: Outcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub repo_root: &'a Path,
}

/// Metadata for an eval run, persisted to `meta.json`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EvalMeta {
    pub case_id: String,
    pub eval_run_id: String,
    /// SHA-256 hash of the case file for reproducibility tracking.
    pub case_hash: String,
    /// Git SHA of the repo at time of run.
    pub git_sha: Option<String>,
    pub problem_kind: String,
    pub generator_command: Vec<String>,
    pub outcome: Outcome,
    pub answer: Option<String>,
    /// Iterations executed, including the solving one.
    pub iterations: u32,
    pub error: Option<String>,
    pub start_time: String,
    pub end_time: String,
    pub duration_secs: f64,
    /// Non-fatal errors encountered during capture.
    pub errors: Vec<String>,
}

/// Write trace and metadata for a finished run; returns the run's results directory.
#[instrument(skip_all, fields(case_id = %input.case_id, eval_run_id = %input.eval_run_id))]
pub fn capture_results(base_dir: &Path, input: &CaptureInput<'_>) -> Result<PathBuf> {
    let results_dir = results_dir(base_dir, input.case_id, input.eval_run_id);
    fs::create_dir_all(&results_dir)
        .with_context(|| format!("create results dir {}", results_dir.display()))?;

    let mut errors = Vec::new();

    let case_hash = match file_sha256(input.case_path) {
        Ok(hash) => hash,
        Err(err) => {
            errors.push(format!("case hash: {err}"));
            String::new()
        }
    };

    let git_sha = match git_rev_parse(input.repo_root) {
        Ok(sha) => Some(sha),
        Err(err) => {
            errors.push(format!("git sha: {err}"));
            None
        }
    };

    let mut trace = TraceWriter::create(&results_dir.join("trace.jsonl"))?;
    for step in input.steps {
        trace.append(step)?;
    }

    if !errors.is_empty() {
        warn!(errors = ?errors, "result capture had errors");
    }

    let duration = input.finished_at - input.started_at;
    let meta = EvalMeta {
        case_id: input.case_id.to_string(),
        eval_run_id: input.eval_run_id.to_string(),
        case_hash,
        git_sha,
        problem_kind: input.problem_kind.to_string(),
        generator_command: input.generator_command.to_vec(),
        outcome: input.outcome,
        answer: input.answer.map(str::to_string),
        iterations: u32::try_from(input.steps.len()).unwrap_or(u32::MAX),
        error: input.error.clone(),
        start_time: input.started_at.to_rfc3339(),
        end_time: input.finished_at.to_rfc3339(),
        duration_secs: duration.num_milliseconds() as f64 / 1000.0,
        errors,
    };

    write_meta(&results_dir.join("meta.json"), &meta)?;
    debug!(results_dir = %results_dir.display(), "results captured");
    Ok(results_dir)
}

pub fn read_meta(path: &Path) -> Result<EvalMeta> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

pub fn results_dir(base_dir: &Path, case_id: &str, eval_run_id: &str) -> PathBuf {
    base_dir.join(case_id).join(eval_run_id)
}

fn write_meta(path: &Path, meta: &EvalMeta) -> Result<()> {
    let contents = serde_json::to_string_pretty(meta).context("serialize meta")?;
    fs::write(path, format!("{contents}\n"))
        .with_context(|| format!("write meta {}", path.display()))?;
    Ok(())
}

fn file_sha256(path: &Path) -> Result<String> {
    let contents = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(contents);
    let digest = hasher.finalize();
    Ok(hex::encode(digest))
}

fn git_rev_parse(repo_root: &Path) -> Result<String> {
    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(repo_root)
        .output()
        .context("git rev-parse")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("git rev-parse failed: {}", stderr.trim()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
