//! Search and backend configuration stored as TOML (`rff.toml`).

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "rff.toml";

/// Top-level config file. Missing fields fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RffConfig {
    pub search: SearchConfig,
    pub generator: GeneratorConfig,
}

/// Controller parameters, passed explicitly into the loop entry point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SearchConfig {
    /// Hard bound on controller iterations.
    pub max_iterations: u32,

    /// Iterations to run before an unverified objective is accepted
    /// (only consulted when `require_gold = false`).
    pub min_iterations: u32,

    /// Require global verification before returning an answer.
    pub require_gold: bool,

    /// Failures after which a symbol is excluded for the rest of the run.
    pub failure_threshold: u32,

    /// Consecutive no-progress iterations that trigger avoid-set pruning.
    pub stagnation_window: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_iterations: 16,
            min_iterations: 1,
            require_gold: true,
            failure_threshold: 3,
            stagnation_window: 4,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(anyhow!("search.max_iterations must be > 0"));
        }
        if self.min_iterations > self.max_iterations {
            return Err(anyhow!(
                "search.min_iterations ({}) must not exceed search.max_iterations ({})",
                self.min_iterations,
                self.max_iterations
            ));
        }
        if self.failure_threshold == 0 {
            return Err(anyhow!("search.failure_threshold must be > 0"));
        }
        if self.stagnation_window == 0 {
            return Err(anyhow!("search.stagnation_window must be > 0"));
        }
        Ok(())
    }
}

/// Text-generation backend invoked as a child process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Command that reads a prompt on stdin and prints the completion on stdout.
    pub command: Vec<String>,

    /// Per-call wall-clock limit in seconds.
    pub timeout_secs: u64,

    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            command: vec!["llm".to_string()],
            timeout_secs: 120,
            output_limit_bytes: 100_000,
        }
    }
}

impl GeneratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.command.is_empty() || self.command[0].trim().is_empty() {
            return Err(anyhow!("generator.command must be a non-empty array"));
        }
        if self.timeout_secs == 0 {
            return Err(anyhow!("generator.timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("generator.output_limit_bytes must be > 0"));
        }
        Ok(())
    }
}

impl RffConfig {
    pub fn validate(&self) -> Result<()> {
        self.search.validate()?;
        self.generator.validate()
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `RffConfig::default()`.
pub fn load_config(path: &Path) -> Result<RffConfig> {
    if !path.exists() {
        let cfg = RffConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RffConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &RffConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
