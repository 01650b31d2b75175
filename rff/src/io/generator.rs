//! Text-generation backend abstraction.
//!
//! The [`Generator`] trait decouples domains from the actual model backend.
//! [`CommandGenerator`] pipes the prompt into a configured command (for example
//! `llm -m gemini-2.5-flash`) and returns its stdout. Tests use scripted
//! generators that return predetermined completions without spawning processes.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, trace, warn};

use crate::io::config::GeneratorConfig;
use crate::io::process::run_with_input;

/// One synchronous operation: prompt in, completion out.
///
/// Errors mean the backend is unreachable or misconfigured; callers treat them
/// as fatal and never retry.
pub trait Generator {
    fn generate(&self, prompt: &str) -> Result<String>;
}

impl<G: Generator + ?Sized> Generator for &G {
    fn generate(&self, prompt: &str) -> Result<String> {
        (**self).generate(prompt)
    }
}

/// Generator that spawns a command per prompt.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandGenerator {
    pub fn from_config(config: &GeneratorConfig) -> Result<Self> {
        config.validate()?;
        let (program, args) = config
            .command
            .split_first()
            .ok_or_else(|| anyhow!("generator.command must be a non-empty array"))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout: config.timeout(),
            output_limit_bytes: config.output_limit_bytes,
        })
    }
}

impl Generator for CommandGenerator {
    #[instrument(skip_all, fields(program = %self.program, prompt_bytes = prompt.len()))]
    fn generate(&self, prompt: &str) -> Result<String> {
        trace!(%prompt, "generation prompt");
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        let output = run_with_input(cmd, prompt.as_bytes(), self.timeout, self.output_limit_bytes)
            .with_context(|| format!("run generator {}", self.program))?;

        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "generator timed out");
            return Err(anyhow!(
                "generator {} timed out after {:?}",
                self.program,
                self.timeout
            ));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "generator failed");
            return Err(anyhow!(
                "generator {} failed with status {:?}: {}",
                self.program,
                output.status.code(),
                output.stderr_tail()
            ));
        }

        let text = output.stdout.lossy().trim().to_string();
        if text.is_empty() {
            return Err(anyhow!("generator {} returned no output", self.program));
        }
        trace!(response = %text, "generation response");
        debug!(response_bytes = text.len(), "generation completed");
        Ok(text)
    }
}
