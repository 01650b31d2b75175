//! Search configuration merging.
//!
//! Applies case-specific overrides to the base rff configuration.

use anyhow::Result;
use rff::io::config::RffConfig;

use crate::case::CaseConfig;

/// Apply case configuration overrides to the base config.
pub fn apply_case_config(mut base: RffConfig, overrides: &CaseConfig) -> Result<RffConfig> {
    if let Some(max_iterations) = overrides.max_iterations {
        base.search.max_iterations = max_iterations;
    }
    if let Some(min_iterations) = overrides.min_iterations {
        base.search.min_iterations = min_iterations;
    }
    if let Some(require_gold) = overrides.require_gold {
        base.search.require_gold = require_gold;
    }
    if let Some(command) = &overrides.generator_command {
        base.generator.command = command.clone();
    }
    base.validate()?;
    Ok(base)
}
