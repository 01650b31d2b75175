//! Shared deterministic types for the controller.
//!
//! These are the records the controller emits per iteration. They are plain
//! data, serializable so traces can be persisted as JSON lines.

use serde::{Deserialize, Serialize};

/// Result of the authoritative acceptance check for the objective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub accepted: bool,
    /// Answer text the strategy would report for the current workspace.
    pub answer: String,
}

impl Verdict {
    pub fn accept(answer: impl Into<String>) -> Self {
        Self {
            accepted: true,
            answer: answer.into(),
        }
    }

    pub fn reject(answer: impl Into<String>) -> Self {
        Self {
            accepted: false,
            answer: answer.into(),
        }
    }
}

/// Outcome of the direct-attempt fast path (computing the objective outright).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectAttempt {
    /// Objective was excluded, no attempt made.
    Skipped,
    /// Candidate did not locally satisfy the objective.
    Invalid,
    /// Candidate satisfied the objective locally but verification rejected it.
    Unverified,
}

/// What a single iteration ended with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    /// Objective accepted; the run is over.
    Solved { answer: String },
    /// Backward planning produced nothing.
    NoPrerequisite,
    /// Backward planning proposed a symbol that is currently excluded.
    Excluded { symbol: String },
    /// The requested prerequisite was computed, validated, and committed.
    Committed { symbol: String },
    /// The forward step produced the objective instead, but it failed the
    /// local check or verification. The candidate was discarded.
    ObjectiveRejected { prerequisite: String },
    /// The forward step supplied the requested symbol but it failed the local check.
    Invalid { symbol: String },
    /// The forward step supplied neither the requested symbol nor the objective.
    Malformed {
        requested: String,
        supplied: Option<String>,
    },
}

impl Transition {
    pub fn made_progress(&self) -> bool {
        matches!(self, Transition::Committed { .. })
    }
}

/// Record of one controller iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Zero-based iteration index.
    pub iter: u32,
    pub direct_attempt: Option<DirectAttempt>,
    pub transition: Transition,
    /// Stagnation counter after bookkeeping.
    pub stagnation: u32,
    /// Whether the avoid set was pruned at the end of this iteration.
    pub stagnation_reset: bool,
    /// Avoid set after bookkeeping, sorted.
    pub avoid: Vec<String>,
    /// Number of symbols in the committed workspace after this iteration.
    pub workspace_size: usize,
}

impl StepOutcome {
    pub fn is_solved(&self) -> bool {
        matches!(self.transition, Transition::Solved { .. })
    }
}
