//! Retry and exclusion bookkeeping for the controller.
//!
//! Two kinds of avoid-set membership exist:
//!
//! - **permanent**: the symbol's failure counter reached `failure_threshold`.
//!   Survives every stagnation reset for the rest of the run.
//! - **transient**: the symbol was resolved (committed) and should not be
//!   re-requested for now. Dropped by the next stagnation reset.
//!
//! Failures below the threshold leave the symbol requestable so a later
//! iteration can repair it.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookkeeping {
    failure_threshold: u32,
    stagnation_window: u32,
    attempts: BTreeMap<String, u32>,
    avoid: BTreeSet<String>,
    stagnation: u32,
}

impl Bookkeeping {
    pub fn new(failure_threshold: u32, stagnation_window: u32) -> Self {
        Self {
            failure_threshold,
            stagnation_window,
            attempts: BTreeMap::new(),
            avoid: BTreeSet::new(),
            stagnation: 0,
        }
    }

    /// Count one rejection for `symbol`; returns the new counter value.
    ///
    /// Reaching the threshold excludes the symbol permanently.
    pub fn register_failure(&mut self, symbol: &str) -> u32 {
        let count = self.attempts.entry(symbol.to_string()).or_insert(0);
        *count += 1;
        let count = *count;
        if count >= self.failure_threshold && self.avoid.insert(symbol.to_string()) {
            debug!(symbol, count, "symbol permanently excluded");
        }
        count
    }

    /// Exclude a resolved symbol from being requested until the next stagnation reset.
    pub fn mark_resolved(&mut self, symbol: &str) {
        self.avoid.insert(symbol.to_string());
    }

    pub fn is_excluded(&self, symbol: &str) -> bool {
        self.avoid.contains(symbol)
    }

    pub fn is_permanent(&self, symbol: &str) -> bool {
        self.attempts(symbol) >= self.failure_threshold
    }

    pub fn attempts(&self, symbol: &str) -> u32 {
        self.attempts.get(symbol).copied().unwrap_or(0)
    }

    pub fn avoid(&self) -> &BTreeSet<String> {
        &self.avoid
    }

    pub fn stagnation(&self) -> u32 {
        self.stagnation
    }

    /// Update the stagnation counter after an iteration.
    ///
    /// Returns `true` when the counter reached the window and a reset fired.
    pub fn record_iteration(&mut self, progress: bool) -> bool {
        if progress {
            self.stagnation = 0;
            return false;
        }
        self.stagnation += 1;
        if self.stagnation >= self.stagnation_window {
            self.reset_stagnation();
            return true;
        }
        false
    }

    /// Shrink the avoid set to permanent exclusions and zero the stagnation counter.
    pub fn reset_stagnation(&mut self) {
        let threshold = self.failure_threshold;
        let before = self.avoid.len();
        self.avoid = self
            .attempts
            .iter()
            .filter(|(_, count)| **count >= threshold)
            .map(|(symbol, _)| symbol.clone())
            .collect();
        self.stagnation = 0;
        debug!(
            pruned = before.saturating_sub(self.avoid.len()),
            kept = self.avoid.len(),
            "stagnation reset"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_below_threshold_stay_requestable() {
        let mut book = Bookkeeping::new(3, 4);
        assert_eq!(book.register_failure("x"), 1);
        assert_eq!(book.register_failure("x"), 2);
        assert!(!book.is_excluded("x"));
        assert_eq!(book.register_failure("x"), 3);
        assert!(book.is_excluded("x"));
        assert!(book.is_permanent("x"));
    }

    #[test]
    fn resolved_marks_do_not_touch_counters() {
        let mut book = Bookkeeping::new(3, 4);
        book.mark_resolved("y");
        assert!(book.is_excluded("y"));
        assert_eq!(book.attempts("y"), 0);
    }

    #[test]
    fn reset_keeps_only_permanent_exclusions() {
        let mut book = Bookkeeping::new(2, 4);
        book.register_failure("perm");
        book.register_failure("perm");
        book.register_failure("once");
        book.mark_resolved("done");

        book.reset_stagnation();

        let avoid: Vec<&str> = book.avoid().iter().map(String::as_str).collect();
        assert_eq!(avoid, vec!["perm"]);
        assert_eq!(book.attempts("once"), 1);
    }

    #[test]
    fn reset_fires_exactly_at_window() {
        let mut book = Bookkeeping::new(3, 3);
        book.mark_resolved("t");
        assert!(!book.record_iteration(false));
        assert!(!book.record_iteration(false));
        assert_eq!(book.stagnation(), 2);
        assert!(book.is_excluded("t"));
        assert!(book.record_iteration(false));
        assert_eq!(book.stagnation(), 0);
        assert!(!book.is_excluded("t"));
    }

    #[test]
    fn progress_zeroes_stagnation() {
        let mut book = Bookkeeping::new(3, 3);
        book.record_iteration(false);
        book.record_iteration(false);
        assert!(!book.record_iteration(true));
        assert_eq!(book.stagnation(), 0);
    }

    #[test]
    fn avoid_set_never_shrinks_between_resets() {
        let mut book = Bookkeeping::new(2, 100);
        let mut previous = book.avoid().clone();
        for symbol in ["a", "b", "a", "c", "b", "a"] {
            book.register_failure(symbol);
            book.mark_resolved("r");
            book.record_iteration(false);
            assert!(book.avoid().is_superset(&previous));
            previous = book.avoid().clone();
        }
    }
}
