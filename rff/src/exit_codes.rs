//! Stable exit codes for the `rff` CLI.

/// The objective was solved; the answer is on stdout.
pub const SOLVED: i32 = 0;
/// Invalid arguments or config, backend failure, or any other error.
pub const INVALID: i32 = 1;
/// The iteration budget ran out without an accepted answer.
pub const EXHAUSTED: i32 = 2;
