//! Reason-from-future search controller.
//!
//! A problem is solved by alternating two moves over a shared symbol table
//! (the [`core::workspace::Workspace`]): plan backward from the objective to a
//! single prerequisite, then compute that prerequisite forward and commit it.
//! The controller stops when the objective is verified or the iteration budget
//! is spent.
//!
//! - **[`core`]**: Pure, deterministic pieces (workspace algebra, bookkeeping,
//!   iteration records, exact arithmetic). No I/O.
//! - **[`io`]**: Side effects (config files, the generation backend subprocess,
//!   run traces).
//! - **[`strategy`]**: The contract a problem domain implements.
//! - **[`step`]** / **[`looping`]**: One iteration, and the bounded loop around it.
//! - **[`domains`]**: Bundled strategies (24 game, arithmetic word problems).

pub mod core;
pub mod domains;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
pub mod step;
pub mod strategy;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
