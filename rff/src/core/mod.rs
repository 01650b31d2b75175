//! Deterministic, pure logic shared by the controller and the domains.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod arith;
pub mod bookkeeping;
pub mod types;
pub mod workspace;
