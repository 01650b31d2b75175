//! Side-effecting helpers: configuration files, the generation backend, traces.

pub mod config;
pub mod generator;
pub mod process;
pub mod trace;
