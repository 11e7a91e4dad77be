//! Project context resolution for stage-based research pipelines.
//!
//! A pipeline stage (simulate, estimate, make tables, ...) runs as its own
//! process and needs to know where it lives and what it declared: its inputs,
//! outputs, params and log folder. This crate answers that:
//!
//! - **[`core`]**: Pure logic (path namespace, file registry, workflow-file
//!   grammar, rule context model). No I/O.
//! - **[`io`]**: Side-effecting operations (root discovery, layout walk,
//!   config, workflow loading, stage log files, child processes).
//!
//! Orchestration modules ([`project`], [`rule`], [`stage`]) combine the two;
//! [`stage::setup_stage`] is the single call a stage makes at startup.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod project;
pub mod rule;
pub mod stage;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
