//! I/O helpers for resolver commands.

pub mod config;
pub mod export;
pub mod layout;
pub mod process;
pub mod root;
pub mod snakefile;
pub mod stage_log;
pub mod stats;
