//! Stable exit codes for stagekit CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid config, unreadable layout, workflow syntax or any other error.
pub const INVALID: i32 = 1;
/// No ancestor of the start path contains a root marker.
pub const ROOT_NOT_FOUND: i32 = 2;
/// The requested rule is not declared in the workflow file.
pub const RULE_NOT_FOUND: i32 = 3;
/// `stagekit stats`: the statistical runtime failed or timed out.
pub const RUNTIME_FAILED: i32 = 4;
