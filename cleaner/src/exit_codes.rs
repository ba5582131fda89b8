//! Stable exit codes for cleaner CLI commands.

/// Run completed, whether or not infections were found.
pub const OK: i32 = 0;
/// The run itself failed (bad arguments, config, or an unhandled error).
pub const ERROR: i32 = 1;
