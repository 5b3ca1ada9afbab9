//! Stable exit codes for the tester CLI.

/// Every script ran and no failure was reported.
pub const OK: i32 = 0;
/// Setup failed (config, connections, trace file) or a script could not be loaded.
pub const INVALID: i32 = 1;
/// Every script ran, but at least one failure was reported.
pub const FAILED: i32 = 2;
