//! Process exit codes
//!
//! A forwarded helm subcommand exits with helm's own status instead.

/// Success - operation completed without errors
pub const SUCCESS: i32 = 0;

/// General error - any failure
pub const ERROR: i32 = 1;

/// `diff --detailed-exitcode` found changes
pub const DIFF_CHANGES: i32 = 2;
