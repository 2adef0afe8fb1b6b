//! Process exit codes. Part of the public contract of the `promptgrid` binary.

pub const SUCCESS: i32 = 0;
/// The command ran but could not do what was asked (no such run, storage failure, ...).
pub const COMMAND_FAILED: i32 = 1;
/// Configuration or setup problem detected before any work started.
pub const CONFIG_ERROR: i32 = 2;
/// Ctrl-C during a run (128 + SIGINT).
pub const INTERRUPTED: i32 = 130;
