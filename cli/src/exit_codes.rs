//! Stable exit codes for the CLI.

/// Every action ran to completion.
pub const OK: i32 = 0;
/// Invalid config, a malformed server payload, or an action failed.
pub const ERROR: i32 = 1;
/// A polling action gave up without a terminal status.
pub const UNRESOLVED: i32 = 1;
