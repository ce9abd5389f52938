//! Server-directed action execution for the CodeCrafters CLI.
//!
//! The grading backend answers CLI requests with trees of action definitions;
//! this crate parses them into executable actions and runs them.
//!
//! - **[`core`]**: Pure logic (wire types, polling policies, progress math,
//!   rendering). No I/O.
//! - **[`io`]**: Side-effecting collaborators (backend HTTP, log streams, the
//!   terminal, config), behind traits where tests need fakes.
//! - **[`actions`]**: The action registry and every action's execution.
//!
//! [`submission`] ties them together for the CLI commands.

pub mod actions;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod submission;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
