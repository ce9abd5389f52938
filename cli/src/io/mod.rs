//! Side-effecting collaborators: backend HTTP, log streams, the terminal and config.

pub mod backend;
pub mod config;
pub mod console;
pub mod log_stream;
pub mod retry;
