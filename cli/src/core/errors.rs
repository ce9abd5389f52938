//! Typed errors raised while building and executing action trees.
//!
//! Everything else flows through `anyhow`; these exist so callers can tell a
//! malformed server payload apart from a failure while running it.

use thiserror::Error;

/// Construction failure. Always fatal to the enclosing tree.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unexpected action type: {0}")]
    UnknownActionType(String),
    #[error("invalid arguments for {action_type} action: {source}")]
    InvalidArguments {
        action_type: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure of a leaf action while it runs.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("invalid color: {0}")]
    InvalidColor(String),
    #[error("failed to read from log stream {url}")]
    Stream { url: String },
}
