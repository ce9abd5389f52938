//! Wire types exchanged with the grading service.
//!
//! Field names are contract strings shared with the server and must not be
//! renamed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A serialized, not-yet-parsed action as emitted by the server.
///
/// Only `type` is inspected before parsing; `args` stays opaque until the
/// registry hands it to the matching constructor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDefinition {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default)]
    pub args: Value,
}

impl ActionDefinition {
    pub fn new(action_type: impl Into<String>, args: Value) -> Self {
        Self {
            action_type: action_type.into(),
            args,
        }
    }
}

/// Body returned by the build, submission and autofix status endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StatusResponse {
    pub status: String,
    pub is_error: bool,
    pub error_message: String,
}

/// Body returned by endpoints that hand back a list of actions
/// (`fetch_dynamic_actions`, `ping`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ActionsResponse {
    pub actions: Vec<ActionDefinition>,
}

/// Body returned by `create_submission`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CreateSubmissionResponse {
    pub id: String,
    /// Root action list to execute for this submission.
    pub actions: Vec<ActionDefinition>,
    pub commit_sha: String,
    /// Set when the server refused the submission; `error_message` is meant for humans.
    pub is_error: bool,
    pub error_message: String,
}

/// Accepted shapes for a saved payload: a full response object carrying
/// `actions`, or a bare list of definitions.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ActionPayload {
    List(Vec<ActionDefinition>),
    Submission(CreateSubmissionResponse),
}
