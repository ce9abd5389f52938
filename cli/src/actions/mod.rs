//! Executable actions and the registry that builds them from server definitions.
//!
//! Definitions are parsed into a complete [`Action`] tree before anything runs:
//! nested branches are built eagerly, so a malformed definition anywhere fails
//! the whole tree up front. Actions that talk to the backend receive the client
//! from the [`ActionFactory`] that built them.

pub mod autofix;
pub mod await_status;
pub mod context;
pub mod control;
pub mod dynamic;
pub mod print;
pub mod stream_logs;

use anyhow::Result;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Deserializer};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::definition::ActionDefinition;
use crate::core::errors::ParseError;
use crate::io::backend::SharedClient;

use self::autofix::AwaitTerminalAutofixRequestStatus;
use self::await_status::{AwaitTerminalBuildStatus, AwaitTerminalSubmissionStatus, Branches};
use self::context::ActionContext;
use self::control::{Sleep, Terminate};
use self::dynamic::ExecuteDynamicActions;
use self::print::{PrintFileDiff, PrintMessage, PrintProgressBar, PrintTerminalCommandsBox};
use self::stream_logs::StreamLogs;

pub const PRINT_MESSAGE: &str = "print_message";
pub const PRINT_PROGRESS_BAR: &str = "print_progress_bar";
pub const PRINT_FILE_DIFF: &str = "print_file_diff";
pub const PRINT_TERMINAL_COMMANDS_BOX: &str = "print_terminal_commands_box";
pub const SLEEP: &str = "sleep";
pub const TERMINATE: &str = "terminate";
pub const STREAM_LOGS: &str = "stream_logs";
pub const AWAIT_TERMINAL_BUILD_STATUS: &str = "await_terminal_build_status";
pub const AWAIT_TERMINAL_SUBMISSION_STATUS: &str = "await_terminal_submission_status";
pub const AWAIT_TERMINAL_AUTOFIX_REQUEST_STATUS: &str = "await_terminal_autofix_request_status";
pub const EXECUTE_DYNAMIC_ACTIONS: &str = "execute_dynamic_actions";

/// Every type tag the registry understands.
pub const ACTION_TYPES: [&str; 11] = [
    PRINT_MESSAGE,
    PRINT_PROGRESS_BAR,
    PRINT_FILE_DIFF,
    PRINT_TERMINAL_COMMANDS_BOX,
    SLEEP,
    TERMINATE,
    STREAM_LOGS,
    AWAIT_TERMINAL_BUILD_STATUS,
    AWAIT_TERMINAL_SUBMISSION_STATUS,
    AWAIT_TERMINAL_AUTOFIX_REQUEST_STATUS,
    EXECUTE_DYNAMIC_ACTIONS,
];

/// A parsed, ready-to-run action.
#[derive(Debug)]
pub enum Action {
    PrintMessage(PrintMessage),
    PrintProgressBar(PrintProgressBar),
    PrintFileDiff(PrintFileDiff),
    PrintTerminalCommandsBox(PrintTerminalCommandsBox),
    Sleep(Sleep),
    Terminate(Terminate),
    StreamLogs(StreamLogs),
    AwaitTerminalBuildStatus(AwaitTerminalBuildStatus),
    AwaitTerminalSubmissionStatus(AwaitTerminalSubmissionStatus),
    AwaitTerminalAutofixRequestStatus(AwaitTerminalAutofixRequestStatus),
    ExecuteDynamicActions(ExecuteDynamicActions),
}

impl Action {
    pub fn type_tag(&self) -> &'static str {
        match self {
            Action::PrintMessage(_) => PRINT_MESSAGE,
            Action::PrintProgressBar(_) => PRINT_PROGRESS_BAR,
            Action::PrintFileDiff(_) => PRINT_FILE_DIFF,
            Action::PrintTerminalCommandsBox(_) => PRINT_TERMINAL_COMMANDS_BOX,
            Action::Sleep(_) => SLEEP,
            Action::Terminate(_) => TERMINATE,
            Action::StreamLogs(_) => STREAM_LOGS,
            Action::AwaitTerminalBuildStatus(_) => AWAIT_TERMINAL_BUILD_STATUS,
            Action::AwaitTerminalSubmissionStatus(_) => AWAIT_TERMINAL_SUBMISSION_STATUS,
            Action::AwaitTerminalAutofixRequestStatus(_) => AWAIT_TERMINAL_AUTOFIX_REQUEST_STATUS,
            Action::ExecuteDynamicActions(_) => EXECUTE_DYNAMIC_ACTIONS,
        }
    }

    pub fn execute<'a>(&'a self, ctx: &'a ActionContext) -> BoxFuture<'a, Result<()>> {
        self.run(ctx, None)
    }

    /// Like [`Action::execute`], but a progress bar stops waiting between
    /// frames once `cancel` fires. Other actions ignore the token.
    pub fn execute_interruptible<'a>(
        &'a self,
        ctx: &'a ActionContext,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<()>> {
        self.run(ctx, Some(cancel))
    }

    fn run<'a>(
        &'a self,
        ctx: &'a ActionContext,
        cancel: Option<&'a CancellationToken>,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            debug!(action = self.type_tag(), "executing action");
            match self {
                Action::PrintMessage(action) => action.execute(&ctx.console),
                Action::PrintProgressBar(action) => match cancel {
                    Some(token) => action.execute_interruptible(&ctx.console, token).await,
                    None => action.execute(&ctx.console).await,
                },
                Action::PrintFileDiff(action) => action.execute(&ctx.console),
                Action::PrintTerminalCommandsBox(action) => action.execute(&ctx.console),
                Action::Sleep(action) => {
                    action.execute().await;
                    Ok(())
                }
                Action::Terminate(action) => action.execute(ctx),
                Action::StreamLogs(action) => action.execute(ctx).await,
                Action::AwaitTerminalBuildStatus(action) => action.execute(ctx).await,
                Action::AwaitTerminalSubmissionStatus(action) => action.execute(ctx).await,
                Action::AwaitTerminalAutofixRequestStatus(action) => action.execute(ctx).await,
                Action::ExecuteDynamicActions(action) => action.execute(ctx).await,
            }
        }
        .boxed()
    }
}

/// Execute `actions` in order, stopping at the first error.
pub async fn execute_sequence(actions: &[Action], ctx: &ActionContext) -> Result<()> {
    for action in actions {
        action.execute(ctx).await?;
    }
    Ok(())
}

/// Builds actions from definitions, handing the backend client to the
/// actions that need it.
#[derive(Debug, Clone)]
pub struct ActionFactory {
    client: SharedClient,
}

#[derive(Deserialize)]
struct BranchArgs {
    #[serde(default, deserialize_with = "null_as_default")]
    on_success_actions: Vec<ActionDefinition>,
    #[serde(default, deserialize_with = "null_as_default")]
    on_failure_actions: Vec<ActionDefinition>,
}

#[derive(Deserialize)]
struct BuildStatusArgs {
    build_id: String,
    #[serde(flatten)]
    branches: BranchArgs,
}

#[derive(Deserialize)]
struct SubmissionStatusArgs {
    submission_id: String,
    #[serde(flatten)]
    branches: BranchArgs,
}

#[derive(Deserialize)]
struct AutofixStatusArgs {
    submission_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    in_progress_actions: Vec<ActionDefinition>,
    #[serde(flatten)]
    branches: BranchArgs,
}

#[derive(Deserialize)]
struct DynamicActionsArgs {
    event_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    event_params: Map<String, Value>,
}

impl ActionFactory {
    pub fn new(client: SharedClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &SharedClient {
        &self.client
    }

    /// Build one action, including every nested branch.
    pub fn build(&self, definition: &ActionDefinition) -> Result<Action, ParseError> {
        let tag = definition.action_type.as_str();
        let action = match tag {
            PRINT_MESSAGE => Action::PrintMessage(parse_args(definition)?),
            PRINT_PROGRESS_BAR => Action::PrintProgressBar(parse_args(definition)?),
            PRINT_FILE_DIFF => Action::PrintFileDiff(parse_args(definition)?),
            PRINT_TERMINAL_COMMANDS_BOX => {
                Action::PrintTerminalCommandsBox(parse_args(definition)?)
            }
            SLEEP => Action::Sleep(parse_args(definition)?),
            TERMINATE => Action::Terminate(parse_args(definition)?),
            STREAM_LOGS => Action::StreamLogs(parse_args(definition)?),
            AWAIT_TERMINAL_BUILD_STATUS => {
                let args: BuildStatusArgs = parse_args(definition)?;
                Action::AwaitTerminalBuildStatus(AwaitTerminalBuildStatus {
                    build_id: args.build_id,
                    branches: self.branches(&args.branches)?,
                    client: self.client.clone(),
                })
            }
            AWAIT_TERMINAL_SUBMISSION_STATUS => {
                let args: SubmissionStatusArgs = parse_args(definition)?;
                Action::AwaitTerminalSubmissionStatus(AwaitTerminalSubmissionStatus {
                    submission_id: args.submission_id,
                    branches: self.branches(&args.branches)?,
                    client: self.client.clone(),
                })
            }
            AWAIT_TERMINAL_AUTOFIX_REQUEST_STATUS => {
                let args: AutofixStatusArgs = parse_args(definition)?;
                Action::AwaitTerminalAutofixRequestStatus(AwaitTerminalAutofixRequestStatus {
                    submission_id: args.submission_id,
                    in_progress: self.build_all(&args.in_progress_actions)?,
                    branches: self.branches(&args.branches)?,
                    client: self.client.clone(),
                })
            }
            EXECUTE_DYNAMIC_ACTIONS => {
                let args: DynamicActionsArgs = parse_args(definition)?;
                Action::ExecuteDynamicActions(ExecuteDynamicActions {
                    event_name: args.event_name,
                    event_params: args.event_params,
                    factory: self.clone(),
                })
            }
            other => return Err(ParseError::UnknownActionType(other.to_string())),
        };
        Ok(action)
    }

    /// Build every definition or none: the first failure is returned.
    pub fn build_all(&self, definitions: &[ActionDefinition]) -> Result<Vec<Action>, ParseError> {
        definitions.iter().map(|definition| self.build(definition)).collect()
    }

    fn branches(&self, args: &BranchArgs) -> Result<Branches, ParseError> {
        Ok(Branches {
            on_success: self.build_all(&args.on_success_actions)?,
            on_failure: self.build_all(&args.on_failure_actions)?,
        })
    }
}

/// Treats an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn parse_args<T: DeserializeOwned>(definition: &ActionDefinition) -> Result<T, ParseError> {
    T::deserialize(&definition.args).map_err(|source| ParseError::InvalidArguments {
        action_type: definition.action_type.clone(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedClient;
    use serde_json::json;
    use std::sync::Arc;

    fn factory() -> ActionFactory {
        ActionFactory::new(Arc::new(ScriptedClient::default()))
    }

    fn sample_args(tag: &str) -> Value {
        match tag {
            PRINT_MESSAGE => json!({"color": "green", "text": "hi"}),
            PRINT_PROGRESS_BAR => json!({"expected_delay_in_seconds": 10}),
            PRINT_FILE_DIFF => json!({"diff_str": "+a", "file_path": "main.rs"}),
            PRINT_TERMINAL_COMMANDS_BOX => json!({"commands": ["git push"]}),
            SLEEP => json!({"duration_in_milliseconds": 5}),
            TERMINATE => json!({"exit_code": 2}),
            STREAM_LOGS => json!({"logstream_url": "redis://localhost/0/k"}),
            AWAIT_TERMINAL_BUILD_STATUS => json!({"build_id": "b1"}),
            AWAIT_TERMINAL_SUBMISSION_STATUS => json!({"submission_id": "s1"}),
            AWAIT_TERMINAL_AUTOFIX_REQUEST_STATUS => json!({"submission_id": "s1"}),
            EXECUTE_DYNAMIC_ACTIONS => json!({"event_name": "test_passed"}),
            other => panic!("no sample for {other}"),
        }
    }

    #[test]
    fn every_known_tag_builds_its_variant() {
        let factory = factory();
        for tag in ACTION_TYPES {
            let action = factory
                .build(&ActionDefinition::new(tag, sample_args(tag)))
                .unwrap_or_else(|err| panic!("{tag}: {err}"));
            assert_eq!(action.type_tag(), tag);
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = factory()
            .build(&ActionDefinition::new("launch_rocket", json!({})))
            .unwrap_err();
        assert!(matches!(err, ParseError::UnknownActionType(ref tag) if tag == "launch_rocket"));
        assert_eq!(err.to_string(), "unexpected action type: launch_rocket");
    }

    #[test]
    fn malformed_args_name_the_action() {
        let err = factory()
            .build(&ActionDefinition::new(SLEEP, json!({"duration_in_milliseconds": "soon"})))
            .unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidArguments { ref action_type, .. } if action_type == SLEEP
        ));
    }

    #[test]
    fn nested_branches_are_built_eagerly() {
        let definition = ActionDefinition::new(
            AWAIT_TERMINAL_SUBMISSION_STATUS,
            json!({
                "submission_id": "s1",
                "on_success_actions": [
                    {"type": "print_message", "args": {"color": "green", "text": "ok"}}
                ],
                "on_failure_actions": [
                    {"type": "await_terminal_build_status", "args": {
                        "build_id": "b1",
                        "on_failure_actions": [{"type": "not_a_real_action", "args": {}}]
                    }}
                ]
            }),
        );
        let err = factory().build(&definition).unwrap_err();
        assert!(matches!(
            err,
            ParseError::UnknownActionType(ref tag) if tag == "not_a_real_action"
        ));
    }

    #[test]
    fn null_lists_and_params_count_as_empty() {
        let build = ActionDefinition::new(
            AWAIT_TERMINAL_BUILD_STATUS,
            json!({"build_id": "b1", "on_success_actions": null, "on_failure_actions": null}),
        );
        let Action::AwaitTerminalBuildStatus(action) = factory().build(&build).expect("build")
        else {
            panic!("wrong variant");
        };
        assert!(action.branches.on_success.is_empty());
        assert!(action.branches.on_failure.is_empty());

        let autofix = ActionDefinition::new(
            AWAIT_TERMINAL_AUTOFIX_REQUEST_STATUS,
            json!({"submission_id": "s1", "in_progress_actions": null}),
        );
        let Action::AwaitTerminalAutofixRequestStatus(action) =
            factory().build(&autofix).expect("autofix")
        else {
            panic!("wrong variant");
        };
        assert!(action.in_progress.is_empty());

        let dynamic = ActionDefinition::new(
            EXECUTE_DYNAMIC_ACTIONS,
            json!({"event_name": "test_passed", "event_params": null}),
        );
        let Action::ExecuteDynamicActions(action) = factory().build(&dynamic).expect("dynamic")
        else {
            panic!("wrong variant");
        };
        assert!(action.event_params.is_empty());
    }

    #[test]
    fn build_all_fails_on_any_bad_definition() {
        let definitions = vec![
            ActionDefinition::new(SLEEP, json!({"duration_in_milliseconds": 1})),
            ActionDefinition::new("nope", json!({})),
        ];
        assert!(factory().build_all(&definitions).is_err());
    }

    #[test]
    fn autofix_keeps_in_progress_actions_in_order() {
        let definition = ActionDefinition::new(
            AWAIT_TERMINAL_AUTOFIX_REQUEST_STATUS,
            json!({
                "submission_id": "s1",
                "in_progress_actions": [
                    {"type": "print_message", "args": {"color": "plain", "text": "analyzing"}},
                    {"type": "print_progress_bar", "args": {"expected_delay_in_seconds": 20}}
                ]
            }),
        );
        let Action::AwaitTerminalAutofixRequestStatus(action) =
            factory().build(&definition).expect("build")
        else {
            panic!("wrong variant");
        };
        let tags: Vec<&str> = action.in_progress.iter().map(Action::type_tag).collect();
        assert_eq!(tags, vec![PRINT_MESSAGE, PRINT_PROGRESS_BAR]);
        assert!(action.branches.on_success.is_empty());
    }
}
