//! Orchestration: turn a server response into a running action tree.

use anyhow::{Result, bail};
use tracing::{info, instrument};

use crate::actions::context::ActionContext;
use crate::actions::{ActionFactory, execute_sequence};
use crate::core::definition::{ActionDefinition, CreateSubmissionResponse};
use crate::io::backend::SharedClient;

/// Parse `definitions` into a complete tree, then execute it in order.
///
/// Nothing runs if any definition, at any depth, fails to parse.
#[instrument(skip_all, fields(count = definitions.len()))]
pub async fn execute_action_tree(
    definitions: &[ActionDefinition],
    client: SharedClient,
    ctx: &ActionContext,
) -> Result<()> {
    let factory = ActionFactory::new(client);
    let actions = factory.build_all(definitions)?;
    info!(count = actions.len(), "executing action tree");
    execute_sequence(&actions, ctx).await
}

/// Run the root actions of a created submission.
///
/// A refused submission fails with the server's message.
#[instrument(skip_all, fields(submission_id = %response.id))]
pub async fn handle_submission(
    response: &CreateSubmissionResponse,
    client: SharedClient,
    ctx: &ActionContext,
) -> Result<()> {
    if response.is_error {
        bail!("{}", response.error_message);
    }
    execute_action_tree(&response.actions, client, ctx).await
}
