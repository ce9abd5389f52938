//! Wait for an autofix analysis while showing in-progress output.

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use crate::actions::Action;
use crate::actions::await_status::{AUTOFIX_UNRESOLVED, Branches, poll_until_resolved};
use crate::actions::context::ActionContext;
use crate::core::polling::PollPolicy;
use crate::io::backend::SharedClient;

/// Runs `in_progress` actions concurrently with the status poll.
///
/// When the poll resolves, interruptible in-progress actions are canceled and
/// the branch only starts after the whole in-progress sequence has returned.
#[derive(Debug)]
pub struct AwaitTerminalAutofixRequestStatus {
    pub submission_id: String,
    pub in_progress: Vec<Action>,
    pub branches: Branches,
    pub client: SharedClient,
}

impl AwaitTerminalAutofixRequestStatus {
    #[instrument(skip_all, fields(submission_id = %self.submission_id))]
    pub async fn execute(&self, ctx: &ActionContext) -> Result<()> {
        let cancel = CancellationToken::new();
        let polling = async {
            let outcome = poll_until_resolved(&PollPolicy::autofix_status(), move || {
                self.client.fetch_autofix_status(&self.submission_id)
            })
            .await;
            cancel.cancel();
            outcome
        };
        let in_progress = async {
            if let Err(err) = self.run_in_progress(ctx, &cancel).await {
                warn!(error = %format!("{err:#}"), "in-progress actions failed");
            }
        };
        let (outcome, ()) = tokio::join!(polling, in_progress);
        self.branches.run(outcome, ctx, &AUTOFIX_UNRESOLVED).await
    }

    async fn run_in_progress(&self, ctx: &ActionContext, cancel: &CancellationToken) -> Result<()> {
        for action in &self.in_progress {
            action.execute_interruptible(ctx, cancel).await?;
        }
        Ok(())
    }
}
