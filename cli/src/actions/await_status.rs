//! Actions that poll the backend until a build, submission or autofix request
//! reaches a terminal status, then run the matching branch.

use std::future::Future;

use anyhow::Result;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::actions::context::ActionContext;
use crate::actions::print::PrintMessage;
use crate::actions::{Action, execute_sequence};
use crate::core::polling::{PollOutcome, PollPolicy};
use crate::core::render::Color;
use crate::exit_codes;
use crate::io::backend::SharedClient;

const CONTACT_LINE: &str = "Let us know at hello@codecrafters.io if this error persists.";

/// What the user sees when polling gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnresolvedNotice {
    pub headline: &'static str,
    /// Print an empty line after the contact line.
    pub trailing_blank: bool,
}

pub const BUILD_UNRESOLVED: UnresolvedNotice = UnresolvedNotice {
    headline: "We couldn't fetch the results of your build. Please try again?",
    trailing_blank: false,
};

pub const SUBMISSION_UNRESOLVED: UnresolvedNotice = UnresolvedNotice {
    headline: "We couldn't fetch the results of your submission. Please try again?",
    trailing_blank: true,
};

pub const AUTOFIX_UNRESOLVED: UnresolvedNotice = UnresolvedNotice {
    headline: "We failed to analyze your test failure in time. Please try again?",
    trailing_blank: false,
};

/// Poll `fetch` under `policy` until a status classifies.
///
/// Fetch errors are logged and count as an attempt; they never end the loop.
pub async fn poll_until_resolved<F, Fut>(policy: &PollPolicy, mut fetch: F) -> PollOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String>>,
{
    for attempt in 1..=policy.max_attempts {
        sleep(policy.delay.before_attempt(attempt)).await;
        match fetch().await {
            Ok(status) => {
                debug!(subject = policy.subject, attempt, status = %status, "polled status");
                if let Some(outcome) = policy.classify(&status) {
                    return outcome;
                }
            }
            Err(err) => {
                warn!(
                    subject = policy.subject,
                    attempt,
                    error = %format!("{err:#}"),
                    "status fetch failed"
                );
            }
        }
    }
    info!(
        subject = policy.subject,
        attempts = policy.max_attempts,
        waited_ms = policy.delay.total(policy.max_attempts).as_millis() as u64,
        "gave up polling"
    );
    PollOutcome::Unresolved
}

/// Actions to run once the polled status is terminal.
#[derive(Debug, Default)]
pub struct Branches {
    pub on_success: Vec<Action>,
    pub on_failure: Vec<Action>,
}

impl Branches {
    /// Run the branch for `outcome`; an unresolved outcome prints `notice` and exits 1.
    pub async fn run(
        &self,
        outcome: PollOutcome,
        ctx: &ActionContext,
        notice: &UnresolvedNotice,
    ) -> Result<()> {
        match outcome {
            PollOutcome::Success => execute_sequence(&self.on_success, ctx).await,
            PollOutcome::Failure => execute_sequence(&self.on_failure, ctx).await,
            PollOutcome::Unresolved => give_up(ctx, notice),
        }
    }
}

/// Print the unresolved notice and end the process.
pub fn give_up(ctx: &ActionContext, notice: &UnresolvedNotice) -> ! {
    let mut lines = vec![
        PrintMessage::new(Color::Red, notice.headline),
        PrintMessage::new(Color::Red, CONTACT_LINE),
    ];
    if notice.trailing_blank {
        lines.push(PrintMessage::new(Color::Plain, ""));
    }
    for line in &lines {
        if let Err(err) = line.execute(&ctx.console) {
            warn!(error = %format!("{err:#}"), "failed to print unresolved notice");
            break;
        }
    }
    ctx.terminate(exit_codes::UNRESOLVED)
}

/// Wait for a test runner build, then branch on its result.
#[derive(Debug)]
pub struct AwaitTerminalBuildStatus {
    pub build_id: String,
    pub branches: Branches,
    pub client: SharedClient,
}

impl AwaitTerminalBuildStatus {
    #[instrument(skip_all, fields(build_id = %self.build_id))]
    pub async fn execute(&self, ctx: &ActionContext) -> Result<()> {
        let outcome = poll_until_resolved(&PollPolicy::build_status(), move || {
            self.client.fetch_build_status(&self.build_id)
        })
        .await;
        self.branches.run(outcome, ctx, &BUILD_UNRESOLVED).await
    }
}

/// Wait for a submission to be graded, then branch on its result.
#[derive(Debug)]
pub struct AwaitTerminalSubmissionStatus {
    pub submission_id: String,
    pub branches: Branches,
    pub client: SharedClient,
}

impl AwaitTerminalSubmissionStatus {
    #[instrument(skip_all, fields(submission_id = %self.submission_id))]
    pub async fn execute(&self, ctx: &ActionContext) -> Result<()> {
        let outcome = poll_until_resolved(&PollPolicy::submission_status(), move || {
            self.client.fetch_submission_status(&self.submission_id)
        })
        .await;
        self.branches.run(outcome, ctx, &SUBMISSION_UNRESOLVED).await
    }
}
