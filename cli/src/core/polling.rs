//! Attempt budgets and status classification for the await-terminal-status actions.
//!
//! The three loops share a shape but differ in budget, delay schedule and in
//! which statuses count as "still pending". Those differences are spelled out
//! per policy instead of being folded into one rule.

use std::time::Duration;

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_FAILURE: &str = "failure";
pub const STATUS_ERROR: &str = "error";
pub const STATUS_IN_PROGRESS: &str = "in_progress";

/// How a polling loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Success,
    Failure,
    /// Budget exhausted, or a status that ends polling without an outcome.
    Unresolved,
}

/// Which non-terminal statuses keep a loop polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingRule {
    /// Every status other than `success`/`failure` is pending, except the
    /// listed ones which end polling as unresolved.
    AnyNonTerminal { abort_on: &'static [&'static str] },
    /// Only this status is pending; anything else that is not terminal ends
    /// polling as unresolved.
    Only(&'static str),
}

/// Wait inserted before each attempt (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelaySchedule {
    /// `step * n` before attempt `n`.
    Linear(Duration),
    /// Nothing before the first attempt, then the same wait before each one.
    Fixed(Duration),
}

impl DelaySchedule {
    pub fn before_attempt(&self, attempt: u32) -> Duration {
        match *self {
            DelaySchedule::Linear(step) => step * attempt,
            DelaySchedule::Fixed(wait) => {
                if attempt <= 1 {
                    Duration::ZERO
                } else {
                    wait
                }
            }
        }
    }

    /// Sum of every wait the schedule inserts across `attempts` attempts.
    pub fn total(&self, attempts: u32) -> Duration {
        (1..=attempts).map(|n| self.before_attempt(n)).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Label used in logs (`build`, `submission`, `autofix request`).
    pub subject: &'static str,
    pub max_attempts: u32,
    pub delay: DelaySchedule,
    pub pending: PendingRule,
}

impl PollPolicy {
    /// 20 attempts, `100ms * n` before attempt `n` (about 21s worst case).
    pub fn build_status() -> Self {
        Self {
            subject: "build",
            max_attempts: 20,
            delay: DelaySchedule::Linear(Duration::from_millis(100)),
            pending: PendingRule::AnyNonTerminal {
                abort_on: &[STATUS_ERROR],
            },
        }
    }

    /// 10 attempts, `100ms * n` before attempt `n`.
    pub fn submission_status() -> Self {
        Self {
            subject: "submission",
            max_attempts: 10,
            delay: DelaySchedule::Linear(Duration::from_millis(100)),
            pending: PendingRule::AnyNonTerminal { abort_on: &[] },
        }
    }

    /// 60 attempts one second apart; only `in_progress` is pending.
    pub fn autofix_status() -> Self {
        Self {
            subject: "autofix request",
            max_attempts: 60,
            delay: DelaySchedule::Fixed(Duration::from_secs(1)),
            pending: PendingRule::Only(STATUS_IN_PROGRESS),
        }
    }

    /// Classify a successfully fetched status.
    ///
    /// Returns `None` while the loop should keep polling.
    pub fn classify(&self, status: &str) -> Option<PollOutcome> {
        match status {
            STATUS_SUCCESS => return Some(PollOutcome::Success),
            STATUS_FAILURE => return Some(PollOutcome::Failure),
            _ => {}
        }
        match self.pending {
            PendingRule::AnyNonTerminal { abort_on } => abort_on
                .contains(&status)
                .then_some(PollOutcome::Unresolved),
            PendingRule::Only(pending) if status == pending => None,
            PendingRule::Only(_) => Some(PollOutcome::Unresolved),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_resolve_every_policy() {
        for policy in [
            PollPolicy::build_status(),
            PollPolicy::submission_status(),
            PollPolicy::autofix_status(),
        ] {
            assert_eq!(policy.classify("success"), Some(PollOutcome::Success));
            assert_eq!(policy.classify("failure"), Some(PollOutcome::Failure));
        }
    }

    #[test]
    fn build_and_submission_keep_polling_on_unknown_statuses() {
        let build = PollPolicy::build_status();
        let submission = PollPolicy::submission_status();
        for status in ["not_started", "evaluating", "queued", "", "SUCCESS"] {
            assert_eq!(build.classify(status), None, "build {status:?}");
            assert_eq!(submission.classify(status), None, "submission {status:?}");
        }
    }

    #[test]
    fn build_error_status_ends_polling_unresolved() {
        assert_eq!(
            PollPolicy::build_status().classify("error"),
            Some(PollOutcome::Unresolved)
        );
        assert_eq!(PollPolicy::submission_status().classify("error"), None);
    }

    #[test]
    fn autofix_only_waits_on_in_progress() {
        let autofix = PollPolicy::autofix_status();
        assert_eq!(autofix.classify("in_progress"), None);
        assert_eq!(autofix.classify("queued"), Some(PollOutcome::Unresolved));
        assert_eq!(autofix.classify(""), Some(PollOutcome::Unresolved));
    }

    #[test]
    fn linear_schedule_grows_by_step() {
        let schedule = PollPolicy::build_status().delay;
        assert_eq!(schedule.before_attempt(1), Duration::from_millis(100));
        assert_eq!(schedule.before_attempt(20), Duration::from_secs(2));
        assert_eq!(schedule.total(20), Duration::from_millis(21_000));
    }

    #[test]
    fn fixed_schedule_skips_first_wait() {
        let schedule = PollPolicy::autofix_status().delay;
        assert_eq!(schedule.before_attempt(1), Duration::ZERO);
        assert_eq!(schedule.before_attempt(2), Duration::from_secs(1));
        assert_eq!(schedule.total(60), Duration::from_secs(59));
    }
}
