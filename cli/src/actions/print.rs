//! Actions that only write to the terminal.

use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use serde::Deserialize;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::errors::ExecutionError;
use crate::core::progress::{
    DELAY_JITTER_MS, PERCENT_JITTER, ProgressPlan, bar, displayed_percentage, jittered,
};
use crate::core::render::{Color, MESSAGE_WIDTH, commands_box, diff_box, wrap_words};
use crate::io::console::Console;

/// Word-wrapped message, each line painted in the requested color.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PrintMessage {
    pub color: String,
    pub text: String,
}

impl PrintMessage {
    pub fn new(color: Color, text: impl Into<String>) -> Self {
        let name = match color {
            Color::Red => "red",
            Color::Green => "green",
            Color::Yellow => "yellow",
            Color::Blue => "blue",
            Color::Plain => "plain",
        };
        Self {
            color: name.to_string(),
            text: text.into(),
        }
    }

    /// Fails with [`ExecutionError::InvalidColor`] before printing anything.
    pub fn execute(&self, console: &Console) -> Result<()> {
        let color = Color::from_name(&self.color)
            .ok_or_else(|| ExecutionError::InvalidColor(self.color.clone()))?;
        for line in wrap_words(&self.text, MESSAGE_WIDTH) {
            console.print_line(&color.paint(&line))?;
        }
        Ok(())
    }
}

/// Simulated progress toward an expected delay.
///
/// Regular frames are spread over the expected delay; the last frame is held
/// back until the bar is canceled (or a minute passes), so a bar running next
/// to a poll loop completes when the poll does. A negative delay is treated as
/// zero, which still prints the minimum number of frames.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PrintProgressBar {
    pub expected_delay_in_seconds: i64,
}

impl PrintProgressBar {
    pub async fn execute(&self, console: &Console) -> Result<()> {
        self.run(console, None).await
    }

    /// Run the bar; once `cancel` fires the remaining frames print without waiting.
    pub async fn execute_interruptible(
        &self,
        console: &Console,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.run(console, Some(cancel)).await
    }

    async fn run(&self, console: &Console, cancel: Option<&CancellationToken>) -> Result<()> {
        let plan = ProgressPlan::new(u64::try_from(self.expected_delay_in_seconds).unwrap_or(0));
        let mut last_printed = 0;
        let mut canceled = false;
        for frame in 0..plan.frames() {
            let percentage = plan.percentage(frame);
            let jitter = rand::thread_rng().gen_range(-PERCENT_JITTER..PERCENT_JITTER);
            let shown = displayed_percentage(percentage, jitter, last_printed);
            console.print_line(&progress_line(percentage, shown))?;
            last_printed = shown;

            if canceled {
                continue;
            }
            let Some(base) = plan.delay_after(frame) else {
                continue;
            };
            let wait = jittered(
                base,
                rand::thread_rng().gen_range(-DELAY_JITTER_MS..DELAY_JITTER_MS),
            );
            canceled = wait_or_cancel(wait, cancel).await;
        }
        Ok(())
    }
}

/// Sleep for `wait`; returns true if `cancel` fired first.
async fn wait_or_cancel(wait: Duration, cancel: Option<&CancellationToken>) -> bool {
    match cancel {
        Some(token) => {
            tokio::select! {
                _ = token.cancelled() => true,
                _ = sleep(wait) => false,
            }
        }
        None => {
            sleep(wait).await;
            false
        }
    }
}

/// `[===>    ] 42%` with the bar drawn from the true percentage.
fn progress_line(percentage: u32, shown: u32) -> String {
    let (bars, spaces) = bar(percentage);
    format!(
        "[{}{}] {}",
        Color::Green.paint(&bars),
        " ".repeat(spaces),
        Color::Green.paint(&format!("{shown}%"))
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PrintFileDiff {
    pub diff_str: String,
    pub file_path: String,
}

impl PrintFileDiff {
    pub fn execute(&self, console: &Console) -> Result<()> {
        debug!(file = %self.file_path, "printing file diff");
        console.print_line(&diff_box(&self.diff_str))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PrintTerminalCommandsBox {
    pub commands: Vec<String>,
}

impl PrintTerminalCommandsBox {
    pub fn execute(&self, console: &Console) -> Result<()> {
        console.print_line(&commands_box(&self.commands))
    }
}
