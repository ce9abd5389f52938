//! Frame math for the progress bar action.
//!
//! Randomness is supplied by the caller so the arithmetic stays deterministic
//! under test.

use std::time::Duration;

/// Upper bound on the wait between two regular frames.
pub const MAX_DELAY_BETWEEN_FRAMES: Duration = Duration::from_secs(2);
pub const MIN_FRAMES: u32 = 5;
pub const BAR_WIDTH: usize = 20;
/// Wait held before the final frame; the bar sits there until canceled.
pub const FINAL_FRAME_WAIT: Duration = Duration::from_secs(60);
/// Printed percentages wander by up to this much below 100%.
pub const PERCENT_JITTER: i64 = 5;
pub const DELAY_JITTER_MS: i64 = 500;

/// Derived layout of a progress bar run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressPlan {
    expected_delay_secs: u64,
    frames: u32,
}

impl ProgressPlan {
    pub fn new(expected_delay_secs: u64) -> Self {
        let per_frame = MAX_DELAY_BETWEEN_FRAMES.as_secs();
        let frames = u32::try_from(expected_delay_secs / per_frame)
            .unwrap_or(u32::MAX)
            .max(MIN_FRAMES);
        Self {
            expected_delay_secs,
            frames,
        }
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// True percentage at `frame` (0-based): `ceil((frame + 1) * 100 / frames)`.
    pub fn percentage(&self, frame: u32) -> u32 {
        let done = u64::from(frame + 1) * 100;
        let pct = done.div_ceil(u64::from(self.frames));
        pct.min(100) as u32
    }

    /// Base wait after printing `frame`, before jitter.
    ///
    /// `None` after the final frame. The wait in front of the final frame is
    /// [`FINAL_FRAME_WAIT`] so the bar only completes once the caller cancels it.
    pub fn delay_after(&self, frame: u32) -> Option<Duration> {
        let remaining = self.frames.saturating_sub(frame + 1);
        match remaining {
            0 => None,
            1 => Some(FINAL_FRAME_WAIT),
            _ => {
                let spread = Duration::from_secs(self.expected_delay_secs) / self.frames;
                Some(spread.min(MAX_DELAY_BETWEEN_FRAMES))
            }
        }
    }
}

/// Percentage to print for a frame.
///
/// `jitter` is applied only while the true value is below 100; the result is
/// clamped to `[last_printed, 100]` so the display never regresses.
pub fn displayed_percentage(percentage: u32, jitter: i64, last_printed: u32) -> u32 {
    let candidate = if percentage < 100 {
        i64::from(percentage) + jitter
    } else {
        100
    };
    candidate.clamp(i64::from(last_printed), 100) as u32
}

/// Apply a millisecond jitter to a wait, saturating at zero.
pub fn jittered(base: Duration, jitter_ms: i64) -> Duration {
    let millis = base.as_millis() as i64 + jitter_ms;
    Duration::from_millis(millis.max(0) as u64)
}

/// Filled part of the bar and the number of padding spaces after it.
///
/// An unfinished bar ends in `>` instead of its last `=`.
pub fn bar(percentage: u32) -> (String, usize) {
    let filled = (percentage.min(100) as usize) * BAR_WIDTH / 100;
    let spaces = BAR_WIDTH - filled;
    let mut bars = "=".repeat(filled);
    if spaces > 0 && filled > 0 {
        bars.pop();
        bars.push('>');
    }
    (bars, spaces)
}
