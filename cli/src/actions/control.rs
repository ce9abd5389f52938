//! Pacing and process control.

use std::time::Duration;

use serde::Deserialize;

use crate::actions::context::ActionContext;

/// A negative duration does not wait at all.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Sleep {
    pub duration_in_milliseconds: i64,
}

impl Sleep {
    pub async fn execute(&self) {
        let millis = u64::try_from(self.duration_in_milliseconds).unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }
}

/// Ends the process; never returns.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Terminate {
    pub exit_code: i32,
}

impl Terminate {
    pub fn execute(&self, ctx: &ActionContext) -> ! {
        ctx.terminate(self.exit_code)
    }
}
