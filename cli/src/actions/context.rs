//! Capabilities handed to every action at execution time.

use std::sync::Arc;

use tracing::warn;

use crate::io::console::{Console, ProcessExit};
use crate::io::log_stream::LogStreamConnector;

/// Where actions print, how they end the process and how they open log streams.
#[derive(Clone)]
pub struct ActionContext {
    pub console: Console,
    pub exit: Arc<dyn ProcessExit>,
    pub log_streams: Arc<dyn LogStreamConnector>,
}

impl ActionContext {
    pub fn new(
        console: Console,
        exit: Arc<dyn ProcessExit>,
        log_streams: Arc<dyn LogStreamConnector>,
    ) -> Self {
        Self {
            console,
            exit,
            log_streams,
        }
    }

    /// Flush output and end the process with `code`.
    pub fn terminate(&self, code: i32) -> ! {
        if let Err(err) = self.console.flush() {
            warn!(error = %format!("{err:#}"), "flush before exit failed");
        }
        self.exit.exit(code)
    }
}
