//! Forward a remote log stream to the terminal until the producer disconnects.

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::actions::context::ActionContext;
use crate::core::errors::ExecutionError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamLogs {
    pub logstream_url: String,
}

impl StreamLogs {
    #[instrument(skip_all, fields(url = %self.logstream_url))]
    pub async fn execute(&self, ctx: &ActionContext) -> Result<()> {
        let mut stream = ctx
            .log_streams
            .connect(&self.logstream_url)
            .await
            .context("failed to create logstream consumer")?;
        let mut forwarded = 0usize;
        loop {
            let chunk = stream.next_chunk().await.map_err(|err| {
                err.context(ExecutionError::Stream {
                    url: self.logstream_url.clone(),
                })
            })?;
            let Some(chunk) = chunk else {
                debug!(bytes = forwarded, "log stream finished");
                return Ok(());
            };
            forwarded += chunk.len();
            ctx.console.write_bytes(&chunk)?;
        }
    }
}
