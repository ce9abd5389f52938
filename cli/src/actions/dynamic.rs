//! Fetch actions for an event at run time and execute them.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tracing::{info, instrument};

use crate::actions::context::ActionContext;
use crate::actions::{ActionFactory, execute_sequence};

/// The fetched batch is parsed as a whole before anything runs: one bad
/// definition means none of the batch executes.
#[derive(Debug)]
pub struct ExecuteDynamicActions {
    pub event_name: String,
    pub event_params: Map<String, Value>,
    pub factory: ActionFactory,
}

impl ExecuteDynamicActions {
    #[instrument(skip_all, fields(event = %self.event_name))]
    pub async fn execute(&self, ctx: &ActionContext) -> Result<()> {
        let definitions = self
            .factory
            .client()
            .fetch_dynamic_actions(&self.event_name, &self.event_params)
            .await
            .with_context(|| format!("fetch dynamic actions for {}", self.event_name))?;
        let actions = self.factory.build_all(&definitions)?;
        info!(count = actions.len(), "executing dynamic actions");
        execute_sequence(&actions, ctx).await
    }
}
