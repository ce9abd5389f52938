//! CodeCrafters CLI.
//!
//! Asks the grading backend what to do and runs the actions it sends back.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value, json};
use tracing::info;

use codecrafters_cli::actions::EXECUTE_DYNAMIC_ACTIONS;
use codecrafters_cli::actions::context::ActionContext;
use codecrafters_cli::core::definition::{ActionDefinition, ActionPayload};
use codecrafters_cli::exit_codes;
use codecrafters_cli::io::backend::{HttpBackendClient, SharedClient};
use codecrafters_cli::io::config::{CliConfig, DEFAULT_CONFIG_PATH, load_config, write_config};
use codecrafters_cli::io::console::{Console, SystemExit};
use codecrafters_cli::io::log_stream::RedisLogStreams;
use codecrafters_cli::logging;
use codecrafters_cli::submission::{execute_action_tree, handle_submission};

#[derive(Parser)]
#[command(
    name = "codecrafters",
    version,
    about = "Run server-directed actions for CodeCrafters exercises"
)]
struct Cli {
    /// Path to the CLI config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the default config file if missing.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Execute actions from a saved server response or a bare list of definitions.
    Run {
        /// JSON file to read.
        file: PathBuf,
    },
    /// Tell the backend the CLI is alive for a repository and run what it returns.
    Ping {
        #[arg(long)]
        repository_id: String,
    },
    /// Create a submission for a pushed commit and run its actions.
    Submit {
        #[arg(long)]
        repository_id: String,
        #[arg(long)]
        commit_sha: String,
        #[arg(long, default_value = "submit")]
        command: String,
        #[arg(long, default_value = "current_and_previous_descending")]
        stage_selection_strategy: String,
    },
    /// Fetch and run the actions attached to an event.
    Dynamic {
        #[arg(long)]
        event: String,
        /// Event parameter as `key=value`; repeatable.
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
}

#[tokio::main]
async fn main() {
    logging::init();
    if let Err(err) = run(Cli::parse()).await {
        eprintln!("{:#}", err);
        std::process::exit(exit_codes::ERROR);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Command::Init { force } = cli.command {
        return cmd_init(&cli.config, force);
    }

    let config = load_config(&cli.config)?;
    let http = HttpBackendClient::new(&config)?;
    let client: SharedClient = Arc::new(http.clone());
    let ctx = action_context(&config);

    match cli.command {
        Command::Init { .. } => Ok(()),
        Command::Run { file } => cmd_run(&file, client, &ctx).await,
        Command::Ping { repository_id } => {
            let definitions = http.ping(&repository_id).await?;
            execute_action_tree(&definitions, client, &ctx).await
        }
        Command::Submit {
            repository_id,
            commit_sha,
            command,
            stage_selection_strategy,
        } => {
            let response = http
                .create_submission(&repository_id, &commit_sha, &command, &stage_selection_strategy)
                .await?;
            info!(submission_id = %response.id, "submission created");
            handle_submission(&response, client, &ctx).await
        }
        Command::Dynamic { event, params } => {
            let definition = dynamic_definition(&event, &params);
            execute_action_tree(&[definition], client, &ctx).await
        }
    }
}

fn action_context(config: &CliConfig) -> ActionContext {
    ActionContext::new(
        Console::stdout(),
        Arc::new(SystemExit),
        Arc::new(RedisLogStreams::new(config.log_stream.block_timeout())),
    )
}

fn cmd_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        println!("{} already exists", path.display());
        return Ok(());
    }
    write_config(path, &CliConfig::default())?;
    println!("wrote {}", path.display());
    Ok(())
}

async fn cmd_run(file: &Path, client: SharedClient, ctx: &ActionContext) -> Result<()> {
    let contents = fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?;
    let payload: ActionPayload =
        serde_json::from_str(&contents).with_context(|| format!("parse {}", file.display()))?;
    match payload {
        ActionPayload::List(definitions) => execute_action_tree(&definitions, client, ctx).await,
        ActionPayload::Submission(response) => handle_submission(&response, client, ctx).await,
    }
}

/// A single `execute_dynamic_actions` definition for `event`.
fn dynamic_definition(event: &str, params: &[(String, String)]) -> ActionDefinition {
    let event_params: Map<String, Value> = params
        .iter()
        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
        .collect();
    ActionDefinition::new(
        EXECUTE_DYNAMIC_ACTIONS,
        json!({"event_name": event, "event_params": event_params}),
    )
}

fn parse_param(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected key=value, got {raw:?}"))?;
    if key.trim().is_empty() {
        return Err(anyhow!("parameter key must not be empty"));
    }
    Ok((key.trim().to_string(), value.to_string()))
}
