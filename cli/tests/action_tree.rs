//! Whole action trees: parsing before execution, dynamic batches, leaf output.

use serde_json::json;

use codecrafters_cli::core::definition::{ActionDefinition, ActionPayload};
use codecrafters_cli::core::errors::{ExecutionError, ParseError};
use codecrafters_cli::exit_codes;
use codecrafters_cli::submission::{execute_action_tree, handle_submission};
use codecrafters_cli::test_support::{RunEnd, ScriptedClient, TestHarness, run_until_exit};

fn say(text: &str) -> ActionDefinition {
    ActionDefinition::new("print_message", json!({"color": "plain", "text": text}))
}

fn dynamic(event: &str) -> ActionDefinition {
    ActionDefinition::new(
        "execute_dynamic_actions",
        json!({"event_name": event, "event_params": {"stage_slug": "ab1", "attempt": 2}}),
    )
}

#[tokio::test]
async fn dynamic_actions_execute_in_order() {
    let client = ScriptedClient::new().with_dynamic_actions(vec![say("first"), say("second")]);
    let harness = TestHarness::with_client(client);

    execute_action_tree(&[dynamic("test_passed")], harness.client.clone(), &harness.ctx)
        .await
        .expect("run");

    assert_eq!(harness.console.lines(), vec!["first", "second"]);
    let requests = harness.client.dynamic_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, "test_passed");
    assert_eq!(requests[0].1["stage_slug"], "ab1");
    assert_eq!(requests[0].1["attempt"], 2);
}

#[tokio::test]
async fn dynamic_batch_with_invalid_definition_runs_nothing() {
    let client = ScriptedClient::new().with_dynamic_actions(vec![
        say("valid"),
        ActionDefinition::new("unknown_kind", json!({})),
    ]);
    let harness = TestHarness::with_client(client);

    let err = execute_action_tree(&[dynamic("test_failed")], harness.client.clone(), &harness.ctx)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ParseError>(),
        Some(ParseError::UnknownActionType(tag)) if tag == "unknown_kind"
    ));
    assert!(harness.console.text().is_empty());
}

#[tokio::test]
async fn dynamic_fetch_failure_aborts_the_tree() {
    let harness = TestHarness::new();

    let err = execute_action_tree(
        &[dynamic("test_passed"), say("after")],
        harness.client.clone(),
        &harness.ctx,
    )
    .await
    .unwrap_err();

    assert!(format!("{err:#}").contains("fetch dynamic actions for test_passed"));
    assert!(harness.console.text().is_empty());
}

#[tokio::test]
async fn deeply_nested_parse_failure_fails_the_whole_tree() {
    let tree = vec![
        say("root"),
        ActionDefinition::new(
            "await_terminal_autofix_request_status",
            json!({
                "submission_id": "s1",
                "in_progress_actions": [
                    {"type": "print_progress_bar", "args": {"expected_delay_in_seconds": "ten"}}
                ],
            }),
        ),
    ];
    let harness = TestHarness::new();

    let err = execute_action_tree(&tree, harness.client.clone(), &harness.ctx)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ParseError>(),
        Some(ParseError::InvalidArguments { action_type, .. })
            if action_type == "print_progress_bar"
    ));
    assert!(harness.console.text().is_empty());
    assert_eq!(harness.client.autofix_calls(), 0);
}

#[tokio::test]
async fn invalid_color_stops_at_execution_time() {
    let tree = vec![
        say("shown"),
        ActionDefinition::new("print_message", json!({"color": "teal", "text": "hidden"})),
        say("never"),
    ];
    let harness = TestHarness::new();

    let err = execute_action_tree(&tree, harness.client.clone(), &harness.ctx)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ExecutionError>(),
        Some(ExecutionError::InvalidColor(color)) if color == "teal"
    ));
    assert_eq!(harness.console.lines(), vec!["shown"]);
}

#[tokio::test(start_paused = true)]
async fn streamed_logs_and_boxes_render_in_sequence() {
    let harness = TestHarness::new();
    harness
        .log_streams
        .script("redis://logs:6379/0/run-1", vec![Ok(b"[tester] ok\n".to_vec())]);
    let tree = vec![
        ActionDefinition::new(
            "stream_logs",
            json!({"logstream_url": "redis://logs:6379/0/run-1"}),
        ),
        ActionDefinition::new("sleep", json!({"duration_in_milliseconds": 250})),
        ActionDefinition::new(
            "print_terminal_commands_box",
            json!({"commands": ["git commit -am 'pass'", "git push origin master"]}),
        ),
        ActionDefinition::new(
            "print_file_diff",
            json!({"diff_str": "-old\n+new", "file_path": "src/main.rs"}),
        ),
    ];
    let started = tokio::time::Instant::now();

    execute_action_tree(&tree, harness.client.clone(), &harness.ctx)
        .await
        .expect("run");

    assert!(started.elapsed() >= std::time::Duration::from_millis(250));
    let lines = harness.console.plain_lines();
    assert_eq!(lines[0], "[tester] ok");
    assert!(lines[1].starts_with('┌'));
    assert!(lines.iter().any(|line| line.contains("$ git push origin master")));
    assert!(lines.iter().any(|line| line.contains("-old")));
    assert!(lines.iter().any(|line| line.contains("+new")));
}

#[tokio::test]
async fn saved_submission_payload_runs_its_actions() {
    let payload: ActionPayload = serde_json::from_value(json!({
        "id": "sub-9",
        "commit_sha": "abc123",
        "actions": [
            {"type": "print_message", "args": {"color": "green", "text": "Submission created"}},
            {"type": "terminate", "args": {"exit_code": 0}}
        ]
    }))
    .expect("payload");
    let ActionPayload::Submission(response) = payload else {
        panic!("expected submission payload");
    };
    let harness = TestHarness::new();

    let end =
        run_until_exit(handle_submission(&response, harness.client.clone(), &harness.ctx)).await;

    assert_eq!(end.exit_code(), Some(exit_codes::OK));
    assert_eq!(harness.console.plain_lines(), vec!["Submission created"]);
}
