//! Grading backend access.
//!
//! Actions talk to the backend through [`BackendClient`]; the production
//! implementation is [`HttpBackendClient`].

use std::fmt::Debug;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument};

use crate::core::definition::{
    ActionDefinition, ActionsResponse, CreateSubmissionResponse, StatusResponse,
};
use crate::core::polling::{STATUS_FAILURE, STATUS_SUCCESS};
use crate::io::config::CliConfig;
use crate::io::retry::{RetryPolicy, retry_with_backoff};

pub const VERSION_HEADER: &str = "X-Codecrafters-CLI-Version";

/// Backend calls made while executing actions.
///
/// Status fetches return the raw status string; classifying it is up to the
/// caller.
#[async_trait]
pub trait BackendClient: Send + Sync + Debug {
    async fn fetch_build_status(&self, build_id: &str) -> Result<String>;
    async fn fetch_submission_status(&self, submission_id: &str) -> Result<String>;
    async fn fetch_autofix_status(&self, submission_id: &str) -> Result<String>;
    async fn fetch_dynamic_actions(
        &self,
        event_name: &str,
        event_params: &Map<String, Value>,
    ) -> Result<Vec<ActionDefinition>>;
}

/// Client handle shared by every action in a tree.
pub type SharedClient = Arc<dyn BackendClient>;

/// HTTP client for the `/services/cli` endpoints.
#[derive(Debug, Clone)]
pub struct HttpBackendClient {
    http: Client,
    server_url: String,
    build_retry: RetryPolicy,
    submission_retry: RetryPolicy,
}

impl HttpBackendClient {
    pub fn new(config: &CliConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let version = format!("v{}", env!("CARGO_PKG_VERSION"));
        headers.insert(
            VERSION_HEADER,
            HeaderValue::from_str(&version).context("build version header")?,
        );
        let http = Client::builder()
            .timeout(config.request_timeout())
            .default_headers(headers)
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            server_url: config.server_url.trim_end_matches('/').to_string(),
            build_retry: RetryPolicy::build_fetch(),
            submission_retry: RetryPolicy::submission_fetch(),
        })
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/services/cli/{name}", self.server_url)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        name: &str,
        query: &[(String, String)],
        what: &str,
    ) -> Result<T> {
        let response = self
            .http
            .get(self.endpoint(name))
            .query(query)
            .send()
            .await
            .with_context(|| format!("failed to fetch {what} from CodeCrafters"))?;
        decode(response, what, false).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        name: &str,
        body: &Value,
        what: &str,
        accept_forbidden: bool,
    ) -> Result<T> {
        let response = self
            .http
            .post(self.endpoint(name))
            .json(body)
            .send()
            .await
            .with_context(|| format!("failed to {what}"))?;
        decode(response, what, accept_forbidden).await
    }

    async fn fetch_status_once(
        &self,
        name: &str,
        id_param: &str,
        id: &str,
        what: &str,
    ) -> Result<String> {
        let query = [(id_param.to_string(), id.to_string())];
        let resp: StatusResponse = self.get(name, &query, what).await?;
        if resp.is_error {
            bail!("{}", resp.error_message);
        }
        Ok(resp.status)
    }

    /// Report the CLI as alive for a repository and return follow-up actions.
    #[instrument(skip(self))]
    pub async fn ping(&self, repository_id: &str) -> Result<Vec<ActionDefinition>> {
        let resp: ActionsResponse = self
            .post("ping", &json!({"repository_id": repository_id}), "ping CodeCrafters", false)
            .await?;
        Ok(resp.actions)
    }

    /// Create a submission for a pushed commit.
    ///
    /// A refused submission (HTTP 403) still decodes: the caller inspects
    /// `is_error`.
    #[instrument(skip(self))]
    pub async fn create_submission(
        &self,
        repository_id: &str,
        commit_sha: &str,
        command: &str,
        stage_selection_strategy: &str,
    ) -> Result<CreateSubmissionResponse> {
        let body = json!({
            "repository_id": repository_id,
            "commit_sha": commit_sha,
            "command": command,
            "stage_selection_strategy": stage_selection_strategy,
        });
        self.post("create_submission", &body, "submit code to CodeCrafters", true)
            .await
    }
}

#[async_trait]
impl BackendClient for HttpBackendClient {
    #[instrument(skip(self))]
    async fn fetch_build_status(&self, build_id: &str) -> Result<String> {
        retry_with_backoff(&self.build_retry, || async move {
            let status = self
                .fetch_status_once(
                    "fetch_test_runner_build",
                    "test_runner_build_id",
                    build_id,
                    "build result",
                )
                .await?;
            require_terminal(status, "build")
        })
        .await
    }

    #[instrument(skip(self))]
    async fn fetch_submission_status(&self, submission_id: &str) -> Result<String> {
        retry_with_backoff(&self.submission_retry, || async move {
            let status = self
                .fetch_status_once(
                    "fetch_submission",
                    "submission_id",
                    submission_id,
                    "submission result",
                )
                .await?;
            require_terminal(status, "submission")
        })
        .await
    }

    #[instrument(skip(self))]
    async fn fetch_autofix_status(&self, submission_id: &str) -> Result<String> {
        self.fetch_status_once(
            "fetch_autofix_request",
            "submission_id",
            submission_id,
            "autofix request status",
        )
        .await
    }

    #[instrument(skip(self, event_params))]
    async fn fetch_dynamic_actions(
        &self,
        event_name: &str,
        event_params: &Map<String, Value>,
    ) -> Result<Vec<ActionDefinition>> {
        let query = dynamic_actions_query(event_name, event_params);
        let resp: ActionsResponse = self
            .get("fetch_dynamic_actions", &query, "dynamic actions")
            .await?;
        debug!(count = resp.actions.len(), "fetched dynamic actions");
        Ok(resp.actions)
    }
}

/// Statuses other than `success`/`failure` are retried by the HTTP layer.
fn require_terminal(status: String, subject: &str) -> Result<String> {
    if status == STATUS_SUCCESS || status == STATUS_FAILURE {
        Ok(status)
    } else {
        bail!("unexpected {subject} status: {status}")
    }
}

async fn decode<T: DeserializeOwned>(
    response: reqwest::Response,
    what: &str,
    accept_forbidden: bool,
) -> Result<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .with_context(|| format!("read {what} response"))?;
    if !status.is_success() && !(accept_forbidden && status == StatusCode::FORBIDDEN) {
        bail!(
            "CodeCrafters request for {what} failed. status code: {}, body: {body}",
            status.as_u16()
        );
    }
    serde_json::from_str(&body).with_context(|| format!("failed to parse {what} response"))
}

/// Query pairs for `fetch_dynamic_actions`: the event name plus one
/// `event_params[key]` entry per parameter.
pub fn dynamic_actions_query(
    event_name: &str,
    event_params: &Map<String, Value>,
) -> Vec<(String, String)> {
    let mut query = vec![("event_name".to_string(), event_name.to_string())];
    for (key, value) in event_params {
        query.push((format!("event_params[{key}]"), query_value(value)));
    }
    query
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn quick(policy: RetryPolicy) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            ..policy
        }
    }

    fn client_for(server: &MockServer) -> HttpBackendClient {
        let config = CliConfig {
            server_url: server.uri(),
            ..CliConfig::default()
        };
        HttpBackendClient {
            build_retry: quick(RetryPolicy::build_fetch()),
            submission_retry: quick(RetryPolicy::submission_fetch()),
            ..HttpBackendClient::new(&config).expect("client")
        }
    }

    fn version() -> String {
        format!("v{}", env!("CARGO_PKG_VERSION"))
    }

    async fn request_count(server: &MockServer) -> usize {
        server.received_requests().await.map_or(0, |requests| requests.len())
    }

    #[tokio::test]
    async fn pending_build_status_is_retried_eleven_times() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services/cli/fetch_test_runner_build"))
            .and(query_param("test_runner_build_id", "b1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"status": "in_progress"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_build_status("b1").await.unwrap_err();

        assert_eq!(err.to_string(), "unexpected build status: in_progress");
        assert_eq!(request_count(&server).await, 11);
    }

    #[tokio::test]
    async fn pending_submission_status_is_retried_five_times() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services/cli/fetch_submission"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "evaluating"})))
            .mount(&server)
            .await;

        assert!(client_for(&server).fetch_submission_status("s1").await.is_err());
        assert_eq!(request_count(&server).await, 5);
    }

    #[tokio::test]
    async fn terminal_status_returns_on_first_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services/cli/fetch_submission"))
            .and(query_param("submission_id", "s1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "failure"})))
            .mount(&server)
            .await;

        let status = client_for(&server)
            .fetch_submission_status("s1")
            .await
            .expect("status");

        assert_eq!(status, "failure");
        assert_eq!(request_count(&server).await, 1);
    }

    #[tokio::test]
    async fn error_body_surfaces_server_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services/cli/fetch_autofix_request"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "is_error": true,
                "error_message": "Autofix request not found",
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch_autofix_status("s1")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Autofix request not found");
        assert_eq!(request_count(&server).await, 1);
    }

    #[tokio::test]
    async fn forbidden_submission_body_is_still_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/services/cli/create_submission"))
            .and(body_json(json!({
                "repository_id": "r1",
                "commit_sha": "abc",
                "command": "submit",
                "stage_selection_strategy": "current_and_previous_descending",
            })))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "is_error": true,
                "error_message": "Your trial has ended",
            })))
            .mount(&server)
            .await;

        let resp = client_for(&server)
            .create_submission("r1", "abc", "submit", "current_and_previous_descending")
            .await
            .expect("decoded");

        assert!(resp.is_error);
        assert_eq!(resp.error_message, "Your trial has ended");
    }

    #[tokio::test]
    async fn forbidden_elsewhere_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/services/cli/ping"))
            .respond_with(ResponseTemplate::new(403).set_body_string("nope"))
            .mount(&server)
            .await;

        let err = client_for(&server).ping("r1").await.unwrap_err();

        assert!(err.to_string().contains("status code: 403"));
    }

    #[tokio::test]
    async fn every_request_carries_the_version_header() {
        let server = MockServer::start().await;
        Mock::given(header(VERSION_HEADER, version().as_str()))
            .and(path("/services/cli/fetch_dynamic_actions"))
            .and(query_param("event_name", "test_passed"))
            .and(query_param("event_params[stage]", "ab1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "actions": [{"type": "sleep", "args": {"duration_in_milliseconds": 1}}],
            })))
            .mount(&server)
            .await;
        Mock::given(header(VERSION_HEADER, version().as_str()))
            .and(path("/services/cli/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"actions": []})))
            .mount(&server)
            .await;
        let client = client_for(&server);
        let params = json!({"stage": "ab1"}).as_object().cloned().expect("object");

        let actions = client
            .fetch_dynamic_actions("test_passed", &params)
            .await
            .expect("dynamic");
        let pinged = client.ping("r1").await.expect("ping");

        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action_type, "sleep");
        assert!(pinged.is_empty());
        assert_eq!(request_count(&server).await, 2);
    }

    #[test]
    fn dynamic_query_flattens_params() {
        let params = json!({"stage": "ab1", "attempt": 3, "first": true})
            .as_object()
            .cloned()
            .expect("object");
        let query = dynamic_actions_query("test_passed", &params);
        assert_eq!(query[0], ("event_name".to_string(), "test_passed".to_string()));
        assert!(query.contains(&("event_params[stage]".to_string(), "ab1".to_string())));
        assert!(query.contains(&("event_params[attempt]".to_string(), "3".to_string())));
        assert!(query.contains(&("event_params[first]".to_string(), "true".to_string())));
    }

    #[test]
    fn only_success_and_failure_are_terminal_for_retries() {
        assert_eq!(require_terminal("success".to_string(), "build").expect("ok"), "success");
        let err = require_terminal("evaluating".to_string(), "submission").unwrap_err();
        assert_eq!(err.to_string(), "unexpected submission status: evaluating");
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let config = CliConfig {
            server_url: "http://localhost:4000/".to_string(),
            ..CliConfig::default()
        };
        let client = HttpBackendClient::new(&config).expect("client");
        assert_eq!(
            client.endpoint("ping"),
            "http://localhost:4000/services/cli/ping"
        );
    }
}
