// Workflow executor
//
// Runs a workflow's actions in list order and records the outcome as a
// single execution row. The caller sees nothing: every effect, including a
// panic inside an action, ends up in the persisted record. Exactly one
// create_execution and one update_execution are issued per invocation.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use camshaft_core::{
    ActionDefinition, ActionType, Execution, ExecutionStatus, LogEntry, LogLevel, Workflow,
};
use camshaft_storage::WorkflowStore;
use chrono::Utc;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Total timeout for one http_endpoint request
pub const HTTP_ACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Response bodies are truncated to this many characters in the log entry
pub const BODY_LOG_LIMIT: usize = 500;

/// Build the HTTP client shared by all http_endpoint actions
pub fn build_action_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(HTTP_ACTION_TIMEOUT)
        .build()
}

/// Run `workflow` and persist the outcome to `store`
///
/// Never returns an error: a store failure before the record exists is
/// logged and the run is abandoned; after that, the terminal state is always
/// written, whatever the actions did.
pub async fn execute_workflow(
    workflow: Workflow,
    store: Arc<dyn WorkflowStore>,
    http: reqwest::Client,
) {
    let mut execution = Execution::start(workflow.id, workflow.user_id);
    execution.logs.push(LogEntry::new(
        format!("Starting execution for Workflow '{}'", workflow.name),
        LogLevel::Info,
    ));

    if let Err(err) = store.create_execution(&execution).await {
        tracing::error!(
            workflow_id = %workflow.id,
            "failed to create execution record, not running: {}",
            err
        );
        return;
    }

    let outcome = AssertUnwindSafe(run_actions(&workflow, &mut execution.logs, &http))
        .catch_unwind()
        .await;

    finalize(&mut execution, outcome);

    if let Err(err) = store.update_execution(&execution).await {
        tracing::error!(
            execution_id = %execution.id,
            workflow_id = %workflow.id,
            "failed to persist terminal execution state: {}",
            err
        );
    }
}

/// Terminal hook: force a terminal status and stamp completion
///
/// Runs on every exit path of the action loop. A caught panic becomes an
/// ERROR log line and the execution is marked failed; logs collected before
/// the panic are preserved.
fn finalize(
    execution: &mut Execution,
    outcome: Result<ExecutionStatus, Box<dyn std::any::Any + Send>>,
) {
    execution.status = match outcome {
        Ok(status) => status,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!(
                execution_id = %execution.id,
                "panic during workflow execution: {}",
                message
            );
            execution.logs.push(LogEntry::new(
                format!("Execution panicked: {message}"),
                LogLevel::Error,
            ));
            ExecutionStatus::Failed
        }
    };
    execution.completed_at = Some(Utc::now());
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

async fn run_actions(
    workflow: &Workflow,
    logs: &mut Vec<LogEntry>,
    http: &reqwest::Client,
) -> ExecutionStatus {
    if workflow.actions.is_empty() {
        logs.push(LogEntry::new(
            "Workflow has no actions to execute",
            LogLevel::Warning,
        ));
        return ExecutionStatus::Completed;
    }

    let total = workflow.actions.len();
    let mut overall_success = true;

    for (index, action) in workflow.actions.iter().enumerate() {
        logs.push(LogEntry::new(
            format!(
                "--- Executing Action {}/{}: Name '{}', Type '{}' ---",
                index + 1,
                total,
                action.name,
                action.action_type
            ),
            LogLevel::Info,
        ));

        let result = match action.action_type {
            ActionType::LogMessage => run_log_message(action, logs),
            ActionType::HttpEndpoint => run_http_endpoint(action, logs, http).await,
            ActionType::Unknown => Err(ActionError::UnknownType),
        };

        // A failed action poisons the overall status but does not stop the
        // pipeline; remaining actions still run.
        if let Err(err) = result {
            logs.push(LogEntry::new(
                format!("Action '{}' failed: {}", action.name, err),
                LogLevel::Error,
            ));
            overall_success = false;
        }
    }

    if overall_success {
        ExecutionStatus::Completed
    } else {
        ExecutionStatus::Failed
    }
}

#[derive(Debug, thiserror::Error)]
enum ActionError {
    #[error("invalid config: {0}")]
    Config(String),

    #[error("request error: {0}")]
    Request(String),

    #[error("endpoint returned status {0}")]
    Status(u16),

    #[error("unknown action type")]
    UnknownType,
}

/// Project a free-form config map into the action's typed config
fn parse_config<T: DeserializeOwned>(
    config: &serde_json::Map<String, Value>,
) -> Result<T, ActionError> {
    serde_json::from_value(Value::Object(config.clone()))
        .map_err(|err| ActionError::Config(err.to_string()))
}

#[derive(Debug, Deserialize)]
struct LogMessageConfig {
    message: String,
}

fn run_log_message(action: &ActionDefinition, logs: &mut Vec<LogEntry>) -> Result<(), ActionError> {
    let config: LogMessageConfig = parse_config(&action.config)?;
    logs.push(LogEntry::new(config.message, LogLevel::ActionOutput));
    Ok(())
}

#[derive(Debug, Deserialize)]
struct HttpEndpointConfig {
    url: String,
    method: Option<String>,
    headers: Option<HashMap<String, String>>,
    body: Option<Value>,
}

async fn run_http_endpoint(
    action: &ActionDefinition,
    logs: &mut Vec<LogEntry>,
    http: &reqwest::Client,
) -> Result<(), ActionError> {
    let config: HttpEndpointConfig = parse_config(&action.config)?;
    if config.url.is_empty() {
        return Err(ActionError::Config("'url' must not be empty".to_string()));
    }

    let method = config.method.as_deref().unwrap_or("GET").to_uppercase();
    let method = reqwest::Method::from_bytes(method.as_bytes())
        .map_err(|_| ActionError::Config(format!("invalid HTTP method '{method}'")))?;

    let mut request = http.request(method.clone(), &config.url);

    let mut has_content_type = false;
    if let Some(headers) = &config.headers {
        for (name, value) in headers {
            if name.eq_ignore_ascii_case("content-type") {
                has_content_type = true;
            }
            request = request.header(name, value);
        }
    }

    match &config.body {
        // A string body goes out verbatim, no content type inferred
        Some(Value::String(body)) => {
            request = request.body(body.clone());
        }
        // A structured body is JSON-serialized and tagged as such unless the
        // caller already set a content type
        Some(body) => {
            let serialized = serde_json::to_string(body)
                .map_err(|err| ActionError::Config(format!("unserializable body: {err}")))?;
            if !has_content_type {
                request = request.header(reqwest::header::CONTENT_TYPE, "application/json");
            }
            request = request.body(serialized);
        }
        None => {}
    }

    let response = request
        .send()
        .await
        .map_err(|err| ActionError::Request(err.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| ActionError::Request(err.to_string()))?;

    logs.push(LogEntry::new(
        format!(
            "{} {} responded with status {}: {}",
            method,
            config.url,
            status.as_u16(),
            truncate(&body, BODY_LOG_LIMIT)
        ),
        LogLevel::ActionOutput,
    ));

    if !status.is_success() {
        return Err(ActionError::Status(status.as_u16()));
    }
    Ok(())
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let mut truncated: String = text.chars().take(limit).collect();
        truncated.push_str("...");
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use camshaft_core::{TriggerDefinition, TriggerType};
    use camshaft_storage::{InMemoryWorkflowStore, StoreError};
    use serde_json::{json, Map};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn json_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected a JSON object"),
        }
    }

    fn action(name: &str, action_type: ActionType, config: Value) -> ActionDefinition {
        ActionDefinition {
            name: name.to_string(),
            action_type,
            config: json_map(config),
            depends_on: None,
        }
    }

    fn workflow_with(actions: Vec<ActionDefinition>) -> Workflow {
        Workflow {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            name: "daily_ping".to_string(),
            description: None,
            trigger: TriggerDefinition {
                trigger_type: TriggerType::Schedule,
                config: json_map(json!({ "cron": "*/1 * * * *" })),
            },
            actions,
            is_enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn run(workflow: Workflow) -> (Arc<InMemoryWorkflowStore>, Execution) {
        let store = Arc::new(InMemoryWorkflowStore::new());
        store.save(&workflow).await.unwrap();
        let (user_id, workflow_id) = (workflow.user_id, workflow.id);

        execute_workflow(workflow, store.clone(), build_action_client().unwrap()).await;

        let mut executions = store.list_executions(user_id, workflow_id).await.unwrap();
        assert_eq!(executions.len(), 1);
        (store, executions.remove(0))
    }

    fn entries_at(execution: &Execution, level: LogLevel) -> Vec<&LogEntry> {
        execution
            .logs
            .iter()
            .filter(|e| e.status == level)
            .collect()
    }

    #[tokio::test]
    async fn test_log_message_action_completes() {
        let workflow = workflow_with(vec![action(
            "say-hi",
            ActionType::LogMessage,
            json!({ "message": "tick" }),
        )]);
        let (_, execution) = run(workflow).await;

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert!(execution.completed_at.is_some());
        assert!(execution.completed_at.unwrap() >= execution.triggered_at);

        let outputs = entries_at(&execution, LogLevel::ActionOutput);
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].message, "tick");
    }

    #[tokio::test]
    async fn test_missing_message_fails_but_pipeline_continues() {
        let workflow = workflow_with(vec![
            action("broken", ActionType::LogMessage, json!({})),
            action("after", ActionType::LogMessage, json!({ "message": "still ran" })),
        ]);
        let (_, execution) = run(workflow).await;

        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert_eq!(entries_at(&execution, LogLevel::Error).len(), 1);

        // The second action ran despite the first failing
        let outputs = entries_at(&execution, LogLevel::ActionOutput);
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].message, "still ran");
    }

    #[tokio::test]
    async fn test_non_string_message_fails_action() {
        let workflow = workflow_with(vec![action(
            "typed-wrong",
            ActionType::LogMessage,
            json!({ "message": 42 }),
        )]);
        let (_, execution) = run(workflow).await;

        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert!(entries_at(&execution, LogLevel::ActionOutput).is_empty());
    }

    #[tokio::test]
    async fn test_unknown_action_type_fails_action() {
        let workflow = workflow_with(vec![action("mystery", ActionType::Unknown, json!({}))]);
        let (_, execution) = run(workflow).await;

        assert_eq!(execution.status, ExecutionStatus::Failed);
        let errors = entries_at(&execution, LogLevel::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("unknown action type"));
    }

    #[tokio::test]
    async fn test_empty_action_list_completes_with_warning() {
        let (_, execution) = run(workflow_with(vec![])).await;

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(entries_at(&execution, LogLevel::Warning).len(), 1);
    }

    #[tokio::test]
    async fn test_http_endpoint_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("content-type", "application/json"))
            .and(body_string("{\"event\":\"tick\"}"))
            .respond_with(ResponseTemplate::new(200).set_body_string("accepted"))
            .expect(1)
            .mount(&server)
            .await;

        let workflow = workflow_with(vec![action(
            "notify",
            ActionType::HttpEndpoint,
            json!({
                "url": format!("{}/hook", server.uri()),
                "method": "post",
                "body": { "event": "tick" }
            }),
        )]);
        let (_, execution) = run(workflow).await;

        assert_eq!(execution.status, ExecutionStatus::Completed);
        let outputs = entries_at(&execution, LogLevel::ActionOutput);
        assert_eq!(outputs.len(), 1);
        assert!(outputs[0].message.contains("status 200"));
        assert!(outputs[0].message.contains("accepted"));
    }

    #[tokio::test]
    async fn test_http_endpoint_string_body_sent_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/raw"))
            .and(body_string("plain text payload"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let workflow = workflow_with(vec![action(
            "upload",
            ActionType::HttpEndpoint,
            json!({
                "url": format!("{}/raw", server.uri()),
                "method": "PUT",
                "body": "plain text payload"
            }),
        )]);
        let (_, execution) = run(workflow).await;

        assert_eq!(execution.status, ExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn test_http_endpoint_server_error_fails_run() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let workflow = workflow_with(vec![action(
            "check",
            ActionType::HttpEndpoint,
            json!({ "url": format!("{}/broken", server.uri()) }),
        )]);
        let (_, execution) = run(workflow).await;

        assert_eq!(execution.status, ExecutionStatus::Failed);

        let outputs = entries_at(&execution, LogLevel::ActionOutput);
        assert_eq!(outputs.len(), 1);
        assert!(outputs[0].message.contains("status 500"));

        let errors = entries_at(&execution, LogLevel::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("500"));
    }

    #[tokio::test]
    async fn test_http_endpoint_unreachable_host_fails_action() {
        let workflow = workflow_with(vec![action(
            "dead",
            ActionType::HttpEndpoint,
            json!({ "url": "http://127.0.0.1:1/unroutable" }),
        )]);
        let (_, execution) = run(workflow).await;

        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert_eq!(entries_at(&execution, LogLevel::Error).len(), 1);
        // No response, so no action output either
        assert!(entries_at(&execution, LogLevel::ActionOutput).is_empty());
    }

    #[tokio::test]
    async fn test_response_body_truncated_in_log() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(2000)))
            .mount(&server)
            .await;

        let workflow = workflow_with(vec![action(
            "fetch",
            ActionType::HttpEndpoint,
            json!({ "url": format!("{}/big", server.uri()) }),
        )]);
        let (_, execution) = run(workflow).await;

        let outputs = entries_at(&execution, LogLevel::ActionOutput);
        assert_eq!(outputs.len(), 1);
        assert!(outputs[0].message.len() < 700);
        assert!(outputs[0].message.ends_with("..."));
    }

    #[tokio::test]
    async fn test_finalize_on_panic_forces_failed_and_keeps_logs() {
        let mut execution = Execution::start(Uuid::now_v7(), Uuid::now_v7());
        execution
            .logs
            .push(LogEntry::new("collected before the panic", LogLevel::Info));

        let outcome = AssertUnwindSafe(async {
            panic!("action exploded");
            #[allow(unreachable_code)]
            ExecutionStatus::Completed
        })
        .catch_unwind()
        .await;
        assert!(outcome.is_err());

        finalize(&mut execution, outcome);

        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert!(execution.completed_at.is_some());
        assert_eq!(execution.logs[0].message, "collected before the panic");
        let last = execution.logs.last().unwrap();
        assert_eq!(last.status, LogLevel::Error);
        assert!(last.message.contains("action exploded"));
    }

    /// Store wrapper that counts lifecycle writes
    struct CountingStore {
        inner: InMemoryWorkflowStore,
        creates: AtomicUsize,
        updates: AtomicUsize,
    }

    #[async_trait]
    impl WorkflowStore for CountingStore {
        async fn save(&self, workflow: &Workflow) -> Result<(), StoreError> {
            self.inner.save(workflow).await
        }
        async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Workflow>, StoreError> {
            self.inner.list_by_user(user_id).await
        }
        async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Workflow, StoreError> {
            self.inner.get(user_id, id).await
        }
        async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
            self.inner.delete(user_id, id).await
        }
        async fn list_enabled_scheduled(&self) -> Result<Vec<Workflow>, StoreError> {
            self.inner.list_enabled_scheduled().await
        }
        async fn create_execution(&self, execution: &Execution) -> Result<(), StoreError> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            self.inner.create_execution(execution).await
        }
        async fn update_execution(&self, execution: &Execution) -> Result<(), StoreError> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            self.inner.update_execution(execution).await
        }
        async fn list_executions(
            &self,
            user_id: Uuid,
            workflow_id: Uuid,
        ) -> Result<Vec<Execution>, StoreError> {
            self.inner.list_executions(user_id, workflow_id).await
        }
    }

    #[tokio::test]
    async fn test_exactly_one_create_and_one_update_even_when_actions_fail() {
        let store = Arc::new(CountingStore {
            inner: InMemoryWorkflowStore::new(),
            creates: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
        });

        let workflow = workflow_with(vec![
            action("broken", ActionType::LogMessage, json!({})),
            action("mystery", ActionType::Unknown, json!({})),
            action("ok", ActionType::LogMessage, json!({ "message": "done" })),
        ]);
        store.save(&workflow).await.unwrap();
        let (user_id, workflow_id) = (workflow.user_id, workflow.id);

        execute_workflow(workflow, store.clone(), build_action_client().unwrap()).await;

        assert_eq!(store.creates.load(Ordering::SeqCst), 1);
        assert_eq!(store.updates.load(Ordering::SeqCst), 1);

        let executions = store.list_executions(user_id, workflow_id).await.unwrap();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].status, ExecutionStatus::Failed);
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("short", 500), "short");
        let long = "é".repeat(600);
        let truncated = truncate(&long, 500);
        assert_eq!(truncated.chars().count(), 503);
        assert!(truncated.ends_with("..."));
    }
}
