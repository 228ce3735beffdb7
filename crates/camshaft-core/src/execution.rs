// Execution records: the durable outcome of one workflow run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle of an execution record
///
/// The only legal transitions are `running -> completed` and
/// `running -> failed`; terminal records are never mutated again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown execution status: {other}")),
        }
    }
}

/// Severity tag on a captured log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    ActionOutput,
}

/// One line of an execution's captured log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub status: LogLevel,
}

impl LogEntry {
    pub fn new(message: impl Into<String>, status: LogLevel) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
            status,
        }
    }
}

/// A durable record of one run of one workflow
///
/// `user_id` is denormalized from the workflow at dispatch time so history
/// queries stay owner-scoped without a join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Execution {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub user_id: Uuid,
    pub status: ExecutionStatus,
    pub triggered_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub logs: Vec<LogEntry>,
}

impl Execution {
    /// A fresh `running` record for a dispatch of `workflow_id`
    pub fn start(workflow_id: Uuid, user_id: Uuid) -> Self {
        Self {
            id: Uuid::now_v7(),
            workflow_id,
            user_id,
            status: ExecutionStatus::Running,
            triggered_at: Utc::now(),
            completed_at: None,
            logs: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_log_level_wire_names() {
        assert_eq!(serde_json::to_value(LogLevel::Info).unwrap(), json!("INFO"));
        assert_eq!(
            serde_json::to_value(LogLevel::ActionOutput).unwrap(),
            json!("ACTION_OUTPUT")
        );
        let parsed: LogLevel = serde_json::from_value(json!("WARNING")).unwrap();
        assert_eq!(parsed, LogLevel::Warning);
    }

    #[test]
    fn test_execution_status_wire_names() {
        assert_eq!(
            serde_json::to_value(ExecutionStatus::Running).unwrap(),
            json!("running")
        );
        assert_eq!(ExecutionStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_start_is_running_without_completed_at() {
        let execution = Execution::start(Uuid::now_v7(), Uuid::now_v7());
        assert_eq!(execution.status, ExecutionStatus::Running);
        assert!(execution.completed_at.is_none());
        assert!(execution.logs.is_empty());
    }
}
