// Workflow definitions: a trigger plus an ordered list of actions
// Decision: trigger/action config stays a free-form JSON map so unknown keys
// survive the JSONB round trip; the engine projects it into typed structs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use uuid::Uuid;

/// Condition under which a workflow runs
///
/// `Unknown` absorbs discriminants this build does not know; the API
/// validator rejects it, so it never reaches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// Cron-driven; `config.cron` holds the expression
    Schedule,
    /// Reserved for inbound-webhook delivery; never scheduled
    Webhook,
    /// Unrecognized discriminant
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Schedule => write!(f, "schedule"),
            Self::Webhook => write!(f, "webhook"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// One step of a workflow
///
/// `Unknown` absorbs discriminants written by newer builds: the API validator
/// rejects it on input, and the executor fails the action at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Append `config.message` to the execution log
    LogMessage,
    /// Call `config.url` with bounded network I/O
    HttpEndpoint,
    /// Unrecognized discriminant
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LogMessage => write!(f, "log_message"),
            Self::HttpEndpoint => write!(f, "http_endpoint"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Trigger definition: a tagged type plus free-form configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TriggerDefinition {
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub config: Map<String, Value>,
}

impl TriggerDefinition {
    /// Cron expression for schedule triggers, if present and a string
    pub fn cron_spec(&self) -> Option<&str> {
        self.config.get("cron").and_then(Value::as_str)
    }
}

/// Action definition: a tagged type, a step name, and free-form configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ActionDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub config: Map<String, Value>,
    /// Reserved: accepted and persisted, never interpreted. Execution order
    /// is list order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Vec<String>>,
}

/// A user-owned automation definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Workflow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub trigger: TriggerDefinition,
    pub actions: Vec<ActionDefinition>,
    pub is_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Whether the scheduler should consider this workflow at reconcile time
    pub fn is_schedulable(&self) -> bool {
        self.is_enabled && self.trigger.trigger_type == TriggerType::Schedule
    }
}
