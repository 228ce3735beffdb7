// WorkflowStore trait definition
//
// Implementations must be safe for concurrent use: the API mutates workflows
// while the scheduler reads the enabled set and the executor writes
// execution records.

use async_trait::async_trait;
use camshaft_core::{Execution, Workflow};
use uuid::Uuid;

/// Error type for store operations
///
/// `NotFound` is an expected absence (or an owner mismatch, which callers
/// must not be able to distinguish); everything else is a backend failure,
/// retryable at the caller's discretion.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            other => StoreError::Database(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Durable, owner-scoped repository for workflows and execution records
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Upsert by id. On conflict everything except `id`, `user_id`, and
    /// `created_at` is replaced.
    async fn save(&self, workflow: &Workflow) -> Result<(), StoreError>;

    /// All workflows owned by `user_id`, newest first. Empty when none.
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Workflow>, StoreError>;

    /// One workflow by `(id, user_id)`. Another user's workflow is
    /// indistinguishable from a nonexistent one.
    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Workflow, StoreError>;

    /// Remove by `(id, user_id)`. True iff a row was deleted.
    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError>;

    /// All enabled workflows with a schedule trigger, across all users.
    /// The scheduler's only non-owner-scoped read.
    async fn list_enabled_scheduled(&self) -> Result<Vec<Workflow>, StoreError>;

    /// Insert the initial `running` record for a dispatch.
    async fn create_execution(&self, execution: &Execution) -> Result<(), StoreError>;

    /// Write the terminal status, `completed_at`, and captured logs.
    async fn update_execution(&self, execution: &Execution) -> Result<(), StoreError>;

    /// Execution history for a workflow the caller owns, newest first.
    /// `NotFound` when the workflow does not exist or belongs to someone
    /// else; an owned workflow with no runs yields an empty list.
    async fn list_executions(
        &self,
        user_id: Uuid,
        workflow_id: Uuid,
    ) -> Result<Vec<Execution>, StoreError>;
}
