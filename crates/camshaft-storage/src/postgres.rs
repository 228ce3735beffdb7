// Postgres-backed WorkflowStore over sqlx

use async_trait::async_trait;
use camshaft_core::{Execution, ExecutionStatus, LogEntry, Workflow};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::store::{StoreError, WorkflowStore};

/// Open a connection pool against `database_url`
pub async fn connect(database_url: &str) -> Result<PgPool, StoreError> {
    let pool = PgPool::connect(database_url).await?;
    Ok(pool)
}

/// Create the orchestrator tables if they do not exist yet
///
/// Idempotent; the binary runs this on every boot.
pub async fn run_migrations(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS workflows (
            id UUID PRIMARY KEY,
            user_id UUID NOT NULL,
            name VARCHAR(255) NOT NULL,
            description TEXT,
            trigger JSONB NOT NULL,
            actions JSONB NOT NULL,
            is_enabled BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS workflow_executions (
            id UUID PRIMARY KEY,
            workflow_id UUID NOT NULL REFERENCES workflows(id) ON DELETE CASCADE,
            user_id UUID NOT NULL,
            status VARCHAR(32) NOT NULL,
            triggered_at TIMESTAMPTZ NOT NULL,
            completed_at TIMESTAMPTZ,
            logs JSONB NOT NULL DEFAULT '[]'::jsonb
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("orchestrator migrations complete");
    Ok(())
}

#[derive(Debug, Clone, FromRow)]
struct WorkflowRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    description: Option<String>,
    trigger: serde_json::Value,
    actions: serde_json::Value,
    is_enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WorkflowRow {
    fn into_workflow(self) -> Result<Workflow, StoreError> {
        Ok(Workflow {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            description: self.description,
            trigger: serde_json::from_value(self.trigger)?,
            actions: serde_json::from_value(self.actions)?,
            is_enabled: self.is_enabled,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
struct ExecutionRow {
    id: Uuid,
    workflow_id: Uuid,
    user_id: Uuid,
    status: String,
    triggered_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    logs: serde_json::Value,
}

impl ExecutionRow {
    fn into_execution(self) -> Result<Execution, StoreError> {
        let status: ExecutionStatus = self.status.parse().map_err(StoreError::Serialization)?;
        let logs: Vec<LogEntry> = serde_json::from_value(self.logs)?;

        Ok(Execution {
            id: self.id,
            workflow_id: self.workflow_id,
            user_id: self.user_id,
            status,
            triggered_at: self.triggered_at,
            completed_at: self.completed_at,
            logs,
        })
    }
}

/// Postgres-backed workflow store
#[derive(Clone)]
pub struct PgWorkflowStore {
    pool: PgPool,
}

impl PgWorkflowStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl WorkflowStore for PgWorkflowStore {
    async fn save(&self, workflow: &Workflow) -> Result<(), StoreError> {
        let trigger = serde_json::to_value(&workflow.trigger)?;
        let actions = serde_json::to_value(&workflow.actions)?;

        sqlx::query(
            r#"
            INSERT INTO workflows (id, user_id, name, description, trigger, actions, is_enabled, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                trigger = EXCLUDED.trigger,
                actions = EXCLUDED.actions,
                is_enabled = EXCLUDED.is_enabled,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(workflow.id)
        .bind(workflow.user_id)
        .bind(&workflow.name)
        .bind(&workflow.description)
        .bind(&trigger)
        .bind(&actions)
        .bind(workflow.is_enabled)
        .bind(workflow.created_at)
        .bind(workflow.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Workflow>, StoreError> {
        let rows = sqlx::query_as::<_, WorkflowRow>(
            r#"
            SELECT id, user_id, name, description, trigger, actions, is_enabled, created_at, updated_at
            FROM workflows
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(WorkflowRow::into_workflow).collect()
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Workflow, StoreError> {
        let row = sqlx::query_as::<_, WorkflowRow>(
            r#"
            SELECT id, user_id, name, description, trigger, actions, is_enabled, created_at, updated_at
            FROM workflows
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;

        row.into_workflow()
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_enabled_scheduled(&self) -> Result<Vec<Workflow>, StoreError> {
        let rows = sqlx::query_as::<_, WorkflowRow>(
            r#"
            SELECT id, user_id, name, description, trigger, actions, is_enabled, created_at, updated_at
            FROM workflows
            WHERE is_enabled = TRUE AND trigger->>'type' = 'schedule'
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(WorkflowRow::into_workflow).collect()
    }

    async fn create_execution(&self, execution: &Execution) -> Result<(), StoreError> {
        let logs = serde_json::to_value(&execution.logs)?;

        sqlx::query(
            r#"
            INSERT INTO workflow_executions (id, workflow_id, user_id, status, triggered_at, completed_at, logs)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(execution.id)
        .bind(execution.workflow_id)
        .bind(execution.user_id)
        .bind(execution.status.to_string())
        .bind(execution.triggered_at)
        .bind(execution.completed_at)
        .bind(&logs)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_execution(&self, execution: &Execution) -> Result<(), StoreError> {
        let logs = serde_json::to_value(&execution.logs)?;

        let result = sqlx::query(
            "UPDATE workflow_executions SET status = $2, completed_at = $3, logs = $4 WHERE id = $1",
        )
        .bind(execution.id)
        .bind(execution.status.to_string())
        .bind(execution.completed_at)
        .bind(&logs)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_executions(
        &self,
        user_id: Uuid,
        workflow_id: Uuid,
    ) -> Result<Vec<Execution>, StoreError> {
        // Owner check first so "not yours" and "does not exist" collapse into
        // the same NotFound, distinct from "no runs yet".
        self.get(user_id, workflow_id).await?;

        let rows = sqlx::query_as::<_, ExecutionRow>(
            r#"
            SELECT id, workflow_id, user_id, status, triggered_at, completed_at, logs
            FROM workflow_executions
            WHERE workflow_id = $1
            ORDER BY triggered_at DESC
            "#,
        )
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ExecutionRow::into_execution).collect()
    }
}
