// In-memory implementation of WorkflowStore
//
// Primarily for tests; provides the same semantics as the Postgres
// implementation, including the owner-scoped NotFound collapse and the
// delete cascade to executions.

use std::collections::HashMap;

use async_trait::async_trait;
use camshaft_core::{Execution, Workflow};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::{StoreError, WorkflowStore};

/// In-memory workflow store
#[derive(Default)]
pub struct InMemoryWorkflowStore {
    workflows: RwLock<HashMap<Uuid, Workflow>>,
    executions: RwLock<HashMap<Uuid, Execution>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored workflows
    pub async fn workflow_count(&self) -> usize {
        self.workflows.read().await.len()
    }

    /// Number of stored execution records, across all workflows
    pub async fn execution_count(&self) -> usize {
        self.executions.read().await.len()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn save(&self, workflow: &Workflow) -> Result<(), StoreError> {
        let mut workflows = self.workflows.write().await;
        let mut stored = workflow.clone();
        if let Some(existing) = workflows.get(&workflow.id) {
            stored.user_id = existing.user_id;
            stored.created_at = existing.created_at;
        }
        workflows.insert(stored.id, stored);
        Ok(())
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Workflow>, StoreError> {
        let workflows = self.workflows.read().await;
        let mut list: Vec<Workflow> = workflows
            .values()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Workflow, StoreError> {
        let workflows = self.workflows.read().await;
        workflows
            .get(&id)
            .filter(|w| w.user_id == user_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let mut workflows = self.workflows.write().await;
        let owned = workflows
            .get(&id)
            .map(|w| w.user_id == user_id)
            .unwrap_or(false);
        if !owned {
            return Ok(false);
        }
        workflows.remove(&id);

        let mut executions = self.executions.write().await;
        executions.retain(|_, e| e.workflow_id != id);
        Ok(true)
    }

    async fn list_enabled_scheduled(&self) -> Result<Vec<Workflow>, StoreError> {
        let workflows = self.workflows.read().await;
        Ok(workflows
            .values()
            .filter(|w| w.is_schedulable())
            .cloned()
            .collect())
    }

    async fn create_execution(&self, execution: &Execution) -> Result<(), StoreError> {
        let mut executions = self.executions.write().await;
        executions.insert(execution.id, execution.clone());
        Ok(())
    }

    async fn update_execution(&self, execution: &Execution) -> Result<(), StoreError> {
        let mut executions = self.executions.write().await;
        if !executions.contains_key(&execution.id) {
            return Err(StoreError::NotFound);
        }
        executions.insert(execution.id, execution.clone());
        Ok(())
    }

    async fn list_executions(
        &self,
        user_id: Uuid,
        workflow_id: Uuid,
    ) -> Result<Vec<Execution>, StoreError> {
        self.get(user_id, workflow_id).await?;

        let executions = self.executions.read().await;
        let mut list: Vec<Execution> = executions
            .values()
            .filter(|e| e.workflow_id == workflow_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camshaft_core::{ActionDefinition, ActionType, TriggerDefinition, TriggerType};
    use chrono::{Duration, Utc};
    use serde_json::{json, Map, Value};

    fn json_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected a JSON object"),
        }
    }

    fn sample_workflow(user_id: Uuid) -> Workflow {
        Workflow {
            id: Uuid::now_v7(),
            user_id,
            name: "daily_ping".to_string(),
            description: Some("pings the status page".to_string()),
            trigger: TriggerDefinition {
                trigger_type: TriggerType::Schedule,
                config: json_map(json!({ "cron": "*/1 * * * *" })),
            },
            actions: vec![ActionDefinition {
                name: "say-hi".to_string(),
                action_type: ActionType::LogMessage,
                config: json_map(json!({ "message": "tick" })),
                depends_on: None,
            }],
            is_enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_save_then_get_round_trips() {
        let store = InMemoryWorkflowStore::new();
        let workflow = sample_workflow(Uuid::now_v7());

        store.save(&workflow).await.unwrap();
        let fetched = store.get(workflow.user_id, workflow.id).await.unwrap();
        assert_eq!(fetched, workflow);
    }

    #[tokio::test]
    async fn test_upsert_preserves_owner_and_created_at() {
        let store = InMemoryWorkflowStore::new();
        let original = sample_workflow(Uuid::now_v7());
        store.save(&original).await.unwrap();

        let mut replacement = original.clone();
        replacement.name = "renamed".to_string();
        replacement.user_id = Uuid::now_v7();
        replacement.created_at = Utc::now() + Duration::hours(1);
        store.save(&replacement).await.unwrap();

        let fetched = store.get(original.user_id, original.id).await.unwrap();
        assert_eq!(fetched.name, "renamed");
        assert_eq!(fetched.user_id, original.user_id);
        assert_eq!(fetched.created_at, original.created_at);
    }

    #[tokio::test]
    async fn test_other_users_workflow_is_not_found() {
        let store = InMemoryWorkflowStore::new();
        let workflow = sample_workflow(Uuid::now_v7());
        store.save(&workflow).await.unwrap();

        let stranger = Uuid::now_v7();
        assert!(matches!(
            store.get(stranger, workflow.id).await,
            Err(StoreError::NotFound)
        ));
        assert!(!store.delete(stranger, workflow.id).await.unwrap());

        // Still present for the owner
        assert!(store.get(workflow.user_id, workflow.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_by_user_newest_first() {
        let store = InMemoryWorkflowStore::new();
        let user_id = Uuid::now_v7();

        let mut older = sample_workflow(user_id);
        older.created_at = Utc::now() - Duration::hours(2);
        let newer = sample_workflow(user_id);
        store.save(&older).await.unwrap();
        store.save(&newer).await.unwrap();
        store.save(&sample_workflow(Uuid::now_v7())).await.unwrap();

        let list = store.list_by_user(user_id).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, newer.id);
        assert_eq!(list[1].id, older.id);
    }

    #[tokio::test]
    async fn test_list_enabled_scheduled_filters() {
        let store = InMemoryWorkflowStore::new();

        let scheduled = sample_workflow(Uuid::now_v7());
        let mut disabled = sample_workflow(Uuid::now_v7());
        disabled.is_enabled = false;
        let mut webhook = sample_workflow(Uuid::now_v7());
        webhook.trigger.trigger_type = TriggerType::Webhook;

        store.save(&scheduled).await.unwrap();
        store.save(&disabled).await.unwrap();
        store.save(&webhook).await.unwrap();

        let list = store.list_enabled_scheduled().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, scheduled.id);
    }

    #[tokio::test]
    async fn test_delete_cascades_to_executions() {
        let store = InMemoryWorkflowStore::new();
        let workflow = sample_workflow(Uuid::now_v7());
        store.save(&workflow).await.unwrap();

        let execution = Execution::start(workflow.id, workflow.user_id);
        store.create_execution(&execution).await.unwrap();
        assert_eq!(store.execution_count().await, 1);

        assert!(store.delete(workflow.user_id, workflow.id).await.unwrap());
        assert_eq!(store.execution_count().await, 0);
    }

    #[tokio::test]
    async fn test_list_executions_distinguishes_missing_from_empty() {
        let store = InMemoryWorkflowStore::new();
        let workflow = sample_workflow(Uuid::now_v7());
        store.save(&workflow).await.unwrap();

        // Owned workflow, no runs yet: empty list
        let runs = store
            .list_executions(workflow.user_id, workflow.id)
            .await
            .unwrap();
        assert!(runs.is_empty());

        // Unknown workflow: NotFound
        assert!(matches!(
            store.list_executions(workflow.user_id, Uuid::now_v7()).await,
            Err(StoreError::NotFound)
        ));

        // Someone else's workflow: NotFound as well
        assert!(matches!(
            store.list_executions(Uuid::now_v7(), workflow.id).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_update_execution_requires_existing_row() {
        let store = InMemoryWorkflowStore::new();
        let execution = Execution::start(Uuid::now_v7(), Uuid::now_v7());
        assert!(matches!(
            store.update_execution(&execution).await,
            Err(StoreError::NotFound)
        ));
    }
}
