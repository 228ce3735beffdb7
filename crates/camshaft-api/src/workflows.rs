// Workflow CRUD and execution-history HTTP routes
//
// Every successful mutation ends with a scheduler reconcile so the cron
// wheel converges on the stored definitions.

use std::sync::Arc;

use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::get,
    routing::post,
    Json, Router,
};
use camshaft_core::{
    validate_workflow, ActionDefinition, Execution, TriggerDefinition, Workflow,
};
use camshaft_engine::Scheduler;
use camshaft_storage::WorkflowStore;
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::auth_client::AuthServiceClient;
use crate::error::ApiError;

/// App state shared across workflow routes
#[derive(Clone, FromRef)]
pub struct AppState {
    pub store: Arc<dyn WorkflowStore>,
    pub scheduler: Arc<Scheduler>,
    pub auth: AuthServiceClient,
}

/// Body for create and full-replacement update
#[derive(Debug, Deserialize, ToSchema)]
pub struct WorkflowRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub trigger: TriggerDefinition,
    pub actions: Vec<ActionDefinition>,
    #[serde(default)]
    pub is_enabled: bool,
}

/// Create workflow routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/tasks/v1/workflows",
            post(create_workflow).get(list_workflows),
        )
        .route(
            "/tasks/v1/workflows/:workflow_id",
            get(get_workflow)
                .put(update_workflow)
                .delete(delete_workflow),
        )
        .route(
            "/tasks/v1/workflows/:workflow_id/executions",
            get(list_workflow_executions),
        )
        .with_state(state)
}

/// Best effort: the mutation is already durable, a reconcile failure only
/// delays convergence until the next one.
async fn reconcile_after_mutation(scheduler: &Scheduler) {
    if let Err(err) = scheduler.reconcile().await {
        tracing::error!("scheduler reconcile after mutation failed: {}", err);
    }
}

/// POST /tasks/v1/workflows - Create a new workflow
#[utoipa::path(
    post,
    path = "/tasks/v1/workflows",
    request_body = WorkflowRequest,
    responses(
        (status = 201, description = "Workflow created successfully", body = Workflow),
        (status = 400, description = "Invalid workflow definition"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 500, description = "Internal server error")
    ),
    tag = "workflows"
)]
pub async fn create_workflow(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<WorkflowRequest>,
) -> Result<(StatusCode, Json<Workflow>), ApiError> {
    validate_workflow(&req.name, &req.trigger, &req.actions)?;

    let now = Utc::now();
    let workflow = Workflow {
        id: Uuid::now_v7(),
        user_id: user.user_id,
        name: req.name,
        description: req.description,
        trigger: req.trigger,
        actions: req.actions,
        is_enabled: req.is_enabled,
        created_at: now,
        updated_at: now,
    };

    state.store.save(&workflow).await?;
    reconcile_after_mutation(&state.scheduler).await;

    Ok((StatusCode::CREATED, Json(workflow)))
}

/// GET /tasks/v1/workflows - List the caller's workflows
#[utoipa::path(
    get,
    path = "/tasks/v1/workflows",
    responses(
        (status = 200, description = "Workflows owned by the caller, newest first", body = Vec<Workflow>),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 500, description = "Internal server error")
    ),
    tag = "workflows"
)]
pub async fn list_workflows(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Workflow>>, ApiError> {
    let workflows = state.store.list_by_user(user.user_id).await?;
    Ok(Json(workflows))
}

/// GET /tasks/v1/workflows/:workflow_id - Fetch one workflow
#[utoipa::path(
    get,
    path = "/tasks/v1/workflows/{workflow_id}",
    params(("workflow_id" = Uuid, Path, description = "Workflow ID")),
    responses(
        (status = 200, description = "Workflow found", body = Workflow),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "Workflow not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "workflows"
)]
pub async fn get_workflow(
    State(state): State<AppState>,
    user: AuthUser,
    Path(workflow_id): Path<Uuid>,
) -> Result<Json<Workflow>, ApiError> {
    let workflow = state.store.get(user.user_id, workflow_id).await?;
    Ok(Json(workflow))
}

/// PUT /tasks/v1/workflows/:workflow_id - Replace a workflow definition
#[utoipa::path(
    put,
    path = "/tasks/v1/workflows/{workflow_id}",
    params(("workflow_id" = Uuid, Path, description = "Workflow ID")),
    request_body = WorkflowRequest,
    responses(
        (status = 200, description = "Workflow updated successfully", body = Workflow),
        (status = 400, description = "Invalid workflow definition"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "Workflow not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "workflows"
)]
pub async fn update_workflow(
    State(state): State<AppState>,
    user: AuthUser,
    Path(workflow_id): Path<Uuid>,
    Json(req): Json<WorkflowRequest>,
) -> Result<Json<Workflow>, ApiError> {
    validate_workflow(&req.name, &req.trigger, &req.actions)?;

    let existing = state.store.get(user.user_id, workflow_id).await?;

    // Full replacement; id, owner and creation time survive
    let workflow = Workflow {
        id: existing.id,
        user_id: existing.user_id,
        name: req.name,
        description: req.description,
        trigger: req.trigger,
        actions: req.actions,
        is_enabled: req.is_enabled,
        created_at: existing.created_at,
        updated_at: Utc::now(),
    };

    state.store.save(&workflow).await?;
    reconcile_after_mutation(&state.scheduler).await;

    Ok(Json(workflow))
}

/// DELETE /tasks/v1/workflows/:workflow_id - Delete a workflow
#[utoipa::path(
    delete,
    path = "/tasks/v1/workflows/{workflow_id}",
    params(("workflow_id" = Uuid, Path, description = "Workflow ID")),
    responses(
        (status = 204, description = "Workflow deleted"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "Workflow not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "workflows"
)]
pub async fn delete_workflow(
    State(state): State<AppState>,
    user: AuthUser,
    Path(workflow_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let deleted = state.store.delete(user.user_id, workflow_id).await?;
    if !deleted {
        return Err(ApiError::NotFound);
    }

    reconcile_after_mutation(&state.scheduler).await;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /tasks/v1/workflows/:workflow_id/executions - Execution history
#[utoipa::path(
    get,
    path = "/tasks/v1/workflows/{workflow_id}/executions",
    params(("workflow_id" = Uuid, Path, description = "Workflow ID")),
    responses(
        (status = 200, description = "Executions, newest first", body = Vec<Execution>),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "Workflow not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "workflows"
)]
pub async fn list_workflow_executions(
    State(state): State<AppState>,
    user: AuthUser,
    Path(workflow_id): Path<Uuid>,
) -> Result<Json<Vec<Execution>>, ApiError> {
    let executions = state.store.list_executions(user.user_id, workflow_id).await?;
    Ok(Json(executions))
}
