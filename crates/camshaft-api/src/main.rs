// Camshaft orchestrator service
//
// Workflow CRUD behind the auth gate, plus the cron scheduler that executes
// them. Auth is delegated to the identity service on every request.

mod auth;
mod auth_client;
mod config;
mod error;
mod workflows;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{routing::get, Json, Router};
use camshaft_core::{
    ActionDefinition, ActionType, Execution, ExecutionStatus, LogEntry, LogLevel,
    TriggerDefinition, TriggerType, Workflow,
};
use camshaft_engine::{build_action_client, Scheduler};
use camshaft_storage::{connect, run_migrations, PgWorkflowStore, WorkflowStore};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth_client::AuthServiceClient;
use crate::config::Config;
use crate::workflows::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        workflows::create_workflow,
        workflows::list_workflows,
        workflows::get_workflow,
        workflows::update_workflow,
        workflows::delete_workflow,
        workflows::list_workflow_executions,
    ),
    components(
        schemas(
            Workflow,
            TriggerDefinition,
            TriggerType,
            ActionDefinition,
            ActionType,
            Execution,
            ExecutionStatus,
            LogEntry,
            LogLevel,
            workflows::WorkflowRequest,
        )
    ),
    tags(
        (name = "workflows", description = "Workflow management and execution history")
    ),
    info(
        title = "Camshaft Orchestrator API",
        version = "0.1.0",
        description = "Multi-tenant workflow orchestration",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "camshaft_api=debug,camshaft_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Connected to database");

    let store: Arc<dyn WorkflowStore> = Arc::new(PgWorkflowStore::new(pool));

    let action_client = build_action_client().context("Failed to build action HTTP client")?;
    let scheduler = Arc::new(
        Scheduler::new(store.clone(), action_client)
            .await
            .context("Failed to create scheduler")?,
    );
    scheduler
        .start()
        .await
        .context("Failed to start scheduler")?;

    let auth = AuthServiceClient::new(config.auth_service_base_url.clone())
        .context("Failed to build auth service client")?;

    let state = AppState {
        store,
        scheduler: scheduler.clone(),
        auth,
    };

    let app = Router::new()
        .route("/health", get(health))
        .merge(workflows::routes(state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Orchestrator listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // New firings are fenced off; in-flight executions finish their records
    scheduler.stop().await.context("Failed to stop scheduler")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", err);
    }
}
