// Camshaft identity service
//
// Issues HS256 bearer tokens and resolves them for the orchestrator via the
// validate_token oracle endpoint.

mod config;
mod error;
mod jwt;
mod password;
mod routes;
mod store;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{routing::get, Json, Router};
use serde::Serialize;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::jwt::TokenService;
use crate::routes::AppState;
use crate::store::{run_migrations, PgUserStore, UserStore};

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
        routes::register,
        routes::login,
        routes::validate_token,
        routes::me,
    ),
    components(
        schemas(
            routes::RegisterRequest,
            routes::RegisterResponse,
            routes::LoginRequest,
            routes::LoginResponse,
            routes::ValidateTokenResponse,
            routes::UserResponse,
        )
    ),
    tags(
        (name = "auth", description = "Registration, login, and token validation"),
        (name = "users", description = "User profile endpoints")
    ),
    info(
        title = "Camshaft Identity API",
        version = "0.1.0",
        description = "Bearer token issuance and validation",
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
                .unwrap_or_else(|_| "camshaft_auth=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = PgPool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Connected to database");

    let store: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool));
    let tokens = TokenService::new(&config.jwt_secret_key, config.jwt_expiration);

    let state = AppState { store, tokens };

    let app = Router::new()
        .route("/health", get(health))
        .merge(routes::routes(state))
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
    tracing::info!("Identity service listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
