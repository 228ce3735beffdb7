// Identity HTTP routes: registration, login, the token oracle, and the
// current-user endpoint

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts, State},
    http::{header, request::Parts, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::jwt::{Claims, TokenService};
use crate::password::{hash_password, verify_password};
use crate::store::{User, UserStore};

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 50;
pub const PASSWORD_MIN_LEN: usize = 8;

/// App state shared across identity routes
#[derive(Clone, FromRef)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub tokens: TokenService,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ValidateTokenResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

/// Claims extracted from a locally validated bearer token
#[derive(Debug, Clone)]
pub struct AuthSession(pub Claims);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = TokenService::from_ref(state);
        let token = bearer_token(parts)?;
        let claims = tokens.validate(token).map_err(|err| {
            tracing::debug!("token validation failed: {}", err);
            ApiError::Unauthorized("Invalid or expired token".to_string())
        })?;
        Ok(AuthSession(claims))
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let value = parts
        .headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::Unauthorized("Authorization header required".to_string()))?
        .to_str()
        .map_err(|_| ApiError::Unauthorized("Invalid authorization header".to_string()))?;

    value.strip_prefix("Bearer ").ok_or_else(|| {
        ApiError::Unauthorized("Authorization header format must be Bearer {token}".to_string())
    })
}

/// Create identity routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/validate_token", post(validate_token))
        .route("/users/me", get(me))
        .with_state(state)
}

fn validate_registration(req: &RegisterRequest) -> Result<(), ApiError> {
    let username_len = req.username.chars().count();
    if username_len < USERNAME_MIN_LEN || username_len > USERNAME_MAX_LEN {
        return Err(ApiError::Validation(format!(
            "username must be between {USERNAME_MIN_LEN} and {USERNAME_MAX_LEN} characters"
        )));
    }
    // Full RFC 5322 parsing buys nothing here; uniqueness is what matters
    let email = req.email.trim();
    if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err(ApiError::Validation("email is not valid".to_string()));
    }
    if req.password.chars().count() < PASSWORD_MIN_LEN {
        return Err(ApiError::Validation(format!(
            "password must be at least {PASSWORD_MIN_LEN} characters"
        )));
    }
    Ok(())
}

/// POST /auth/register - Register a new user
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = RegisterResponse),
        (status = 400, description = "Invalid registration payload"),
        (status = 409, description = "Username or email already taken"),
        (status = 500, description = "Internal server error")
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    validate_registration(&req)?;

    if state.store.find_by_email(&req.email).await?.is_some() {
        return Err(ApiError::Conflict(
            "User with this email already exists".to_string(),
        ));
    }
    if state.store.find_by_username(&req.username).await?.is_some() {
        return Err(ApiError::Conflict(
            "User with this username already exists".to_string(),
        ));
    }

    let password_hash = hash_password(&req.password).map_err(|err| {
        tracing::error!("password hashing failed: {}", err);
        ApiError::Internal
    })?;

    let now = Utc::now();
    let user = User {
        id: Uuid::now_v7(),
        username: req.username,
        email: req.email,
        password_hash,
        created_at: now,
        updated_at: now,
    };
    state.store.create(&user).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".to_string(),
            user_id: user.id,
        }),
    ))
}

/// POST /auth/login - Exchange credentials for an access token
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Access token issued", body = LoginResponse),
        (status = 401, description = "Invalid email or password"),
        (status = 500, description = "Internal server error")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    // Unknown email and wrong password are indistinguishable on purpose
    let rejected = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = state
        .store
        .find_by_email(&req.email)
        .await?
        .ok_or_else(rejected)?;

    let valid = verify_password(&req.password, &user.password_hash).map_err(|err| {
        tracing::error!("password verification failed: {}", err);
        ApiError::Internal
    })?;
    if !valid {
        return Err(rejected());
    }

    let access_token = state
        .tokens
        .generate(user.id, &user.username)
        .map_err(|err| {
            tracing::error!("token generation failed: {}", err);
            ApiError::Internal
        })?;

    Ok(Json(LoginResponse { access_token }))
}

/// POST /auth/validate_token - Token oracle for other services
#[utoipa::path(
    post,
    path = "/auth/validate_token",
    responses(
        (status = 200, description = "Token is valid", body = ValidateTokenResponse),
        (status = 401, description = "Token is missing or invalid", body = ValidateTokenResponse)
    ),
    tag = "auth"
)]
pub async fn validate_token(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> (StatusCode, Json<ValidateTokenResponse>) {
    let rejected = |reason: String| {
        (
            StatusCode::UNAUTHORIZED,
            Json(ValidateTokenResponse {
                valid: false,
                user_id: None,
                username: None,
                error: Some(reason),
            }),
        )
    };

    let value = match headers.get(header::AUTHORIZATION).map(|v| v.to_str()) {
        Some(Ok(value)) => value,
        Some(Err(_)) => return rejected("Invalid authorization header".to_string()),
        None => return rejected("Authorization header required".to_string()),
    };
    let token = match value.strip_prefix("Bearer ") {
        Some(token) => token,
        None => return rejected("Bearer token required".to_string()),
    };

    match state.tokens.validate(token) {
        Ok(claims) => (
            StatusCode::OK,
            Json(ValidateTokenResponse {
                valid: true,
                user_id: Some(claims.user_id),
                username: Some(claims.username),
                error: None,
            }),
        ),
        Err(err) => rejected(err.to_string()),
    }
}

/// GET /users/me - Profile of the authenticated user
#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "User no longer exists"),
        (status = 500, description = "Internal server error")
    ),
    tag = "users"
)]
pub async fn me(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .store
        .find_by_id(session.0.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(UserResponse {
        id: user.id,
        username: user.username,
        email: user.email,
    }))
}
