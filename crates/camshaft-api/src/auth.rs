// Auth gate: bearer-token extractor for protected routes
//
// Every failure mode (missing header, wrong scheme, unreachable oracle,
// rejected token) collapses to a 401; the distinction only shows up in the
// operator log.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::auth_client::{AuthServiceClient, TokenValidationError};

/// Authentication error returned as `{"error": ...}` with a 401
#[derive(Debug, Clone, Serialize)]
pub struct AuthError {
    pub error: String,
}

impl AuthError {
    pub fn unauthorized(message: &str) -> Self {
        Self {
            error: message.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, Json(self)).into_response()
    }
}

/// Authenticated identity attached to the request
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AuthServiceClient: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let client = AuthServiceClient::from_ref(state);

        let value = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AuthError::unauthorized("Authorization header required"))?
            .to_str()
            .map_err(|_| AuthError::unauthorized("Invalid authorization header"))?;

        let token = value.strip_prefix("Bearer ").ok_or_else(|| {
            AuthError::unauthorized("Authorization header format must be Bearer {token}")
        })?;

        match client.validate_token(token).await {
            Ok(identity) => Ok(AuthUser {
                user_id: identity.user_id,
                username: identity.username,
            }),
            Err(err @ TokenValidationError::Unreachable(_)) => {
                tracing::error!("token oracle unreachable: {}", err);
                Err(AuthError::unauthorized("Token validation failed"))
            }
            Err(err) => {
                tracing::warn!("token rejected: {}", err);
                Err(AuthError::unauthorized("Invalid token"))
            }
        }
    }
}
