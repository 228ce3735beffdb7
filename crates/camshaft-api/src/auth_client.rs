// Token oracle client
//
// The orchestrator never inspects tokens itself; it forwards them to the
// identity service's validate_token endpoint and trusts the answer.

use std::time::Duration;

use serde::Deserialize;
use uuid::Uuid;

/// Total timeout for one token-oracle call
pub const TOKEN_ORACLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Identity resolved from a bearer token
#[derive(Debug, Clone)]
pub struct AuthIdentity {
    pub user_id: Uuid,
    pub username: String,
}

/// Why a token could not be resolved
///
/// Callers collapse every variant into a single 401 for the user; the
/// variants exist so operators can tell an unreachable identity service from
/// a genuinely rejected token in the logs.
#[derive(Debug, thiserror::Error)]
pub enum TokenValidationError {
    #[error("auth service unreachable: {0}")]
    Unreachable(String),

    #[error("token rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Deserialize)]
struct ValidateTokenResponse {
    valid: bool,
    user_id: Option<Uuid>,
    username: Option<String>,
    error: Option<String>,
}

/// Stateless HTTP client against the identity service
#[derive(Clone)]
pub struct AuthServiceClient {
    http: reqwest::Client,
    base_url: String,
}

impl AuthServiceClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(TOKEN_ORACLE_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    /// Resolve a bearer token to an identity
    ///
    /// The token is forwarded unchanged in the Authorization header.
    pub async fn validate_token(&self, token: &str) -> Result<AuthIdentity, TokenValidationError> {
        let url = format!("{}/validate_token", self.base_url);

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, format!("Bearer {token}"))
            .send()
            .await
            .map_err(|err| TokenValidationError::Unreachable(err.to_string()))?;

        let status = response.status();
        let body: ValidateTokenResponse = response
            .json()
            .await
            .map_err(|err| TokenValidationError::Rejected(format!("unreadable response: {err}")))?;

        if !status.is_success() || !body.valid {
            let reason = body
                .error
                .unwrap_or_else(|| format!("auth service answered status {}", status.as_u16()));
            return Err(TokenValidationError::Rejected(reason));
        }

        match (body.user_id, body.username) {
            (Some(user_id), Some(username)) => Ok(AuthIdentity { user_id, username }),
            _ => Err(TokenValidationError::Rejected(
                "auth service response missing identity fields".to_string(),
            )),
        }
    }
}
