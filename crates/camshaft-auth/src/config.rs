// Identity service configuration loaded from environment variables

use anyhow::{Context, Result};
use chrono::Duration;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_JWT_EXPIRATION_MINUTES: i64 = 15;
pub const DEFAULT_REFRESH_TOKEN_EXPIRATION_HOURS: i64 = 168;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret_key: String,
    pub jwt_expiration: Duration,
    /// Reserved for refresh tokens; parsed but not yet consumed
    #[allow(dead_code)]
    pub refresh_token_expiration: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse().context("PORT must be a valid port number")?,
            Err(_) => DEFAULT_PORT,
        };

        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL environment variable required")?;

        let jwt_secret_key = std::env::var("JWT_SECRET_KEY").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET_KEY not set, using insecure default");
            "insecure-dev-secret-change-me".to_string()
        });

        let jwt_expiration_minutes = std::env::var("JWT_EXPIRATION_MINUTES")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_JWT_EXPIRATION_MINUTES);

        let refresh_expiration_hours = std::env::var("REFRESH_TOKEN_EXPIRATION_HOURS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_REFRESH_TOKEN_EXPIRATION_HOURS);

        Ok(Self {
            port,
            database_url,
            jwt_secret_key,
            jwt_expiration: Duration::minutes(jwt_expiration_minutes),
            refresh_token_expiration: Duration::hours(refresh_expiration_hours),
        })
    }
}
