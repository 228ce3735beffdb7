// Orchestrator configuration loaded from environment variables

use anyhow::{Context, Result};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_AUTH_SERVICE_BASE_URL: &str = "http://localhost:5000/auth";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub auth_service_base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse().context("PORT must be a valid port number")?,
            Err(_) => DEFAULT_PORT,
        };

        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL environment variable required")?;

        let auth_service_base_url = std::env::var("AUTH_SERVICE_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_AUTH_SERVICE_BASE_URL.to_string());

        Ok(Self {
            port,
            database_url,
            auth_service_base_url,
        })
    }
}
