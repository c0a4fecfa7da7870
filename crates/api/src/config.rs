//! Environment-driven configuration.

use anyhow::Context;

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub mail_api_url: String,
    pub mail_api_token: String,
    pub mail_from: String,
}

impl ApiConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = std::env::var("SECRET_KEY").unwrap_or_else(|_| {
            tracing::warn!("SECRET_KEY not set; using insecure dev default");
            "dev-secret".to_string()
        });

        Ok(Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL is required")?,
            redis_url: std::env::var("REDIS_URL").context("REDIS_URL is required")?,
            jwt_secret,
            mail_api_url: std::env::var("MAIL_API_URL").context("MAIL_API_URL is required")?,
            mail_api_token: std::env::var("MAIL_API_TOKEN")
                .context("MAIL_API_TOKEN is required")?,
            mail_from: std::env::var("MAIL_FROM")
                .unwrap_or_else(|_| "no-reply@kardex.example".to_string()),
        })
    }
}
