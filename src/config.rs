use anyhow::{Context, Result};

use crate::oplog::OpLogTarget;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite connection string, e.g. "sqlite:./shorthop.db"
    pub database_url: String,

    /// Host to bind the HTTP server to, e.g. "0.0.0.0"
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Public base URL used when rendering short links, e.g. "https://sho.rt"
    /// Must NOT have a trailing slash.
    pub base_url: String,

    /// Remote operator-log endpoint; entries stay local when unset.
    pub oplog: Option<OpLogTarget>,
}

impl AppConfig {
    /// Load configuration from environment variables (populated by dotenvy before this is called).
    pub fn from_env() -> Result<Self> {
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "5000".into())
            .parse::<u16>()
            .context("PORT must be a valid port number (1–65535)")?;

        let base_url = std::env::var("BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_owned();

        // Both endpoint and token are required for remote shipping; a
        // leading "Bearer " on the token is tolerated and stripped.
        let oplog = match (std::env::var("LOG_ENDPOINT"), std::env::var("LOG_BEARER_TOKEN")) {
            (Ok(endpoint), Ok(token)) if !token.trim().is_empty() => Some(OpLogTarget {
                endpoint,
                bearer_token: token
                    .trim()
                    .strip_prefix("Bearer ")
                    .unwrap_or(token.trim())
                    .to_owned(),
            }),
            _ => None,
        };

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./shorthop.db".into()),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            base_url,
            oplog,
        })
    }
}
