use std::env;

use crate::error::AppError;

/// Runtime configuration, read once at startup. A missing secret or
/// database URL is a fatal configuration error, never a request-time one.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_name: String,
    pub jwt_secret: String,
    pub refresh_secret: String,
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| AppError::Config("DATABASE_URL must be set".to_string()))?;
        let database_name =
            env::var("DATABASE_NAME").unwrap_or_else(|_| "storefront".to_string());
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| AppError::Config("JWT_SECRET must be set".to_string()))?;
        // Refresh tokens may be signed with a distinct secret; default to the
        // access-token secret when none is configured.
        let refresh_secret =
            env::var("REFRESH_SECRET").unwrap_or_else(|_| jwt_secret.clone());
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

        Ok(Config {
            database_url,
            database_name,
            jwt_secret,
            refresh_secret,
            bind_addr,
        })
    }
}
