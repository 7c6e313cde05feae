//! Application configuration loaded from the environment (and `.env`).

use std::{env, fmt::Display, str::FromStr};

/// Fallback signing secret. Only acceptable for local development.
pub const DEFAULT_JWT_SECRET: &str = "furry-gallery-dev-secret-change-me";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub database: DbConfig,
    pub auth: AuthConfig,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub bcrypt_cost: u32,
    pub cookie_name: String,
    pub legacy_cookie_name: String,
    pub secure_cookies: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = var_or("ENVIRONMENT", "development");
        let is_production = environment == "production";

        let config = Self {
            host: var_or("HOST", "127.0.0.1"),
            port: parse_or("PORT", 3001),
            database: DbConfig::from_env(),
            auth: AuthConfig::from_env(is_production),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", 20 * 1024 * 1024),
            environment,
        };

        if config.is_production() && config.auth.jwt_secret == DEFAULT_JWT_SECRET {
            tracing::warn!(
                "SECURITY: JWT_SECRET is not set, tokens are signed with the built-in default secret"
            );
        }

        config
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl DbConfig {
    /// Prefers `DATABASE_URL`; otherwise assembles the URL from the `DB_*` parts.
    pub fn from_env() -> Self {
        let url = env::var("DATABASE_URL").unwrap_or_else(|_| {
            format!(
                "postgresql://{}:{}@{}:{}/{}",
                var_or("DB_USER", "postgres"),
                var_or("DB_PASSWORD", "postgres"),
                var_or("DB_HOST", "localhost"),
                parse_or::<u16>("DB_PORT", 5432),
                var_or("DB_NAME", "furry_gallery"),
            )
        });

        Self {
            url,
            max_connections: parse_or("DB_POOL_MAX", 10),
            min_connections: parse_or("DB_POOL_MIN", 2),
            connect_timeout_secs: parse_or("DB_CONNECT_TIMEOUT", 10),
            idle_timeout_secs: parse_or("DB_IDLE_TIMEOUT", 300),
        }
    }

    /// True when the operator configured a database explicitly.
    pub fn is_configured() -> bool {
        env::var("DATABASE_URL").is_ok() || env::var("DB_HOST").is_ok()
    }
}

impl AuthConfig {
    pub fn from_env(is_production: bool) -> Self {
        Self {
            jwt_secret: var_or("JWT_SECRET", DEFAULT_JWT_SECRET),
            token_ttl_hours: parse_or("JWT_EXPIRES_IN_HOURS", 24 * 7),
            bcrypt_cost: parse_or("BCRYPT_COST", 10),
            cookie_name: var_or("AUTH_COOKIE_NAME", "auth_token"),
            legacy_cookie_name: "token".to_string(),
            secure_cookies: is_production,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            token_ttl_hours: 24 * 7,
            bcrypt_cost: 10,
            cookie_name: "auth_token".to_string(),
            legacy_cookie_name: "token".to_string(),
            secure_cookies: false,
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|e| {
            tracing::warn!("Invalid {key} value {raw:?}: {e}; using default {default}");
            default
        }),
        Err(_) => default,
    }
}
