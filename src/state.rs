//! Shared application state, built once at startup and handed to every handler.

use axum::http::HeaderMap;
use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::request::authenticate_request;
use crate::config::AppConfig;
use crate::db::models::PublicUser;
use crate::db::users::{MemoryUserStore, PgUserStore, UserStore};
use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pool: Option<PgPool>,
    users: Arc<dyn UserStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig) -> Self {
        Self {
            users: Arc::new(PgUserStore::new(pool.clone())),
            pool: Some(pool),
            config: Arc::new(config),
        }
    }

    /// No database: accounts live in memory, every other resource answers 503.
    pub fn without_database(config: AppConfig) -> Self {
        Self::with_user_store(Arc::new(MemoryUserStore::new()), config)
    }

    pub fn with_user_store(users: Arc<dyn UserStore>, config: AppConfig) -> Self {
        Self {
            pool: None,
            users,
            config: Arc::new(config),
        }
    }

    pub fn pool(&self) -> Result<&PgPool, ApiError> {
        self.pool.as_ref().ok_or(ApiError::ServiceUnavailable)
    }

    pub fn pool_opt(&self) -> Option<&PgPool> {
        self.pool.as_ref()
    }

    pub fn users(&self) -> &dyn UserStore {
        self.users.as_ref()
    }

    /// Resolves the caller or fails with a 401.
    pub async fn current_user(&self, headers: &HeaderMap) -> Result<PublicUser, ApiError> {
        authenticate_request(headers, self.users(), &self.config.auth)
            .await
            .map_err(ApiError::from)
    }

    pub async fn require_admin(&self, headers: &HeaderMap) -> Result<PublicUser, ApiError> {
        let user = self.current_user(headers).await?;
        if !user.is_admin() {
            return Err(ApiError::forbidden());
        }
        Ok(user)
    }
}

#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    let mut config = AppConfig::from_env();
    config.auth = crate::auth::test_config();
    AppState::without_database(config)
}
