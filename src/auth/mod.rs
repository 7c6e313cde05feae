/*!
 * Auth Module
 * Password hashing, signed session tokens and account operations.
 *
 * Account operations return `Result<_, AuthFailure>`; the handlers turn a
 * failure into the matching HTTP status via `ApiError`.
 */
pub mod request;

use bcrypt::BcryptError;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AuthConfig;
use crate::db::models::{NewUser, PublicUser};
use crate::db::users::UserStore;
use crate::error::ApiError;
use crate::validation;

// ============================================================================
// Types
// ============================================================================

/// Identity carried inside a session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub user_id: i32,
    pub username: String,
    pub email: String,
    pub role: String,
    pub photographer_id: Option<i32>,
    pub organizer_id: Option<i32>,
}

impl From<&PublicUser> for TokenPayload {
    fn from(user: &PublicUser) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
            photographer_id: user.photographer_id,
            organizer_id: user.organizer_id,
        }
    }
}

/// JWT claims: the payload plus issue and expiry timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(flatten)]
    pub payload: TokenPayload,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct LoginSuccess {
    pub token: String,
    pub user: PublicUser,
}

#[derive(Debug, Error)]
pub enum AuthFailure {
    #[error("{0}")]
    Invalid(&'static str),

    #[error("Uživatelské jméno je již obsazeno")]
    UsernameTaken,

    #[error("Tento e-mail je již registrován")]
    EmailTaken,

    #[error("Neplatné uživatelské jméno nebo heslo")]
    InvalidCredentials,

    #[error("Účet je deaktivován")]
    AccountInactive,

    #[error("Nepřihlášený uživatel")]
    MissingToken,

    #[error("Neplatný nebo expirovaný token")]
    InvalidToken,

    #[error("Uživatel nenalezen")]
    UserNotFound,

    #[error("Současné heslo není správné")]
    WrongPassword,

    #[error("Chyba při zpracování hesla")]
    Hashing,

    #[error("Nepodařilo se vytvořit token")]
    TokenCreation,

    #[error("Chyba databáze: {0}")]
    Storage(#[from] sqlx::Error),
}

impl From<AuthFailure> for ApiError {
    fn from(failure: AuthFailure) -> Self {
        match failure {
            AuthFailure::Invalid(_)
            | AuthFailure::UsernameTaken
            | AuthFailure::EmailTaken
            | AuthFailure::WrongPassword => ApiError::Validation(failure.to_string()),
            AuthFailure::InvalidCredentials
            | AuthFailure::AccountInactive
            | AuthFailure::MissingToken
            | AuthFailure::InvalidToken
            | AuthFailure::UserNotFound => ApiError::Authentication(failure.to_string()),
            AuthFailure::Hashing | AuthFailure::TokenCreation => {
                ApiError::Unexpected(failure.to_string())
            }
            AuthFailure::Storage(e) => ApiError::from(e),
        }
    }
}

// ============================================================================
// Passwords
// ============================================================================

pub fn hash_password(password: &str, cost: u32) -> Result<String, BcryptError> {
    bcrypt::hash(password, cost)
}

/// A malformed hash never verifies.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

// bcrypt is CPU-bound; keep it off the async executor.
async fn hash_on_blocking_pool(password: String, cost: u32) -> Result<String, AuthFailure> {
    match tokio::task::spawn_blocking(move || hash_password(&password, cost)).await {
        Ok(Ok(hash)) => Ok(hash),
        Ok(Err(e)) => {
            tracing::error!("Failed to hash password: {}", e);
            Err(AuthFailure::Hashing)
        }
        Err(e) => {
            tracing::error!("spawn_blocking panic during hash: {}", e);
            Err(AuthFailure::Hashing)
        }
    }
}

async fn verify_on_blocking_pool(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .unwrap_or(false)
}

// ============================================================================
// Tokens
// ============================================================================

pub fn generate_token(
    payload: &TokenPayload,
    config: &AuthConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::hours(config.token_ttl_hours);

    let claims = Claims {
        payload: payload.clone(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

/// `None` on a bad signature, malformed token or expiry.
pub fn verify_token(token: &str, config: &AuthConfig) -> Option<Claims> {
    match decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    ) {
        Ok(data) => Some(data.claims),
        Err(e) => {
            tracing::debug!("Token verification failed: {}", e);
            None
        }
    }
}

// ============================================================================
// Account operations
// ============================================================================

pub async fn login_user(
    store: &dyn UserStore,
    config: &AuthConfig,
    username: &str,
    password: &str,
) -> Result<LoginSuccess, AuthFailure> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(AuthFailure::Invalid("Uživatelské jméno a heslo jsou povinné"));
    }

    let Some(user) = store.find_by_username(username.trim()).await? else {
        tracing::warn!("Login attempt for unknown user: {}", username);
        return Err(AuthFailure::InvalidCredentials);
    };

    if !verify_on_blocking_pool(password.to_string(), user.password_hash.clone()).await {
        tracing::warn!("Failed login attempt for: {}", user.username);
        return Err(AuthFailure::InvalidCredentials);
    }

    if !user.active {
        tracing::warn!("Login attempt on inactive account: {}", user.username);
        return Err(AuthFailure::AccountInactive);
    }

    let user = PublicUser::from(user);
    let token = generate_token(&TokenPayload::from(&user), config).map_err(|e| {
        tracing::error!("Failed to create token: {}", e);
        AuthFailure::TokenCreation
    })?;

    tracing::info!("Successful login for user: {}", user.username);
    Ok(LoginSuccess { token, user })
}

pub async fn register_user(
    store: &dyn UserStore,
    config: &AuthConfig,
    username: &str,
    email: &str,
    password: &str,
) -> Result<i32, AuthFailure> {
    let username = username.trim();
    let email = email.trim();

    if username.is_empty() || email.is_empty() || password.is_empty() {
        return Err(AuthFailure::Invalid("Všechna pole jsou povinná"));
    }
    validation::username(username).map_err(AuthFailure::Invalid)?;
    validation::email(email).map_err(AuthFailure::Invalid)?;
    validation::password(password).map_err(AuthFailure::Invalid)?;

    if store.username_exists(username).await? {
        return Err(AuthFailure::UsernameTaken);
    }
    if store.email_exists(email).await? {
        return Err(AuthFailure::EmailTaken);
    }

    let password_hash = hash_on_blocking_pool(password.to_string(), config.bcrypt_cost).await?;

    let id = store
        .insert(NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
        })
        .await
        .map_err(|e| match &e {
            // Lost a race with a concurrent registration of the same name.
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                if db.constraint().is_some_and(|c| c.contains("email")) {
                    AuthFailure::EmailTaken
                } else {
                    AuthFailure::UsernameTaken
                }
            }
            _ => AuthFailure::Storage(e),
        })?;

    tracing::info!("User registered: {} (id {})", username, id);
    Ok(id)
}

/// Resolves a token to the user's current row, so deactivation and role
/// changes apply immediately rather than at token expiry.
pub async fn get_user_from_token(
    store: &dyn UserStore,
    config: &AuthConfig,
    token: &str,
) -> Result<PublicUser, AuthFailure> {
    let claims = verify_token(token, config).ok_or(AuthFailure::InvalidToken)?;

    let user = store
        .find_by_id(claims.payload.user_id)
        .await?
        .ok_or(AuthFailure::UserNotFound)?;

    if !user.active {
        return Err(AuthFailure::AccountInactive);
    }

    Ok(user.into())
}

pub async fn change_password(
    store: &dyn UserStore,
    config: &AuthConfig,
    user_id: i32,
    current_password: &str,
    new_password: &str,
) -> Result<(), AuthFailure> {
    if current_password.is_empty() || new_password.is_empty() {
        return Err(AuthFailure::Invalid("Současné i nové heslo jsou povinné"));
    }
    validation::password(new_password).map_err(AuthFailure::Invalid)?;

    let user = store
        .find_by_id(user_id)
        .await?
        .ok_or(AuthFailure::UserNotFound)?;

    if !verify_on_blocking_pool(current_password.to_string(), user.password_hash).await {
        return Err(AuthFailure::WrongPassword);
    }

    let password_hash = hash_on_blocking_pool(new_password.to_string(), config.bcrypt_cost).await?;
    store.update_password(user_id, &password_hash).await?;

    tracing::info!("Password changed for user id {}", user_id);
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "test-secret".to_string(),
        bcrypt_cost: 4,
        ..AuthConfig::default()
    }
}
