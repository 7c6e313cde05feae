//! Request-side auth helpers: token extraction, request authentication,
//! ownership predicates and the 401/403 envelopes.

use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use super::{get_user_from_token, AuthFailure};
use crate::config::AuthConfig;
use crate::db::models::PublicUser;
use crate::db::users::UserStore;
use crate::error::error_envelope;

/// Primary cookie, then the legacy cookie, then `Authorization: Bearer`.
pub fn get_token_from_request(headers: &HeaderMap, config: &AuthConfig) -> Option<String> {
    cookie_value(headers, &config.cookie_name)
        .or_else(|| cookie_value(headers, &config.legacy_cookie_name))
        .or_else(|| bearer_token(headers))
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

pub async fn authenticate_request(
    headers: &HeaderMap,
    store: &dyn UserStore,
    config: &AuthConfig,
) -> Result<PublicUser, AuthFailure> {
    let token = get_token_from_request(headers, config).ok_or(AuthFailure::MissingToken)?;
    get_user_from_token(store, config, &token).await
}

pub fn can_edit_photographer(user: &PublicUser, photographer_id: i32) -> bool {
    user.is_admin() || user.photographer_id == Some(photographer_id)
}

pub fn can_edit_organizer(user: &PublicUser, organizer_id: i32) -> bool {
    user.is_admin() || user.organizer_id == Some(organizer_id)
}

pub fn auth_error_response(message: &str, status: StatusCode) -> Response {
    let mut response = error_envelope(message, status);
    if status == StatusCode::UNAUTHORIZED {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    response
}

pub fn permission_error_response(message: &str, status: StatusCode) -> Response {
    error_envelope(message, status).into_response()
}

/// HttpOnly session cookie carrying the token for its whole lifetime.
pub fn session_cookie(token: &str, config: &AuthConfig) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
        config.cookie_name,
        token,
        config.token_ttl_hours.max(0) * 3600,
        if config.secure_cookies { "; Secure" } else { "" }
    )
}

/// Expiring `Set-Cookie` values for both the primary and the legacy cookie.
pub fn clear_session_cookies(config: &AuthConfig) -> [String; 2] {
    [&config.cookie_name, &config.legacy_cookie_name].map(|name| {
        format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
    })
}
