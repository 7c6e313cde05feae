/**
 * User Routes
 * Account listing (admin), detail and updates
 */
use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::models::{AccountChanges, PublicUser, ROLE_ADMIN, ROLE_USER};
use crate::error::ApiError;
use crate::listing::{self, ListResponse};
use crate::routes::{parse_id, ApiJson, ApiResponse};
use crate::state::AppState;
use crate::validation;

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub role: Option<String>,
    pub active: Option<bool>,
}

/// GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListResponse<PublicUser>>, ApiError> {
    state.require_admin(&headers).await?;
    let pool = state.pool()?;
    Ok(Json(
        listing::handle_get_request(pool, &listing::USERS, &params).await?,
    ))
}

/// GET /api/users/{id} - the caller's own account, or any account for admins
pub async fn get_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<PublicUser>>, ApiError> {
    let id = parse_id(&id)?;
    let caller = state.current_user(&headers).await?;
    if caller.id != id && !caller.is_admin() {
        return Err(ApiError::forbidden());
    }

    let user = state
        .users()
        .find_by_id(id)
        .await?
        .ok_or_else(ApiError::not_found)?;

    Ok(Json(ApiResponse::data(user.into())))
}

/// PUT /api/users/{id}
/// Users may change their own e-mail; admins may also change role and active.
pub async fn update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateUserRequest>,
) -> Result<Json<ApiResponse<PublicUser>>, ApiError> {
    let id = parse_id(&id)?;
    let caller = state.current_user(&headers).await?;
    if caller.id != id && !caller.is_admin() {
        return Err(ApiError::forbidden());
    }
    if (payload.role.is_some() || payload.active.is_some()) && !caller.is_admin() {
        return Err(ApiError::forbidden());
    }

    let changes = validate_changes(payload)?;

    let current = state
        .users()
        .find_by_id(id)
        .await?
        .ok_or_else(ApiError::not_found)?;

    if let Some(email) = &changes.email {
        if !email.eq_ignore_ascii_case(&current.email) && state.users().email_exists(email).await? {
            return Err(ApiError::validation("Tento e-mail je již registrován"));
        }
    }

    let user = state
        .users()
        .update_account(id, &changes)
        .await?
        .ok_or_else(ApiError::not_found)?;

    tracing::info!(user_id = id, by = caller.id, "account updated");
    Ok(Json(ApiResponse::with_message(
        "Uživatel byl aktualizován",
        user.into(),
    )))
}

fn validate_changes(payload: UpdateUserRequest) -> Result<AccountChanges, ApiError> {
    let email = match payload.email {
        Some(email) => {
            let email = email.trim().to_string();
            validation::email(&email).map_err(ApiError::validation)?;
            Some(email)
        }
        None => None,
    };

    if let Some(role) = &payload.role {
        if role != ROLE_ADMIN && role != ROLE_USER {
            return Err(ApiError::validation("Neplatná role"));
        }
    }

    Ok(AccountChanges {
        email,
        role: payload.role,
        active: payload.active,
    })
}
