/**
 * Photographer Routes
 * Public profiles; each account may own at most one
 */
use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::request::can_edit_photographer;
use crate::db::models::Photographer;
use crate::error::ApiError;
use crate::listing::{self, ListResponse, PHOTOGRAPHERS};
use crate::routes::{clean_markdown, clean_name, clean_url, parse_id, ApiJson, ApiResponse};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PhotographerRequest {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub website: Option<String>,
    pub is_beginner: Option<bool>,
}

/// Validated and cleaned profile fields.
#[derive(Debug, PartialEq)]
struct PhotographerFields {
    name: Option<String>,
    bio: Option<String>,
    website: Option<String>,
    is_beginner: Option<bool>,
}

impl PhotographerRequest {
    fn validate(self, creating: bool) -> Result<PhotographerFields, ApiError> {
        Ok(PhotographerFields {
            name: clean_name(self.name, creating)?,
            bio: clean_markdown(self.bio),
            website: clean_url(self.website)?,
            is_beginner: self.is_beginner,
        })
    }
}

/// GET /api/photographers
pub async fn list_photographers(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListResponse<Photographer>>, ApiError> {
    let pool = state.pool()?;
    Ok(Json(
        listing::handle_get_request(pool, &PHOTOGRAPHERS, &params).await?,
    ))
}

/// GET /api/photographers/{id}
pub async fn get_photographer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Photographer>>, ApiError> {
    let id = parse_id(&id)?;
    let pool = state.pool()?;
    let photographer = listing::fetch_by_id(pool, &PHOTOGRAPHERS, id).await?;
    Ok(Json(ApiResponse::data(photographer)))
}

/// POST /api/photographers - creates the caller's profile and links it
pub async fn create_photographer(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<PhotographerRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Photographer>>), ApiError> {
    let user = state.current_user(&headers).await?;
    if user.photographer_id.is_some() {
        return Err(ApiError::validation("Již máte profil fotografa"));
    }
    let fields = payload.validate(true)?;
    let pool = state.pool()?;

    let mut tx = pool.begin().await?;

    let photographer = sqlx::query_as::<_, Photographer>(
        r#"
        INSERT INTO photographers (name, bio, website, is_beginner)
        VALUES ($1, $2, $3, $4)
        RETURNING id, name, bio, website, avatar_id, is_beginner, created_at
        "#,
    )
    .bind(&fields.name)
    .bind(&fields.bio)
    .bind(&fields.website)
    .bind(fields.is_beginner.unwrap_or(false))
    .fetch_one(&mut *tx)
    .await?;

    // Guarded so two concurrent creates cannot both link a profile.
    let linked = sqlx::query(
        "UPDATE users SET photographer_id = $1 WHERE id = $2 AND photographer_id IS NULL",
    )
    .bind(photographer.id)
    .bind(user.id)
    .execute(&mut *tx)
    .await?;
    if linked.rows_affected() == 0 {
        return Err(ApiError::validation("Již máte profil fotografa"));
    }

    tx.commit().await?;

    tracing::info!(photographer_id = photographer.id, user_id = user.id, "photographer created");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Profil fotografa byl vytvořen", photographer)),
    ))
}

/// PUT /api/photographers/{id}
pub async fn update_photographer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<PhotographerRequest>,
) -> Result<Json<ApiResponse<Photographer>>, ApiError> {
    let id = parse_id(&id)?;
    let user = state.current_user(&headers).await?;
    if !can_edit_photographer(&user, id) {
        return Err(ApiError::forbidden());
    }
    let fields = payload.validate(false)?;
    let pool = state.pool()?;

    let photographer = sqlx::query_as::<_, Photographer>(
        r#"
        UPDATE photographers
        SET name = COALESCE($1, name),
            bio = COALESCE($2, bio),
            website = COALESCE($3, website),
            is_beginner = COALESCE($4, is_beginner)
        WHERE id = $5
        RETURNING id, name, bio, website, avatar_id, is_beginner, created_at
        "#,
    )
    .bind(&fields.name)
    .bind(&fields.bio)
    .bind(&fields.website)
    .bind(fields.is_beginner)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(ApiError::not_found)?;

    Ok(Json(ApiResponse::with_message(
        "Profil fotografa byl aktualizován",
        photographer,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{call, Harness};
    use axum::routing::get;
    use axum::Router;
    use serde_json::json;

    fn router(h: &Harness) -> Router {
        Router::new()
            .route(
                "/api/photographers",
                get(list_photographers).post(create_photographer),
            )
            .route(
                "/api/photographers/{id}",
                get(get_photographer).put(update_photographer),
            )
            .with_state(h.state.clone())
    }

    #[test]
    fn test_validate_create_requires_name() {
        let err = PhotographerRequest::default().validate(true).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn test_validate_cleans_fields() {
        let fields = PhotographerRequest {
            name: Some("  Fenrir ".into()),
            bio: Some("<script>x</script>Paws".into()),
            website: Some("".into()),
            is_beginner: Some(true),
        }
        .validate(true)
        .unwrap();
        assert_eq!(fields.name.as_deref(), Some("Fenrir"));
        assert_eq!(fields.bio.as_deref(), Some("Paws"));
        assert_eq!(fields.website, None);
    }

    #[test]
    fn test_validate_rejects_bad_website() {
        let err = PhotographerRequest {
            website: Some("javascript:alert(1)".into()),
            ..Default::default()
        }
        .validate(false)
        .unwrap_err();
        assert_eq!(err.to_string(), "Neplatná URL adresa");
    }

    #[tokio::test]
    async fn test_create_requires_login() {
        let h = Harness::new();
        let (status, _) = call(
            router(&h),
            "POST",
            "/api/photographers",
            None,
            Some(json!({ "name": "Fenrir" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_second_profile_is_rejected() {
        let h = Harness::new();
        let (id, _) = h.user("fox").await;
        h.store.link_photographer(id, Some(4)).await;
        let token = h.token(id).await;

        let (status, body) = call(
            router(&h),
            "POST",
            "/api/photographers",
            Some(&token),
            Some(json!({ "name": "Fenrir" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Již máte profil fotografa");
    }

    #[tokio::test]
    async fn test_update_requires_ownership() {
        let h = Harness::new();
        let (id, _) = h.user("fox").await;
        h.store.link_photographer(id, Some(4)).await;
        let token = h.token(id).await;

        let (status, _) = call(
            router(&h),
            "PUT",
            "/api/photographers/5",
            Some(&token),
            Some(json!({ "name": "Other" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // Owner passes the permission check and reaches storage.
        let (status, _) = call(
            router(&h),
            "PUT",
            "/api/photographers/4",
            Some(&token),
            Some(json!({ "name": "Mine" })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_reads_need_database() {
        let h = Harness::new();
        let (status, _) = call(router(&h), "GET", "/api/photographers", None, None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _) = call(router(&h), "GET", "/api/photographers/x", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
