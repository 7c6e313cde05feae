/**
 * Organizer Routes
 * Event organizer profiles, one per account
 */
use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::request::can_edit_organizer;
use crate::db::models::Organizer;
use crate::error::ApiError;
use crate::listing::{self, ListResponse, ORGANIZERS};
use crate::routes::{clean_markdown, clean_name, clean_url, parse_id, ApiJson, ApiResponse};
use crate::state::AppState;

const ORGANIZER_COLUMNS: &str = "id, name, description, website, avatar_id, is_beginner, created_at";

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OrganizerRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub is_beginner: Option<bool>,
}

struct OrganizerFields {
    name: Option<String>,
    description: Option<String>,
    website: Option<String>,
    is_beginner: Option<bool>,
}

impl OrganizerRequest {
    fn validate(self, creating: bool) -> Result<OrganizerFields, ApiError> {
        Ok(OrganizerFields {
            name: clean_name(self.name, creating)?,
            description: clean_markdown(self.description),
            website: clean_url(self.website)?,
            is_beginner: self.is_beginner,
        })
    }
}

/// GET /api/organizers
pub async fn list_organizers(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListResponse<Organizer>>, ApiError> {
    let pool = state.pool()?;
    Ok(Json(
        listing::handle_get_request(pool, &ORGANIZERS, &params).await?,
    ))
}

/// GET /api/organizers/{id}
pub async fn get_organizer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Organizer>>, ApiError> {
    let id = parse_id(&id)?;
    let pool = state.pool()?;
    Ok(Json(ApiResponse::data(
        listing::fetch_by_id(pool, &ORGANIZERS, id).await?,
    )))
}

/// POST /api/organizers
pub async fn create_organizer(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<OrganizerRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Organizer>>), ApiError> {
    let user = state.current_user(&headers).await?;
    if user.organizer_id.is_some() {
        return Err(ApiError::validation("Již máte profil organizátora"));
    }
    let fields = payload.validate(true)?;
    let pool = state.pool()?;

    let mut tx = pool.begin().await?;

    let organizer = sqlx::query_as::<_, Organizer>(&format!(
        r#"
        INSERT INTO organizers (name, description, website, is_beginner)
        VALUES ($1, $2, $3, $4)
        RETURNING {ORGANIZER_COLUMNS}
        "#
    ))
    .bind(&fields.name)
    .bind(&fields.description)
    .bind(&fields.website)
    .bind(fields.is_beginner.unwrap_or(false))
    .fetch_one(&mut *tx)
    .await?;

    let linked = sqlx::query(
        "UPDATE users SET organizer_id = $1 WHERE id = $2 AND organizer_id IS NULL",
    )
    .bind(organizer.id)
    .bind(user.id)
    .execute(&mut *tx)
    .await?;
    if linked.rows_affected() == 0 {
        return Err(ApiError::validation("Již máte profil organizátora"));
    }

    tx.commit().await?;

    tracing::info!(organizer_id = organizer.id, user_id = user.id, "organizer created");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Profil organizátora byl vytvořen", organizer)),
    ))
}

/// PUT /api/organizers/{id}
pub async fn update_organizer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<OrganizerRequest>,
) -> Result<Json<ApiResponse<Organizer>>, ApiError> {
    let id = parse_id(&id)?;
    let user = state.current_user(&headers).await?;
    if !can_edit_organizer(&user, id) {
        return Err(ApiError::forbidden());
    }
    let fields = payload.validate(false)?;
    let pool = state.pool()?;

    let organizer = sqlx::query_as::<_, Organizer>(&format!(
        r#"
        UPDATE organizers
        SET name = COALESCE($1, name),
            description = COALESCE($2, description),
            website = COALESCE($3, website),
            is_beginner = COALESCE($4, is_beginner)
        WHERE id = $5
        RETURNING {ORGANIZER_COLUMNS}
        "#
    ))
    .bind(&fields.name)
    .bind(&fields.description)
    .bind(&fields.website)
    .bind(fields.is_beginner)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(ApiError::not_found)?;

    Ok(Json(ApiResponse::with_message(
        "Profil organizátora byl aktualizován",
        organizer,
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
            .route("/api/organizers", get(list_organizers).post(create_organizer))
            .route("/api/organizers/{id}", get(get_organizer).put(update_organizer))
            .with_state(h.state.clone())
    }

    #[tokio::test]
    async fn test_create_validates_before_storage() {
        let h = Harness::new();
        let (_, token) = h.user("fox").await;

        let (status, body) = call(
            router(&h),
            "POST",
            "/api/organizers",
            Some(&token),
            Some(json!({ "description": "no name" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Název je povinný");

        let (status, _) = call(
            router(&h),
            "POST",
            "/api/organizers",
            Some(&token),
            Some(json!({ "name": "FurFest", "website": "https://furfest.example" })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_second_profile_is_rejected() {
        let h = Harness::new();
        let (id, _) = h.user("fox").await;
        h.store.link_organizer(id, Some(2)).await;
        let token = h.token(id).await;

        let (status, _) = call(
            router(&h),
            "POST",
            "/api/organizers",
            Some(&token),
            Some(json!({ "name": "FurFest" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_photographer_link_does_not_grant_organizer_edit() {
        let h = Harness::new();
        let (id, _) = h.user("fox").await;
        h.store.link_photographer(id, Some(2)).await;
        let token = h.token(id).await;

        let (status, _) = call(
            router(&h),
            "PUT",
            "/api/organizers/2",
            Some(&token),
            Some(json!({ "name": "Mine" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_may_edit_any_organizer() {
        let h = Harness::new();
        let (_, token) = h.admin("boss").await;
        let (status, _) = call(
            router(&h),
            "PUT",
            "/api/organizers/9",
            Some(&token),
            Some(json!({ "name": "Renamed" })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
