/**
 * Event Routes
 * Conventions and meets, owned by an organizer profile
 */
use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::auth::request::can_edit_organizer;
use crate::db::models::{Event, PublicUser};
use crate::error::ApiError;
use crate::listing::{self, ListResponse, EVENTS};
use crate::routes::{clean_markdown, clean_name, clean_text, parse_date, parse_id, ApiJson, ApiResponse};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub date: Option<String>,
    pub organizer_id: Option<i32>,
    pub cover_image_id: Option<i32>,
}

#[derive(Debug)]
struct EventFields {
    name: Option<String>,
    description: Option<String>,
    location: Option<String>,
    date: Option<NaiveDate>,
    organizer_id: Option<i32>,
    cover_image_id: Option<i32>,
}

impl EventRequest {
    fn validate(self, creating: bool) -> Result<EventFields, ApiError> {
        Ok(EventFields {
            name: clean_name(self.name, creating)?,
            description: clean_markdown(self.description),
            location: clean_text(self.location),
            date: parse_date(self.date.as_deref())?,
            organizer_id: self.organizer_id,
            cover_image_id: self.cover_image_id,
        })
    }
}

/// Organizer the new event belongs to: admins may pick one, everybody else
/// must have an organizer profile and gets that one.
fn owning_organizer(user: &PublicUser, requested: Option<i32>) -> Result<Option<i32>, ApiError> {
    if user.is_admin() {
        return Ok(requested.or(user.organizer_id));
    }
    match user.organizer_id {
        Some(own) if requested.is_none_or(|id| id == own) => Ok(Some(own)),
        _ => Err(ApiError::forbidden()),
    }
}

/// GET /api/events
pub async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListResponse<Event>>, ApiError> {
    let pool = state.pool()?;
    Ok(Json(listing::handle_get_request(pool, &EVENTS, &params).await?))
}

/// GET /api/events/{id}
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Event>>, ApiError> {
    let id = parse_id(&id)?;
    let pool = state.pool()?;
    Ok(Json(ApiResponse::data(
        listing::fetch_by_id(pool, &EVENTS, id).await?,
    )))
}

/// POST /api/events - organizers and admins
pub async fn create_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<EventRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Event>>), ApiError> {
    let user = state.current_user(&headers).await?;
    let fields = payload.validate(true)?;
    let organizer_id = owning_organizer(&user, fields.organizer_id)?;
    let pool = state.pool()?;

    let event = sqlx::query_as::<_, Event>(
        r#"
        INSERT INTO events (name, description, location, date, organizer_id, cover_image_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, name, description, location, date, organizer_id, cover_image_id, created_at
        "#,
    )
    .bind(&fields.name)
    .bind(&fields.description)
    .bind(&fields.location)
    .bind(fields.date)
    .bind(organizer_id)
    .bind(fields.cover_image_id)
    .fetch_one(pool)
    .await?;

    tracing::info!(event_id = event.id, user_id = user.id, "event created");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Událost byla vytvořena", event)),
    ))
}

/// PUT /api/events/{id} - the owning organizer or an admin
pub async fn update_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<EventRequest>,
) -> Result<Json<ApiResponse<Event>>, ApiError> {
    let id = parse_id(&id)?;
    let user = state.current_user(&headers).await?;
    let fields = payload.validate(false)?;
    if fields.organizer_id.is_some() && !user.is_admin() {
        return Err(ApiError::forbidden());
    }
    let pool = state.pool()?;

    let current: Event = listing::fetch_by_id(pool, &EVENTS, id).await?;
    let allowed = match current.organizer_id {
        Some(organizer_id) => can_edit_organizer(&user, organizer_id),
        None => user.is_admin(),
    };
    if !allowed {
        return Err(ApiError::forbidden());
    }

    let event = sqlx::query_as::<_, Event>(
        r#"
        UPDATE events
        SET name = COALESCE($1, name),
            description = COALESCE($2, description),
            location = COALESCE($3, location),
            date = COALESCE($4, date),
            organizer_id = COALESCE($5, organizer_id),
            cover_image_id = COALESCE($6, cover_image_id)
        WHERE id = $7
        RETURNING id, name, description, location, date, organizer_id, cover_image_id, created_at
        "#,
    )
    .bind(&fields.name)
    .bind(&fields.description)
    .bind(&fields.location)
    .bind(fields.date)
    .bind(fields.organizer_id)
    .bind(fields.cover_image_id)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(ApiError::not_found)?;

    Ok(Json(ApiResponse::with_message("Událost byla aktualizována", event)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{call, Harness};
    use axum::routing::get;
    use axum::Router;
    use chrono::Utc;
    use serde_json::json;

    fn router(h: &Harness) -> Router {
        Router::new()
            .route("/api/events", get(list_events).post(create_event))
            .route("/api/events/{id}", get(get_event).put(update_event))
            .with_state(h.state.clone())
    }

    fn user(role: &str, organizer_id: Option<i32>) -> PublicUser {
        PublicUser {
            id: 1,
            username: "lynx".into(),
            email: "lynx@example.com".into(),
            role: role.into(),
            active: true,
            photographer_id: None,
            organizer_id,
            avatar_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_owning_organizer_rules() {
        assert_eq!(owning_organizer(&user("user", Some(3)), None).unwrap(), Some(3));
        assert_eq!(owning_organizer(&user("user", Some(3)), Some(3)).unwrap(), Some(3));
        assert!(owning_organizer(&user("user", Some(3)), Some(4)).is_err());
        assert!(owning_organizer(&user("user", None), None).is_err());
        assert_eq!(owning_organizer(&user("admin", None), Some(8)).unwrap(), Some(8));
        assert_eq!(owning_organizer(&user("admin", None), None).unwrap(), None);
    }

    #[test]
    fn test_validate_parses_date() {
        let fields = EventRequest {
            name: Some("FurMeet".into()),
            date: Some("2025-03-14".into()),
            ..Default::default()
        }
        .validate(true)
        .unwrap();
        assert_eq!(fields.date, NaiveDate::from_ymd_opt(2025, 3, 14));

        let err = EventRequest {
            name: Some("FurMeet".into()),
            date: Some("14.3.2025".into()),
            ..Default::default()
        }
        .validate(true)
        .unwrap_err();
        assert_eq!(err.to_string(), "Neplatné datum");
    }

    #[tokio::test]
    async fn test_create_requires_organizer_profile() {
        let h = Harness::new();
        let (_, token) = h.user("fox").await;
        let (status, _) = call(
            router(&h),
            "POST",
            "/api/events",
            Some(&token),
            Some(json!({ "name": "FurMeet" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (id, _) = h.user("wolf").await;
        h.store.link_organizer(id, Some(1)).await;
        let token = h.token(id).await;
        let (status, _) = call(
            router(&h),
            "POST",
            "/api/events",
            Some(&token),
            Some(json!({ "name": "FurMeet", "date": "2025-03-14" })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_update_cannot_move_event_without_admin() {
        let h = Harness::new();
        let (id, _) = h.user("wolf").await;
        h.store.link_organizer(id, Some(1)).await;
        let token = h.token(id).await;

        let (status, _) = call(
            router(&h),
            "PUT",
            "/api/events/3",
            Some(&token),
            Some(json!({ "organizerId": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_list_without_database() {
        let h = Harness::new();
        let (status, body) = call(router(&h), "GET", "/api/events?page=2", None, None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["message"], "Databáze není dostupná");
    }
}
