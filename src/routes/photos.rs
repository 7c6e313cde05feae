/**
 * Photo Routes
 * Browsing, likes, tagging and multipart photo upload
 */
use std::collections::HashMap;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::auth::request::can_edit_photographer;
use crate::db::models::{Photo, PhotoDetails, PublicUser, Tag};
use crate::error::ApiError;
use crate::listing::{self, ListResponse, SqlParam, PHOTOS};
use crate::routes::blobs::{read_image_field, UploadedImage};
use crate::routes::{parse_date, parse_id, ApiJson, ApiResponse};
use crate::state::AppState;

const PHOTO_COLUMNS: &str = "id, event_id, photographer_id, likes, date, created_at";

#[derive(Debug, Serialize, Deserialize)]
pub struct LikesResponse {
    pub id: i32,
    pub likes: i32,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssignTagsRequest {
    pub tag_ids: Vec<i32>,
}

// ============================================================================
// Reads
// ============================================================================

/// GET /api/photos
/// Filters: `event_id`, `photographer_id`, `date`, plus `tag_id`.
pub async fn list_photos(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListResponse<Photo>>, ApiError> {
    let pagination = listing::parse_pagination_params(&params, &PHOTOS);
    let mut filter = listing::parse_filter_params(&params, PHOTOS.exact_fields, PHOTOS.text_fields)?;

    if let Some(raw) = params.get("tag_id").map(|v| v.trim()).filter(|v| !v.is_empty()) {
        let tag_id = raw
            .parse::<i64>()
            .map_err(|_| ApiError::validation("Neplatná hodnota parametru tag_id"))?;
        filter.push(
            |n| format!("id IN (SELECT photo_id FROM photo_tags WHERE tag_id = ${n})"),
            SqlParam::Int(tag_id),
        );
    }

    let pool = state.pool()?;
    Ok(Json(
        listing::fetch_page(pool, &PHOTOS, &pagination, &filter).await?,
    ))
}

/// GET /api/photos/{id} - with event and photographer names and tag names
pub async fn get_photo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<PhotoDetails>>, ApiError> {
    let id = parse_id(&id)?;
    let pool = state.pool()?;

    let photo = sqlx::query_as::<_, PhotoDetails>(
        r#"
        SELECT p.id, p.event_id, p.photographer_id, p.likes, p.date, p.created_at,
               e.name AS event_name,
               ph.name AS photographer_name,
               COALESCE(
                   ARRAY_AGG(t.name ORDER BY t.name) FILTER (WHERE t.name IS NOT NULL),
                   '{}'::text[]
               ) AS tags
        FROM photos p
        LEFT JOIN events e ON e.id = p.event_id
        LEFT JOIN photographers ph ON ph.id = p.photographer_id
        LEFT JOIN photo_tags pt ON pt.photo_id = p.id
        LEFT JOIN tags t ON t.id = pt.tag_id
        WHERE p.id = $1
        GROUP BY p.id, e.name, ph.name
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(ApiError::not_found)?;

    Ok(Json(ApiResponse::data(photo)))
}

// ============================================================================
// Likes
// ============================================================================

/// POST /api/photos/{id}/like
/// Anonymous counter; no per-user tracking.
pub async fn like_photo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<LikesResponse>>, ApiError> {
    adjust_likes(&state, &id, "likes + 1").await
}

/// POST /api/photos/{id}/unlike - never drops below zero
pub async fn unlike_photo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<LikesResponse>>, ApiError> {
    adjust_likes(&state, &id, "GREATEST(likes - 1, 0)").await
}

async fn adjust_likes(
    state: &AppState,
    raw_id: &str,
    expression: &'static str,
) -> Result<Json<ApiResponse<LikesResponse>>, ApiError> {
    let id = parse_id(raw_id)?;
    let pool = state.pool()?;

    let (likes,): (i32,) = sqlx::query_as(&format!(
        "UPDATE photos SET likes = {expression} WHERE id = $1 RETURNING likes"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(ApiError::not_found)?;

    Ok(Json(ApiResponse::data(LikesResponse { id, likes })))
}

// ============================================================================
// Tags
// ============================================================================

/// POST /api/photos/{id}/tags - the photo's photographer or an admin
/// Unknown tag ids are skipped; already assigned ones are left alone.
pub async fn assign_tags(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<AssignTagsRequest>,
) -> Result<Json<ApiResponse<Vec<Tag>>>, ApiError> {
    let id = parse_id(&id)?;
    let user = state.current_user(&headers).await?;
    if payload.tag_ids.is_empty() {
        return Err(ApiError::validation("Nebyly zadány žádné štítky"));
    }
    let pool = state.pool()?;

    let (photographer_id,): (i32,) =
        sqlx::query_as("SELECT photographer_id FROM photos WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(ApiError::not_found)?;
    if !can_edit_photographer(&user, photographer_id) {
        return Err(ApiError::forbidden());
    }

    sqlx::query(
        r#"
        INSERT INTO photo_tags (photo_id, tag_id)
        SELECT $1, id FROM tags WHERE id = ANY($2)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(id)
    .bind(&payload.tag_ids)
    .execute(pool)
    .await?;

    let tags = sqlx::query_as::<_, Tag>(
        r#"
        SELECT t.id, t.name
        FROM tags t
        JOIN photo_tags pt ON pt.tag_id = t.id
        WHERE pt.photo_id = $1
        ORDER BY t.name
        "#,
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(Json(ApiResponse::with_message("Štítky byly přiřazeny", tags)))
}

// ============================================================================
// Upload
// ============================================================================

/// Parsed multipart form of `POST /api/photos`.
#[derive(Debug, Default)]
pub struct PhotoForm {
    pub file: Option<UploadedImage>,
    pub thumbnail: Option<UploadedImage>,
    pub event_id: Option<i32>,
    pub date: Option<NaiveDate>,
    pub photographer_id: Option<i32>,
}

fn optional_id(raw: &str) -> Result<Option<i32>, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        Ok(None)
    } else {
        parse_id(raw).map(Some)
    }
}

pub async fn read_photo_form(
    multipart: &mut Multipart,
    max_bytes: usize,
) -> Result<PhotoForm, ApiError> {
    let mut form = PhotoForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => form.file = Some(read_image_field(field, max_bytes).await?),
            "thumbnail" => form.thumbnail = Some(read_image_field(field, max_bytes).await?),
            "event_id" | "eventId" => form.event_id = optional_id(&field.text().await?)?,
            "photographer_id" | "photographerId" => {
                form.photographer_id = optional_id(&field.text().await?)?
            }
            "date" => {
                let text = field.text().await?;
                form.date = parse_date(Some(text.as_str()))?;
            }
            other => tracing::debug!(field = other, "ignoring multipart field"),
        }
    }

    Ok(form)
}

/// Admins upload on behalf of any photographer; everybody else as themselves.
fn uploading_photographer(user: &PublicUser, requested: Option<i32>) -> Result<i32, ApiError> {
    if user.is_admin() {
        return requested
            .or(user.photographer_id)
            .ok_or_else(|| ApiError::validation("Chybí fotograf"));
    }
    match (user.photographer_id, requested) {
        (Some(own), None) => Ok(own),
        (Some(own), Some(id)) if id == own => Ok(own),
        (Some(_), Some(_)) => Err(ApiError::forbidden()),
        (None, _) => Err(ApiError::Authorization(
            "Nejprve si vytvořte profil fotografa".to_string(),
        )),
    }
}

/// POST /api/photos
/// Photo row, file and optional thumbnail are written in one transaction.
pub async fn create_photo(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<Photo>>), ApiError> {
    let user = state.current_user(&headers).await?;
    let form = read_photo_form(&mut multipart, state.config.max_upload_bytes).await?;
    let photographer_id = uploading_photographer(&user, form.photographer_id)?;
    let file = form
        .file
        .ok_or_else(|| ApiError::validation("Nebyl nahrán žádný soubor"))?;
    let pool = state.pool()?;

    let mut tx = pool.begin().await?;

    let photo = sqlx::query_as::<_, Photo>(&format!(
        "INSERT INTO photos (event_id, photographer_id, date) VALUES ($1, $2, $3) \
         RETURNING {PHOTO_COLUMNS}"
    ))
    .bind(form.event_id)
    .bind(photographer_id)
    .bind(form.date)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO storage.photo_files (photo_id, data, content_type, original_name) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(photo.id)
    .bind(&file.data)
    .bind(file.content_type)
    .bind(&file.original_name)
    .execute(&mut *tx)
    .await?;

    if let Some(thumbnail) = &form.thumbnail {
        sqlx::query(
            "INSERT INTO storage.photo_thumbnails (photo_id, data, content_type) \
             VALUES ($1, $2, $3)",
        )
        .bind(photo.id)
        .bind(&thumbnail.data)
        .bind(thumbnail.content_type)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        photo_id = photo.id,
        photographer_id,
        bytes = file.data.len(),
        thumbnail = form.thumbnail.is_some(),
        "photo uploaded"
    );
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Fotografie byla nahrána", photo)),
    ))
}
