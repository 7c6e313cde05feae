/**
 * Tag Routes
 */
use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::models::Tag;
use crate::error::ApiError;
use crate::listing::{self, ListResponse, TAGS};
use crate::routes::{ApiJson, ApiResponse};
use crate::state::AppState;

pub const MAX_TAG_CHARS: usize = 50;

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CreateTagRequest {
    pub name: String,
}

/// Tags are compared trimmed and lowercased.
pub fn normalize_tag_name(raw: &str) -> Result<String, ApiError> {
    let name = raw.trim().to_lowercase();
    if name.is_empty() {
        return Err(ApiError::validation("Název štítku je povinný"));
    }
    if name.chars().count() > MAX_TAG_CHARS {
        return Err(ApiError::validation(format!(
            "Název štítku může mít nejvýše {MAX_TAG_CHARS} znaků"
        )));
    }
    Ok(name)
}

/// GET /api/tags
pub async fn list_tags(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListResponse<Tag>>, ApiError> {
    let pool = state.pool()?;
    Ok(Json(listing::handle_get_request(pool, &TAGS, &params).await?))
}

/// POST /api/tags
/// 201 with the new tag, or 200 with the existing one of the same name.
pub async fn create_tag(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<CreateTagRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Tag>>), ApiError> {
    state.current_user(&headers).await?;
    let name = normalize_tag_name(&payload.name)?;
    let pool = state.pool()?;

    let inserted = sqlx::query_as::<_, Tag>(
        "INSERT INTO tags (name) VALUES ($1) ON CONFLICT (name) DO NOTHING RETURNING id, name",
    )
    .bind(&name)
    .fetch_optional(pool)
    .await?;

    if let Some(tag) = inserted {
        return Ok((
            StatusCode::CREATED,
            Json(ApiResponse::with_message("Štítek byl vytvořen", tag)),
        ));
    }

    let existing = sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE name = $1")
        .bind(&name)
        .fetch_one(pool)
        .await?;

    Ok((StatusCode::OK, Json(ApiResponse::data(existing))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{call, Harness};
    use axum::routing::get;
    use axum::Router;
    use serde_json::json;

    #[test]
    fn test_normalize_tag_name() {
        assert_eq!(normalize_tag_name("  Canine ").unwrap(), "canine");
        assert!(normalize_tag_name("   ").is_err());
        assert!(normalize_tag_name(&"x".repeat(MAX_TAG_CHARS + 1)).is_err());
        assert!(normalize_tag_name(&"ž".repeat(MAX_TAG_CHARS)).is_ok());
    }

    #[tokio::test]
    async fn test_create_tag_requires_login() {
        let h = Harness::new();
        let app = Router::new()
            .route("/api/tags", get(list_tags).post(create_tag))
            .with_state(h.state.clone());

        let (status, _) = call(
            app.clone(),
            "POST",
            "/api/tags",
            None,
            Some(json!({ "name": "canine" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (_, token) = h.user("fox").await;
        let (status, _) = call(app, "POST", "/api/tags", Some(&token), Some(json!({ "name": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
