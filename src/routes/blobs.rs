/**
 * Blob Routes
 * Binary images stored in the `storage` schema: retrieval with ETag
 * revalidation, and multipart uploads checked by magic bytes.
 */
use axum::{
    body::Body,
    extract::{multipart::Field, Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::db::models::StoredBlob;
use crate::error::ApiError;
use crate::routes::{parse_id, ApiResponse};
use crate::state::AppState;

const IMMUTABLE: &str = "public, max-age=31536000, immutable";
const REVALIDATE: &str = "no-cache";

// ============================================================================
// Retrieval
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobKind {
    Avatar,
    PhotoFile,
    PhotoThumbnail,
    MarkdownImage,
    ProfileImage,
}

impl BlobKind {
    /// Photo files and thumbnails are keyed by photo id, the rest by their own id.
    fn select_sql(self) -> &'static str {
        match self {
            Self::Avatar => {
                "SELECT data, content_type, NULL::text AS original_name \
                 FROM storage.avatars WHERE id = $1"
            }
            Self::PhotoFile => {
                "SELECT data, content_type, original_name \
                 FROM storage.photo_files WHERE photo_id = $1"
            }
            Self::PhotoThumbnail => {
                "SELECT data, content_type, NULL::text AS original_name \
                 FROM storage.photo_thumbnails WHERE photo_id = $1"
            }
            Self::MarkdownImage => {
                "SELECT data, content_type, original_name \
                 FROM storage.markdown_images WHERE id = $1"
            }
            Self::ProfileImage => {
                "SELECT data, content_type, NULL::text AS original_name \
                 FROM storage.profile_images WHERE id = $1"
            }
        }
    }

    /// Avatars and profile images can be replaced under the same id.
    pub fn cache_control(self) -> &'static str {
        match self {
            Self::PhotoFile | Self::PhotoThumbnail | Self::MarkdownImage => IMMUTABLE,
            Self::Avatar | Self::ProfileImage => REVALIDATE,
        }
    }
}

pub async fn load_blob(
    pool: &PgPool,
    kind: BlobKind,
    id: i32,
) -> Result<Option<StoredBlob>, sqlx::Error> {
    sqlx::query_as::<_, StoredBlob>(kind.select_sql())
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Strong ETag over the blob bytes.
pub fn etag_for(data: &[u8]) -> String {
    format!("\"{:x}\"", Sha256::digest(data))
}

fn if_none_match_hits(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get_all(header::IF_NONE_MATCH)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|candidate| candidate.trim().trim_start_matches("W/"))
        .any(|candidate| candidate == "*" || candidate == etag)
}

/// `inline` disposition with an ASCII fallback name plus the RFC 5987 form.
pub fn content_disposition(original_name: &str) -> String {
    let fallback: String = original_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let mut encoded = String::with_capacity(original_name.len() * 3);
    for byte in original_name.bytes() {
        if byte.is_ascii_alphanumeric() || b"-._~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }

    format!("inline; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}

fn put_cache_headers(headers: &mut HeaderMap, kind: BlobKind, etag: &str) {
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(kind.cache_control()),
    );
    if let Ok(value) = HeaderValue::from_str(etag) {
        headers.insert(header::ETAG, value);
    }
}

/// 304 when the client already holds these bytes, otherwise the full blob.
pub fn blob_response(blob: StoredBlob, kind: BlobKind, request_headers: &HeaderMap) -> Response {
    let etag = etag_for(&blob.data);

    if if_none_match_hits(request_headers, &etag) {
        let mut response = StatusCode::NOT_MODIFIED.into_response();
        put_cache_headers(response.headers_mut(), kind, &etag);
        return response;
    }

    let mut response = Response::new(Body::from(blob.data));
    let headers = response.headers_mut();
    let content_type = HeaderValue::from_str(&blob.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);
    put_cache_headers(headers, kind, &etag);
    if let Some(name) = blob.original_name.as_deref().filter(|n| !n.is_empty()) {
        if let Ok(value) = HeaderValue::from_str(&content_disposition(name)) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }
    response
}

async fn serve(
    state: &AppState,
    kind: BlobKind,
    raw_id: &str,
    headers: &HeaderMap,
) -> Result<Response, ApiError> {
    let id = parse_id(raw_id)?;
    let pool = state.pool()?;
    let blob = load_blob(pool, kind, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Obrázek nebyl nalezen".to_string()))?;
    Ok(blob_response(blob, kind, headers))
}

/// GET /api/avatars/{id}
pub async fn get_avatar(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    serve(&state, BlobKind::Avatar, &id, &headers).await
}

/// GET /api/photos/{id}/file
pub async fn get_photo_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    serve(&state, BlobKind::PhotoFile, &id, &headers).await
}

/// GET /api/photos/{id}/thumbnail
pub async fn get_photo_thumbnail(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    serve(&state, BlobKind::PhotoThumbnail, &id, &headers).await
}

/// GET /api/images/{id}
pub async fn get_markdown_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    serve(&state, BlobKind::MarkdownImage, &id, &headers).await
}

/// GET /api/profile-images/{id}
pub async fn get_profile_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    serve(&state, BlobKind::ProfileImage, &id, &headers).await
}

// ============================================================================
// Uploads
// ============================================================================

/// An image that passed the size and magic-byte checks.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub data: Vec<u8>,
    pub content_type: &'static str,
    pub original_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadedBlob {
    pub id: i32,
    pub url: String,
}

pub fn detect_image_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 4 {
        return None;
    }
    match bytes {
        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        // PNG: 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        // GIF: 47 49 46 38
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        // WebP: RIFF .... WEBP
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        _ => None,
    }
}

/// Last path component only, at most 255 characters.
fn clean_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let base: String = base
        .chars()
        .filter(|c| !c.is_control())
        .take(255)
        .collect();
    let base = base.trim().to_string();
    (!base.is_empty() && base != "." && base != "..").then_some(base)
}

pub fn validate_image(
    data: Vec<u8>,
    file_name: Option<&str>,
    max_bytes: usize,
) -> Result<UploadedImage, ApiError> {
    if data.is_empty() {
        return Err(ApiError::validation("Prázdný soubor"));
    }
    if data.len() > max_bytes {
        return Err(ApiError::validation(format!(
            "Soubor je příliš velký (maximum je {} MB)",
            max_bytes / (1024 * 1024)
        )));
    }
    let content_type = detect_image_type(&data).ok_or_else(|| {
        ApiError::validation("Nepodporovaný formát obrázku. Povolené: JPEG, PNG, GIF, WebP")
    })?;

    Ok(UploadedImage {
        data,
        content_type,
        original_name: file_name.and_then(clean_file_name),
    })
}

pub async fn read_image_field(
    field: Field<'_>,
    max_bytes: usize,
) -> Result<UploadedImage, ApiError> {
    let file_name = field.file_name().map(str::to_string);
    let data = field.bytes().await?;
    validate_image(data.to_vec(), file_name.as_deref(), max_bytes)
}

/// The `file` part of a single-image upload (or the first part carrying a file name).
async fn single_image(multipart: &mut Multipart, max_bytes: usize) -> Result<UploadedImage, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") || field.file_name().is_some() {
            return read_image_field(field, max_bytes).await;
        }
    }
    Err(ApiError::validation("Nebyl nahrán žádný soubor"))
}

fn uploaded(id: i32, prefix: &str, message: &str) -> (StatusCode, Json<ApiResponse<UploadedBlob>>) {
    (
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            message,
            UploadedBlob {
                id,
                url: format!("{prefix}/{id}"),
            },
        )),
    )
}

/// POST /api/avatars - stores the image and makes it the caller's avatar
pub async fn upload_avatar(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.current_user(&headers).await?;
    let image = single_image(&mut multipart, state.config.max_upload_bytes).await?;
    let pool = state.pool()?;

    let mut tx = pool.begin().await?;
    let (id,): (i32,) = sqlx::query_as(
        "INSERT INTO storage.avatars (data, content_type, user_id) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(&image.data)
    .bind(image.content_type)
    .bind(user.id)
    .fetch_one(&mut *tx)
    .await?;
    sqlx::query("UPDATE users SET avatar_id = $1 WHERE id = $2")
        .bind(id)
        .bind(user.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(avatar_id = id, user_id = user.id, bytes = image.data.len(), "avatar uploaded");
    Ok(uploaded(id, "/api/avatars", "Avatar byl nahrán"))
}

/// POST /api/profile-images
pub async fn upload_profile_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.current_user(&headers).await?;
    let image = single_image(&mut multipart, state.config.max_upload_bytes).await?;
    let pool = state.pool()?;

    let (id,): (i32,) = sqlx::query_as(
        "INSERT INTO storage.profile_images (data, content_type, user_id) \
         VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(&image.data)
    .bind(image.content_type)
    .bind(user.id)
    .fetch_one(pool)
    .await?;

    tracing::info!(profile_image_id = id, user_id = user.id, "profile image uploaded");
    Ok(uploaded(id, "/api/profile-images", "Obrázek byl nahrán"))
}

/// POST /api/images - images embedded in markdown descriptions
pub async fn upload_markdown_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.current_user(&headers).await?;
    let image = single_image(&mut multipart, state.config.max_upload_bytes).await?;
    let pool = state.pool()?;

    let (id,): (i32,) = sqlx::query_as(
        "INSERT INTO storage.markdown_images (data, content_type, original_name, user_id) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(&image.data)
    .bind(image.content_type)
    .bind(&image.original_name)
    .bind(user.id)
    .fetch_one(pool)
    .await?;

    tracing::info!(image_id = id, user_id = user.id, "markdown image uploaded");
    Ok(uploaded(id, "/api/images", "Obrázek byl nahrán"))
}
